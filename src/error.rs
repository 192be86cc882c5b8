// fastqsumm: Sample reads and fastqcheck statistics from SAM and BAM files.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::path::PathBuf;

/// Result type used throughout fastqsumm.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Each variant terminates a run with its own exit status.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input could not be opened or read as SAM or BAM.
    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sample file or fastqcheck report could not be created or written.
    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The count in a `name:count` tag count spec is not a number.
    #[error("invalid count in tag count spec {spec}")]
    TagCount { spec: String },

    /// A sequence is longer than the accumulator was configured for.
    #[error("read {name} length = {length} longer than maximum length = {max_length}; rerun with a larger --max-length")]
    SequenceTooLong {
        name: String,
        length: usize,
        max_length: usize,
    },

    /// Invalid run configuration.
    #[error("{0}")]
    Config(String),
}

impl Error {
    /// Process exit status for this class of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Input { .. } => 2,
            Error::Output { .. } => 3,
            Error::TagCount { .. } => 4,
            Error::SequenceTooLong { .. } => 5,
            Error::Config(_) => 6,
        }
    }

    pub(crate) fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Input { path: path.into(), source }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Output { path: path.into(), source }
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn exit_codes_are_distinct() {
        use super::Error;
        use std::collections::HashSet;

        let errors = vec![
            Error::input("in.sam", std::io::Error::other("x")),
            Error::output("out", std::io::Error::other("x")),
            Error::TagCount { spec: "#1:zz".to_string() },
            Error::SequenceTooLong { name: "r1".to_string(), length: 11, max_length: 10 },
            Error::Config("x".to_string()),
        ];

        let codes: HashSet<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }
}
