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

//! Output locations and file names.
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::error::Error;
use crate::error::Result;

/// Default directory for the output files.
pub const DEFAULT_LANE_DIR: &str = ".npg_cache_10000";

/// Output stream of a destination group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    /// Single-end reads or mate 1.
    One,
    /// Mate 2.
    Two,
    /// Tag reads.
    Tag,
}

impl Stream {
    fn label(&self) -> char {
        match self {
            Stream::One => '1',
            Stream::Two => '2',
            Stream::Tag => 't',
        }
    }
}

/// Where output goes: `<dir>/<base>...`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSpec {
    pub dir: PathBuf,
    pub base: String,
}

impl OutputSpec {
    pub fn new(
        dir: impl Into<PathBuf>,
        base: impl Into<String>,
    ) -> Self {
        OutputSpec { dir: dir.into(), base: base.into() }
    }

    /// Sample file, `<base>_<stream><key>.fastq.<n>`.
    pub fn fastq_path(
        &self,
        stream: Stream,
        key: &str,
        n: u64,
    ) -> PathBuf {
        self.dir.join(format!("{}_{}{}.fastq.{}", self.base, stream.label(), key, n))
    }

    /// Statistics report, `<base>_<stream><key>.fastqcheck`.
    pub fn fastqcheck_path(
        &self,
        stream: Stream,
        key: &str,
    ) -> PathBuf {
        self.dir.join(format!("{}_{}{}.fastqcheck", self.base, stream.label(), key))
    }

    /// Create the output directory if it does not exist.
    ///
    /// An existing path that is not a directory is an error.
    pub fn prepare(&self) -> Result<()> {
        prepare_dir(&self.dir)
    }
}

fn prepare_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(())
    }
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::Config(format!("{} exists and is not a directory", dir.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("Creating output directory {}", dir.display());
            std::fs::create_dir_all(dir).map_err(|e| Error::output(dir, e))
        },
        Err(e) => Err(Error::output(dir, e)),
    }
}

/// Base name used when none is given, `genoutfn_<seconds since epoch>`.
pub fn generated_base_name() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    format!("genoutfn_{}", secs)
}
