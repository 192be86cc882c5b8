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

//! Standalone fastqcheck for FASTQ input.
use std::io::Read;
use std::path::Path;

use needletail::errors::ParseErrorKind;
use needletail::parser::FastxReader;

use crate::error::Error;
use crate::error::Result;
use crate::fastqcheck::FastqCheck;
use crate::sequence::base_class;

/// Maximum read length accepted by the standalone check.
pub const CHECK_MAX_LENGTH: usize = 1_000_000;

const PHRED_OFFSET: u8 = 33;

fn parse_error(
    path: &Path,
    e: needletail::errors::ParseError,
) -> Error {
    Error::input(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

/// Count every record of a FASTQ file, plain or gzip compressed.
pub fn check_file(
    path: &Path,
    max_length: usize,
) -> Result<FastqCheck> {
    let conn = std::fs::File::open(path).map_err(|e| Error::input(path, e))?;
    check_reader(path, conn, max_length)
}

/// Count every record read from `conn`; `path` is used in error messages.
///
/// Empty input gives an empty report. Records without qualities count as
/// quality 0.
pub fn check_reader<R: Read + Send>(
    path: &Path,
    conn: R,
    max_length: usize,
) -> Result<FastqCheck> {
    let mut stats = FastqCheck::new(max_length);
    let mut reader: Box<dyn FastxReader + '_> = match needletail::parse_fastx_reader(conn) {
        Ok(reader) => reader,
        Err(e) if e.kind == ParseErrorKind::EmptyFile => return Ok(stats),
        Err(e) => return Err(parse_error(path, e)),
    };

    while let Some(record) = reader.next() {
        let record = record.map_err(|e| parse_error(path, e))?;
        let seq = record.seq();
        stats.begin_sequence(record.id(), seq.len())?;
        seq.iter().enumerate().for_each(|(pos, base)| stats.add_base(base_class(*base), pos));
        match record.qual() {
            Some(qual) => qual.iter().take(seq.len()).enumerate().for_each(|(pos, q)| {
                stats.add_quality(q.saturating_sub(PHRED_OFFSET), pos)
            }),
            None => (0..seq.len()).for_each(|pos| stats.add_quality(0, pos)),
        }
    }

    Ok(stats)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn check_fastq() {
        use super::check_reader;
        use std::io::Cursor;
        use std::path::Path;

        let data = b"@r1\nACGT\n+\n####\n@r2\nan\n+\n\"!\n".to_vec();
        let stats = check_reader(Path::new("test.fq"), Cursor::new(data), 100).unwrap();

        let mut got: Vec<u8> = Vec::new();
        stats.write_report(&mut got).unwrap();
        let got = String::from_utf8(got).unwrap();
        assert!(got.starts_with("2 sequences, 6 total length, 3.00 average, 4 max\n"));
        assert!(got.contains("base  2   0.0 50.0  0.0  0.0 50.0  500   0 500  0.9\n"));
    }

    #[test]
    fn check_gzip_file() {
        use super::check_file;
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".fq.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"@r1\nACGTAC\n+\nIIIIII\n").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let stats = check_file(file.path(), 100).unwrap();
        assert_eq!(stats.nseq(), 1);
        assert_eq!(stats.total_length(), 6);
    }

    #[test]
    fn check_empty_and_too_long() {
        use super::check_reader;
        use std::io::Cursor;
        use std::path::Path;

        let stats = check_reader(Path::new("empty.fq"), Cursor::new(Vec::new()), 100).unwrap();
        assert_eq!(stats.nseq(), 0);

        let data = b"@r1\nACGTACGT\n+\nIIIIIIII\n".to_vec();
        let got = check_reader(Path::new("long.fq"), Cursor::new(data), 4);
        assert_eq!(got.err().unwrap().exit_code(), 5);
    }
}
