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
use std::io::BufRead;
use std::path::Path;
use std::path::PathBuf;

use noodles_bam as bam;
use noodles_sam::alignment::record::data::field::Tag;
use noodles_sam::alignment::record::data::field::Value;

use crate::error::Error;
use crate::error::Result;
use crate::record::AuxKeys;
use crate::record::Record;

/// Reads [Records](Record) from a [BAM](https://samtools.github.io/hts-specs/SAMv1.pdf) file.
///
/// Expects the decompressed BAM stream starting at the magic number. The
/// packed sequence is copied as is.
pub struct BamReader {
    reader: bam::io::Reader<Box<dyn BufRead>>,
    buf: bam::Record,
    keys: [([u8; 2], Tag); 3],
    path: PathBuf,
}

impl BamReader {
    /// Read from `conn`; `path` is only used in error messages.
    pub fn from_reader(
        path: &Path,
        conn: Box<dyn BufRead>,
        aux_keys: &AuxKeys,
    ) -> Result<Self> {
        let mut reader = bam::io::Reader::from(conn);
        reader.read_header().map_err(|e| Error::input(path, e))?;

        Ok(BamReader { reader, buf: bam::Record::default(), keys: aux_keys.tags(), path: path.to_path_buf() })
    }

    /// Read the next alignment into `record`.
    ///
    /// Returns false at the end of the input.
    pub fn read_record(
        &mut self,
        record: &mut Record,
    ) -> Result<bool> {
        let n = self.reader.read_record(&mut self.buf).map_err(|e| Error::input(&self.path, e))?;
        if n == 0 {
            return Ok(false)
        }

        let name: &[u8] = match self.buf.name() {
            Some(name) => name,
            None => b"",
        };
        let sequence = self.buf.sequence();
        record.set_packed(
            self.buf.flags(),
            name,
            sequence.as_ref(),
            sequence.len(),
            self.buf.quality_scores().as_ref(),
        );

        let data = self.buf.data();
        for (key, tag) in self.keys.iter() {
            match data.get(tag) {
                Some(Ok(Value::String(value))) => record.push_data(*key, value),
                Some(Ok(Value::Character(c))) => record.push_data(*key, &[c]),
                Some(Err(e)) => return Err(Error::input(&self.path, e)),
                _ => (),
            }
        }

        Ok(true)
    }
}
