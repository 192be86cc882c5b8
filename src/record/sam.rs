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

use noodles_sam as sam;
use noodles_sam::alignment::record::data::field::Tag;
use noodles_sam::alignment::record_buf::data::field::Value;
use noodles_sam::alignment::RecordBuf;

use crate::error::Error;
use crate::error::Result;
use crate::record::AuxKeys;
use crate::record::Record;

/// Reads [Records](Record) from a [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf) file.
///
/// Expects uncompressed text; [AlignmentReader](super::AlignmentReader)
/// takes care of decompression. The header is consumed when the reader is
/// created.
pub struct SamReader {
    reader: sam::io::Reader<Box<dyn BufRead>>,
    header: sam::Header,
    buf: RecordBuf,
    keys: [([u8; 2], Tag); 3],
    path: PathBuf,
}

impl SamReader {
    /// Read from `conn`; `path` is only used in error messages.
    pub fn from_reader(
        path: &Path,
        conn: Box<dyn BufRead>,
        aux_keys: &AuxKeys,
    ) -> Result<Self> {
        let mut reader = sam::io::Reader::new(conn);
        let header = reader.read_header().map_err(|e| Error::input(path, e))?;

        Ok(SamReader { reader, header, buf: RecordBuf::default(), keys: aux_keys.tags(), path: path.to_path_buf() })
    }

    /// Read the next alignment into `record`.
    ///
    /// Returns false at the end of the input.
    pub fn read_record(
        &mut self,
        record: &mut Record,
    ) -> Result<bool> {
        let n = self.reader.read_record_buf(&self.header, &mut self.buf).map_err(|e| Error::input(&self.path, e))?;
        if n == 0 {
            return Ok(false)
        }

        let name: &[u8] = match self.buf.name() {
            Some(name) => name,
            None => b"",
        };
        record.set(
            self.buf.flags(),
            name,
            self.buf.sequence().as_ref(),
            self.buf.quality_scores().as_ref(),
        );

        for (key, tag) in self.keys.iter() {
            match self.buf.data().get(tag) {
                Some(Value::String(value)) => record.push_data(*key, value),
                Some(Value::Character(c)) => record.push_data(*key, &[*c]),
                _ => (),
            }
        }

        Ok(true)
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn sam_text() -> Vec<u8> {
        let mut data: Vec<u8> = b"@HD\tVN:1.6\tSO:unsorted\n".to_vec();
        data.append(&mut b"@RG\tID:1234_5#7\n".to_vec());
        data.append(&mut b"r1\t77\t*\t0\t0\t*\t*\t0\t0\tACGTN\t!+5?I\tRG:Z:1234_5#7\tBC:Z:ACGT\tQT:Z:IIII\n".to_vec());
        data.append(&mut b"r1\t141\t*\t0\t0\t*\t*\t0\t0\tGGCC\t*\tRG:Z:1234_5#7\n".to_vec());
        data
    }

    #[test]
    fn read_unmapped_pair() {
        use super::SamReader;
        use crate::record::{AuxKeys, Record};
        use std::io::Cursor;
        use std::path::Path;

        let conn = Box::new(Cursor::new(sam_text()));
        let mut reader = SamReader::from_reader(Path::new("test.sam"), conn, &AuxKeys::default()).unwrap();

        let mut record = Record::default();
        assert!(reader.read_record(&mut record).unwrap());
        let expected = Record::new(77, b"r1", b"ACGTN", &[0, 10, 20, 30, 40], &[(*b"RG", b"1234_5#7"), (*b"BC", b"ACGT"), (*b"QT", b"IIII")]);
        assert_eq!(record, expected);
        assert_eq!(record.group_key().unwrap(), "#7");

        assert!(reader.read_record(&mut record).unwrap());
        let expected = Record::new(141, b"r1", b"GGCC", &[], &[(*b"RG", b"1234_5#7")]);
        assert_eq!(record, expected);

        assert!(!reader.read_record(&mut record).unwrap());
    }
}
