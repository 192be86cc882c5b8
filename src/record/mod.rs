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

//! Alignment records as seen by the fan-out.
//!
//! A [Record] holds the parts of an alignment line that fastqsumm needs: the
//! flags, the query name, the sequence packed into 4-bit calls, the raw
//! quality scores and the auxiliary fields selected by [AuxKeys]. Readers
//! such as [SamReader](sam::SamReader) and [BamReader](bam::BamReader) fill
//! a reused [Record] one alignment at a time. [AlignmentReader] picks the
//! reader from the first bytes of the input.

// Format specific implementations
pub mod bam;
pub mod sam;

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use bstr::BStr;
use bstr::BString;
use bstr::ByteSlice;
use flate2::bufread::MultiGzDecoder;
use noodles_sam::alignment::record::data::field::Tag;
use noodles_sam::alignment::record::Flags;

use crate::error::Error;
use crate::error::Result;
use crate::sequence::pack_bases;

/// Two-letter key of the read group field.
pub const READ_GROUP: [u8; 2] = *b"RG";

/// Which auxiliary fields carry the tag read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxKeys {
    /// Key of the tag (index/barcode) read sequence.
    pub tag_sequence: [u8; 2],
    /// Key of the tag read qualities, Phred+33 encoded.
    pub tag_quality: [u8; 2],
}

impl Default for AuxKeys {
    fn default() -> Self {
        AuxKeys { tag_sequence: *b"BC", tag_quality: *b"QT" }
    }
}

impl AuxKeys {
    // Fields copied into a Record, read group first.
    pub(crate) fn tags(&self) -> [([u8; 2], Tag); 3] {
        [
            (READ_GROUP, Tag::from(READ_GROUP)),
            (self.tag_sequence, Tag::from(self.tag_sequence)),
            (self.tag_quality, Tag::from(self.tag_quality)),
        ]
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BAM_MAGIC: [u8; 4] = *b"BAM\x01";

/// Reads SAM or BAM input, plain or gzip/BGZF compressed.
pub enum AlignmentReader {
    Sam(sam::SamReader),
    Bam(bam::BamReader),
}

impl AlignmentReader {
    /// Open `path` for reading, keeping the fields named in `aux_keys`.
    pub fn open(
        path: &Path,
        aux_keys: &AuxKeys,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::input(path, e))?;
        Self::from_reader(path, Box::new(file), aux_keys)
    }

    /// Read from `conn`; `path` is only used in error messages.
    pub fn from_reader(
        path: &Path,
        conn: Box<dyn Read>,
        aux_keys: &AuxKeys,
    ) -> Result<Self> {
        let mut inner = BufReader::new(conn);
        let compressed = inner.fill_buf().map_err(|e| Error::input(path, e))?.starts_with(&GZIP_MAGIC);
        let mut inner: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(inner)))
        } else {
            Box::new(inner)
        };

        if inner.fill_buf().map_err(|e| Error::input(path, e))?.starts_with(&BAM_MAGIC) {
            log::debug!("Reading {} as BAM", path.display());
            Ok(AlignmentReader::Bam(bam::BamReader::from_reader(path, inner, aux_keys)?))
        } else {
            Ok(AlignmentReader::Sam(sam::SamReader::from_reader(path, inner, aux_keys)?))
        }
    }

    /// Read the next alignment into `record`.
    ///
    /// Returns false at the end of the input.
    pub fn read_record(
        &mut self,
        record: &mut Record,
    ) -> Result<bool> {
        match self {
            AlignmentReader::Sam(reader) => reader.read_record(record),
            AlignmentReader::Bam(reader) => reader.read_record(record),
        }
    }
}

impl Iterator for AlignmentReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = Record::default();
        match self.read_record(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Keeps records whose flags contain all of `required` and none of `forbidden`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlagFilter {
    pub required: u16,
    pub forbidden: u16,
}

impl FlagFilter {
    pub fn accepts(
        &self,
        flags: Flags,
    ) -> bool {
        let bits = flags.bits();
        (bits & self.required) == self.required && (bits & self.forbidden) == 0
    }
}

/// One alignment record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    flags: Flags,
    name: BString,
    len: usize,
    sequence: Vec<u8>,
    quality_scores: Vec<u8>,
    data: Vec<([u8; 2], BString)>,
}

impl Default for Record {
    fn default() -> Self {
        Record {
            flags: Flags::empty(),
            name: BString::default(),
            len: 0,
            sequence: Vec::new(),
            quality_scores: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl Record {
    /// Build a record from a plain text sequence.
    ///
    /// Quality scores are raw Phred values without the +33 offset. An empty
    /// `quality_scores` is read as all zeros.
    pub fn new(
        flags: u16,
        name: &[u8],
        bases: &[u8],
        quality_scores: &[u8],
        data: &[([u8; 2], &[u8])],
    ) -> Self {
        let mut record = Record::default();
        record.set(Flags::from(flags), name, bases, quality_scores);
        data.iter().for_each(|(key, value)| record.push_data(*key, value));
        record
    }

    pub(crate) fn set(
        &mut self,
        flags: Flags,
        name: &[u8],
        bases: &[u8],
        quality_scores: &[u8],
    ) {
        self.flags = flags;
        self.name.clear();
        self.name.extend_from_slice(name);
        self.len = bases.len();
        pack_bases(bases, &mut self.sequence);
        self.set_quality_scores(quality_scores);
        self.data.clear();
    }

    /// Like [Record::set] but with `len` calls already packed.
    pub(crate) fn set_packed(
        &mut self,
        flags: Flags,
        name: &[u8],
        packed: &[u8],
        len: usize,
        quality_scores: &[u8],
    ) {
        self.flags = flags;
        self.name.clear();
        self.name.extend_from_slice(name);
        self.len = len;
        self.sequence.clear();
        self.sequence.extend_from_slice(packed);
        self.set_quality_scores(quality_scores);
        self.data.clear();
    }

    // Missing scores (empty, or 0xFF in BAM) become zeros.
    fn set_quality_scores(
        &mut self,
        quality_scores: &[u8],
    ) {
        self.quality_scores.clear();
        if quality_scores.len() == self.len && quality_scores.first() != Some(&0xFF) {
            self.quality_scores.extend_from_slice(quality_scores);
        } else {
            self.quality_scores.resize(self.len, 0);
        }
    }

    pub(crate) fn push_data(
        &mut self,
        key: [u8; 2],
        value: &[u8],
    ) {
        self.data.push((key, BString::from(value)));
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    /// Number of calls in the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence packed two calls per byte.
    pub fn packed_sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Raw Phred quality scores, one per call.
    pub fn quality_scores(&self) -> &[u8] {
        &self.quality_scores
    }

    /// Value of the auxiliary field `key`, if present.
    pub fn aux(
        &self,
        key: &[u8; 2],
    ) -> Option<&BStr> {
        self.data.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_bstr())
    }

    /// Sample key of the record.
    ///
    /// The read group value from the first `#` onward, or the whole read
    /// group if it has no `#`. None if the record has no read group.
    pub fn group_key(&self) -> Option<&BStr> {
        self.aux(&READ_GROUP).map(|rg| {
            match rg.find_byte(b'#') {
                Some(pos) => rg[pos..].as_bstr(),
                None => rg,
            }
        })
    }
}
