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

//! Read fragments handed to destination groups.
//!
//! A [FragmentView] borrows the current [Record]. The first mate of a pair
//! has to outlive its record while it waits for its partner, so it is copied
//! into a [CachedFragment] which lends out a view of itself.
use std::io::Write;

use bstr::BStr;
use bstr::BString;
use bstr::ByteSlice;
use noodles_sam::alignment::record::Flags;

use crate::error::Result;
use crate::fastqcheck::FastqCheck;
use crate::record::AuxKeys;
use crate::record::Record;
use crate::sequence::base_class;
use crate::sequence::Calls;

const PHRED_OFFSET: u8 = 33;

/// Which mate of a pair a fragment is. Unpaired reads are [Mate::One].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mate {
    One,
    Two,
}

impl Mate {
    /// Mate two iff the read is segmented and not the first segment.
    pub fn from_flags(flags: Flags) -> Self {
        if flags.is_segmented() && !flags.is_first_segment() {
            Mate::Two
        } else {
            Mate::One
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Mate::One => 1,
            Mate::Two => 2,
        }
    }
}

/// Borrowed fragment valid for the lifetime of its record.
#[derive(Clone, Copy, Debug)]
pub struct FragmentView<'a> {
    pub name: &'a BStr,
    pub mate: Mate,
    pub len: usize,
    pub reverse: bool,
    pub packed_sequence: &'a [u8],
    pub quality_scores: &'a [u8],
    pub group_key: Option<&'a BStr>,
    pub tag_sequence: Option<&'a BStr>,
    pub tag_quality: Option<&'a BStr>,
}

impl<'a> FragmentView<'a> {
    pub fn from_record(
        record: &'a Record,
        aux_keys: &AuxKeys,
    ) -> Self {
        let flags = record.flags();
        FragmentView {
            name: record.name(),
            mate: Mate::from_flags(flags),
            len: record.len(),
            reverse: flags.is_reverse_complemented(),
            packed_sequence: record.packed_sequence(),
            quality_scores: record.quality_scores(),
            group_key: record.group_key(),
            tag_sequence: record.aux(&aux_keys.tag_sequence),
            tag_quality: record.aux(&aux_keys.tag_quality),
        }
    }

    /// Copy into an owned fragment.
    pub fn to_cached(&self) -> CachedFragment {
        CachedFragment {
            name: self.name.to_owned(),
            mate: self.mate,
            len: self.len,
            reverse: self.reverse,
            packed_sequence: self.packed_sequence.to_vec(),
            quality_scores: self.quality_scores.to_vec(),
            group_key: self.group_key.map(|x| x.to_owned()),
            tag_sequence: self.tag_sequence.map(|x| x.to_owned()),
            tag_quality: self.tag_quality.map(|x| x.to_owned()),
        }
    }

    /// Base calls in read orientation.
    pub fn calls(&self) -> Calls<'a> {
        Calls::new(self.packed_sequence, self.len, self.reverse)
    }

    /// Raw quality scores in read orientation.
    pub fn qualities(&self) -> Box<dyn Iterator<Item = u8> + 'a> {
        let quals: &'a [u8] = self.quality_scores;
        let quals = quals.iter().copied();
        if self.reverse { Box::new(quals.rev()) } else { Box::new(quals) }
    }

    /// Whether the fragment carries a tag read.
    pub fn has_tag(&self) -> bool {
        self.tag_sequence.is_some()
    }

    fn write_header<W: Write>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        conn.write_all(b"@")?;
        conn.write_all(self.name)?;
        writeln!(conn, "/{}", self.mate.number())
    }

    /// Write the read as a FASTQ record with Phred+33 qualities.
    pub fn write_fastq<W: Write>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        self.write_header(conn)?;
        let mut line: Vec<u8> = self.calls().collect();
        line.extend_from_slice(b"\n+\n");
        line.extend(self.qualities().map(|q| q.saturating_add(PHRED_OFFSET)));
        line.push(b'\n');
        conn.write_all(&line)
    }

    /// Write the tag read as a FASTQ record.
    ///
    /// Tag qualities are written as stored; a missing quality string is
    /// written as `!` (quality 0) for every call.
    pub fn write_tag_fastq<W: Write>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        let Some(tag_sequence) = self.tag_sequence else {
            return Ok(())
        };
        self.write_header(conn)?;
        conn.write_all(tag_sequence)?;
        conn.write_all(b"\n+\n")?;
        match self.tag_quality {
            Some(quals) => conn.write_all(quals)?,
            None => conn.write_all(&vec![PHRED_OFFSET; tag_sequence.len()])?,
        }
        conn.write_all(b"\n")
    }

    /// Count the read in `stats`.
    pub fn count(
        &self,
        stats: &mut FastqCheck,
    ) -> Result<()> {
        stats.begin_sequence(self.name, self.len)?;
        self.calls().enumerate().for_each(|(pos, base)| stats.add_base(base_class(base), pos));
        self.qualities().enumerate().for_each(|(pos, q)| stats.add_quality(q, pos));
        Ok(())
    }

    /// Count the tag read in `stats`.
    pub fn count_tag(
        &self,
        stats: &mut FastqCheck,
    ) -> Result<()> {
        let Some(tag_sequence) = self.tag_sequence else {
            return Ok(())
        };
        stats.begin_sequence(self.name, tag_sequence.len())?;
        let quals: &[u8] = self.tag_quality.map(|x| x.as_bytes()).unwrap_or(b"");
        tag_sequence.iter().enumerate().for_each(|(pos, base)| {
            stats.add_base(base_class(*base), pos);
            let q = quals.get(pos).map(|q| q.saturating_sub(PHRED_OFFSET)).unwrap_or(0);
            stats.add_quality(q, pos);
        });
        Ok(())
    }
}

/// Owned copy of a first-seen mate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedFragment {
    name: BString,
    mate: Mate,
    len: usize,
    reverse: bool,
    packed_sequence: Vec<u8>,
    quality_scores: Vec<u8>,
    group_key: Option<BString>,
    tag_sequence: Option<BString>,
    tag_quality: Option<BString>,
}

impl CachedFragment {
    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    pub fn as_view(&self) -> FragmentView<'_> {
        FragmentView {
            name: self.name.as_bstr(),
            mate: self.mate,
            len: self.len,
            reverse: self.reverse,
            packed_sequence: &self.packed_sequence,
            quality_scores: &self.quality_scores,
            group_key: self.group_key.as_ref().map(|x| x.as_bstr()),
            tag_sequence: self.tag_sequence.as_ref().map(|x| x.as_bstr()),
            tag_quality: self.tag_quality.as_ref().map(|x| x.as_bstr()),
        }
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn mate_numbers() {
        use super::Mate;
        use noodles_sam::alignment::record::Flags;

        assert_eq!(Mate::from_flags(Flags::from(0x4)), Mate::One);
        assert_eq!(Mate::from_flags(Flags::from(0x41)), Mate::One);
        assert_eq!(Mate::from_flags(Flags::from(0x81)), Mate::Two);
        assert_eq!(Mate::from_flags(Flags::from(0x1)), Mate::Two);
        // 0x80 without 0x1 is not a pair
        assert_eq!(Mate::from_flags(Flags::from(0x80)), Mate::One);
    }

    #[test]
    fn write_fastq_forward() {
        use super::FragmentView;
        use crate::record::{AuxKeys, Record};

        let record = Record::new(0x4, b"r1", b"ACGTN", &[0, 10, 20, 30, 40], &[]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());

        let mut got: Vec<u8> = Vec::new();
        view.write_fastq(&mut got).unwrap();
        assert_eq!(got, b"@r1/1\nACGTN\n+\n!+5?I\n".to_vec());
    }

    #[test]
    fn write_fastq_reverse_complemented() {
        use super::FragmentView;
        use crate::record::{AuxKeys, Record};

        let record = Record::new(0x1 | 0x10 | 0x80, b"r2", b"AACG", &[1, 2, 3, 4], &[]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());

        let mut got: Vec<u8> = Vec::new();
        view.write_fastq(&mut got).unwrap();
        assert_eq!(got, b"@r2/2\nCGTT\n+\n%$#\"\n".to_vec());
    }

    #[test]
    fn write_tag_fastq() {
        use super::FragmentView;
        use crate::record::{AuxKeys, Record};

        let record = Record::new(0x41, b"r3", b"ACGT", &[30; 4], &[(*b"BC", b"GATC"), (*b"QT", b"II5+")]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());
        let mut got: Vec<u8> = Vec::new();
        view.write_tag_fastq(&mut got).unwrap();
        assert_eq!(got, b"@r3/1\nGATC\n+\nII5+\n".to_vec());

        let record = Record::new(0x41, b"r4", b"ACGT", &[30; 4], &[(*b"BC", b"GAT")]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());
        let mut got: Vec<u8> = Vec::new();
        view.write_tag_fastq(&mut got).unwrap();
        assert_eq!(got, b"@r4/1\nGAT\n+\n!!!\n".to_vec());

        let record = Record::new(0x41, b"r5", b"ACGT", &[30; 4], &[]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());
        let mut got: Vec<u8> = Vec::new();
        view.write_tag_fastq(&mut got).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn count_tag_read() {
        use super::FragmentView;
        use crate::fastqcheck::FastqCheck;
        use crate::record::{AuxKeys, Record};

        let record = Record::new(0x41, b"r3", b"ACGT", &[30; 4], &[(*b"BC", b"GATC"), (*b"QT", b"II5+")]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());

        let mut stats = FastqCheck::new(10);
        view.count_tag(&mut stats).unwrap();
        assert_eq!(stats.nseq(), 1);
        assert_eq!(stats.total_length(), 4);

        let mut report: Vec<u8> = Vec::new();
        stats.write_report(&mut report).unwrap();
        let report = String::from_utf8(report).unwrap();
        // highest quality in the header row is 'I' - 33
        assert!(report.contains("  40 AQ\n"));
    }

    #[test]
    fn cached_view_matches_borrowed() {
        use super::FragmentView;
        use crate::record::{AuxKeys, Record};

        let record = Record::new(0x51, b"r6", b"ACGTTGCA", &[5, 6, 7, 8, 9, 10, 11, 12], &[(*b"RG", b"1_2#3"), (*b"BC", b"AC")]);
        let view = FragmentView::from_record(&record, &AuxKeys::default());
        let cached = view.to_cached();
        drop(record);

        let view = cached.as_view();
        assert_eq!(view.name, "r6");
        assert_eq!(view.group_key.unwrap(), "#3");
        assert_eq!(view.tag_sequence.unwrap(), "AC");
        assert!(view.tag_quality.is_none());
        assert!(view.reverse);

        let mut got: Vec<u8> = Vec::new();
        view.write_fastq(&mut got).unwrap();
        assert_eq!(got, b"@r6/1\nTGCAACGT\n+\n-,+*)('&\n".to_vec());
    }
}
