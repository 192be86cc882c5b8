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

//! Discovery of destination groups and their expected totals.
//!
//! Totals come either from a counting pass over the input
//! ([Registry::count]) or from `name:count` pairs given by the caller
//! ([Registry::from_tag_counts]). After the totals are known the registry is
//! told how many reads to sample ([Registry::set_requested]) and opens its
//! outputs ([Registry::open]).
use std::io::Write;

use bstr::BStr;
use bstr::BString;
use bstr::ByteSlice;
use indexmap::IndexMap;
use log::debug;
use log::info;
use log::warn;

use crate::error::Error;
use crate::error::Result;
use crate::group::DestinationGroup;
use crate::group::GroupKind;
use crate::group::Outputs;
use crate::output::OutputSpec;
use crate::record::FlagFilter;
use crate::record::Record;

/// Tag names must be shorter than this.
pub const MAX_TAG_NAME_LEN: usize = 128;

const FIRST_OF_PAIR: u16 = 0x41;

/// Expected total of one tag group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagCount {
    pub name: BString,
    pub count: u64,
    pub paired: bool,
}

/// Parse an unsigned integer the way `strtol` does with base 0.
///
/// `0x` or `0X` selects hexadecimal, a leading `0` octal, anything else
/// decimal. Returns None for empty or invalid input.
///
/// ## Usage
/// ```rust
/// use fastqsumm::registry::parse_number;
///
/// assert_eq!(parse_number("1024"), Some(1024));
/// assert_eq!(parse_number("0x404"), Some(1028));
/// assert_eq!(parse_number("0200"), Some(128));
/// assert_eq!(parse_number("12a"), None);
/// ```
pub fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, radix) = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        (hex, 16)
    } else if value.len() > 1 && value.starts_with('0') {
        (&value[1..], 8)
    } else {
        (value, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None
    }
    u64::from_str_radix(digits, radix).ok()
}

// Digits, with an `x` allowed only right after a `0`.
fn is_count_like(count: &str) -> bool {
    let bytes = count.as_bytes();
    bytes.iter().enumerate().all(|(i, c)| {
        c.is_ascii_digit() || (*c == b'x' && i > 0 && bytes[i - 1] == b'0')
    })
}

/// Parse one `name:count` spec.
///
/// Returns Ok(None) and logs a warning if the spec is malformed, including
/// counts with characters other than digits and a `0x` prefix.
/// [Error::TagCount] is returned for counts that still fail to convert,
/// such as empty, overflowing or bad octal values.
pub fn parse_tag_count(
    spec: &str,
    paired: bool,
) -> Result<Option<TagCount>> {
    let Some((name, count)) = spec.rsplit_once(':') else {
        warn!("Invalid format {} for tag count spec", spec);
        return Ok(None)
    };
    if name.is_empty() {
        warn!("Invalid format {} for tag count spec", spec);
        return Ok(None)
    }
    if name.len() >= MAX_TAG_NAME_LEN {
        warn!("Tag name too long in tag count spec: {}", spec);
        return Ok(None)
    }
    if !is_count_like(count) {
        warn!("Invalid format {} for tag count spec", spec);
        return Ok(None)
    }
    let count = parse_number(count).ok_or_else(|| Error::TagCount { spec: spec.to_string() })?;
    Ok(Some(TagCount { name: BString::from(name), count, paired }))
}

/// Parse all `specs`, dropping malformed and duplicate entries.
pub fn parse_tag_counts(
    specs: &[String],
    paired: bool,
) -> Result<Vec<TagCount>> {
    let mut counts: Vec<TagCount> = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(count) = parse_tag_count(spec, paired)? {
            if counts.iter().any(|x| x.name == count.name) {
                warn!("Tag {} given more than once, keeping the first count", count.name);
                continue
            }
            counts.push(count);
        }
    }
    Ok(counts)
}

/// Lane and tag level destination groups.
pub struct Registry {
    lane_paired: DestinationGroup,
    lane_unpaired: DestinationGroup,
    tags: IndexMap<BString, DestinationGroup>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            lane_paired: DestinationGroup::new(GroupKind::LanePaired, 0, true),
            lane_unpaired: DestinationGroup::new(GroupKind::LaneUnpaired, 0, false),
            tags: IndexMap::new(),
        }
    }
}

impl Registry {
    /// Count the records accepted by `filter` in `records`.
    ///
    /// The first mate of a pair (flags 0x41) is skipped so pairs are
    /// counted once. Tag groups are keyed by [Record::group_key] and are not
    /// created in `lane_mode`. Fewer than two tag groups means no tag level
    /// output.
    pub fn count<I: IntoIterator<Item = Result<Record>>>(
        records: I,
        filter: &FlagFilter,
        lane_mode: bool,
    ) -> Result<Self> {
        let mut registry = Registry::default();
        let mut n_records: u64 = 0;
        let mut n_filtered: u64 = 0;

        for record in records {
            let record = record?;
            n_records += 1;
            let flags = record.flags();
            if !filter.accepts(flags) {
                n_filtered += 1;
                continue
            }
            if flags.bits() & FIRST_OF_PAIR == FIRST_OF_PAIR {
                continue
            }

            let paired = flags.is_segmented();
            if !lane_mode {
                if let Some(key) = record.group_key() {
                    registry.tags.entry(key.to_owned())
                        .or_insert_with(|| DestinationGroup::new(GroupKind::Tag(key.to_owned()), 0, paired))
                        .add_to_total(1);
                }
            }
            if paired {
                registry.lane_paired.add_to_total(1);
            } else {
                registry.lane_unpaired.add_to_total(1);
            }
        }
        debug!("Counting pass read {} records, {} filtered", n_records, n_filtered);

        match registry.tags.len() {
            0 => (),
            1 => {
                warn!("Only one tag seen, disregarding tag level");
                registry.tags.clear();
            },
            n => info!("Found {} tags", n),
        }
        registry.log_totals();

        Ok(registry)
    }

    /// Build from caller supplied tag totals.
    ///
    /// Lane totals are the sums of the tag totals. In `lane_mode` the tag
    /// groups are discarded.
    pub fn from_tag_counts(
        counts: &[TagCount],
        lane_mode: bool,
    ) -> Self {
        let mut registry = Registry::default();
        counts.iter().for_each(|count| {
            if count.paired {
                registry.lane_paired.add_to_total(count.count);
            } else {
                registry.lane_unpaired.add_to_total(count.count);
            }
            if !lane_mode {
                let group = DestinationGroup::new(GroupKind::Tag(count.name.clone()), count.count, count.paired);
                registry.tags.insert(count.name.clone(), group);
            }
        });
        if lane_mode && !counts.is_empty() {
            warn!("Tag counts specified in lane mode, disregarding");
        }
        registry.log_totals();

        registry
    }

    fn log_totals(&self) {
        info!("Lane level total reads (paired): {}", self.lane_paired.total());
        info!("Lane level total reads (unpaired): {}", self.lane_unpaired.total());
    }

    /// Set the number of reads to sample from every group; 0 selects all.
    pub fn set_requested(
        &mut self,
        requested: u64,
    ) {
        self.groups_mut().for_each(|group| {
            group.set_requested(requested);
            info!("Calculated select interval for {}: {}", group.kind(), group.interval());
        });
    }

    /// Open the outputs of every group with reads.
    ///
    /// Tag reads are written at lane level only when there are at least two
    /// tag groups. If the lane has both paired and unpaired reads the
    /// unpaired group is opened beside the paired one, which keeps the lane
    /// reports.
    pub fn open(
        &mut self,
        out: &OutputSpec,
        fastqcheck: bool,
        max_length: usize,
    ) -> Result<()> {
        let outputs = Outputs { fastqcheck, tag_reads: self.tags.len() > 1, max_length };
        if self.lane_paired.total() > 0 {
            self.lane_paired.open(out, &outputs)?;
        }
        if self.lane_unpaired.total() > 0 {
            if self.lane_paired.total() > 0 {
                warn!("Input has both paired and unpaired reads, lane level reports cover the pairs only");
                self.lane_unpaired.open_beside(out, &outputs, &self.lane_paired)?;
            } else {
                self.lane_unpaired.open(out, &outputs)?;
            }
        }
        for group in self.tags.values_mut() {
            if group.total() > 0 {
                group.open(out, &outputs)?;
            }
        }
        Ok(())
    }

    pub fn lane_paired(&self) -> &DestinationGroup {
        &self.lane_paired
    }

    pub fn lane_unpaired(&self) -> &DestinationGroup {
        &self.lane_unpaired
    }

    pub(crate) fn lane_paired_mut(&mut self) -> &mut DestinationGroup {
        &mut self.lane_paired
    }

    pub(crate) fn lane_unpaired_mut(&mut self) -> &mut DestinationGroup {
        &mut self.lane_unpaired
    }

    /// Tag group keyed by `key`.
    pub fn tag(
        &self,
        key: &BStr,
    ) -> Option<&DestinationGroup> {
        self.tags.get(key.as_bytes())
    }

    pub(crate) fn tag_mut(
        &mut self,
        key: &BStr,
    ) -> Option<&mut DestinationGroup> {
        self.tags.get_mut(key.as_bytes())
    }

    /// Tag groups in the order they were found.
    pub fn tags(&self) -> impl Iterator<Item = &DestinationGroup> {
        self.tags.values()
    }

    pub fn n_tags(&self) -> usize {
        self.tags.len()
    }

    fn groups_mut(&mut self) -> impl Iterator<Item = &mut DestinationGroup> {
        [&mut self.lane_paired, &mut self.lane_unpaired].into_iter().chain(self.tags.values_mut())
    }

    /// Write the totals and sampling intervals as tab separated lines.
    pub fn write_counts<W: Write>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        writeln!(conn, "group\tpaired\ttotal\tselect_interval")?;
        let lanes = [&self.lane_paired, &self.lane_unpaired];
        for group in lanes.into_iter().chain(self.tags.values()) {
            let name = match group.kind() {
                GroupKind::LanePaired => "lane_paired".to_string(),
                GroupKind::LaneUnpaired => "lane_unpaired".to_string(),
                GroupKind::Tag(key) => key.to_str_lossy().to_string(),
            };
            writeln!(conn, "{}\t{}\t{}\t{}", name, group.paired() as u8, group.total(), group.interval())?;
        }
        Ok(())
    }

    /// Close every group, writing the reports.
    pub fn close(self) -> Result<()> {
        self.lane_unpaired.close()?;
        self.lane_paired.close()?;
        for (_, group) in self.tags {
            group.close()?;
        }
        Ok(())
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn records(data: &[(u16, &str, Option<&str>)]) -> Vec<crate::error::Result<crate::record::Record>> {
        use crate::record::Record;

        data.iter().map(|(flags, name, rg)| {
            let aux: Vec<([u8; 2], &[u8])> = rg.iter().map(|x| (*b"RG", x.as_bytes())).collect();
            Ok(Record::new(*flags, name.as_bytes(), b"ACGT", &[30; 4], &aux))
        }).collect()
    }

    #[test]
    fn parse_number() {
        use super::parse_number;

        assert_eq!(parse_number("0"), Some(0));
        assert_eq!(parse_number("10000"), Some(10000));
        assert_eq!(parse_number("0x10"), Some(16));
        assert_eq!(parse_number("0XfF"), Some(255));
        assert_eq!(parse_number("017"), Some(15));
        assert_eq!(parse_number("019"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("-1"), None);
    }

    #[test]
    fn parse_tag_counts() {
        use super::{parse_tag_counts, TagCount};
        use bstr::BString;

        let specs: Vec<String> = vec!["#1:100", "nocolon", ":5", "#2:0x20", "#1:7", "a:b:3"].into_iter().map(|x| x.to_string()).collect();
        let got = parse_tag_counts(&specs, true).unwrap();
        let expected = vec![
            TagCount { name: BString::from("#1"), count: 100, paired: true },
            TagCount { name: BString::from("#2"), count: 32, paired: true },
            TagCount { name: BString::from("a:b"), count: 3, paired: true },
        ];
        assert_eq!(got, expected);

        let long = format!("{}:1", "x".repeat(128));
        assert!(parse_tag_counts(&[long], true).unwrap().is_empty());

        let got = parse_tag_counts(&["#1:0x20".to_string(), "#2:0xff".to_string()], true).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].count, 32);

        for bad in ["#1:", "#1:019", "#1:0x", "#1:99999999999999999999"] {
            let got = parse_tag_counts(&[bad.to_string()], true);
            assert_eq!(got.err().unwrap().exit_code(), 4);
        }
    }

    #[test]
    fn bad_count_skips_only_that_tag() {
        use super::parse_tag_counts;

        let specs: Vec<String> = vec!["#1:100", "#2:12z", "#3:50", "#4:-5"].into_iter().map(|x| x.to_string()).collect();
        let got = parse_tag_counts(&specs, false).unwrap();
        let names: Vec<String> = got.iter().map(|x| x.name.to_string()).collect();
        assert_eq!(names, vec!["#1", "#3"]);
        assert_eq!(got[1].count, 50);
    }

    #[test]
    fn count_pairs_without_read_groups() {
        use super::Registry;
        use crate::record::FlagFilter;

        let data = records(&[
            (0x4D, "r1", None), (0x8D, "r1", None),
            (0x4D, "r2", None), (0x8D, "r2", None),
            (0x4D, "r3", None), (0x8D, "r3", None),
        ]);
        let registry = Registry::count(data, &FlagFilter::default(), false).unwrap();

        assert_eq!(registry.lane_paired().total(), 3);
        assert_eq!(registry.lane_unpaired().total(), 0);
        assert_eq!(registry.n_tags(), 0);
    }

    #[test]
    fn count_tag_groups() {
        use super::Registry;
        use crate::record::FlagFilter;
        use bstr::ByteSlice;

        let data = records(&[
            (0x4D, "r1", Some("5_1#1")), (0x8D, "r1", Some("5_1#1")),
            (0x4D, "r2", Some("5_1#2")), (0x8D, "r2", Some("5_1#2")),
            (0x4D, "r3", Some("5_1#1")), (0x8D, "r3", Some("5_1#1")),
            (0x4, "s1", Some("5_1#3")),
            (0x48D, "r4", Some("5_1#1")),
        ]);
        let filter = FlagFilter { required: 0, forbidden: 0x400 };
        let registry = Registry::count(data, &filter, false).unwrap();

        assert_eq!(registry.lane_paired().total(), 3);
        assert_eq!(registry.lane_unpaired().total(), 1);
        assert_eq!(registry.n_tags(), 3);
        assert_eq!(registry.tag(b"#1".as_bstr()).unwrap().total(), 2);
        assert!(registry.tag(b"#1".as_bstr()).unwrap().paired());
        assert!(!registry.tag(b"#3".as_bstr()).unwrap().paired());

        let keys: Vec<String> = registry.tags().map(|x| x.kind().file_key()).collect();
        assert_eq!(keys, vec!["#1", "#2", "#3"]);
    }

    #[test]
    fn single_tag_is_dropped() {
        use super::Registry;
        use crate::record::FlagFilter;

        let data = records(&[(0x4, "s1", Some("5_1#1")), (0x4, "s2", Some("5_1#1"))]);
        let registry = Registry::count(data, &FlagFilter::default(), false).unwrap();
        assert_eq!(registry.n_tags(), 0);
        assert_eq!(registry.lane_unpaired().total(), 2);
    }

    #[test]
    fn lane_mode_skips_tags() {
        use super::Registry;
        use crate::record::FlagFilter;

        let data = records(&[(0x4, "s1", Some("5_1#1")), (0x4, "s2", Some("5_1#2"))]);
        let registry = Registry::count(data, &FlagFilter::default(), true).unwrap();
        assert_eq!(registry.n_tags(), 0);
        assert_eq!(registry.lane_unpaired().total(), 2);
    }

    #[test]
    fn from_tag_counts() {
        use super::{Registry, TagCount};
        use bstr::BString;

        let counts = vec![
            TagCount { name: BString::from("#1"), count: 100, paired: true },
            TagCount { name: BString::from("#2"), count: 50, paired: true },
        ];
        let registry = Registry::from_tag_counts(&counts, false);
        assert_eq!(registry.lane_paired().total(), 150);
        assert_eq!(registry.n_tags(), 2);

        let registry = Registry::from_tag_counts(&counts[0..1], false);
        assert_eq!(registry.n_tags(), 1);

        let registry = Registry::from_tag_counts(&counts, true);
        assert_eq!(registry.n_tags(), 0);
        assert_eq!(registry.lane_paired().total(), 150);
    }

    #[test]
    fn write_counts() {
        use super::{Registry, TagCount};
        use bstr::BString;

        let counts = vec![
            TagCount { name: BString::from("#1"), count: 1000, paired: true },
            TagCount { name: BString::from("#2"), count: 5, paired: false },
        ];
        let mut registry = Registry::from_tag_counts(&counts, false);
        registry.set_requested(100);

        let mut got: Vec<u8> = Vec::new();
        registry.write_counts(&mut got).unwrap();
        let expected = "group\tpaired\ttotal\tselect_interval\n\
                        lane_paired\t1\t1000\t10\n\
                        lane_unpaired\t0\t5\t1\n\
                        #1\t1\t1000\t10\n\
                        #2\t0\t5\t1\n";
        assert_eq!(String::from_utf8(got).unwrap(), expected);
    }
}
