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

//! Destination groups: sampling cadence and outputs for one lane or tag.
//!
//! Every read routed to a group is counted in the group's [FastqCheck]
//! accumulators. Only reads at every `interval`th position, up to the
//! requested number, are written to the sample files.
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use bstr::BString;
use bstr::ByteSlice;

use crate::error::Error;
use crate::error::Result;
use crate::fastqcheck::FastqCheck;
use crate::fragment::FragmentView;
use crate::fragment::Mate;
use crate::output::OutputSpec;
use crate::output::Stream;

/// Identity of a destination group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKind {
    LanePaired,
    LaneUnpaired,
    /// Tag level group keyed by e.g. `#12`.
    Tag(BString),
}

impl GroupKind {
    /// Key inserted into the output file names.
    pub fn file_key(&self) -> String {
        match self {
            GroupKind::Tag(key) => key.to_str_lossy().to_string(),
            _ => String::new(),
        }
    }

    pub fn is_lane(&self) -> bool {
        !matches!(self, GroupKind::Tag(_))
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKind::LanePaired => write!(f, "lane (paired)"),
            GroupKind::LaneUnpaired => write!(f, "lane (non-paired)"),
            GroupKind::Tag(key) => write!(f, "tag {}", key),
        }
    }
}

/// Sampling interval for `requested` evenly spaced reads out of `total`.
///
/// `(total - 1) / (requested - 1)` if more than one read is requested and
/// there are more reads than requested, otherwise 1.
///
/// ## Usage
/// ```rust
/// use fastqsumm::group::select_interval;
///
/// assert_eq!(select_interval(10000, 100), 101);
/// assert_eq!(select_interval(5, 100), 1);
/// assert_eq!(select_interval(5, 1), 1);
/// ```
pub fn select_interval(
    total: u64,
    requested: u64,
) -> u64 {
    if requested > 1 && total > requested {
        ((total - 1) / (requested - 1)).max(1)
    } else {
        1
    }
}

struct Sink {
    path: PathBuf,
    conn: BufWriter<File>,
}

impl Sink {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| Error::output(&path, e))?;
        Ok(Sink { path, conn: BufWriter::new(file) })
    }

    fn close(mut self) -> Result<()> {
        self.conn.flush().map_err(|e| Error::output(&self.path, e))
    }
}

// Reports without a path only accumulate.
struct Report {
    path: Option<PathBuf>,
    stats: FastqCheck,
}

impl Report {
    fn close(self) -> Result<()> {
        let Some(path) = self.path else {
            return Ok(())
        };
        let file = File::create(&path).map_err(|e| Error::output(&path, e))?;
        let mut conn = BufWriter::new(file);
        self.stats.write_report(&mut conn).map_err(|e| Error::output(&path, e))?;
        conn.flush().map_err(|e| Error::output(&path, e))
    }
}

fn slot(stream: Stream) -> usize {
    match stream {
        Stream::One => 0,
        Stream::Two => 1,
        Stream::Tag => 2,
    }
}

fn mate_stream(mate: Mate) -> Stream {
    match mate {
        Mate::One => Stream::One,
        Mate::Two => Stream::Two,
    }
}

/// What to open when a group is activated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outputs {
    /// Write fastqcheck reports.
    pub fastqcheck: bool,
    /// Write tag reads (lane level groups only).
    pub tag_reads: bool,
    /// Maximum read length accepted by the reports.
    pub max_length: usize,
}

/// Sampling state and outputs of one lane or tag.
pub struct DestinationGroup {
    kind: GroupKind,
    paired: bool,
    total: u64,
    requested: u64,
    interval: u64,
    reads_seen: u64,
    selections_made: u64,
    sinks: [Option<Sink>; 3],
    reports: [Option<Report>; 3],
}

impl DestinationGroup {
    pub fn new(
        kind: GroupKind,
        total: u64,
        paired: bool,
    ) -> Self {
        DestinationGroup {
            kind,
            paired,
            total,
            requested: 0,
            interval: 1,
            reads_seen: 0,
            selections_made: 0,
            sinks: [None, None, None],
            reports: [None, None, None],
        }
    }

    pub fn kind(&self) -> &GroupKind {
        &self.kind
    }

    pub fn paired(&self) -> bool {
        self.paired
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn reads_seen(&self) -> u64 {
        self.reads_seen
    }

    pub fn selections_made(&self) -> u64 {
        self.selections_made
    }

    pub(crate) fn add_to_total(
        &mut self,
        count: u64,
    ) {
        self.total += count;
    }

    /// Set the number of reads to sample; 0 selects every read.
    pub fn set_requested(
        &mut self,
        requested: u64,
    ) {
        self.requested = if requested == 0 { self.total } else { requested };
        self.interval = select_interval(self.total, self.requested);
    }

    /// Suffix of the sample file names.
    pub fn file_suffix(&self) -> u64 {
        self.requested.min(self.total)
    }

    /// Open the sample files and reports under `out`.
    ///
    /// Mate 2 outputs are only opened for paired groups and tag read outputs
    /// only for lane level groups with `outputs.tag_reads` set.
    pub fn open(
        &mut self,
        out: &OutputSpec,
        outputs: &Outputs,
    ) -> Result<()> {
        self.open_streams(out, outputs, None)
    }

    /// Open next to `other`, a group that writes to the same file names.
    ///
    /// Sample files are only opened if their suffix differs from the one
    /// used by `other`. Statistics are accumulated but the reports are left
    /// to `other`.
    pub fn open_beside(
        &mut self,
        out: &OutputSpec,
        outputs: &Outputs,
        other: &DestinationGroup,
    ) -> Result<()> {
        self.open_streams(out, outputs, Some(other.file_suffix()))
    }

    fn open_streams(
        &mut self,
        out: &OutputSpec,
        outputs: &Outputs,
        taken: Option<u64>,
    ) -> Result<()> {
        let key = self.kind.file_key();
        let n = self.file_suffix();

        let mut streams = vec![Stream::One];
        if self.paired {
            streams.push(Stream::Two);
        }
        if outputs.tag_reads && self.kind.is_lane() {
            streams.push(Stream::Tag);
        }

        let write_samples = taken != Some(n);
        if !write_samples {
            log::warn!("Sample files of {} would overwrite another group's, not writing them", self.kind);
        }

        for stream in streams {
            if write_samples {
                self.sinks[slot(stream)] = Some(Sink::create(out.fastq_path(stream, &key, n))?);
            }
            if outputs.fastqcheck {
                let path = match taken {
                    Some(_) => None,
                    None => Some(out.fastqcheck_path(stream, &key)),
                };
                self.reports[slot(stream)] = Some(Report { path, stats: FastqCheck::new(outputs.max_length) });
            }
        }
        log::debug!("Opened outputs for {} with suffix {}", self.kind, n);

        Ok(())
    }

    /// Decide whether the next read (or pair) is sampled.
    ///
    /// Advances `reads_seen` by one.
    pub fn next_decision(&mut self) -> bool {
        let emit = self.reads_seen % self.interval == 0 && self.selections_made < self.requested;
        if emit {
            self.selections_made += 1;
        }
        self.reads_seen += 1;
        emit
    }

    fn route(
        &mut self,
        fragment: &FragmentView,
        emit: bool,
    ) -> Result<()> {
        let idx = slot(mate_stream(fragment.mate));
        if emit {
            if let Some(sink) = self.sinks[idx].as_mut() {
                fragment.write_fastq(&mut sink.conn).map_err(|e| Error::output(&sink.path, e))?;
            }
        }
        if let Some(report) = self.reports[idx].as_mut() {
            fragment.count(&mut report.stats)?;
        }
        Ok(())
    }

    fn route_tag(
        &mut self,
        fragment: &FragmentView,
        emit: bool,
    ) -> Result<()> {
        let idx = slot(Stream::Tag);
        if emit {
            if let Some(sink) = self.sinks[idx].as_mut() {
                fragment.write_tag_fastq(&mut sink.conn).map_err(|e| Error::output(&sink.path, e))?;
            }
        }
        if let Some(report) = self.reports[idx].as_mut() {
            fragment.count_tag(&mut report.stats)?;
        }
        Ok(())
    }

    /// Route a single-end read.
    pub fn visit_single(
        &mut self,
        fragment: &FragmentView,
    ) -> Result<()> {
        let emit = self.next_decision();
        self.route(fragment, emit)?;
        if fragment.has_tag() {
            self.route_tag(fragment, emit)?;
        }
        Ok(())
    }

    /// Route a completed pair; `second` is the mate seen last.
    ///
    /// Each mate goes to the outputs of its own mate number. The tag read
    /// is taken from `second` if it has one, otherwise from `first`.
    pub fn visit_pair(
        &mut self,
        first: &FragmentView,
        second: &FragmentView,
    ) -> Result<()> {
        let emit = self.next_decision();
        self.route(second, emit)?;
        self.route(first, emit)?;
        let tagged = if second.has_tag() { second } else { first };
        if tagged.has_tag() {
            self.route_tag(tagged, emit)?;
        }
        Ok(())
    }

    /// Statistics for `stream`, if reports are written.
    pub fn stats(
        &self,
        stream: Stream,
    ) -> Option<&FastqCheck> {
        self.reports[slot(stream)].as_ref().map(|x| &x.stats)
    }

    /// Flush the sample files and write the reports.
    pub fn close(self) -> Result<()> {
        log::info!(
            "Closing {}: {} reads seen, {} selected",
            self.kind, self.reads_seen, self.selections_made,
        );
        for sink in self.sinks.into_iter().flatten() {
            sink.close()?;
        }
        for report in self.reports.into_iter().flatten() {
            report.close()?;
        }
        Ok(())
    }
}
