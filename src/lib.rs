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

//! fastqsumm is a library and a command-line client for:
//!
//!   - Sampling evenly spaced reads from a SAM or BAM file into FASTQ files.
//!   - Computing base and quality statistics in the fastqcheck format.
//!   - Splitting both by lane and by multiplex tag (sample index).
//!
//! It is meant for quickly checking large sequencing runs without writing
//! every read to disk.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The fastqsumm CLI supports the following subcommands:
//!   - `fastqsumm summ` sample reads and write statistics from a SAM or BAM file.
//!   - `fastqsumm check` write the fastqcheck report of a FASTQ file.
//!
//! `summ` reads the input twice: once to count the reads per lane and per
//! tag, and once to write the output. The counting pass is skipped if the
//! tag totals are given with `--tag-count`.
//!
//! ### Output
//!
//! The files are written to `<dir>/<base>...`:
//!   - `<base>_1.fastq.<N>`, `<base>_2.fastq.<N>`: sampled single-end reads or mates.
//!   - `<base>_t.fastq.<N>`: sampled tag reads, if there are at least two tags.
//!   - `<base>_1.fastqcheck`, `<base>_2.fastqcheck`, `<base>_t.fastqcheck`: statistics over all reads.
//!   - `<base>_1#<tag>.fastq.<N>` etc.: the same per tag, without tag reads.
//!
//! `N` is the number of reads requested or the number of reads available,
//! whichever is smaller.
//!
//! ### Rust API
//!
//! [summarise] and [count_to_write] operate on a whole input file. The
//! parts are available separately:
//!
//!   - [AlignmentReader](record::AlignmentReader): reads [Records](record::Record) from a SAM or BAM file.
//!   - [Registry](registry::Registry): finds the destination groups and their totals.
//!   - [FanOut](driver::FanOut): routes records to the destination groups.
//!   - [FastqCheck](fastqcheck::FastqCheck): accumulates the statistics for one output.
//!
//! See documentation for the appropriate functions or structs for usage examples.
//!
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::info;

pub mod check;
pub mod driver;
pub mod error;
pub mod fastqcheck;
pub mod fragment;
pub mod group;
pub mod output;
pub mod pairing;
pub mod record;
pub mod registry;
pub mod sequence;

pub use error::Error;
pub use error::Result;

use driver::FanOut;
use driver::RunSummary;
use output::OutputSpec;
use pairing::OrphanSet;
use record::AlignmentReader;
use record::AuxKeys;
use record::FlagFilter;
use registry::Registry;

/// Default number of reads to sample per output.
pub const DEFAULT_SELECTS: u64 = 10000;

/// Settings for [summarise] and [count_to_write].
#[derive(Clone, Debug)]
pub struct Config {
    /// Output directory and base name.
    pub output: OutputSpec,
    /// Reads to sample per output, 0 for all.
    pub requested: u64,
    /// Flag filter applied in both passes.
    pub filter: FlagFilter,
    /// Auxiliary fields holding the tag read.
    pub aux_keys: AuxKeys,
    /// Write fastqcheck reports.
    pub fastqcheck: bool,
    /// Lane level output only.
    pub lane_mode: bool,
    /// Tag totals as `name:count`; skips the counting pass if not empty.
    pub tag_counts: Vec<String>,
    /// The tags in `tag_counts` are single-end.
    pub single_end_tags: bool,
    /// File listing reads whose mates are absent.
    pub orphans: Option<PathBuf>,
    /// Longest read accepted by the reports.
    pub max_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: OutputSpec::new(output::DEFAULT_LANE_DIR, output::generated_base_name()),
            requested: DEFAULT_SELECTS,
            filter: FlagFilter::default(),
            aux_keys: AuxKeys::default(),
            fastqcheck: false,
            lane_mode: false,
            tag_counts: Vec::new(),
            single_end_tags: false,
            orphans: None,
            max_length: fastqcheck::DEFAULT_MAX_LENGTH,
        }
    }
}

/// Find the destination groups for `input` and set their sampling interval.
///
/// Counts the reads in `input` unless `config.tag_counts` is given.
pub fn build_registry(
    input: &Path,
    config: &Config,
) -> Result<Registry> {
    let mut registry = if config.tag_counts.is_empty() {
        let reader = AlignmentReader::open(input, &config.aux_keys)?;
        Registry::count(reader, &config.filter, config.lane_mode)?
    } else {
        let counts = registry::parse_tag_counts(&config.tag_counts, !config.single_end_tags)?;
        Registry::from_tag_counts(&counts, config.lane_mode)
    };
    registry.set_requested(config.requested);
    Ok(registry)
}

/// Write the group totals and sampling intervals for `input` to `conn`.
///
/// ## Usage
///
/// ```rust
/// use fastqsumm::{count_to_write, Config};
/// use std::io::Write;
///
/// let mut sam = tempfile::NamedTempFile::new().unwrap();
/// sam.write_all(b"@HD\tVN:1.6\n").unwrap();
/// for i in 0..5 {
///     writeln!(sam, "r{}\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII", i).unwrap();
/// }
/// sam.flush().unwrap();
///
/// let config = Config { requested: 3, ..Default::default() };
/// let mut output: Vec<u8> = Vec::new();
/// count_to_write(sam.path(), &config, &mut output).unwrap();
///
/// let expected = "group\tpaired\ttotal\tselect_interval\nlane\t1\t0\t1\nlane\t0\t5\t2\n";
/// assert_eq!(String::from_utf8(output).unwrap(), expected);
/// ```
pub fn count_to_write<W: Write>(
    input: &Path,
    config: &Config,
    conn: &mut W,
) -> Result<()> {
    let registry = build_registry(input, config)?;
    registry.write_counts(conn).map_err(|e| Error::output("stdout", e))?;
    conn.flush().map_err(|e| Error::output("stdout", e))
}

/// Sample reads and compute statistics from the SAM or BAM file `input`.
///
/// ## Usage
///
/// ```rust
/// use fastqsumm::output::OutputSpec;
/// use fastqsumm::{summarise, Config};
/// use std::io::Write;
///
/// let mut sam = tempfile::NamedTempFile::new().unwrap();
/// sam.write_all(b"@HD\tVN:1.6\n").unwrap();
/// for i in 0..10 {
///     writeln!(sam, "p{}\t77\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII", i).unwrap();
///     writeln!(sam, "p{}\t141\t*\t0\t0\t*\t*\t0\t0\tGGA\t555", i).unwrap();
/// }
/// sam.flush().unwrap();
///
/// let out_dir = tempfile::tempdir().unwrap();
/// let config = Config {
///     output: OutputSpec::new(out_dir.path(), "run"),
///     requested: 4,
///     fastqcheck: true,
///     ..Default::default()
/// };
/// let summary = summarise(sam.path(), &config).unwrap();
/// assert_eq!(summary.pairs, 10);
///
/// let sampled = std::fs::read_to_string(out_dir.path().join("run_2.fastq.4")).unwrap();
/// assert!(sampled.starts_with("@p0/2\nGGA\n+\n555\n@p3/2\n"));
///
/// let report = std::fs::read_to_string(out_dir.path().join("run_1.fastqcheck")).unwrap();
/// assert!(report.starts_with("10 sequences, 40 total length, 4.00 average, 4 max\n"));
/// ```
pub fn summarise(
    input: &Path,
    config: &Config,
) -> Result<RunSummary> {
    config.output.prepare()?;
    let mut registry = build_registry(input, config)?;
    registry.open(&config.output, config.fastqcheck, config.max_length)?;

    let orphans = match &config.orphans {
        Some(path) => OrphanSet::from_file(path)?,
        None => OrphanSet::default(),
    };
    info!("Output queues initialised");

    let mut fan_out = FanOut::new(registry, config.filter, config.aux_keys.clone(), orphans);
    fan_out.run(AlignmentReader::open(input, &config.aux_keys)?)?;
    fan_out.finish()
}

/// Write the fastqcheck report of FASTQ data from [Read] to [Write].
///
/// ## Usage
///
/// ```rust
/// use fastqsumm::fastqcheck_from_read_to_write;
/// use std::io::Cursor;
///
/// let input = Cursor::new(b"@r1\nACGT\n+\nIIII\n".to_vec());
/// let mut output: Vec<u8> = Vec::new();
/// fastqcheck_from_read_to_write(input, &mut output).unwrap();
///
/// assert!(output.starts_with(b"1 sequences, 4 total length, 4.00 average, 4 max\n"));
/// ```
pub fn fastqcheck_from_read_to_write<R: Read + Send, W: Write>(
    conn_in: R,
    conn_out: &mut W,
) -> Result<()> {
    let stats = check::check_reader(Path::new("-"), conn_in, check::CHECK_MAX_LENGTH)?;
    stats.write_report(conn_out).map_err(|e| Error::output("stdout", e))?;
    conn_out.flush().map_err(|e| Error::output("stdout", e))
}

/// Write the fastqcheck report of the FASTQ file `input` to [Write].
pub fn fastqcheck_file_to_write<W: Write>(
    input: &Path,
    conn_out: &mut W,
) -> Result<()> {
    let stats = check::check_file(input, check::CHECK_MAX_LENGTH)?;
    stats.write_report(conn_out).map_err(|e| Error::output("stdout", e))?;
    conn_out.flush().map_err(|e| Error::output("stdout", e))
}
