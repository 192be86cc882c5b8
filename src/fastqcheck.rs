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

//! Streaming base and quality statistics in the fastqcheck report format.
//!
//! A [FastqCheck] counts base calls and quality values per read position and
//! over the whole input. Counting is additive and the report is produced once
//! all reads have been seen.
//!
//! ## Usage
//! ```rust
//! use fastqsumm::fastqcheck::FastqCheck;
//! use fastqsumm::sequence::base_class;
//!
//! let mut stats = FastqCheck::new(100);
//! stats.begin_sequence(b"r1", 4).unwrap();
//! b"ACGT".iter().enumerate().for_each(|(pos, base)| {
//!     stats.add_base(base_class(*base), pos);
//!     stats.add_quality(30, pos);
//! });
//!
//! let mut report: Vec<u8> = Vec::new();
//! stats.write_report(&mut report).unwrap();
//! assert!(report.starts_with(b"1 sequences, 4 total length, 4.00 average, 4 max\n"));
//! ```
use std::io::Write;

use crate::error::Error;
use crate::error::Result;
use crate::sequence::BASE_A;
use crate::sequence::BASE_C;
use crate::sequence::BASE_G;
use crate::sequence::BASE_N;
use crate::sequence::BASE_T;

/// Default maximum sequence length.
pub const DEFAULT_MAX_LENGTH: usize = 10000;

const N_CLASSES: usize = 5;
const N_QUALITIES: usize = 256;

/// Base and quality counts for one destination.
#[derive(Clone, Debug)]
pub struct FastqCheck {
    max_length: usize,
    nseq: u64,
    total: u64,
    bases: [u64; N_CLASSES],
    quals: [u64; N_QUALITIES],
    pos_bases: Vec<[u64; N_CLASSES]>,
    pos_quals: Vec<[u64; N_QUALITIES]>,
    // lengths[len] = number of sequences with length `len`
    lengths: Vec<u64>,
    length_max: usize,
    q_max: u8,
}

impl FastqCheck {
    /// Accumulator for sequences of at most `max_length` calls.
    pub fn new(max_length: usize) -> Self {
        FastqCheck {
            max_length,
            nseq: 0,
            total: 0,
            bases: [0; N_CLASSES],
            quals: [0; N_QUALITIES],
            pos_bases: Vec::new(),
            pos_quals: Vec::new(),
            lengths: Vec::new(),
            length_max: 0,
            q_max: 0,
        }
    }

    /// Start counting a sequence of `length` calls.
    ///
    /// Fails with [Error::SequenceTooLong] if `length` is above the maximum.
    pub fn begin_sequence(
        &mut self,
        name: &[u8],
        length: usize,
    ) -> Result<()> {
        if length > self.max_length {
            return Err(Error::SequenceTooLong {
                name: String::from_utf8_lossy(name).to_string(),
                length,
                max_length: self.max_length,
            })
        }

        self.nseq += 1;
        self.total += length as u64;
        if length >= self.lengths.len() {
            self.lengths.resize(length + 1, 0);
        }
        self.lengths[length] += 1;

        if length > self.length_max {
            self.length_max = length;
            self.pos_bases.resize(length, [0; N_CLASSES]);
            self.pos_quals.resize(length, [0; N_QUALITIES]);
        }
        Ok(())
    }

    /// Count base class `class` at position `pos` of the current sequence.
    pub fn add_base(
        &mut self,
        class: usize,
        pos: usize,
    ) {
        self.bases[class] += 1;
        self.pos_bases[pos][class] += 1;
    }

    /// Count quality value `value` (raw Phred) at position `pos`.
    pub fn add_quality(
        &mut self,
        value: u8,
        pos: usize,
    ) {
        self.quals[value as usize] += 1;
        self.pos_quals[pos][value as usize] += 1;
        self.q_max = self.q_max.max(value);
    }

    /// Number of sequences counted.
    pub fn nseq(&self) -> u64 {
        self.nseq
    }

    /// Sum of the counted sequence lengths.
    pub fn total_length(&self) -> u64 {
        self.total
    }

    /// Length of the longest sequence counted.
    pub fn length_max(&self) -> usize {
        self.length_max
    }

    /// Write the report to `conn`.
    pub fn write_report<W: Write>(
        &self,
        conn: &mut W,
    ) -> std::io::Result<()> {
        write!(conn, "{} sequences, {} total length", self.nseq, self.total)?;
        if self.nseq > 0 {
            let average = self.total as f32 / self.nseq as f32;
            write!(conn, ", {:.2} average, {} max", average, self.length_max)?;
        }
        writeln!(conn)?;

        if self.total == 0 {
            return Ok(())
        }

        let total = self.total as f64;
        let nseq = self.nseq as f64;
        writeln!(
            conn,
            "Standard deviations at 0.25:  total {:5.2} %, per base {:5.2} %",
            100.0 * ((0.25 * total).sqrt() / total),
            100.0 * ((0.25 * nseq).sqrt() / nseq),
        )?;

        write!(conn, "            A    C    G    T    N ")?;
        for q in 0..=self.q_max {
            write!(conn, " {:3}", q)?;
        }
        write!(conn, " AQ\nTotal  ")?;
        self.write_row(conn, &self.bases, &self.quals, self.total)?;

        let mut remaining = self.nseq;
        for pos in 0..self.length_max {
            // sequences shorter than pos + 1 drop out of the denominator
            remaining -= self.lengths[pos];
            write!(conn, "\nbase {:2}", pos + 1)?;
            self.write_row(conn, &self.pos_bases[pos], &self.pos_quals[pos], remaining)?;
        }
        writeln!(conn)?;

        Ok(())
    }

    fn write_row<W: Write>(
        &self,
        conn: &mut W,
        bases: &[u64; N_CLASSES],
        quals: &[u64; N_QUALITIES],
        denominator: u64,
    ) -> std::io::Result<()> {
        let denom = denominator as f64;
        let percent = |class: usize| 100.0 * (bases[class] as f64 / denom);
        write!(
            conn,
            "  {:4.1} {:4.1} {:4.1} {:4.1} {:4.1} ",
            percent(BASE_A), percent(BASE_C), percent(BASE_G), percent(BASE_T), percent(BASE_N),
        )?;

        let mut error_rate: f64 = 0.0;
        for q in 0..=(self.q_max as usize) {
            let thousandths = (1000.0 * (quals[q] as f64 / denom)).round_ties_even() as i64;
            write!(conn, " {:3}", thousandths)?;
            error_rate += 10_f64.powf(q as f64 / -10.0) * quals[q] as f64;
        }
        write!(conn, " {:4.1}", -10.0 * (error_rate / denom).ln() / 10_f64.ln())?;

        Ok(())
    }
}

impl Default for FastqCheck {
    fn default() -> Self {
        FastqCheck::new(DEFAULT_MAX_LENGTH)
    }
}

// Tests
#[cfg(test)]
mod tests {
    use super::FastqCheck;

    fn feed(
        stats: &mut FastqCheck,
        bases: &[u8],
        quals: &[u8],
    ) {
        use crate::sequence::base_class;

        stats.begin_sequence(b"r", bases.len()).unwrap();
        bases.iter().zip(quals.iter()).enumerate().for_each(|(pos, (base, qual))| {
            stats.add_base(base_class(*base), pos);
            stats.add_quality(*qual, pos);
        });
    }

    #[test]
    fn write_report() {
        let mut stats = FastqCheck::new(10);
        feed(&mut stats, b"ACGT", &[2, 2, 1, 1]);
        feed(&mut stats, b"AN", &[0, 1]);

        let mut got: Vec<u8> = Vec::new();
        stats.write_report(&mut got).unwrap();

        let mut expected = String::new();
        expected.push_str("2 sequences, 6 total length, 3.00 average, 4 max\n");
        expected.push_str("Standard deviations at 0.25:  total 20.41 %, per base 35.36 %\n");
        expected.push_str("            A    C    G    T    N    0   1   2 AQ\n");
        expected.push_str("Total    33.3 16.7 16.7 16.7 16.7  167 500 333  1.1\n");
        expected.push_str("base  1  100.0  0.0  0.0  0.0  0.0  500   0 500  0.9\n");
        expected.push_str("base  2   0.0 50.0  0.0  0.0 50.0    0 500 500  1.5\n");
        expected.push_str("base  3   0.0  0.0 100.0  0.0  0.0    0 1000   0  1.0\n");
        expected.push_str("base  4   0.0  0.0  0.0 100.0  0.0    0 1000   0  1.0\n");

        assert_eq!(String::from_utf8(got).unwrap(), expected);
    }

    #[test]
    fn write_report_empty() {
        let stats = FastqCheck::new(10);
        let mut got: Vec<u8> = Vec::new();
        stats.write_report(&mut got).unwrap();
        assert_eq!(got, b"0 sequences, 0 total length\n".to_vec());

        let mut stats = FastqCheck::new(10);
        stats.begin_sequence(b"r", 0).unwrap();
        let mut got: Vec<u8> = Vec::new();
        stats.write_report(&mut got).unwrap();
        assert_eq!(got, b"1 sequences, 0 total length, 0.00 average, 0 max\n".to_vec());
    }

    #[test]
    fn base_percentages_sum_to_hundred() {
        use crate::sequence::{BASE_A, BASE_N};

        let mut stats = FastqCheck::new(20);
        feed(&mut stats, b"ACGTNNACGGTA", &[30; 12]);
        feed(&mut stats, b"TTGCA", &[20; 5]);
        feed(&mut stats, b"GGGGGGG", &[10; 7]);

        for pos in 0..stats.length_max() {
            let row = stats.pos_bases[pos];
            let n: u64 = row.iter().sum();
            let sum: f64 = (BASE_A..=BASE_N).map(|class| 100.0 * row[class] as f64 / n as f64).sum();
            assert!((sum - 100.0).abs() < 1e-9);
        }
        assert_eq!(stats.nseq(), 3);
        assert_eq!(stats.total_length(), 24);
    }

    #[test]
    fn max_length_is_inclusive() {
        let mut stats = FastqCheck::new(4);
        assert!(stats.begin_sequence(b"r1", 4).is_ok());

        let got = stats.begin_sequence(b"r2", 5);
        assert_eq!(got.err().unwrap().exit_code(), 5);
        assert_eq!(stats.nseq(), 1);
    }
}
