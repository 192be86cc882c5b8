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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Parse a flag mask or count given in decimal, 0x hex or 0 octal.
fn parse_number(value: &str) -> Result<u64, String> {
    fastqsumm::registry::parse_number(value).ok_or_else(|| format!("'{}' is not a valid number", value))
}

fn parse_flags(value: &str) -> Result<u16, String> {
    let flags = parse_number(value)?;
    u16::try_from(flags).map_err(|_| format!("'{}' is not a valid flag mask", value))
}

fn parse_aux_key(value: &str) -> Result<[u8; 2], String> {
    <[u8; 2]>::try_from(value.as_bytes()).map_err(|_| format!("'{}' is not a two letter field key", value))
}

#[derive(Subcommand)]
pub enum Commands {
    // Sample reads and write statistics from a SAM or BAM file
    Summ {
        // Input SAM or BAM file, plain or gzip compressed
        #[arg(group = "input", required = true, help = "Input SAM or BAM file")]
        input_file: PathBuf,

        // Base name of the output files
        #[arg(short = 'o', long = "output", required = false)]
        out_base: Option<String>,

        // Output directory
        #[arg(short = 'd', long = "dir", default_value = ".npg_cache_10000")]
        out_dir: PathBuf,

        // Reads to sample per output, 0 for all
        #[arg(short = 's', long = "selects", default_value = "10000", value_parser = parse_number)]
        selects: u64,

        // Keep reads with all of these flags set
        #[arg(short = 'f', long = "require-flags", default_value = "0", value_parser = parse_flags)]
        required_flags: u16,

        // Drop reads with any of these flags set
        #[arg(short = 'F', long = "filter-flags", default_value = "0", value_parser = parse_flags)]
        filtering_flags: u16,

        // Field holding the tag read sequence
        #[arg(short = 'r', long = "tag-seq", default_value = "BC", value_parser = parse_aux_key)]
        tag_sequence_key: [u8; 2],

        // Field holding the tag read qualities
        #[arg(short = 'q', long = "tag-qual", default_value = "QT", value_parser = parse_aux_key)]
        tag_quality_key: [u8; 2],

        // Write fastqcheck reports
        #[arg(short = 'k', long = "fastqcheck", default_value_t = false)]
        fastqcheck: bool,

        // Lane level output only
        #[arg(short = 'l', long = "lane", default_value_t = false)]
        lane_mode: bool,

        // Tag totals, skips the counting pass
        #[arg(short = 't', long = "tag-count", value_name = "NAME:COUNT")]
        tag_counts: Vec<String>,

        // Tags given with --tag-count are single-end
        #[arg(long = "single-end-tags", default_value_t = false)]
        single_end_tags: bool,

        // Reads whose mates are absent, one name per line
        #[arg(long = "orphans", required = false)]
        orphans: Option<PathBuf>,

        // Only print the totals and sampling intervals
        #[arg(short = 'c', long = "count", default_value_t = false)]
        count_only: bool,

        // Longest read accepted by the reports
        #[arg(long = "max-length", default_value_t = 10000)]
        max_length: usize,

        // Verbosity
        #[arg(short = 'v', long = "verbose", default_value_t = 0)]
        verbose: usize,
    },

    // Write the fastqcheck report of a FASTQ file
    Check {
        // Input FASTQ file, reads stdin if not given
        #[arg(group = "input", required = false, help = "Input FASTQ file")]
        input_file: Option<PathBuf>,

        // Verbosity
        #[arg(short = 'v', long = "verbose", default_value_t = 0)]
        verbose: usize,
    },
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn parse_summ_args() {
        use super::{Cli, Commands};
        use clap::Parser;

        let cli = Cli::parse_from(["fastqsumm", "summ", "-f", "0x1", "-F", "0x400", "-s", "0", "-t", "#1:10", "-t", "#2:20", "-k", "in.sam"]);
        match cli.command {
            Some(Commands::Summ { required_flags, filtering_flags, selects, tag_counts, fastqcheck, tag_sequence_key, .. }) => {
                assert_eq!(required_flags, 1);
                assert_eq!(filtering_flags, 0x400);
                assert_eq!(selects, 0);
                assert_eq!(tag_counts, vec!["#1:10".to_string(), "#2:20".to_string()]);
                assert!(fastqcheck);
                assert_eq!(&tag_sequence_key, b"BC");
            },
            _ => panic!("expected summ"),
        }
    }

    #[test]
    fn reject_bad_values() {
        use super::Cli;
        use clap::Parser;

        assert!(Cli::try_parse_from(["fastqsumm", "summ", "-f", "0x10000", "in.sam"]).is_err());
        assert!(Cli::try_parse_from(["fastqsumm", "summ", "-r", "BCD", "in.sam"]).is_err());
        assert!(Cli::try_parse_from(["fastqsumm", "summ", "-s", "ten", "in.sam"]).is_err());
    }
}
