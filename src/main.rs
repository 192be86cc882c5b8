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
use std::io::BufWriter;

use clap::Parser;
use log::error;
use log::info;

use fastqsumm::output::OutputSpec;
use fastqsumm::record::AuxKeys;
use fastqsumm::record::FlagFilter;
use fastqsumm::Config;

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    let _ = stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init();
}

/// Exit with the status of `err` after logging it.
fn fail(err: fastqsumm::Error) -> ! {
    error!("{}", err);
    std::process::exit(err.exit_code());
}

fn main() {
    let cli = cli::Cli::parse();

    // Subcommands:
    match &cli.command {
        // Summ
        Some(cli::Commands::Summ {
            input_file,
            out_base,
            out_dir,
            selects,
            required_flags,
            filtering_flags,
            tag_sequence_key,
            tag_quality_key,
            fastqcheck,
            lane_mode,
            tag_counts,
            single_end_tags,
            orphans,
            count_only,
            max_length,
            verbose,
        }) => {
            // level 1 in stderrlog is warnings
            init_log(*verbose + 1);

            let base = out_base.clone().unwrap_or_else(fastqsumm::output::generated_base_name);
            let config = Config {
                output: OutputSpec::new(out_dir, base),
                requested: *selects,
                filter: FlagFilter { required: *required_flags, forbidden: *filtering_flags },
                aux_keys: AuxKeys { tag_sequence: *tag_sequence_key, tag_quality: *tag_quality_key },
                fastqcheck: *fastqcheck,
                lane_mode: *lane_mode,
                tag_counts: tag_counts.clone(),
                single_end_tags: *single_end_tags,
                orphans: orphans.clone(),
                max_length: *max_length,
            };

            if *count_only {
                let mut conn_out = BufWriter::new(std::io::stdout());
                if let Err(e) = fastqsumm::count_to_write(input_file, &config, &mut conn_out) {
                    fail(e);
                }
                return
            }

            match fastqsumm::summarise(input_file, &config) {
                Ok(summary) => {
                    if summary.stragglers > 0 {
                        info!("{} mates were never matched", summary.stragglers);
                    }
                },
                Err(e) => fail(e),
            }
        },

        // Check
        Some(cli::Commands::Check {
            input_file,
            verbose,
        }) => {
            init_log(*verbose + 1);

            let mut conn_out = BufWriter::new(std::io::stdout());
            let res = match input_file {
                Some(file) => fastqsumm::fastqcheck_file_to_write(file, &mut conn_out),
                None => fastqsumm::fastqcheck_from_read_to_write(std::io::stdin(), &mut conn_out),
            };
            if let Err(e) = res {
                fail(e);
            }
        },
        None => {
            use clap::CommandFactory;
            let _ = cli::Cli::command().print_help();
        },
    }
}
