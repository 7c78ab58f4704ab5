// SPDX-License-Identifier: AGPL-3.0-or-later
//! landfall command-line interface.

use clap::{Parser, Subcommand};
use landfall::error::{Error, Result};
use landfall::introduce::{find_introductions, IntroduceOptions};
use landfall::io::samples::read_sample_regions;
use landfall::io::tree_table::parse_tree_table;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "landfall")]
#[command(about = "Geographic introduction inference over mutation-annotated trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer the point of introduction for every sample in one or more
    /// geographic regions
    Introduce {
        /// Input mutation-annotated tree table (plain or .gz)
        #[arg(short = 'i', long)]
        input_mat: PathBuf,

        /// Samples of the population of interest, one per line, with an
        /// optional second region column
        #[arg(short = 's', long)]
        population_samples: PathBuf,

        /// Calculate additional phylogenetic trait association
        /// statistics for whole regions and individual introductions.
        /// WARNING: adds significantly to runtime
        #[arg(short = 'a', long)]
        additional_info: bool,

        /// Record, for each clade root in the tree, the support for
        /// that clade root being IN each region, as a tsv with the
        /// indicated name
        #[arg(short = 'c', long, default_value = "")]
        clade_regions: String,

        /// Name of the file to save the introduction information to
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Threshold for recording of putative origins of introductions
        #[arg(short = 'C', long, default_value_t = 0.5)]
        origin_confidence: f64,

        /// Seed for the permutation-null random generator
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // help and version are success, anything else is not
            std::process::exit(i32::from(err.use_stderr()));
        }
    };
    if let Err(err) = run(&cli) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Introduce {
            input_mat,
            population_samples,
            additional_info,
            clade_regions,
            output,
            origin_confidence,
            seed,
        } => {
            let tree = parse_tree_table(input_mat)?;
            let sample_regions = read_sample_regions(population_samples)?;
            let options = IntroduceOptions {
                additional_info: *additional_info,
                min_origin_confidence: *origin_confidence,
                seed: *seed,
            };
            let clade_output = (!clade_regions.is_empty()).then(|| Path::new(clade_regions));
            let rows = find_introductions(&tree, &sample_regions, clade_output, &options)?;
            write_rows(output, &rows)
        }
    }
}

fn write_rows(path: &Path, rows: &[String]) -> Result<()> {
    let io_err = |e: std::io::Error| Error::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut out = std::io::BufWriter::new(std::fs::File::create(path).map_err(io_err)?);
    for row in rows {
        out.write_all(row.as_bytes()).map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}
