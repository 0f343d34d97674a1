//! Command-line argument parsing for relaxation runs

use super::CoordinateSystem;
use clap::Parser;
use std::path::PathBuf;

/// Relax a molecular geometry against an external energy evaluator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override output file: (default stderr)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override maximum number of steps
    #[arg(long)]
    pub maxsteps: Option<usize>,

    /// Override initial trust radius
    #[arg(long)]
    pub trust: Option<f64>,

    /// Write a JSON debug trace to this path
    #[arg(long)]
    pub debug: Option<PathBuf>,

    /// Coordinate system for the relaxation
    #[arg(long, value_enum)]
    pub coordinates: Option<CoordinateSystem>,
}
