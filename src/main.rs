//! Geometry relaxation command-line driver
//!
//! Reads the starting geometry and options from a YAML file, then exchanges
//! JSON lines with an external evaluator: geometries go out on stdout,
//! energies and gradients come back on stdin.

use color_eyre::eyre::Result;

mod app;
mod io;

use app::RelaxApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    RelaxApplication::from_cli()?.run()
}
