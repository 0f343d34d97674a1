mod geometry;

pub use geometry::build_geometry;

use crate::io::{print_optimized_geometry, setup_output, JsonLines, Status};
use berny::config::{Args, Config, CoordinateSystem, RelaxParams};
use berny::{CartesianCoords, CoordinateAdapter, Geometry, Outcome, PairDistances, StepEngine};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use nalgebra::DVector;
use std::fs;
use std::io::{BufRead, Write};
use tracing::{info, warn};

pub struct RelaxApplication {
    args: Args,
    config: Config,
}

impl RelaxApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());
        info!("Reading configuration from: {}", self.args.config_file);

        let geometry = build_geometry(&self.config)?;
        let params = self.config.relax_params(&self.args);
        info!("Relaxation parameters: {:?}", params);

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut channel = JsonLines::new(stdin.lock(), stdout.lock());

        match self.config.coordinate_system(&self.args) {
            CoordinateSystem::Cartesian => {
                let coords = CartesianCoords::new(&geometry);
                relax(geometry, coords, params, &mut channel, &mut std::io::stderr())
            }
            CoordinateSystem::Distances => {
                let coords = PairDistances::new(&geometry);
                relax(geometry, coords, params, &mut channel, &mut std::io::stderr())
            }
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    serde_yml::from_str::<Config>(&config_content).wrap_err("Failed to parse configuration file")
}

/// Drive the engine until it reports a terminal outcome.
///
/// Rejected evaluations are logged and the same geometry is requested again.
/// The final geometry is written to `report`. A converged geometry is the
/// predicted next point and has no energy of its own, so only the energy of
/// the last evaluated point is quoted next to it.
pub fn relax<A, R, W, S>(
    geometry: Geometry,
    coords: A,
    params: RelaxParams,
    channel: &mut JsonLines<R, W>,
    report: &mut S,
) -> Result<()>
where
    A: CoordinateAdapter,
    R: BufRead,
    W: Write,
    S: Write,
{
    let mut engine = StepEngine::new(geometry, coords, params).wrap_err("Invalid relaxation setup")?;
    channel.send(Status::Evaluate, engine.iteration(), engine.geometry())?;

    loop {
        let evaluation = channel.receive()?;
        let gradient = DVector::from_vec(evaluation.gradient);
        let outcome = match engine.step(evaluation.energy, &gradient) {
            Ok(outcome) => outcome,
            Err(err) if err.is_recoverable() => {
                warn!("Evaluation rejected: {}", err);
                channel.send(Status::Evaluate, engine.iteration(), engine.geometry())?;
                continue;
            }
            Err(err) => return Err(err).wrap_err("Relaxation failed"),
        };
        match outcome {
            Outcome::Continue(next) => channel.send(Status::Evaluate, engine.iteration(), &next)?,
            Outcome::Converged(last) => {
                info!("Relaxation converged in {} steps", engine.iteration());
                channel.send(Status::Converged, engine.iteration(), &last)?;
                print_optimized_geometry(report, &last, None)?;
                writeln!(report, "Last evaluated energy: {:.10} au", evaluation.energy)?;
                return Ok(());
            }
            Outcome::Exhausted(last) => {
                warn!("Relaxation did not converge in {} steps", engine.params().max_steps);
                channel.send(Status::Exhausted, engine.params().max_steps, &last)?;
                print_optimized_geometry(report, &last, Some(evaluation.energy))?;
                return Ok(());
            }
        }
    }
}
