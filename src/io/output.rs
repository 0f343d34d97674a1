//! Output formatting and logging utilities

use berny::Geometry;
use color_eyre::eyre::Result;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = StdSystemTime::now();
        let duration = now
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        let total_seconds = duration.as_secs();
        let hours = (total_seconds / 3600) % 24;
        let minutes = (total_seconds / 60) % 60;
        let seconds = total_seconds % 60;

        write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Setup logging to a file or stderr.
///
/// Stdout is reserved for the evaluator protocol, so the log never goes there.
pub fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => match File::create(path) {
            Ok(log) => {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
                info!("Output will be written to: {}", path);
            }
            Err(err) => {
                eprintln!("Could not create output file {}: {}", path, err);
                setup_output(None);
            }
        },
        None => {
            let stderr_layer = layer()
                .with_writer(std::io::stderr)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stderr_layer).init();
        }
    }
}

/// Print the final geometry to a writer
pub fn print_optimized_geometry<W: Write>(
    writer: &mut W,
    geometry: &Geometry,
    energy: Option<f64>,
) -> Result<()> {
    writeln!(writer, "Optimized geometry:")?;
    for (i, (coord, elem)) in geometry.coords.iter().zip(&geometry.elements).enumerate() {
        writeln!(
            writer,
            "  Atom {}: {} at [{:.6}, {:.6}, {:.6}]",
            i + 1,
            elem.get_symbol(),
            coord.x,
            coord.y,
            coord.z
        )?;
    }
    if let Some(energy) = energy {
        writeln!(writer, "Final energy: {:.10} au", energy)?;
    }
    Ok(())
}
