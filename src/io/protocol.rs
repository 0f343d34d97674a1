//! JSON-lines exchange with the evaluator
//!
//! Every message is one JSON object on one line. The driver writes
//! geometries to stdout and reads `{"energy": E, "gradient": [...]}` back
//! after each `evaluate` request.

use berny::Geometry;
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Evaluate,
    Converged,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AtomRecord {
    element: String,
    coords: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Request {
    status: Status,
    step: usize,
    geometry: Vec<AtomRecord>,
}

/// Energy and flattened Cartesian gradient of the last requested geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub energy: f64,
    pub gradient: Vec<f64>,
}

pub struct JsonLines<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> JsonLines<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        JsonLines { reader, writer }
    }

    pub fn send(&mut self, status: Status, step: usize, geometry: &Geometry) -> Result<()> {
        let request = Request {
            status,
            step,
            geometry: geometry
                .elements
                .iter()
                .zip(&geometry.coords)
                .map(|(element, c)| AtomRecord {
                    element: element.get_symbol().to_string(),
                    coords: [c.x, c.y, c.z],
                })
                .collect(),
        };
        serde_json::to_writer(&mut self.writer, &request).wrap_err("Failed to encode request")?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read the next evaluation, skipping blank lines.
    pub fn receive(&mut self) -> Result<Evaluation> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .wrap_err("Failed to read evaluation")?;
            if read == 0 {
                return Err(eyre!("Evaluator closed the input before sending an evaluation"));
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        serde_json::from_str(line.trim())
            .wrap_err_with(|| format!("Malformed evaluation: {}", line.trim()))
    }
}
