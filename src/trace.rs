//! Per-iteration debug trace

use crate::error::RelaxError;
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// State of the engine after one iteration.
///
/// Non-finite numbers serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub nstep: usize,
    pub trust: f64,
    pub hessian: Vec<Vec<f64>>,
    /// Raw Cartesian gradient.
    pub gradients: Vec<f64>,
    /// Cartesian positions after the step.
    pub coords: Vec<[f64; 3]>,
    pub energy: f64,
    pub q: Vec<f64>,
    pub dq: Vec<f64>,
}

impl IterationSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nstep: usize,
        trust: f64,
        hessian: &DMatrix<f64>,
        gradients: &DVector<f64>,
        coords: &[Vector3<f64>],
        energy: f64,
        q: &DVector<f64>,
        dq: &DVector<f64>,
    ) -> Self {
        IterationSnapshot {
            nstep,
            trust,
            hessian: hessian
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
            gradients: gradients.iter().copied().collect(),
            coords: coords.iter().map(|c| [c.x, c.y, c.z]).collect(),
            energy,
            q: q.iter().copied().collect(),
            dq: dq.iter().copied().collect(),
        }
    }
}

/// Destination of iteration snapshots.
pub trait TraceSink {
    fn record(&mut self, snapshot: &IterationSnapshot) -> Result<(), RelaxError>;
}

/// Keeps every snapshot and rewrites the whole JSON array to a file after
/// each one, so the file is always a complete document.
#[derive(Debug)]
pub struct JsonTraceFile {
    path: PathBuf,
    records: Vec<IterationSnapshot>,
}

impl JsonTraceFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonTraceFile {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[IterationSnapshot] {
        &self.records
    }

    fn flush(&self) -> Result<(), RelaxError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        self.records.serialize(&mut serializer)?;
        writer.flush()?;
        Ok(())
    }
}

impl TraceSink for JsonTraceFile {
    fn record(&mut self, snapshot: &IterationSnapshot) -> Result<(), RelaxError> {
        self.records.push(snapshot.clone());
        if let Err(err) = self.flush() {
            self.records.pop();
            return Err(err);
        }
        Ok(())
    }
}
