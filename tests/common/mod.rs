use berny::{CoordinateAdapter, Geometry, NullObserver, Outcome, RelaxParams, StepEngine};
use nalgebra::{DVector, Vector3};

/// Sum of Morse pair potentials over all atom pairs.
pub struct MorseCluster {
    pub depth: f64,
    pub width: f64,
    pub r0: f64,
}

impl Default for MorseCluster {
    fn default() -> Self {
        MorseCluster {
            depth: 0.1,
            width: 1.5,
            r0: 1.4,
        }
    }
}

impl MorseCluster {
    pub fn evaluate(&self, geom: &Geometry) -> (f64, DVector<f64>) {
        let mut energy = 0.0;
        let mut gradient = DVector::zeros(geom.dof());
        for i in 0..geom.len() {
            for j in i + 1..geom.len() {
                let d = geom.coords[i] - geom.coords[j];
                let r = d.norm();
                let e = (-self.width * (r - self.r0)).exp();
                energy += self.depth * (1.0 - e).powi(2);
                let de_dr = 2.0 * self.depth * self.width * (1.0 - e) * e;
                let f = d * (de_dr / r);
                for k in 0..3 {
                    gradient[3 * i + k] += f[k];
                    gradient[3 * j + k] -= f[k];
                }
            }
        }
        (energy, gradient)
    }
}

pub fn diatomic(r: f64) -> Geometry {
    Geometry::from_symbols(
        &["H", "H"],
        vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.1, 0.2, r)],
    )
    .unwrap()
}

/// Slightly distorted trigonal bipyramid.
pub fn bipyramid() -> Geometry {
    Geometry::from_symbols(
        &["Ar", "Ar", "Ar", "Ar", "Ar"],
        vec![
            Vector3::new(0.85, 0.0, 0.05),
            Vector3::new(-0.40, 0.72, 0.0),
            Vector3::new(-0.42, -0.70, -0.03),
            Vector3::new(0.02, 0.0, 1.22),
            Vector3::new(0.0, -0.05, -1.10),
        ],
    )
    .unwrap()
}

pub fn distance(geom: &Geometry, i: usize, j: usize) -> f64 {
    (geom.coords[i] - geom.coords[j]).norm()
}

/// Run an engine to a terminal outcome, returning it with the number of steps.
pub fn run<A: CoordinateAdapter>(
    geom: Geometry,
    coords: A,
    params: RelaxParams,
    pes: &MorseCluster,
) -> (Outcome, usize) {
    let mut engine = StepEngine::new(geom, coords, params)
        .unwrap()
        .with_observer(NullObserver);
    let mut geom = engine.geometry().clone();
    loop {
        let (energy, gradient) = pes.evaluate(&geom);
        match engine.step(energy, &gradient).unwrap() {
            Outcome::Continue(next) => geom = next,
            terminal => return (terminal, engine.iteration()),
        }
    }
}
