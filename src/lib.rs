pub mod error;
pub mod structs;
pub mod utils;

pub use crate::error::{AcoError, Result};
pub use crate::structs::{AcoMetrics, AcoParams, AcoStruct, BestRoute, PheromoneField, RunReport, SolveRequest};
pub use crate::utils::{choose_next_city, inverse_distance, length, log_run_to_csv};

/// Shortest path found from `start` to `end` through every other vertex of
/// `dist`, or `None` when the run evaluated no ants (`ants` or `ages` is 0).
pub fn aco(dist: &[Vec<f64>], start: usize, end: usize, params: &AcoParams) -> Result<Option<BestRoute>> {
    let mut model = AcoStruct::new(dist.to_vec(), start, end, params.clone())?;
    Ok(model.run_model()?.best)
}

/// Run a solver request given as JSON, return the full run report as JSON.
pub fn solve_json(request: &str) -> Result<String> {
    let request: SolveRequest = serde_json::from_str(request)?;
    let mut model = AcoStruct::new(request.dist, request.start, request.end, request.params)?;
    let report = model.run_model()?;
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(feature = "python")]
mod python {
    use crate::{AcoError, AcoParams};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    impl From<AcoError> for PyErr {
        fn from(err: AcoError) -> PyErr {
            PyValueError::new_err(err.to_string())
        }
    }

    /// Run ACO on a distance matrix, return `(route, length)` or `(None, None)`.
    #[pyfunction]
    #[pyo3(
        name = "aco",
        signature = (dist, start, end, *, ants=1, ages=1, rho=0.1, a=1.0, b=1.0, q=1.0, ph_min=0.01, ph_max=1.0, elite=0.0, seed=None)
    )]
    #[allow(clippy::too_many_arguments)]
    fn py_aco(
        dist: Vec<Vec<f64>>,
        start: usize,
        end: usize,
        ants: usize,
        ages: usize,
        rho: f64,
        a: f64,
        b: f64,
        q: f64,
        ph_min: f64,
        ph_max: f64,
        elite: f64,
        seed: Option<u64>,
    ) -> PyResult<(Option<Vec<usize>>, Option<f64>)> {
        let params = AcoParams {
            ants,
            ages,
            rho,
            a,
            b,
            q,
            ph_min,
            ph_max,
            elite,
            seed,
            verbose: false,
        };
        Ok(match crate::aco(&dist, start, end, &params)? {
            Some(best) => (Some(best.route), Some(best.length)),
            None => (None, None),
        })
    }

    /// Run a JSON solver request, return the run report as a JSON string.
    #[pyfunction]
    fn solve_json(request: &str) -> PyResult<String> {
        Ok(crate::solve_json(request)?)
    }

    /// Python module definition
    #[pymodule]
    fn acotsp(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(py_aco, m)?)?;
        m.add_function(wrap_pyfunction!(solve_json, m)?)?;
        Ok(())
    }
}
