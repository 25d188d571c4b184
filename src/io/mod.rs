//! External container boundary (§6): narrow traits standing in for the
//! self-describing binary file format and the config parser that are out
//! of scope for this crate, plus an in-memory reference implementation
//! used by tests — the same line the teacher's `core::storage` module
//! draws around a backend it defines a trait boundary for but does not
//! implement end-to-end. Kept synchronous (no `async_trait`): this crate
//! has no async runtime, and the master thread's `io` writes happen inside
//! a barrier-protected region, not concurrently with worker threads.

use crate::error::{KpmError, KpmResult};
use num_complex::Complex64;
use std::collections::HashMap;

/// Read-only access to the `/IS_COMPLEX`, `/PRECISION`, `/DIM`,
/// `/EnergyScale`, `/Hamiltonian/...` and `/Calculation/<quantity>/...`
/// groups a real container format would expose (§6). Dataset paths are
/// opaque strings, matching the hierarchical-container model; this crate
/// does not parse or validate path syntax beyond what `dataset_*` need.
pub trait HamiltonianSource {
    fn is_complex(&self) -> bool;
    fn dim(&self) -> usize;
    fn energy_scale(&self) -> f64;
    fn magnetic_field(&self) -> bool;

    /// A real-valued dataset (e.g. `/Hamiltonian/AndersonHalfWidth`).
    fn dataset_f64(&self, path: &str) -> KpmResult<Vec<f64>>;
    /// An integer-valued dataset (e.g. `/Hamiltonian/VacancyList`).
    fn dataset_i64(&self, path: &str) -> KpmResult<Vec<i64>>;
}

/// Write access to the `/Calculation/<quantity>/...` moment output node
/// (§6 "Output"). The master thread is the only writer; nothing here is
/// called from a worker thread.
pub trait MomentSink {
    fn write_real_moments(&mut self, path: &str, moments: &[f64]) -> KpmResult<()>;
    fn write_complex_moments(&mut self, path: &str, moments: &[Complex64]) -> KpmResult<()>;
}

/// In-memory reference implementation of both boundary traits: a flat map
/// of dataset path to its typed payload, standing in for a real container
/// file. Used by tests and by callers that already hold their
/// configuration in memory rather than on disk.
#[derive(Clone, Debug, Default)]
pub struct MemoryContainer {
    pub is_complex: bool,
    pub dim: usize,
    pub energy_scale: f64,
    pub magnetic_field: bool,
    real_datasets: HashMap<String, Vec<f64>>,
    int_datasets: HashMap<String, Vec<i64>>,
    real_moments: HashMap<String, Vec<f64>>,
    complex_moments: HashMap<String, Vec<Complex64>>,
}

impl MemoryContainer {
    pub fn new(is_complex: bool, dim: usize, energy_scale: f64) -> Self {
        Self {
            is_complex,
            dim,
            energy_scale,
            magnetic_field: false,
            real_datasets: HashMap::new(),
            int_datasets: HashMap::new(),
            real_moments: HashMap::new(),
            complex_moments: HashMap::new(),
        }
    }

    pub fn set_f64(&mut self, path: impl Into<String>, values: Vec<f64>) {
        self.real_datasets.insert(path.into(), values);
    }

    pub fn set_i64(&mut self, path: impl Into<String>, values: Vec<i64>) {
        self.int_datasets.insert(path.into(), values);
    }

    /// Read back a previously written real moment array (test/inspection
    /// helper; not part of either trait boundary).
    pub fn real_moments_at(&self, path: &str) -> Option<&[f64]> {
        self.real_moments.get(path).map(Vec::as_slice)
    }

    pub fn complex_moments_at(&self, path: &str) -> Option<&[Complex64]> {
        self.complex_moments.get(path).map(Vec::as_slice)
    }
}

impl HamiltonianSource for MemoryContainer {
    fn is_complex(&self) -> bool {
        self.is_complex
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn energy_scale(&self) -> f64 {
        self.energy_scale
    }

    fn magnetic_field(&self) -> bool {
        self.magnetic_field
    }

    fn dataset_f64(&self, path: &str) -> KpmResult<Vec<f64>> {
        self.real_datasets
            .get(path)
            .cloned()
            .ok_or_else(|| KpmError::config(format!("missing required dataset {path}")))
    }

    fn dataset_i64(&self, path: &str) -> KpmResult<Vec<i64>> {
        self.int_datasets
            .get(path)
            .cloned()
            .ok_or_else(|| KpmError::config(format!("missing required dataset {path}")))
    }
}

impl MomentSink for MemoryContainer {
    fn write_real_moments(&mut self, path: &str, moments: &[f64]) -> KpmResult<()> {
        self.real_moments.insert(path.to_string(), moments.to_vec());
        Ok(())
    }

    fn write_complex_moments(&mut self, path: &str, moments: &[Complex64]) -> KpmResult<()> {
        self.complex_moments
            .insert(path.to_string(), moments.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dataset_is_a_config_error() {
        let container = MemoryContainer::new(false, 1, 2.0);
        let err = container.dataset_f64("/Hamiltonian/AndersonHalfWidth");
        assert!(matches!(err, Err(KpmError::Config { .. })));
    }

    #[test]
    fn written_moments_round_trip() {
        let mut container = MemoryContainer::new(true, 1, 2.0);
        let path = "/Calculation/dos/MU";
        container
            .write_complex_moments(path, &[Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.5)])
            .unwrap();
        let back = container.complex_moments_at(path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1], Complex64::new(0.0, 0.5));
    }

    #[test]
    fn dataset_set_then_read_matches() {
        let mut container = MemoryContainer::new(false, 2, 1.0);
        container.set_f64("/Hamiltonian/AndersonHalfWidth", vec![0.3]);
        assert_eq!(
            container.dataset_f64("/Hamiltonian/AndersonHalfWidth").unwrap(),
            vec![0.3]
        );
    }
}
