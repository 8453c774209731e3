//! The folding oracle consumed by the scoring engine.
//!
//! Energy minimisation itself lives outside this crate; implementations
//! wrap whatever folding library or program the caller has available.

use crate::error::Result;

/// A minimum free energy and its dot-bracket structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Folded {
    /// kcal/mol, ≤ 0 by convention
    pub energy: f64,
    /// Same length as the folded (gap-free) sequence or alignment
    pub structure: String,
}

pub trait FoldingOracle {
    /// Fold a single gap-free sequence.
    fn fold(&self, sequence: &str) -> Result<Folded>;

    /// Fold an alignment into its consensus structure.
    fn alifold(&self, alignment: &[&str]) -> Result<Folded>;

    /// Energy only; called once per shuffled sample, so implementations
    /// may skip backtracking.
    fn energy(&self, sequence: &str) -> Result<f64> {
        Ok(self.fold(sequence)?.energy)
    }
}

impl<T: FoldingOracle + ?Sized> FoldingOracle for &T {
    fn fold(&self, sequence: &str) -> Result<Folded> {
        (**self).fold(sequence)
    }

    fn alifold(&self, alignment: &[&str]) -> Result<Folded> {
        (**self).alifold(alignment)
    }

    fn energy(&self, sequence: &str) -> Result<f64> {
        (**self).energy(sequence)
    }
}
