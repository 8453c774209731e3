//! Feature scaling applied before a vector reaches a model.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::svm::model::Feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    /// `(x - mean) / stdev`
    ZScore,
    /// `-1 + 2 * (x - min) / (max - min)`
    Linear,
}

/// Per-feature scaling parameters. Entry `i` applies to feature index
/// `i + 1` and holds (mean, stdev) or (min, max) depending on the method.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    method: ScaleMethod,
    entries: Cow<'static, [(f64, f64)]>,
}

impl ScaleTable {
    #[must_use]
    pub fn z_score(entries: impl Into<Cow<'static, [(f64, f64)]>>) -> Self {
        Self { method: ScaleMethod::ZScore, entries: entries.into() }
    }

    #[must_use]
    pub fn linear(entries: impl Into<Cow<'static, [(f64, f64)]>>) -> Self {
        Self { method: ScaleMethod::Linear, entries: entries.into() }
    }

    #[must_use]
    pub fn method(&self) -> ScaleMethod {
        self.method
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entry(&self, index: u32) -> Option<(f64, f64)> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.entries.get(slot).copied()
    }

    /// Scale `features` in place. A feature without a table entry, or a
    /// degenerate entry, is a configuration error.
    pub fn apply(&self, features: &mut [Feature]) -> Result<()> {
        for feature in features.iter_mut() {
            let (p1, p2) = self.entry(feature.index).ok_or_else(|| {
                Error::Config(format!(
                    "no scale entry for feature {} (table has {} entries)",
                    feature.index,
                    self.entries.len()
                ))
            })?;
            feature.value = match self.method {
                ScaleMethod::ZScore => {
                    if p2 == 0.0 {
                        return Err(Error::Config(format!(
                            "zero stdev in scale entry {}",
                            feature.index
                        )));
                    }
                    (feature.value - p1) / p2
                }
                ScaleMethod::Linear => {
                    if p2 <= p1 {
                        return Err(Error::Config(format!(
                            "empty range in scale entry {}",
                            feature.index
                        )));
                    }
                    -1.0 + 2.0 * (feature.value - p1) / (p2 - p1)
                }
            };
        }
        Ok(())
    }
}

/// Map a raw model output back to target units: `raw * stdev + mean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetScale {
    pub mean: f64,
    pub stdev: f64,
}

impl TargetScale {
    #[must_use]
    pub const fn new(mean: f64, stdev: f64) -> Self {
        Self { mean, stdev }
    }

    #[must_use]
    pub fn restore(&self, raw: f64) -> f64 {
        raw * self.stdev + self.mean
    }
}
