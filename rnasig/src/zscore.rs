//! Z-scores of minimum free energies against a composition-matched
//! random background.

use rand::Rng;
use statrs::statistics::Statistics;
use tracing::debug;

use crate::background::{
    predict_regression, select_estimator, Background, BackgroundEstimate, EstimatorMode,
};
use crate::composition::CompositionProfile;
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::fold::FoldingOracle;
use crate::registry::ModelRegistry;
use crate::sequence::Sequence;
use crate::shuffle::{
    dinucleotide_shuffle_bounded, mononucleotide_shuffle, ShuffleError, MAX_LAST_EDGE_ATTEMPTS,
};
use crate::warnings::WarningLog;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScore {
    pub value: f64,
    /// Observed minimum free energy
    pub mfe: f64,
    pub mean: f64,
    pub stdev: f64,
    /// Estimator that produced `mean` and `stdev`
    pub mode: EstimatorMode,
}

/// Computes `(mfe - mean) / stdev` for single sequences.
pub struct ZScoreEngine<'a, O: FoldingOracle + ?Sized> {
    registry: &'a ModelRegistry,
    oracle: &'a O,
    config: &'a ScoringConfig,
    shuffle_attempts: usize,
}

impl<'a, O: FoldingOracle + ?Sized> ZScoreEngine<'a, O> {
    pub fn new(registry: &'a ModelRegistry, oracle: &'a O, config: &'a ScoringConfig) -> Self {
        Self { registry, oracle, config, shuffle_attempts: MAX_LAST_EDGE_ATTEMPTS }
    }

    /// Bound the last-edge attempts of each dinucleotide shuffle.
    #[must_use]
    pub fn with_shuffle_attempts(mut self, attempts: usize) -> Self {
        self.shuffle_attempts = attempts;
        self
    }

    /// Z-score of `sequence` (gaps are removed first). A non-positive
    /// `energy` is taken as the already computed MFE; otherwise the
    /// sequence is folded.
    pub fn zscore<R: Rng + ?Sized>(
        &self,
        sequence: &Sequence,
        energy: Option<f64>,
        rng: &mut R,
        warnings: &mut WarningLog,
    ) -> Result<ZScore> {
        let sequence = sequence.ungapped();
        if sequence.is_empty() {
            return Err(Error::EmptySequence);
        }

        let mfe = match energy {
            Some(energy) if energy <= 0.0 => energy,
            _ => self.oracle.fold(sequence.as_str())?.energy,
        };

        let profile = CompositionProfile::from_sequence(sequence.as_bytes());
        let selection = select_estimator(
            self.config.background,
            &profile,
            &self.config.energy_parameters,
            self.config.avoid_shuffle,
        );
        warnings.extend(selection.warnings);

        let mut mode = selection.mode;
        let estimate = if mode.is_regression() {
            let estimate = predict_regression(self.registry, &profile, mode.background())?;
            if estimate.is_plausible() {
                estimate
            } else {
                warnings.push(format!(
                    "Regression estimate out of range (mean={:.2}, stdev={:.2}); \
                     using shuffled sequences",
                    estimate.mean, estimate.stdev
                ));
                mode = mode.shuffle_variant();
                self.shuffle_estimate(&sequence, mode.background(), rng, warnings)?
            }
        } else {
            self.shuffle_estimate(&sequence, mode.background(), rng, warnings)?
        };

        let value =
            if estimate.stdev == 0.0 { 0.0 } else { (mfe - estimate.mean) / estimate.stdev };
        debug!(
            "z={value:.3} (mfe {mfe:.2}, mean {:.2}, stdev {:.2}, {mode:?})",
            estimate.mean, estimate.stdev
        );

        Ok(ZScore { value, mfe, mean: estimate.mean, stdev: estimate.stdev, mode })
    }

    /// Sample mean and standard deviation of the energies of shuffled
    /// copies of `sequence`.
    pub fn shuffle_estimate<R: Rng + ?Sized>(
        &self,
        sequence: &Sequence,
        background: Background,
        rng: &mut R,
        warnings: &mut WarningLog,
    ) -> Result<BackgroundEstimate> {
        let samples = self.config.shuffle_samples;
        let mut energies = Vec::with_capacity(samples);
        let mut fell_back = false;

        for _ in 0..samples {
            let bytes = sequence.as_bytes();
            let shuffled = match background {
                Background::Mononucleotide => mononucleotide_shuffle(bytes, rng),
                Background::Dinucleotide => match dinucleotide_shuffle_bounded(
                    bytes,
                    rng,
                    self.shuffle_attempts,
                ) {
                    Ok(shuffled) => shuffled,
                    Err(ShuffleError::Unconverged { attempts }) => {
                        if !fell_back {
                            warnings.push(format!(
                                "Dinucleotide shuffle did not converge after {attempts} attempts; \
                                 using mononucleotide shuffles instead"
                            ));
                            fell_back = true;
                        }
                        mononucleotide_shuffle(bytes, rng)
                    }
                    Err(err) => return Err(Error::Internal(err.to_string())),
                },
            };
            energies.push(self.oracle.energy(Sequence::from_ascii(shuffled).as_str())?);
        }

        Ok(BackgroundEstimate { mean: energies.iter().mean(), stdev: energies.iter().std_dev() })
    }
}
