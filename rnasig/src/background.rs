//! Background energy model: choosing between regression and shuffling,
//! and predicting (mean, stdev) from the regression models.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composition::{BaseRatios, CompositionProfile};
use crate::error::Result;
use crate::registry::{bucket_for_gc, nearest_bucket, ModelRegistry, RegressionPair};
use crate::svm::{features_from, ScaleTable, TargetScale};

/// Folding parameter set the shipped regression models were trained with.
pub const TRAINING_ENERGY_PARAMETERS: &str = "turner2004";

/// Which composition the random background preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Mononucleotide,
    Dinucleotide,
}

impl Background {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mononucleotide => "mononucleotide",
            Self::Dinucleotide => "dinucleotide",
        }
    }
}

/// How the background (mean, stdev) of a sequence gets estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorMode {
    MonoRegression,
    MonoShuffle,
    DiRegression,
    DiShuffle,
}

impl EstimatorMode {
    #[must_use]
    pub fn regression(background: Background) -> Self {
        match background {
            Background::Mononucleotide => Self::MonoRegression,
            Background::Dinucleotide => Self::DiRegression,
        }
    }

    #[must_use]
    pub fn shuffle(background: Background) -> Self {
        match background {
            Background::Mononucleotide => Self::MonoShuffle,
            Background::Dinucleotide => Self::DiShuffle,
        }
    }

    #[must_use]
    pub fn background(self) -> Background {
        match self {
            Self::MonoRegression | Self::MonoShuffle => Background::Mononucleotide,
            Self::DiRegression | Self::DiShuffle => Background::Dinucleotide,
        }
    }

    #[must_use]
    pub fn is_regression(self) -> bool {
        matches!(self, Self::MonoRegression | Self::DiRegression)
    }

    /// The shuffle estimator of the same arity.
    #[must_use]
    pub fn shuffle_variant(self) -> Self {
        Self::shuffle(self.background())
    }
}

/// Trained length and composition ranges of one regression family.
#[derive(Debug, Clone, Copy)]
struct TrainedRange {
    min_length: usize,
    max_length: usize,
    min_ratio: f64,
    max_ratio: f64,
}

const MONO_RANGE: TrainedRange =
    TrainedRange { min_length: 50, max_length: 400, min_ratio: 0.25, max_ratio: 0.75 };
const DI_RANGE: TrainedRange =
    TrainedRange { min_length: 50, max_length: 200, min_ratio: 0.20, max_ratio: 0.80 };

/// Largest tolerated relative deviation of a dinucleotide frequency from
/// the product of its mononucleotide frequencies.
pub const DINUCLEOTIDE_TOLERANCE: f64 = 1.5;

fn trained_range(background: Background) -> TrainedRange {
    match background {
        Background::Mononucleotide => MONO_RANGE,
        Background::Dinucleotide => DI_RANGE,
    }
}

/// Outcome of [`select_estimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub mode: EstimatorMode,
    pub warnings: Vec<String>,
}

/// Decide how to estimate the background of one sequence.
///
/// Regression is used unless the energy parameters differ from the
/// training set, the length is outside the trained range, a composition
/// ratio is out of range, or (dinucleotide only) the dinucleotide
/// frequencies are far from independent. With `avoid_shuffle` every
/// downgrade except the length one is turned back into regression.
#[must_use]
pub fn select_estimator(
    requested: Background,
    profile: &CompositionProfile,
    energy_parameters: &str,
    avoid_shuffle: bool,
) -> Selection {
    let range = trained_range(requested);
    let name = requested.name();
    let mut warnings = Vec::new();

    let length = profile.length();
    let length_ok = (range.min_length..=range.max_length).contains(&length);
    if !length_ok {
        warnings.push(format!(
            "Sequence length {length} is outside the trained range of the {name} regression \
             ({}-{} nt); using shuffled sequences",
            range.min_length, range.max_length
        ));
    }

    let mut downgraded = false;
    if !energy_parameters.eq_ignore_ascii_case(TRAINING_ENERGY_PARAMETERS) {
        warnings.push(format!(
            "Regression models were trained with the {TRAINING_ENERGY_PARAMETERS} energy \
             parameters, not {energy_parameters}; using shuffled sequences"
        ));
        downgraded = true;
    }

    let BaseRatios { gc, a, c } = profile.ratios();
    let in_range = |ratio: f64| range.min_ratio <= ratio && ratio <= range.max_ratio;
    if !(in_range(gc) && in_range(a) && in_range(c)) {
        warnings.push(format!(
            "Base composition out of range for the {name} regression \
             (GC={gc:.2} A/(A+U)={a:.2} C/(G+C)={c:.2}, trained on {:.2}-{:.2}); \
             using shuffled sequences",
            range.min_ratio, range.max_ratio
        ));
        downgraded = true;
    }

    if requested == Background::Dinucleotide {
        let deviation = profile.max_dinucleotide_deviation();
        if deviation > DINUCLEOTIDE_TOLERANCE {
            warnings.push(format!(
                "Dinucleotide frequencies deviate from independence by a factor of \
                 {deviation:.2} (tolerated {DINUCLEOTIDE_TOLERANCE}); using shuffled sequences"
            ));
            downgraded = true;
        }
    }

    let mode = if !length_ok {
        EstimatorMode::shuffle(requested)
    } else if downgraded && avoid_shuffle {
        warnings.push(
            "Shuffling avoided on request; the regression estimate may be inaccurate".to_string(),
        );
        EstimatorMode::regression(requested)
    } else if downgraded {
        EstimatorMode::shuffle(requested)
    } else {
        EstimatorMode::regression(requested)
    };
    debug!("Selected {mode:?} for a sequence of length {length}");

    Selection { mode, warnings }
}

/// Estimated mean and standard deviation of the background energies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundEstimate {
    pub mean: f64,
    pub stdev: f64,
}

impl BackgroundEstimate {
    /// Regression outputs with `mean > -1` or `stdev < 0.1` are not trusted.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        self.mean <= -1.0 && self.stdev >= 0.1
    }
}

const RATIO_SCALE: (f64, f64) = (0.5, 0.158_121_308_1);
const MONO_LENGTH_SCALE: (f64, f64) = (225.0, 114.569_772_373);
const DINUCLEOTIDE_SCALE: (f64, f64) = (0.0625, 0.03);
const DI_LENGTH_SCALE: (f64, f64) = (0.5, 0.288_675_134_6);

static MONO_FEATURE_SCALE: [(f64, f64); 4] =
    [RATIO_SCALE, RATIO_SCALE, RATIO_SCALE, MONO_LENGTH_SCALE];

static DI_FEATURE_SCALE: [(f64, f64); 20] = {
    let mut table = [DINUCLEOTIDE_SCALE; 20];
    table[0] = RATIO_SCALE;
    table[1] = RATIO_SCALE;
    table[2] = RATIO_SCALE;
    table[19] = DI_LENGTH_SCALE;
    table
};

const MONO_MEAN: TargetScale = TargetScale::new(-58.60276, 45.24618);
const MONO_STDEV: TargetScale = TargetScale::new(4.098457, 1.107606);
// per 10 nt; the mean is stretched to the actual length afterwards
const DI_MEAN: TargetScale = TargetScale::new(-2.6, 0.9);
const DI_STDEV: TargetScale = TargetScale::new(3.0, 0.8);

/// Unscaled mononucleotide regression features:
/// GC content, A/(A+U), C/(G+C), length.
#[must_use]
pub fn mononucleotide_features(profile: &CompositionProfile) -> Vec<f64> {
    let ratios = profile.ratios();
    vec![ratios.gc, ratios.a, ratios.c, profile.length() as f64]
}

/// Unscaled dinucleotide regression features: GC content, C/(G+C),
/// A/(A+U), the 16 dinucleotide frequencies, `(length - 50) / 150`.
#[must_use]
pub fn dinucleotide_features(profile: &CompositionProfile) -> Vec<f64> {
    let ratios = profile.ratios();
    let mut features = Vec::with_capacity(20);
    features.extend([ratios.gc, ratios.c, ratios.a]);
    features.extend(profile.dinucleotides());
    features.push((profile.length() as f64 - 50.0) / 150.0);
    features
}

fn predict_pair(pair: &RegressionPair, table: &ScaleTable, raw: Vec<f64>) -> Result<(f64, f64)> {
    let mut x = features_from(raw);
    table.apply(&mut x)?;
    Ok((pair.mean.predict(&x), pair.stdev.predict(&x)))
}

/// Predict the background (mean, stdev) with the regression models of
/// `background`. A GC content outside every dinucleotide bucket uses the
/// nearest one.
pub fn predict_regression(
    registry: &ModelRegistry,
    profile: &CompositionProfile,
    background: Background,
) -> Result<BackgroundEstimate> {
    match background {
        Background::Mononucleotide => {
            let table = ScaleTable::z_score(&MONO_FEATURE_SCALE[..]);
            let (mean, stdev) =
                predict_pair(registry.mononucleotide(), &table, mononucleotide_features(profile))?;
            Ok(BackgroundEstimate {
                mean: MONO_MEAN.restore(mean),
                stdev: MONO_STDEV.restore(stdev),
            })
        }
        Background::Dinucleotide => {
            let gc = profile.ratios().gc;
            let bucket = bucket_for_gc(gc).unwrap_or_else(|| {
                debug!("GC content {gc:.3} outside all buckets, using the nearest");
                nearest_bucket(gc)
            });
            let pair = registry.dinucleotide(bucket)?;
            let table = ScaleTable::z_score(&DI_FEATURE_SCALE[..]);
            let (mean, stdev) = predict_pair(&pair, &table, dinucleotide_features(profile))?;
            let length = profile.length() as f64;
            Ok(BackgroundEstimate {
                mean: DI_MEAN.restore(mean) / 10.0 * length,
                stdev: DI_STDEV.restore(stdev),
            })
        }
    }
}
