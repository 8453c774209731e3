//! Reading-direction prediction for structured RNA candidates.
//!
//! The classifier compares descriptors of an alignment window with those of
//! its reverse complement. Which differences it looks at is chosen by a
//! [`StrandCode`]; the feature vector is always the code's descriptors in
//! code order followed by the number of sequences, the mean pairwise
//! identity and the GU-pair frequency of the consensus structures.
//!
//! Unlike the main classifier, a difference outside its trained range is
//! never clamped: the prediction for that window is skipped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::ModelRegistry;
use crate::svm::{features_from, ScaleTable, SvmModel};
use crate::warnings::WarningLog;

/// Label of the forward-strand class in the strand model.
pub const FORWARD_LABEL: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrandDescriptor {
    DeltaSci,
    DeltaZ,
    DeltaMeanMfe,
    DeltaConsensusMfe,
    SequenceCount,
    Identity,
    GuFrequency,
}

impl StrandDescriptor {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DeltaSci => "deltaSCI",
            Self::DeltaZ => "deltaZ",
            Self::DeltaMeanMfe => "deltaMeanMFE",
            Self::DeltaConsensusMfe => "deltaConsMFE",
            Self::SequenceCount => "N",
            Self::Identity => "identity",
            Self::GuFrequency => "GU",
        }
    }

    /// Trained (min, max); also the linear scale entry.
    #[must_use]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::DeltaSci => (-0.56, 0.48),
            Self::DeltaZ => (-4.92, 4.92),
            Self::DeltaMeanMfe => (-48.01, 47.64),
            Self::DeltaConsensusMfe => (-66.78, 64.44),
            Self::SequenceCount => (2.0, 6.0),
            Self::Identity => (46.74, 99.54),
            Self::GuFrequency => (0.0, 48.53),
        }
    }
}

/// Named combination of forward-minus-reverse differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrandCode {
    Sci,
    MeanMfe,
    ConsMfe,
    Z,
    SciZ,
    SciZMeanMfe,
    SciZConsMfe,
    #[default]
    SciZMeanMfeConsMfe,
    MeanMfeConsMfe,
    ZMeanMfeConsMfe,
    ZConsMfe,
    SciConsMfe,
    SciMeanMfe,
    SciMeanMfeConsMfe,
    ZMeanMfe,
}

impl StrandCode {
    pub const ALL: [Self; 15] = [
        Self::Sci,
        Self::MeanMfe,
        Self::ConsMfe,
        Self::Z,
        Self::SciZ,
        Self::SciZMeanMfe,
        Self::SciZConsMfe,
        Self::SciZMeanMfeConsMfe,
        Self::MeanMfeConsMfe,
        Self::ZMeanMfeConsMfe,
        Self::ZConsMfe,
        Self::SciConsMfe,
        Self::SciMeanMfe,
        Self::SciMeanMfeConsMfe,
        Self::ZMeanMfe,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sci => "SCI",
            Self::MeanMfe => "MEANMFE",
            Self::ConsMfe => "CONSMFE",
            Self::Z => "Z",
            Self::SciZ => "SCI_Z",
            Self::SciZMeanMfe => "SCI_Z_MEANMFE",
            Self::SciZConsMfe => "SCI_Z_CONSMFE",
            Self::SciZMeanMfeConsMfe => "SCI_Z_MEANMFE_CONSMFE",
            Self::MeanMfeConsMfe => "MEANMFE_CONSMFE",
            Self::ZMeanMfeConsMfe => "Z_MEANMFE_CONSMFE",
            Self::ZConsMfe => "Z_CONSMFE",
            Self::SciConsMfe => "SCI_CONSMFE",
            Self::SciMeanMfe => "SCI_MEANMFE",
            Self::SciMeanMfeConsMfe => "SCI_MEANMFE_CONSMFE",
            Self::ZMeanMfe => "Z_MEANMFE",
        }
    }

    /// The differences this code feeds to the model, in feature order.
    #[must_use]
    pub fn descriptors(self) -> &'static [StrandDescriptor] {
        use StrandDescriptor::{
            DeltaConsensusMfe as Cons, DeltaMeanMfe as Mean, DeltaSci as Sci, DeltaZ as Z,
        };
        match self {
            Self::Sci => &[Sci],
            Self::MeanMfe => &[Mean],
            Self::ConsMfe => &[Cons],
            Self::Z => &[Z],
            Self::SciZ => &[Sci, Z],
            Self::SciZMeanMfe => &[Sci, Z, Mean],
            Self::SciZConsMfe => &[Sci, Z, Cons],
            Self::SciZMeanMfeConsMfe => &[Sci, Z, Mean, Cons],
            Self::MeanMfeConsMfe => &[Mean, Cons],
            Self::ZMeanMfeConsMfe => &[Z, Mean, Cons],
            Self::ZConsMfe => &[Z, Cons],
            Self::SciConsMfe => &[Sci, Cons],
            Self::SciMeanMfe => &[Sci, Mean],
            Self::SciMeanMfeConsMfe => &[Sci, Mean, Cons],
            Self::ZMeanMfe => &[Z, Mean],
        }
    }

    /// Number of model features for this code.
    #[must_use]
    pub fn feature_count(self) -> usize {
        self.descriptors().len() + 3
    }
}

impl fmt::Display for StrandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrandCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown strand descriptor code '{s}'")))
    }
}

impl TryFrom<String> for StrandCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StrandCode> for String {
    fn from(code: StrandCode) -> Self {
        code.name().to_string()
    }
}

/// Forward-minus-reverse descriptor differences.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrandDescriptors {
    pub delta_sci: f64,
    pub delta_z: f64,
    pub delta_mean_mfe: f64,
    pub delta_consensus_mfe: f64,
}

impl StrandDescriptors {
    #[must_use]
    pub fn value(&self, descriptor: StrandDescriptor) -> Option<f64> {
        match descriptor {
            StrandDescriptor::DeltaSci => Some(self.delta_sci),
            StrandDescriptor::DeltaZ => Some(self.delta_z),
            StrandDescriptor::DeltaMeanMfe => Some(self.delta_mean_mfe),
            StrandDescriptor::DeltaConsensusMfe => Some(self.delta_consensus_mfe),
            _ => None,
        }
    }
}

/// Everything the strand model needs for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrandInput {
    pub deltas: StrandDescriptors,
    pub n_seq: usize,
    /// Mean pairwise identity, percent
    pub identity: f64,
    /// GU pairs in the consensus structures, percent
    pub gu_frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strand {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrandPrediction {
    /// Positive values favour the forward strand
    pub decision_value: f64,
    /// Probability of the forward strand
    pub probability: f64,
    /// `2p - 1`
    pub score: f64,
}

impl StrandPrediction {
    #[must_use]
    pub fn strand(&self) -> Strand {
        if self.probability > 0.5 {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

#[derive(Debug)]
pub struct StrandClassifier<'a> {
    code: StrandCode,
    model: &'a SvmModel,
    scale: ScaleTable,
    forward_class: usize,
}

impl<'a> StrandClassifier<'a> {
    pub fn new(registry: &'a ModelRegistry, code: StrandCode) -> Result<Self> {
        let model = registry.strand();
        let mut bounds: Vec<(f64, f64)> =
            code.descriptors().iter().map(|d| d.bounds()).collect();
        bounds.extend(
            [
                StrandDescriptor::SequenceCount,
                StrandDescriptor::Identity,
                StrandDescriptor::GuFrequency,
            ]
            .map(StrandDescriptor::bounds),
        );
        // trailing features may be absent from every support vector
        if model.max_feature_index() as usize > code.feature_count() {
            return Err(Error::Config(format!(
                "strand model uses feature {}, code {code} provides only {}",
                model.max_feature_index(),
                code.feature_count()
            )));
        }
        let forward_class = model
            .labels()
            .iter()
            .position(|&label| label == FORWARD_LABEL)
            .ok_or_else(|| Error::Config(format!("strand model has no class {FORWARD_LABEL}")))?;
        Ok(Self { code, model, scale: ScaleTable::linear(bounds), forward_class })
    }

    #[must_use]
    pub fn code(&self) -> StrandCode {
        self.code
    }

    /// Predict the reading direction, or `None` when a difference lies
    /// outside its trained range.
    pub fn predict(
        &self,
        input: &StrandInput,
        warnings: &mut WarningLog,
    ) -> Result<Option<StrandPrediction>> {
        let mut values = Vec::with_capacity(self.code.feature_count());
        let mut in_range = true;
        for &descriptor in self.code.descriptors() {
            let value = input
                .deltas
                .value(descriptor)
                .ok_or_else(|| {
                    Error::Internal(format!("{} is not a strand difference", descriptor.label()))
                })?;
            let (min, max) = descriptor.bounds();
            if value < min || value > max {
                warnings.push(format!(
                    "Descriptor '{}' is out of range (min={min:.4} max={max:.4}).",
                    descriptor.label()
                ));
                in_range = false;
            }
            values.push(value);
        }
        if !in_range {
            return Ok(None);
        }
        values.extend([input.n_seq as f64, input.identity, input.gu_frequency]);

        let mut features = features_from(values);
        self.scale.apply(&mut features)?;

        let probabilities = self
            .model
            .predict_probability(&features)
            .ok_or_else(|| {
                Error::Config("strand model carries no probability information".to_string())
            })?;
        let probability = probabilities[self.forward_class];
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidProbability(probability));
        }
        let raw = self.model.predict_values(&features)[0];
        let decision_value = if self.forward_class == 0 { raw } else { -raw };
        debug!("Strand prediction ({}): P(forward) {probability:.4}", self.code);

        Ok(Some(StrandPrediction { decision_value, probability, score: 2.0 * probability - 1.0 }))
    }
}

/// Percentage of G-U (or G-T) pairs among all base pairs of a dot-bracket
/// structure over `sequence`; 0 when the structure has no pairs.
pub fn gu_pair_frequency(sequence: &str, structure: &str) -> Result<f64> {
    let (sequence, structure) = (sequence.as_bytes(), structure.as_bytes());
    if sequence.len() != structure.len() {
        return Err(Error::LengthMismatch { sequence: sequence.len(), structure: structure.len() });
    }

    let mut open = Vec::new();
    let (mut gu, mut total) = (0usize, 0usize);
    for (&symbol, &bracket) in sequence.iter().zip(structure) {
        match bracket {
            b'(' => open.push(symbol),
            b')' => {
                let partner = open
                    .pop()
                    .ok_or_else(|| Error::Fold("unbalanced dot-bracket structure".to_string()))?;
                let pair = (partner.to_ascii_uppercase(), symbol.to_ascii_uppercase());
                if matches!(pair, (b'G', b'U' | b'T') | (b'U' | b'T', b'G')) {
                    gu += 1;
                }
                total += 1;
            }
            _ => {}
        }
    }

    if total == 0 {
        return Ok(0.0);
    }
    Ok(gu as f64 / total as f64 * 100.0)
}
