//! Classification of alignment descriptors into functional RNA or
//! background.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::ModelRegistry;
use crate::svm::{features_from, Feature, ScaleTable, SvmModel};
use crate::warnings::WarningLog;

/// Label of the RNA class in the decision models.
pub const RNA_LABEL: i32 = 1;

/// Round `value` to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// One input of a decision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    ZScore,
    Sci,
    Identity,
    SequenceCount,
    Entropy,
}

impl Descriptor {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ZScore => "z-score",
            Self::Sci => "structure conservation index",
            Self::Identity => "mean pairwise identity",
            Self::SequenceCount => "number of sequences",
            Self::Entropy => "Shannon entropy",
        }
    }

    /// Values outside the trained range are clamped rather than passed on.
    #[must_use]
    pub fn is_clamped(self) -> bool {
        matches!(self, Self::ZScore | Self::Sci)
    }
}

/// The trained decision models, distinguished by their descriptor sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionVariant {
    /// z, SCI, identity, number of sequences
    #[default]
    SequenceMono,
    /// z, SCI, entropy
    SequenceDi,
    /// z, SCI, entropy; trained on structural alignments
    StructuralDi,
}

impl DecisionVariant {
    pub const ALL: [Self; 3] = [Self::SequenceMono, Self::SequenceDi, Self::StructuralDi];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SequenceMono => "sequence-mono",
            Self::SequenceDi => "sequence-di",
            Self::StructuralDi => "structural-di",
        }
    }

    #[must_use]
    pub fn model_file(self) -> &'static str {
        match self {
            Self::SequenceMono => "decision_sequence_mono.model",
            Self::SequenceDi => "decision_sequence_di.model",
            Self::StructuralDi => "decision_structural_di.model",
        }
    }

    /// Descriptors in feature order.
    #[must_use]
    pub fn descriptors(self) -> &'static [Descriptor] {
        use Descriptor::*;
        match self {
            Self::SequenceMono => &[ZScore, Sci, Identity, SequenceCount],
            Self::SequenceDi | Self::StructuralDi => &[ZScore, Sci, Entropy],
        }
    }

    /// Trained (min, max) of a descriptor; also the linear scale entry.
    #[must_use]
    pub fn bounds(self, descriptor: Descriptor) -> (f64, f64) {
        match (self, descriptor) {
            (Self::StructuralDi, Descriptor::ZScore) => (-9.0, 2.0),
            (_, Descriptor::ZScore) => (-8.15, 2.0),
            (Self::StructuralDi, Descriptor::Sci) => (0.0, 1.45),
            (_, Descriptor::Sci) => (0.0, 1.29),
            (_, Descriptor::Identity) => (50.0, 100.0),
            (_, Descriptor::SequenceCount) => (2.0, 6.0),
            (_, Descriptor::Entropy) => (0.0, 1.4),
        }
    }

    fn scale_table(self) -> ScaleTable {
        ScaleTable::linear(
            self.descriptors().iter().map(|&d| self.bounds(d)).collect::<Vec<_>>(),
        )
    }
}

impl fmt::Display for DecisionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Alignment-level descriptors computed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentDescriptors {
    /// Mean z-score of the single sequences
    pub z: f64,
    /// Structure conservation index
    pub sci: f64,
    /// Mean pairwise identity, percent
    pub identity: f64,
    pub n_seq: usize,
    #[serde(default)]
    pub entropy: Option<f64>,
}

impl AlignmentDescriptors {
    #[must_use]
    pub fn value(&self, descriptor: Descriptor) -> Option<f64> {
        match descriptor {
            Descriptor::ZScore => Some(self.z),
            Descriptor::Sci => Some(self.sci),
            Descriptor::Identity => Some(self.identity),
            Descriptor::SequenceCount => Some(self.n_seq as f64),
            Descriptor::Entropy => self.entropy,
        }
    }
}

/// Result of classifying one alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// Positive values favour RNA
    pub decision_value: f64,
    /// Probability of the RNA class
    pub probability: f64,
}

impl Classification {
    #[must_use]
    pub fn is_rna(&self) -> bool {
        self.probability > 0.5
    }
}

/// A decision model bound to its descriptor layout and scale table.
#[derive(Debug)]
pub struct Classifier<'a> {
    variant: DecisionVariant,
    model: &'a SvmModel,
    scale: ScaleTable,
    rna_class: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(registry: &'a ModelRegistry, variant: DecisionVariant) -> Result<Self> {
        let model = registry.decision(variant);
        let scale = variant.scale_table();
        if model.nr_class() != 2 {
            return Err(Error::Config(format!(
                "decision model {variant} must have two classes, found {}",
                model.nr_class()
            )));
        }
        if model.max_feature_index() as usize > scale.len() {
            return Err(Error::Config(format!(
                "decision model {variant} uses feature {} but only {} descriptors are defined",
                model.max_feature_index(),
                scale.len()
            )));
        }
        let rna_class = model
            .labels()
            .iter()
            .position(|&label| label == RNA_LABEL)
            .ok_or_else(|| {
                Error::Config(format!("decision model {variant} has no class {RNA_LABEL}"))
            })?;
        Ok(Self { variant, model, scale, rna_class })
    }

    #[must_use]
    pub fn variant(&self) -> DecisionVariant {
        self.variant
    }

    /// Build the scaled feature vector. z and SCI are rounded to two places
    /// and clamped to the trained range; other descriptors outside it are
    /// kept and reported. Scaled values are rounded to five places.
    pub fn features(
        &self,
        descriptors: &AlignmentDescriptors,
        warnings: &mut WarningLog,
    ) -> Result<Vec<Feature>> {
        let variant = self.variant;
        let mut values = Vec::with_capacity(variant.descriptors().len());
        for &descriptor in variant.descriptors() {
            let raw = descriptors.value(descriptor).ok_or(Error::MissingDescriptor {
                model: variant.name(),
                descriptor: descriptor.name(),
            })?;
            let (min, max) = variant.bounds(descriptor);
            let value = if descriptor.is_clamped() {
                let rounded = round_to(raw, 2);
                if rounded < min || rounded > max {
                    warnings.push(format!(
                        "{} {rounded:.2} is outside the trained range ({min} to {max}) \
                         of the {variant} model; clamped",
                        descriptor.name()
                    ));
                }
                rounded.clamp(min, max)
            } else {
                if raw < min || raw > max {
                    warnings.push(format!(
                        "{} {raw:.2} is outside the trained range ({min} to {max}) \
                         of the {variant} model",
                        descriptor.name()
                    ));
                }
                raw
            };
            values.push(value);
        }

        let mut features = features_from(values);
        self.scale.apply(&mut features)?;
        for feature in &mut features {
            feature.value = round_to(feature.value, 5);
        }
        Ok(features)
    }

    pub fn classify(
        &self,
        descriptors: &AlignmentDescriptors,
        warnings: &mut WarningLog,
    ) -> Result<Classification> {
        let features = self.features(descriptors, warnings)?;
        let probabilities = self.model.predict_probability(&features).ok_or_else(|| {
            Error::Config(format!(
                "decision model {} carries no probability information",
                self.variant
            ))
        })?;
        let probability = probabilities[self.rna_class];
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidProbability(probability));
        }

        // the first decision value favours the first label
        let raw = self.model.predict_values(&features)[0];
        let decision_value = if self.rna_class == 0 { raw } else { -raw };
        debug!(
            "{} classification: decision value {decision_value:.4}, P(RNA) {probability:.4}",
            self.variant
        );

        Ok(Classification { decision_value, probability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::embedded().unwrap()
    }

    fn descriptors(z: f64, sci: f64) -> AlignmentDescriptors {
        AlignmentDescriptors { z, sci, identity: 80.0, n_seq: 4, entropy: Some(0.5) }
    }

    #[test]
    fn rounding_keeps_the_requested_places() {
        assert_eq!(round_to(-3.14159, 2), -3.14);
        assert_eq!(round_to(0.123456, 5), 0.12346);
    }

    #[test]
    fn large_z_score_is_clamped_before_scaling() {
        let registry = registry();
        let classifier = Classifier::new(&registry, DecisionVariant::SequenceMono).unwrap();
        let mut warnings = WarningLog::new();
        let features = classifier.features(&descriptors(50.0, 0.8), &mut warnings).unwrap();
        assert_eq!(features[0].value, 1.0);
        assert_eq!(warnings.len(), 1);
        assert!(warnings.mentions("z-score"));
    }

    #[test]
    fn out_of_range_identity_passes_through_with_warning() {
        let registry = registry();
        let classifier = Classifier::new(&registry, DecisionVariant::SequenceMono).unwrap();
        let mut warnings = WarningLog::new();
        let mut input = descriptors(-2.0, 0.8);
        input.identity = 30.0;
        let features = classifier.features(&input, &mut warnings).unwrap();
        assert_eq!(features[2].value, -1.8);
        assert!(warnings.mentions("identity"));
    }

    #[test]
    fn probability_is_monotone_in_sci() {
        let registry = registry();
        let classifier = Classifier::new(&registry, DecisionVariant::SequenceMono).unwrap();
        let mut warnings = WarningLog::new();
        let mut previous = 0.0;
        for step in 0..=10 {
            let sci = 0.5 + 0.079 * f64::from(step);
            let result = classifier.classify(&descriptors(-2.0, sci), &mut warnings).unwrap();
            assert!(result.probability >= previous, "P dropped at SCI {sci}");
            previous = result.probability;
        }
        assert!(warnings.is_empty());
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let registry = registry();
        for variant in DecisionVariant::ALL {
            let classifier = Classifier::new(&registry, variant).unwrap();
            for (z, sci) in [(-8.0, 1.2), (0.0, 0.5), (2.0, 0.0), (-4.0, 1.0)] {
                let result =
                    classifier.classify(&descriptors(z, sci), &mut WarningLog::new()).unwrap();
                assert!((0.0..=1.0).contains(&result.probability));
                assert_eq!(result.is_rna(), result.probability > 0.5);
            }
        }
    }

    #[test]
    fn stable_conserved_alignment_is_rna() {
        let registry = registry();
        let classifier = Classifier::new(&registry, DecisionVariant::SequenceMono).unwrap();
        let rna = classifier.classify(&descriptors(-6.0, 1.1), &mut WarningLog::new()).unwrap();
        let background =
            classifier.classify(&descriptors(1.0, 0.2), &mut WarningLog::new()).unwrap();
        assert!(rna.is_rna() && rna.decision_value > 0.0);
        assert!(!background.is_rna() && background.decision_value < 0.0);
    }

    #[test]
    fn dinucleotide_models_require_entropy() {
        let registry = registry();
        let classifier = Classifier::new(&registry, DecisionVariant::SequenceDi).unwrap();
        let mut input = descriptors(-3.0, 0.9);
        input.entropy = None;
        let result = classifier.classify(&input, &mut WarningLog::new());
        assert!(matches!(result, Err(Error::MissingDescriptor { .. })));
    }

    #[test]
    fn variants_deserialize_from_kebab_case() {
        let variant: DecisionVariant = serde_json::from_str("\"structural-di\"").unwrap();
        assert_eq!(variant, DecisionVariant::StructuralDi);
        assert_eq!(variant.to_string(), "structural-di");
    }
}
