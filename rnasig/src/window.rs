//! Scoring of one alignment window: per-row z-scores, structure
//! conservation index, classification and strand prediction.

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::classify::{AlignmentDescriptors, Classification, Classifier};
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::fold::FoldingOracle;
use crate::registry::ModelRegistry;
use crate::sequence::Sequence;
use crate::strand::{
    gu_pair_frequency, StrandClassifier, StrandDescriptors, StrandInput, StrandPrediction,
};
use crate::warnings::WarningLog;
use crate::zscore::{ZScore, ZScoreEngine};

/// Folding results of a window on one strand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub n_seq: usize,
    pub mean_z: f64,
    /// Mean MFE of the single sequences
    pub mean_mfe: f64,
    pub consensus_mfe: f64,
    pub consensus_structure: String,
    /// `consensus_mfe / mean_mfe`, 0 when the mean is 0
    pub sci: f64,
    #[serde(skip)]
    pub rows: Vec<ZScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub summary: WindowSummary,
    pub descriptors: AlignmentDescriptors,
    pub classification: Classification,
    pub warnings: WarningLog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrandReport {
    pub forward: WindowSummary,
    pub reverse: WindowSummary,
    pub input: StrandInput,
    /// `None` when a difference was outside the trained range
    pub prediction: Option<StrandPrediction>,
}

/// Column-wise majority symbol; ties go to the symbol seen first.
#[must_use]
pub fn consensus_sequence(rows: &[Sequence]) -> String {
    let width = rows.first().map_or(0, Sequence::len);
    (0..width)
        .map(|column| {
            let mut counts: Vec<(u8, usize)> = Vec::new();
            for row in rows {
                let Some(&symbol) = row.as_bytes().get(column) else { continue };
                match counts.iter_mut().find(|(s, _)| *s == symbol) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((symbol, 1)),
                }
            }
            let best = counts.iter().fold(None, |best: Option<(u8, usize)>, &(s, c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((s, c)),
            });
            best.map_or('-', |(s, _)| char::from(s))
        })
        .collect()
}

/// Scores alignment windows with one registry, oracle and configuration.
pub struct Scorer<'a, O: FoldingOracle + ?Sized> {
    registry: &'a ModelRegistry,
    oracle: &'a O,
    config: &'a ScoringConfig,
    engine: ZScoreEngine<'a, O>,
    classifier: Classifier<'a>,
}

impl<'a, O: FoldingOracle + ?Sized> Scorer<'a, O> {
    pub fn new(
        registry: &'a ModelRegistry,
        oracle: &'a O,
        config: &'a ScoringConfig,
    ) -> Result<Self> {
        let classifier = Classifier::new(registry, config.decision_model)?;
        info!(
            "Scoring with the {} decision model and {} background",
            config.decision_model,
            config.background.name()
        );
        let engine = ZScoreEngine::new(registry, oracle, config);
        Ok(Self { registry, oracle, config, engine, classifier })
    }

    /// Fold every row and the alignment as a whole.
    pub fn summarize<R: Rng + ?Sized>(
        &self,
        rows: &[Sequence],
        rng: &mut R,
        warnings: &mut WarningLog,
    ) -> Result<WindowSummary> {
        let Some(first) = rows.first() else {
            return Err(Error::EmptySequence);
        };
        if let Some(row) = rows.iter().find(|row| row.len() != first.len()) {
            return Err(Error::Internal(format!(
                "alignment rows differ in length ({} vs {})",
                first.len(),
                row.len()
            )));
        }

        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            let folded = self.oracle.fold(row.ungapped().as_str())?;
            scores.push(self.engine.zscore(row, Some(folded.energy), rng, warnings)?);
        }

        let n = scores.len() as f64;
        let mean_z = scores.iter().map(|z| z.value).sum::<f64>() / n;
        let mean_mfe = scores.iter().map(|z| z.mfe).sum::<f64>() / n;

        let aligned: Vec<&str> = rows.iter().map(Sequence::as_str).collect();
        let consensus = self.oracle.alifold(&aligned)?;
        let sci = if mean_mfe == 0.0 { 0.0 } else { consensus.energy / mean_mfe };

        Ok(WindowSummary {
            n_seq: rows.len(),
            mean_z,
            mean_mfe,
            consensus_mfe: consensus.energy,
            consensus_structure: consensus.structure,
            sci,
            rows: scores,
        })
    }

    /// Score and classify a window of aligned rows. `identity` (percent)
    /// and `entropy` come from the caller's alignment statistics.
    pub fn score_window<R: Rng + ?Sized>(
        &self,
        rows: &[&str],
        identity: f64,
        entropy: Option<f64>,
        rng: &mut R,
    ) -> Result<WindowReport> {
        let mut warnings = WarningLog::new();
        let rows: Vec<Sequence> = rows.iter().copied().map(Sequence::from_aligned).collect();
        let summary = self.summarize(&rows, rng, &mut warnings)?;

        let descriptors = AlignmentDescriptors {
            z: summary.mean_z,
            sci: summary.sci,
            identity,
            n_seq: summary.n_seq,
            entropy,
        };
        let classification = self.classifier.classify(&descriptors, &mut warnings)?;

        Ok(WindowReport { summary, descriptors, classification, warnings })
    }

    /// Compare a window with its reverse complement and predict which one
    /// is the transcribed strand.
    pub fn predict_strand<R: Rng + ?Sized>(
        &self,
        rows: &[&str],
        identity: f64,
        rng: &mut R,
        warnings: &mut WarningLog,
    ) -> Result<StrandReport> {
        let classifier = StrandClassifier::new(self.registry, self.config.strand_code)?;

        let forward_rows: Vec<Sequence> =
            rows.iter().copied().map(Sequence::from_aligned).collect();
        let reverse_rows: Vec<Sequence> =
            forward_rows.iter().map(Sequence::reverse_complement).collect();
        let forward = self.summarize(&forward_rows, rng, warnings)?;
        let reverse = self.summarize(&reverse_rows, rng, warnings)?;

        let forward_gu =
            gu_pair_frequency(&consensus_sequence(&forward_rows), &forward.consensus_structure)?;
        let reverse_gu =
            gu_pair_frequency(&consensus_sequence(&reverse_rows), &reverse.consensus_structure)?;
        let gu_frequency = forward_gu + reverse_gu;

        let input = StrandInput {
            deltas: StrandDescriptors {
                delta_sci: forward.sci - reverse.sci,
                delta_z: forward.mean_z - reverse.mean_z,
                delta_mean_mfe: forward.mean_mfe - reverse.mean_mfe,
                delta_consensus_mfe: forward.consensus_mfe - reverse.consensus_mfe,
            },
            n_seq: forward.n_seq,
            identity,
            gu_frequency,
        };
        let prediction = classifier.predict(&input, warnings)?;

        Ok(StrandReport { forward, reverse, input, prediction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::testing::HairpinOracle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ScoringConfig {
        ScoringConfig { shuffle_samples: 30, seed: Some(3), ..Default::default() }
    }

    #[test]
    fn consensus_takes_the_column_majority() {
        let rows: Vec<Sequence> =
            ["ACGU", "ACGA", "UC-A"].into_iter().map(Sequence::from).collect();
        assert_eq!(consensus_sequence(&rows), "ACGA");
    }

    #[test]
    fn sci_is_consensus_over_mean_energy() {
        let registry = ModelRegistry::embedded().unwrap();
        let config = config();
        let scorer = Scorer::new(&registry, &HairpinOracle, &config).unwrap();
        let rows = ["GGGAAAACCC", "GGGAAAACCC"];
        let report = scorer.score_window(&rows, 100.0, None, &mut config.rng()).unwrap();
        assert_eq!(report.summary.n_seq, 2);
        assert!((report.summary.sci - 1.0).abs() < 1e-12);
        assert!((report.summary.mean_mfe + 2.7).abs() < 1e-12);
        assert_eq!(report.summary.consensus_structure, "(((....)))");
    }

    #[test]
    fn unstructured_window_has_zero_sci() {
        let registry = ModelRegistry::embedded().unwrap();
        let config = config();
        let scorer = Scorer::new(&registry, &HairpinOracle, &config).unwrap();
        let rows = ["AAAAAAAAAA", "AAAAAAAAAA"];
        let report =
            scorer.score_window(&rows, 100.0, None, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(report.summary.sci, 0.0);
        assert_eq!(report.summary.mean_z, 0.0);
    }

    #[test]
    fn ragged_alignments_are_rejected() {
        let registry = ModelRegistry::embedded().unwrap();
        let config = config();
        let scorer = Scorer::new(&registry, &HairpinOracle, &config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let result = scorer.score_window(&["ACGU", "ACG"], 90.0, None, &mut rng);
        assert!(matches!(result, Err(Error::Internal(_))));
        let result = scorer.score_window(&[], 90.0, None, &mut rng);
        assert!(matches!(result, Err(Error::EmptySequence)));
    }

    #[test]
    fn strand_report_holds_both_directions() {
        let registry = ModelRegistry::embedded().unwrap();
        let config = config();
        let scorer = Scorer::new(&registry, &HairpinOracle, &config).unwrap();
        let rows = ["GGGGAAAAUCCC", "GGGGAAAAUCCC", "GGGGAAAAUCCC"];
        let mut warnings = WarningLog::new();
        let report = scorer
            .predict_strand(&rows, 100.0, &mut StdRng::seed_from_u64(2), &mut warnings)
            .unwrap();
        assert_eq!(report.input.n_seq, 3);
        assert_eq!(report.reverse.n_seq, 3);
        assert!(
            (report.input.deltas.delta_consensus_mfe
                - (report.forward.consensus_mfe - report.reverse.consensus_mfe))
                .abs()
                < 1e-12
        );
    }
}
