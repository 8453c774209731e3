//! Scoring configuration, read from JSON.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::background::{Background, TRAINING_ENERGY_PARAMETERS};
use crate::classify::DecisionVariant;
use crate::registry::ModelSource;
use crate::strand::StrandCode;

/// Environment variable naming a directory of model files.
pub const MODEL_DIR_ENV: &str = "RNASIG_MODEL_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub background: Background,
    /// Prefer an out-of-range regression estimate over shuffling.
    pub avoid_shuffle: bool,
    pub shuffle_samples: usize,
    /// Seed for the shuffles; absent means seeded from the OS.
    pub seed: Option<u64>,
    /// Folding parameter set used by the caller's folding oracle.
    pub energy_parameters: String,
    pub decision_model: DecisionVariant,
    pub strand_code: StrandCode,
    pub model_dir: Option<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            background: Background::Mononucleotide,
            avoid_shuffle: false,
            shuffle_samples: 1000,
            seed: None,
            energy_parameters: TRAINING_ENERGY_PARAMETERS.to_string(),
            decision_model: DecisionVariant::SequenceMono,
            strand_code: StrandCode::SciZMeanMfeConsMfe,
            model_dir: None,
        }
    }
}

impl ScoringConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shuffle_samples < 2 {
            bail!("shuffle_samples must be at least 2, got {}", self.shuffle_samples);
        }
        Ok(())
    }

    /// `model_dir`, else the `RNASIG_MODEL_DIR` directory, else the
    /// embedded models.
    #[must_use]
    pub fn model_source(&self) -> ModelSource {
        self.model_source_with(env::var_os(MODEL_DIR_ENV).map(PathBuf::from))
    }

    fn model_source_with(&self, from_env: Option<PathBuf>) -> ModelSource {
        match self.model_dir.clone().or(from_env) {
            Some(dir) => ModelSource::Directory(dir),
            None => ModelSource::Embedded,
        }
    }

    /// Random source for the shuffles.
    #[must_use]
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
