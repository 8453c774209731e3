//! Model registry: regression, decision and strand models, loaded once and
//! shared read-only by every scoring call.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::classify::DecisionVariant;
use crate::error::{Error, Result};
use crate::svm::model::require_probabilistic;
use crate::svm::{load_model, parse_model, SvmModel};

/// GC-content buckets (percent) of the dinucleotide regression models.
pub const GC_BUCKETS: [(u32, u32); 10] = [
    (20, 30),
    (30, 36),
    (36, 42),
    (42, 46),
    (46, 50),
    (50, 54),
    (54, 58),
    (58, 64),
    (64, 70),
    (70, 80),
];

/// Index of the first bucket (ascending) with `lo <= gc <= hi`, where
/// `gc` is a fraction. A value on a shared boundary lands in the lower
/// bucket.
#[must_use]
pub fn bucket_for_gc(gc: f64) -> Option<usize> {
    GC_BUCKETS
        .iter()
        .position(|&(lo, hi)| fraction(lo) <= gc && gc <= fraction(hi))
}

/// Like [`bucket_for_gc`], but a GC content outside every bucket maps to
/// the closest edge bucket instead of failing.
#[must_use]
pub fn nearest_bucket(gc: f64) -> usize {
    bucket_for_gc(gc).unwrap_or(if gc < fraction(GC_BUCKETS[0].0) {
        0
    } else {
        GC_BUCKETS.len() - 1
    })
}

fn fraction(percent: u32) -> f64 {
    f64::from(percent) / 100.0
}

const MONO_AVG: &str = "mono_avg.model";
const MONO_STDV: &str = "mono_stdv.model";
const STRAND: &str = "strand.model";

fn di_file_names(bucket: usize) -> (String, String) {
    let (lo, hi) = GC_BUCKETS[bucket];
    (format!("di_{lo}_{hi}_avg.model"), format!("di_{lo}_{hi}_stdv.model"))
}

macro_rules! embedded_models {
    ($($name:literal),* $(,)?) => {
        fn embedded_text(name: &str) -> Option<&'static str> {
            match name {
                $($name => Some(include_str!(concat!("../models/", $name))),)*
                _ => None,
            }
        }

        /// Write every embedded model into `dir` under its file name.
        #[cfg(test)]
        pub(crate) fn copy_embedded_models(dir: &std::path::Path) -> Result<()> {
            $(std::fs::write(dir.join($name), include_str!(concat!("../models/", $name)))?;)*
            Ok(())
        }
    };
}

embedded_models!(
    "mono_avg.model",
    "mono_stdv.model",
    "di_20_30_avg.model",
    "di_20_30_stdv.model",
    "di_30_36_avg.model",
    "di_30_36_stdv.model",
    "di_36_42_avg.model",
    "di_36_42_stdv.model",
    "di_42_46_avg.model",
    "di_42_46_stdv.model",
    "di_46_50_avg.model",
    "di_46_50_stdv.model",
    "di_50_54_avg.model",
    "di_50_54_stdv.model",
    "di_54_58_avg.model",
    "di_54_58_stdv.model",
    "di_58_64_avg.model",
    "di_58_64_stdv.model",
    "di_64_70_avg.model",
    "di_64_70_stdv.model",
    "di_70_80_avg.model",
    "di_70_80_stdv.model",
    "decision_sequence_mono.model",
    "decision_sequence_di.model",
    "decision_structural_di.model",
    "strand.model",
);

/// Where model text comes from. Both sources go through the same parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Models compiled into the binary.
    Embedded,
    /// A directory holding one file per model. Every file must exist.
    Directory(PathBuf),
}

impl ModelSource {
    pub fn load(&self, name: &str) -> Result<SvmModel> {
        match self {
            Self::Embedded => {
                let text = embedded_text(name)
                    .ok_or_else(|| Error::Config(format!("no embedded model named '{name}'")))?;
                parse_model(text, name)
            }
            Self::Directory(dir) => load_model(&dir.join(name)),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded models"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Separately trained models for the mean and the standard deviation of
/// the background energy distribution.
#[derive(Debug, Clone)]
pub struct RegressionPair {
    pub mean: SvmModel,
    pub stdev: SvmModel,
}

impl RegressionPair {
    fn load(source: &ModelSource, mean: &str, stdev: &str) -> Result<Self> {
        let pair = Self { mean: source.load(mean)?, stdev: source.load(stdev)? };
        for (model, name) in [(&pair.mean, mean), (&pair.stdev, stdev)] {
            if !model.svm_type().is_regression() {
                return Err(Error::Config(format!(
                    "{name} must be a regression model, found {}",
                    model.svm_type().name()
                )));
            }
        }
        Ok(pair)
    }
}

/// Memoising cache of the dinucleotide regression pairs, one slot per GC
/// bucket. A slot is filled on first use; the lock makes that safe when
/// scoring runs on several threads.
#[derive(Debug)]
pub struct ModelBank {
    source: ModelSource,
    buckets: Mutex<Vec<Option<Arc<RegressionPair>>>>,
}

impl ModelBank {
    #[must_use]
    pub fn new(source: ModelSource) -> Self {
        Self { source, buckets: Mutex::new(vec![None; GC_BUCKETS.len()]) }
    }

    /// The regression pair for `bucket`, loading it if necessary.
    pub fn get(&self, bucket: usize) -> Result<Arc<RegressionPair>> {
        if bucket >= GC_BUCKETS.len() {
            return Err(Error::Internal(format!("GC bucket {bucket} does not exist")));
        }
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| Error::Internal("model bank lock poisoned".to_string()))?;
        if let Some(pair) = &buckets[bucket] {
            return Ok(Arc::clone(pair));
        }

        let (avg, stdv) = di_file_names(bucket);
        debug!("Loading dinucleotide regression models {avg} and {stdv} from {}", self.source);
        let pair = Arc::new(RegressionPair::load(&self.source, &avg, &stdv)?);
        buckets[bucket] = Some(Arc::clone(&pair));
        Ok(pair)
    }

    /// Whether `bucket` has been loaded already.
    #[must_use]
    pub fn is_loaded(&self, bucket: usize) -> bool {
        self.buckets
            .lock()
            .map(|buckets| buckets.get(bucket).is_some_and(Option::is_some))
            .unwrap_or(false)
    }

    /// Load every bucket now instead of on first use.
    pub fn preload(&self) -> Result<()> {
        for bucket in 0..GC_BUCKETS.len() {
            self.get(bucket)?;
        }
        Ok(())
    }
}

/// All models needed for scoring. Construct once, then share by reference.
#[derive(Debug)]
pub struct ModelRegistry {
    source: ModelSource,
    mono: RegressionPair,
    decision: Vec<SvmModel>,
    strand: SvmModel,
    bank: ModelBank,
}

impl ModelRegistry {
    /// Load the mononucleotide, decision and strand models eagerly. The
    /// dinucleotide buckets load lazily through the [`ModelBank`].
    pub fn load(source: ModelSource) -> Result<Self> {
        info!("Loading models from {source}");

        let mono = RegressionPair::load(&source, MONO_AVG, MONO_STDV)?;

        let decision = DecisionVariant::ALL
            .iter()
            .map(|variant| {
                let model = source.load(variant.model_file())?;
                require_probabilistic(&model, variant.model_file())?;
                Ok(model)
            })
            .collect::<Result<Vec<_>>>()?;

        let strand = source.load(STRAND)?;
        require_probabilistic(&strand, STRAND)?;

        info!("Loaded {} decision models and the strand model", decision.len());

        Ok(Self { bank: ModelBank::new(source.clone()), source, mono, decision, strand })
    }

    /// Registry backed by the models compiled into the crate.
    pub fn embedded() -> Result<Self> {
        Self::load(ModelSource::Embedded)
    }

    #[must_use]
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    #[must_use]
    pub fn mononucleotide(&self) -> &RegressionPair {
        &self.mono
    }

    /// The dinucleotide regression pair for a GC bucket.
    pub fn dinucleotide(&self, bucket: usize) -> Result<Arc<RegressionPair>> {
        self.bank.get(bucket)
    }

    #[must_use]
    pub fn bank(&self) -> &ModelBank {
        &self.bank
    }

    #[must_use]
    pub fn decision(&self, variant: DecisionVariant) -> &SvmModel {
        &self.decision[variant.index()]
    }

    #[must_use]
    pub fn strand(&self) -> &SvmModel {
        &self.strand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionProfile;
    use crate::svm::features_from;

    #[test]
    fn bucket_boundaries_resolve_to_the_lower_bucket() {
        assert_eq!(bucket_for_gc(0.25), Some(0));
        assert_eq!(bucket_for_gc(0.30), Some(0));
        assert_eq!(bucket_for_gc(0.31), Some(1));
        assert_eq!(bucket_for_gc(0.50), Some(4));
        assert_eq!(bucket_for_gc(0.80), Some(9));
        assert_eq!(bucket_for_gc(0.05), None);
        assert_eq!(bucket_for_gc(0.85), None);
    }

    #[test]
    fn sequence_with_thirty_percent_gc_uses_the_lower_bucket() {
        let mut sequence = b"C".repeat(10);
        sequence.extend(b"G".repeat(20));
        sequence.extend(b"AU".repeat(35));
        let gc = CompositionProfile::from_sequence(&sequence).ratios().gc;
        assert_eq!(bucket_for_gc(gc), Some(0));
    }

    #[test]
    fn nearest_bucket_clamps_to_the_edges() {
        assert_eq!(nearest_bucket(0.05), 0);
        assert_eq!(nearest_bucket(0.95), 9);
        assert_eq!(nearest_bucket(0.55), 6);
    }

    #[test]
    fn every_embedded_model_parses() {
        for bucket in 0..GC_BUCKETS.len() {
            let (avg, stdv) = di_file_names(bucket);
            assert!(ModelSource::Embedded.load(&avg).is_ok(), "{avg}");
            assert!(ModelSource::Embedded.load(&stdv).is_ok(), "{stdv}");
        }
        assert!(ModelRegistry::embedded().is_ok());
    }

    #[test]
    fn bank_loads_buckets_on_first_use() {
        let registry = ModelRegistry::embedded().unwrap();
        assert!(!registry.bank().is_loaded(3));
        let first = registry.dinucleotide(3).unwrap();
        assert!(registry.bank().is_loaded(3));
        let second = registry.dinucleotide(3).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!registry.bank().is_loaded(4));
    }

    #[test]
    fn preload_fills_every_bucket() {
        let bank = ModelBank::new(ModelSource::Embedded);
        assert!((0..GC_BUCKETS.len()).all(|bucket| !bank.is_loaded(bucket)));
        bank.preload().unwrap();
        assert!((0..GC_BUCKETS.len()).all(|bucket| bank.is_loaded(bucket)));
    }

    #[test]
    fn bank_rejects_unknown_bucket() {
        let registry = ModelRegistry::embedded().unwrap();
        assert!(matches!(registry.dinucleotide(10), Err(Error::Internal(_))));
    }

    #[test]
    fn directory_source_matches_embedded_models() {
        let dir = tempfile::tempdir().unwrap();
        copy_embedded_models(dir.path()).unwrap();
        for bucket in 0..GC_BUCKETS.len() {
            let (avg, stdv) = di_file_names(bucket);
            assert!(dir.path().join(avg).is_file());
            assert!(dir.path().join(stdv).is_file());
        }

        let from_dir =
            ModelRegistry::load(ModelSource::Directory(dir.path().to_path_buf())).unwrap();
        let embedded = ModelRegistry::embedded().unwrap();

        let x = features_from([0.1, -0.3, 0.7, -1.2]);
        assert_eq!(
            from_dir.mononucleotide().mean.predict(&x),
            embedded.mononucleotide().mean.predict(&x)
        );
        for variant in DecisionVariant::ALL {
            assert_eq!(
                from_dir.decision(variant).predict_probability(&x),
                embedded.decision(variant).predict_probability(&x)
            );
        }
    }

    #[test]
    fn missing_file_in_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelRegistry::load(ModelSource::Directory(dir.path().to_path_buf()));
        assert!(matches!(result, Err(Error::ModelNotFound(_))));
    }
}
