//! Thermodynamic significance and classification of conserved RNA
//! secondary structures in multiple sequence alignments.
//!
//! A sequence's minimum free energy is compared with the energies expected
//! for random sequences of the same composition (a z-score), estimated
//! either by trained regression models or by folding shuffled copies.
//! Alignment-level descriptors are then classified by trained kernel
//! machines into functional RNA or background, and optionally into forward
//! or reverse strand.
//!
//! Folding itself is left to the caller through [`fold::FoldingOracle`].

pub mod error;

pub mod background;
pub mod classify;
pub mod composition;
pub mod config;
pub mod fold;
pub mod registry;
pub mod sequence;
pub mod shuffle;
pub mod strand;
pub mod svm;
pub mod warnings;
pub mod window;
pub mod zscore;

pub use background::{select_estimator, Background, BackgroundEstimate, EstimatorMode, Selection};
pub use classify::{AlignmentDescriptors, Classification, Classifier, DecisionVariant};
pub use composition::CompositionProfile;
pub use config::ScoringConfig;
pub use error::{Error, Result};
pub use fold::{Folded, FoldingOracle};
pub use registry::{ModelRegistry, ModelSource};
pub use sequence::Sequence;
pub use strand::{Strand, StrandClassifier, StrandCode, StrandPrediction};
pub use warnings::WarningLog;
pub use window::{Scorer, StrandReport, WindowReport, WindowSummary};
pub use zscore::{ZScore, ZScoreEngine};
