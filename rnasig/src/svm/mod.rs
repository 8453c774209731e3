//! Kernel machines: evaluation, text format and feature scaling.

pub mod format;
pub mod model;
pub mod scale;

pub use format::{load_model, parse_model, write_model};
pub use model::{features_from, Feature, Kernel, KernelType, SvmModel, SvmType};
pub use scale::{ScaleMethod, ScaleTable, TargetScale};
