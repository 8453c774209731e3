use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::from_reader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rnasig::{AlignmentDescriptors, Classifier, ModelRegistry, ScoringConfig, WarningLog};

const USAGE: &str = "usage: rnasig <descriptors.json> [config.json]";

/// One alignment in the input batch.
#[derive(Debug, Deserialize)]
struct DescriptorRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    descriptors: AlignmentDescriptors,
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    id: &'a str,
    model: &'a str,
    z: f64,
    sci: f64,
    identity: f64,
    n_seq: usize,
    entropy: Option<f64>,
    decision_value: f64,
    probability: f64,
    prediction: &'a str,
    warnings: String,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run() {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let mut args = env::args_os().skip(1).map(PathBuf::from);
    let Some(input) = args.next() else {
        bail!(USAGE);
    };
    let config = match args.next() {
        Some(path) => ScoringConfig::from_file(&path)?,
        None => ScoringConfig::default(),
    };

    let registry = ModelRegistry::load(config.model_source()).context("Failed to load models")?;
    let classifier = Classifier::new(&registry, config.decision_model)?;

    let file = File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let records: Vec<DescriptorRecord> = from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse descriptor records in {}", input.display()))?;
    info!("Classifying {} alignments with the {} model", records.len(), config.decision_model);

    let mut writer = csv::Writer::from_writer(io::stdout());
    for (i, record) in records.iter().enumerate() {
        let mut warnings = WarningLog::new();
        let classification = classifier
            .classify(&record.descriptors, &mut warnings)
            .with_context(|| format!("Failed to classify record {}", i + 1))?;

        let fallback_id = (i + 1).to_string();
        let d = &record.descriptors;
        writer.serialize(ResultRow {
            id: record.id.as_deref().unwrap_or(&fallback_id),
            model: config.decision_model.name(),
            z: d.z,
            sci: d.sci,
            identity: d.identity,
            n_seq: d.n_seq,
            entropy: d.entropy,
            decision_value: classification.decision_value,
            probability: classification.probability,
            prediction: if classification.is_rna() { "RNA" } else { "OTHER" },
            warnings: warnings.iter().collect::<Vec<_>>().join("; "),
        })?;
    }
    writer.flush()?;

    info!("Done");
    Ok(())
}
