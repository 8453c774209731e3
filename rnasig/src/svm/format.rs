//! Text serialisation of kernel machine models.
//!
//! Grammar (one item per line, whitespace separated):
//!
//! ```text
//! svm_type    c_svc | nu_svc | one_class | epsilon_svr | nu_svr
//! kernel_type linear | polynomial | rbf | sigmoid
//! degree      <int>                 (optional, default 3)
//! gamma       <float>               (optional, default 0)
//! coef0       <float>               (optional, default 0)
//! nr_class    <int>
//! total_sv    <int>
//! rho         <float> ...           (one per class pair; one for regression)
//! label       <int> ...             (classifiers)
//! probA       <float> ...           (optional, one per class pair)
//! probB       <float> ...           (optional, one per class pair)
//! nr_sv       <int> ...             (classifiers)
//! SV
//! <coef_1> ... <coef_{nr_class-1}> <index>:<value> ...    (total_sv lines)
//! ```
//!
//! Files and in-memory strings go through the same [`parse_model`].

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::svm::model::{Feature, Kernel, KernelType, SvmModel, SvmType};

/// Read and parse a model file.
pub fn load_model(path: &Path) -> Result<SvmModel> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::ModelNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    debug!("Parsing model file {}", path.display());
    parse_model(&text, &path.display().to_string())
}

/// Parse model text. `origin` names the source in error messages.
pub fn parse_model(text: &str, origin: &str) -> Result<SvmModel> {
    let err = |line: usize, reason: String| Error::ModelFormat {
        origin: origin.to_string(),
        line,
        reason,
    };

    let mut svm_type = None;
    let mut kernel = Kernel::default();
    let mut kernel_seen = false;
    let mut nr_class = None;
    let mut total_sv = None;
    let mut rho = Vec::new();
    let mut labels = Vec::new();
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();
    let mut n_sv = Vec::new();

    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut header_closed = false;

    for (number, line) in lines.by_ref() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else { continue };
        let rest: Vec<&str> = tokens.collect();
        match key {
            "svm_type" => {
                let name = single(&rest).map_err(|r| err(number, r))?;
                let parsed = SvmType::from_name(name)
                    .ok_or_else(|| err(number, format!("unknown svm_type '{name}'")))?;
                svm_type = Some(parsed);
            }
            "kernel_type" => {
                let name = single(&rest).map_err(|r| err(number, r))?;
                kernel.kind = KernelType::from_name(name)
                    .ok_or_else(|| err(number, format!("unsupported kernel_type '{name}'")))?;
                kernel_seen = true;
            }
            "degree" => kernel.degree = parse_one(&rest).map_err(|r| err(number, r))?,
            "gamma" => kernel.gamma = parse_one(&rest).map_err(|r| err(number, r))?,
            "coef0" => kernel.coef0 = parse_one(&rest).map_err(|r| err(number, r))?,
            "nr_class" => nr_class = Some(parse_one::<usize>(&rest).map_err(|r| err(number, r))?),
            "total_sv" => total_sv = Some(parse_one::<usize>(&rest).map_err(|r| err(number, r))?),
            "rho" => rho = parse_all(&rest).map_err(|r| err(number, r))?,
            "label" => labels = parse_all(&rest).map_err(|r| err(number, r))?,
            "probA" => prob_a = parse_all(&rest).map_err(|r| err(number, r))?,
            "probB" => prob_b = parse_all(&rest).map_err(|r| err(number, r))?,
            "nr_sv" => n_sv = parse_all(&rest).map_err(|r| err(number, r))?,
            "SV" => {
                header_closed = true;
                break;
            }
            other => return Err(err(number, format!("unknown header key '{other}'"))),
        }
    }

    if !header_closed {
        return Err(err(0, "missing 'SV' line".to_string()));
    }
    let svm_type = svm_type.ok_or_else(|| err(0, "missing svm_type".to_string()))?;
    if !kernel_seen {
        return Err(err(0, "missing kernel_type".to_string()));
    }
    let nr_class = nr_class.ok_or_else(|| err(0, "missing nr_class".to_string()))?;
    let total_sv = total_sv.ok_or_else(|| err(0, "missing total_sv".to_string()))?;
    if nr_class < 2 {
        return Err(err(0, format!("nr_class must be at least 2, got {nr_class}")));
    }

    let mut sv_coef = vec![Vec::with_capacity(total_sv); nr_class - 1];
    let mut support_vectors = Vec::with_capacity(total_sv);

    for (number, line) in lines {
        if support_vectors.len() == total_sv {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < nr_class - 1 {
            return Err(err(number, format!("expected {} coefficient(s)", nr_class - 1)));
        }
        let (coefs, pairs) = tokens.split_at(nr_class - 1);
        for (row, token) in sv_coef.iter_mut().zip(coefs) {
            row.push(parse_token::<f64>(token).map_err(|r| err(number, r))?);
        }
        let sv = pairs
            .iter()
            .map(|token| parse_feature(token))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|r| err(number, r))?;
        support_vectors.push(sv);
    }

    if support_vectors.len() != total_sv {
        return Err(err(
            0,
            format!("expected {total_sv} support vectors, found {}", support_vectors.len()),
        ));
    }

    let model = SvmModel {
        svm_type,
        kernel,
        nr_class,
        support_vectors,
        sv_coef,
        rho,
        labels,
        prob_a,
        prob_b,
        n_sv,
    };
    model.validate().map_err(|r| err(0, r))?;
    Ok(model)
}

/// Serialise a model so that [`parse_model`] reproduces it.
#[must_use]
pub fn write_model(model: &SvmModel) -> String {
    let mut out = String::new();
    let kernel = model.kernel();
    let _ = writeln!(out, "svm_type {}", model.svm_type().name());
    let _ = writeln!(out, "kernel_type {}", kernel.kind.name());
    if kernel.kind == KernelType::Polynomial {
        let _ = writeln!(out, "degree {}", kernel.degree);
    }
    if kernel.kind != KernelType::Linear {
        let _ = writeln!(out, "gamma {}", kernel.gamma);
    }
    if matches!(kernel.kind, KernelType::Polynomial | KernelType::Sigmoid) {
        let _ = writeln!(out, "coef0 {}", kernel.coef0);
    }
    let _ = writeln!(out, "nr_class {}", model.nr_class());
    let _ = writeln!(out, "total_sv {}", model.total_sv());
    let _ = writeln!(out, "rho {}", join(&model.rho));
    if !model.labels.is_empty() {
        let _ = writeln!(out, "label {}", join(&model.labels));
    }
    if !model.prob_a.is_empty() {
        let _ = writeln!(out, "probA {}", join(&model.prob_a));
        let _ = writeln!(out, "probB {}", join(&model.prob_b));
    }
    if !model.n_sv.is_empty() {
        let _ = writeln!(out, "nr_sv {}", join(&model.n_sv));
    }
    out.push_str("SV\n");
    for (i, sv) in model.support_vectors.iter().enumerate() {
        let coefs: Vec<String> = model.sv_coef.iter().map(|row| row[i].to_string()).collect();
        out.push_str(&coefs.join(" "));
        for feature in sv {
            let _ = write!(out, " {}:{}", feature.index, feature.value);
        }
        out.push('\n');
    }
    out
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn single<'a>(rest: &[&'a str]) -> std::result::Result<&'a str, String> {
    match rest {
        [value] => Ok(value),
        _ => Err(format!("expected exactly one value, got {}", rest.len())),
    }
}

fn parse_token<T: std::str::FromStr>(token: &str) -> std::result::Result<T, String> {
    token.parse().map_err(|_| format!("cannot parse '{token}'"))
}

fn parse_one<T: std::str::FromStr>(rest: &[&str]) -> std::result::Result<T, String> {
    parse_token(single(rest)?)
}

fn parse_all<T: std::str::FromStr>(rest: &[&str]) -> std::result::Result<Vec<T>, String> {
    rest.iter().map(|token| parse_token(token)).collect()
}

fn parse_feature(token: &str) -> std::result::Result<Feature, String> {
    let (index, value) = token
        .split_once(':')
        .ok_or_else(|| format!("expected 'index:value', got '{token}'"))?;
    Ok(Feature::new(parse_token(index)?, parse_token(value)?))
}
