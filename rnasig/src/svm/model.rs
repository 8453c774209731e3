//! Kernel machine evaluation for regression and classification models.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Lower bound applied to pairwise class probabilities.
const MIN_PROBABILITY: f64 = 1e-7;

/// One entry of a sparse feature vector. Indices are 1-based and vectors
/// are kept sorted by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature {
    pub index: u32,
    pub value: f64,
}

impl Feature {
    #[must_use]
    pub fn new(index: u32, value: f64) -> Self {
        Self { index, value }
    }
}

/// Build a dense, 1-based feature vector from plain values.
#[must_use]
pub fn features_from(values: impl IntoIterator<Item = f64>) -> Vec<Feature> {
    values
        .into_iter()
        .zip(1u32..)
        .map(|(value, index)| Feature::new(index, value))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvmType {
    CSvc,
    NuSvc,
    OneClass,
    EpsilonSvr,
    NuSvr,
}

impl SvmType {
    pub const ALL: [Self; 5] =
        [Self::CSvc, Self::NuSvc, Self::OneClass, Self::EpsilonSvr, Self::NuSvr];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CSvc => "c_svc",
            Self::NuSvc => "nu_svc",
            Self::OneClass => "one_class",
            Self::EpsilonSvr => "epsilon_svr",
            Self::NuSvr => "nu_svr",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    #[must_use]
    pub fn is_classifier(self) -> bool {
        matches!(self, Self::CSvc | Self::NuSvc)
    }

    #[must_use]
    pub fn is_regression(self) -> bool {
        matches!(self, Self::EpsilonSvr | Self::NuSvr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
}

impl KernelType {
    pub const ALL: [Self; 4] = [Self::Linear, Self::Polynomial, Self::Rbf, Self::Sigmoid];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Polynomial => "polynomial",
            Self::Rbf => "rbf",
            Self::Sigmoid => "sigmoid",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel {
    pub kind: KernelType,
    pub degree: i32,
    pub gamma: f64,
    pub coef0: f64,
}

impl Kernel {
    #[must_use]
    pub fn evaluate(&self, x: &[Feature], y: &[Feature]) -> f64 {
        match self.kind {
            KernelType::Linear => dot(x, y),
            KernelType::Polynomial => (self.gamma * dot(x, y) + self.coef0).powi(self.degree),
            KernelType::Rbf => (-self.gamma * squared_distance(x, y)).exp(),
            KernelType::Sigmoid => (self.gamma * dot(x, y) + self.coef0).tanh(),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self { kind: KernelType::Rbf, degree: 3, gamma: 0.0, coef0: 0.0 }
    }
}

fn dot(x: &[Feature], y: &[Feature]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < x.len() && j < y.len() {
        match x[i].index.cmp(&y[j].index) {
            std::cmp::Ordering::Equal => {
                sum += x[i].value * y[j].value;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    sum
}

fn squared_distance(x: &[Feature], y: &[Feature]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < x.len() && j < y.len() {
        match x[i].index.cmp(&y[j].index) {
            std::cmp::Ordering::Equal => {
                let d = x[i].value - y[j].value;
                sum += d * d;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                sum += x[i].value * x[i].value;
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                sum += y[j].value * y[j].value;
                j += 1;
            }
        }
    }
    sum += x[i..].iter().map(|f| f.value * f.value).sum::<f64>();
    sum += y[j..].iter().map(|f| f.value * f.value).sum::<f64>();
    sum
}

/// A trained kernel machine.
///
/// Classifiers store their support vectors grouped by class, in `labels`
/// order, with `n_sv[c]` vectors per class. `sv_coef` has `nr_class - 1`
/// rows of `total_sv` coefficients; `rho`, `prob_a` and `prob_b` hold one
/// entry per class pair in (0,1), (0,2), ..., (1,2), ... order.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmModel {
    pub(crate) svm_type: SvmType,
    pub(crate) kernel: Kernel,
    pub(crate) nr_class: usize,
    pub(crate) support_vectors: Vec<Vec<Feature>>,
    pub(crate) sv_coef: Vec<Vec<f64>>,
    pub(crate) rho: Vec<f64>,
    pub(crate) labels: Vec<i32>,
    pub(crate) prob_a: Vec<f64>,
    pub(crate) prob_b: Vec<f64>,
    pub(crate) n_sv: Vec<usize>,
}

impl SvmModel {
    #[must_use]
    pub fn svm_type(&self) -> SvmType {
        self.svm_type
    }

    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    #[must_use]
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    #[must_use]
    pub fn total_sv(&self) -> usize {
        self.support_vectors.len()
    }

    #[must_use]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Largest feature index referenced by any support vector.
    #[must_use]
    pub fn max_feature_index(&self) -> u32 {
        self.support_vectors.iter().flatten().map(|f| f.index).max().unwrap_or(0)
    }

    #[must_use]
    pub fn has_probability_model(&self) -> bool {
        let pairs = self.nr_class * self.nr_class.saturating_sub(1) / 2;
        self.svm_type.is_classifier()
            && pairs > 0
            && self.prob_a.len() == pairs
            && self.prob_b.len() == pairs
    }

    /// Check the internal shape invariants described on the type.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let total = self.support_vectors.len();
        if self.nr_class < 2 {
            return Err(format!("nr_class must be at least 2, got {}", self.nr_class));
        }
        if self.sv_coef.len() != self.nr_class - 1
            || self.sv_coef.iter().any(|row| row.len() != total)
        {
            return Err(format!(
                "expected {} coefficient(s) for each of {total} support vectors",
                self.nr_class - 1
            ));
        }
        let pairs = self.nr_class * (self.nr_class - 1) / 2;
        let expected_rho = if self.svm_type.is_classifier() { pairs } else { 1 };
        if self.rho.len() != expected_rho {
            return Err(format!("expected {expected_rho} rho value(s), got {}", self.rho.len()));
        }
        if self.svm_type.is_classifier() {
            if self.labels.len() != self.nr_class || self.n_sv.len() != self.nr_class {
                return Err(format!("classifier needs {} labels and nr_sv entries", self.nr_class));
            }
            let listed = self.n_sv.iter().sum::<usize>();
            if listed != total {
                return Err(format!("nr_sv sums to {listed}, total_sv is {total}"));
            }
            if !(self.prob_a.is_empty() || self.prob_a.len() == pairs)
                || self.prob_a.len() != self.prob_b.len()
            {
                return Err(format!("probA/probB must both hold {pairs} value(s)"));
            }
        }
        if self.support_vectors.iter().any(|sv| sv.windows(2).any(|w| w[0].index >= w[1].index)) {
            return Err("support vector indices must be strictly ascending".to_string());
        }
        Ok(())
    }

    /// Raw decision values: one value for regression and one-class models,
    /// one per class pair for classifiers.
    #[must_use]
    pub fn predict_values(&self, x: &[Feature]) -> Vec<f64> {
        let kvalue: Vec<f64> =
            self.support_vectors.iter().map(|sv| self.kernel.evaluate(x, sv)).collect();

        if !self.svm_type.is_classifier() {
            let sum: f64 = self.sv_coef[0].iter().zip(&kvalue).map(|(c, k)| c * k).sum();
            return vec![sum - self.rho[0]];
        }

        let mut start = Vec::with_capacity(self.nr_class);
        let mut offset = 0;
        for &count in &self.n_sv {
            start.push(offset);
            offset += count;
        }

        let mut values = Vec::with_capacity(self.rho.len());
        let mut p = 0;
        for i in 0..self.nr_class {
            for j in i + 1..self.nr_class {
                let (si, sj) = (start[i], start[j]);
                let (ci, cj) = (self.n_sv[i], self.n_sv[j]);
                let coef1 = &self.sv_coef[j - 1];
                let coef2 = &self.sv_coef[i];
                let sum: f64 = (0..ci).map(|k| coef1[si + k] * kvalue[si + k]).sum::<f64>()
                    + (0..cj).map(|k| coef2[sj + k] * kvalue[sj + k]).sum::<f64>();
                values.push(sum - self.rho[p]);
                p += 1;
            }
        }
        values
    }

    /// Regression output, one-class membership (+1/-1) or the voted label.
    #[must_use]
    pub fn predict(&self, x: &[Feature]) -> f64 {
        let values = self.predict_values(x);
        match self.svm_type {
            SvmType::EpsilonSvr | SvmType::NuSvr => values[0],
            SvmType::OneClass => {
                if values[0] > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            SvmType::CSvc | SvmType::NuSvc => {
                let mut votes = vec![0usize; self.nr_class];
                let mut p = 0;
                for i in 0..self.nr_class {
                    for j in i + 1..self.nr_class {
                        if values[p] > 0.0 {
                            votes[i] += 1;
                        } else {
                            votes[j] += 1;
                        }
                        p += 1;
                    }
                }
                let winner = (0..self.nr_class)
                    .fold(0, |best, c| if votes[c] > votes[best] { c } else { best });
                f64::from(self.labels[winner])
            }
        }
    }

    /// Class-membership probabilities in `labels` order, or `None` when the
    /// model carries no probability information.
    #[must_use]
    pub fn predict_probability(&self, x: &[Feature]) -> Option<Vec<f64>> {
        if !self.has_probability_model() {
            return None;
        }
        let values = self.predict_values(x);
        let k = self.nr_class;
        let mut pairwise = Array2::<f64>::zeros((k, k));
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let r = sigmoid_predict(values[p], self.prob_a[p], self.prob_b[p])
                    .clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY);
                pairwise[[i, j]] = r;
                pairwise[[j, i]] = 1.0 - r;
                p += 1;
            }
        }
        if k == 2 {
            return Some(vec![pairwise[[0, 1]], pairwise[[1, 0]]]);
        }
        Some(multiclass_probability(&pairwise))
    }
}

/// Platt scaling of a decision value.
fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    // arranged to avoid overflow in exp
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] = P(i | i or j)` into class
/// probabilities (Wu, Lin & Weng 2004, method 2).
fn multiclass_probability(r: &Array2<f64>) -> Vec<f64> {
    let k = r.nrows();
    let mut q = Array2::<f64>::zeros((k, k));
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[[t, t]] += r[[j, t]] * r[[j, t]];
            q[[t, j]] = -r[[j, t]] * r[[t, j]];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    for _ in 0..max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[[t, j]] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp.iter().map(|v| (v - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }
        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[[t, t]];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[[t, t]] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[[t, j]]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
    p
}

/// Validate a model that is used as a probabilistic decision model.
pub(crate) fn require_probabilistic(model: &SvmModel, name: &str) -> Result<()> {
    if !model.svm_type().is_classifier() {
        return Err(Error::Config(format!(
            "{name} must be a classifier, found {}",
            model.svm_type().name()
        )));
    }
    if !model.has_probability_model() {
        return Err(Error::Config(format!("{name} carries no probA/probB information")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression(kernel: Kernel, svs: Vec<Vec<Feature>>, coef: Vec<f64>, rho: f64) -> SvmModel {
        SvmModel {
            svm_type: SvmType::EpsilonSvr,
            kernel,
            nr_class: 2,
            support_vectors: svs,
            sv_coef: vec![coef],
            rho: vec![rho],
            labels: vec![],
            prob_a: vec![],
            prob_b: vec![],
            n_sv: vec![],
        }
    }

    fn linear() -> Kernel {
        Kernel { kind: KernelType::Linear, ..Kernel::default() }
    }

    #[test]
    fn sparse_dot_skips_missing_indices() {
        let x = vec![Feature::new(1, 2.0), Feature::new(3, 4.0)];
        let y = vec![Feature::new(2, 5.0), Feature::new(3, 0.5)];
        assert!((dot(&x, &y) - 2.0).abs() < 1e-12);
        assert!((squared_distance(&x, &y) - (4.0 + 25.0 + 12.25)).abs() < 1e-12);
    }

    #[test]
    fn linear_regression_is_weighted_sum_minus_rho() {
        let model = regression(linear(), vec![features_from([1.0, 2.0])], vec![0.5], 0.25);
        let x = features_from([3.0, 1.0]);
        assert!((model.predict(&x) - (0.5 * 5.0 - 0.25)).abs() < 1e-12);
    }

    #[test]
    fn kernels_match_their_definitions() {
        let x = features_from([1.0, 2.0]);
        let y = features_from([0.5, -1.0]);
        let rbf = Kernel { kind: KernelType::Rbf, gamma: 0.5, ..Kernel::default() };
        assert!((rbf.evaluate(&x, &y) - (-0.5f64 * (0.25 + 9.0)).exp()).abs() < 1e-12);
        let poly = Kernel { kind: KernelType::Polynomial, gamma: 2.0, coef0: 1.0, degree: 2 };
        assert!((poly.evaluate(&x, &y) - (2.0f64 * -1.5 + 1.0).powi(2)).abs() < 1e-12);
        let sigmoid = Kernel { kind: KernelType::Sigmoid, gamma: 0.1, coef0: 0.0, degree: 3 };
        assert!((sigmoid.evaluate(&x, &y) - (-0.15f64).tanh()).abs() < 1e-12);
    }

    fn binary_classifier() -> SvmModel {
        SvmModel {
            svm_type: SvmType::CSvc,
            kernel: linear(),
            nr_class: 2,
            support_vectors: vec![features_from([1.0, 0.0]), features_from([-1.0, 0.0])],
            sv_coef: vec![vec![0.5, -0.5]],
            rho: vec![0.0],
            labels: vec![1, -1],
            prob_a: vec![-2.0],
            prob_b: vec![0.0],
            n_sv: vec![1, 1],
        }
    }

    #[test]
    fn binary_classifier_votes_and_probabilities() {
        let model = binary_classifier();
        assert!(model.validate().is_ok());

        let positive = features_from([0.8, 0.3]);
        assert!((model.predict_values(&positive)[0] - 0.8).abs() < 1e-12);
        assert_eq!(model.predict(&positive), 1.0);

        let probs = model.predict_probability(&positive).unwrap();
        let expected = 1.0 / (1.0 + (-1.6f64).exp());
        assert!((probs[0] - expected).abs() < 1e-12);
        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-12);

        let negative = features_from([-0.4, 0.0]);
        assert_eq!(model.predict(&negative), -1.0);
        assert!(model.predict_probability(&negative).unwrap()[0] < 0.5);
    }

    #[test]
    fn regression_has_no_probabilities() {
        let model = regression(linear(), vec![features_from([1.0])], vec![1.0], 0.0);
        assert!(model.predict_probability(&features_from([1.0])).is_none());
    }

    #[test]
    fn three_class_probabilities_sum_to_one() {
        let model = SvmModel {
            svm_type: SvmType::CSvc,
            kernel: linear(),
            nr_class: 3,
            support_vectors: vec![
                features_from([1.0]),
                features_from([-1.0]),
                features_from([0.2]),
            ],
            sv_coef: vec![vec![1.0, -1.0, -0.5], vec![0.5, 0.5, -1.0]],
            rho: vec![0.0, 0.1, -0.1],
            labels: vec![1, 2, 3],
            prob_a: vec![-1.0, -1.5, -2.0],
            prob_b: vec![0.0, 0.1, -0.1],
            n_sv: vec![1, 1, 1],
        };
        assert!(model.validate().is_ok());
        let probs = model.predict_probability(&features_from([0.7])).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn validate_rejects_inconsistent_shapes() {
        let mut model = binary_classifier();
        model.n_sv = vec![2, 1];
        assert!(model.validate().is_err());

        let mut model = binary_classifier();
        model.rho = vec![0.0, 1.0];
        assert!(model.validate().is_err());
    }

    #[test]
    fn require_probabilistic_rejects_regression() {
        let model = regression(linear(), vec![features_from([1.0])], vec![1.0], 0.0);
        assert!(matches!(require_probabilistic(&model, "decision model"), Err(Error::Config(_))));
        assert!(require_probabilistic(&binary_classifier(), "decision model").is_ok());
    }
}
