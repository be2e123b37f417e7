// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Gaussian-process surrogate for Bayesian trial selection.
//!
//! A small exact GP with a squared-exponential kernel and fixed
//! hyperparameters. Matrices are row-major `Vec<f64>`; candidate pools are a
//! few dozen points at most, so an O(n³) Cholesky is plenty.
//!
//! ```
//! use dotori::surrogate::GaussianProcess;
//! use dotori::config::SurrogateConfig;
//!
//! let mut gp = GaussianProcess::new(SurrogateConfig::new());
//! gp.fit(&[0.0, 1.0, 2.0], &[0.1, 0.5, 0.9], 1).unwrap();
//! let (mean, std) = gp.predict(&[1.0]).unwrap();
//! assert!((mean[0] - 0.5).abs() < 0.01);
//! assert!(std[0] < 0.1);
//! ```

use crate::candidate::CandidateConfiguration;
use crate::config::SurrogateConfig;
use thiserror::Error;

/// Jitter levels tried, in order, when `K + noise·I` is not positive definite.
const JITTER_LADDER: [f64; 8] = [0.0, 1e-8, 1e-7, 1e-6, 1e-5, 1e-4, 1e-3, 1e-2];

/// Surrogate failures. The scheduler turns every one of these into a
/// fallback, so they never reach `compile`'s caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurrogateError {
    /// `predict` was called before a successful `fit`.
    #[error("surrogate has not been fitted")]
    NotFitted,

    /// No training points.
    #[error("no training data")]
    Empty,

    /// Input shape does not match.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// NaN or infinite input.
    #[error("non-finite value in surrogate input")]
    NonFinite,

    /// Cholesky failed at every jitter level.
    #[error("kernel matrix not positive definite (jitter up to {jitter:e})")]
    NotPositiveDefinite {
        /// Largest jitter tried
        jitter: f64,
    },
}

type SurrogateResult<T> = std::result::Result<T, SurrogateError>;

/// Exact GP regressor.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    config: SurrogateConfig,
    dim: usize,
    train_x: Vec<f64>,
    chol: Vec<f64>,
    alpha: Vec<f64>,
    y_mean: f64,
    jitter: f64,
    fitted: bool,
}

impl GaussianProcess {
    /// Create an unfitted model.
    pub fn new(config: SurrogateConfig) -> Self {
        Self {
            config,
            dim: 0,
            train_x: Vec::new(),
            chol: Vec::new(),
            alpha: Vec::new(),
            y_mean: 0.0,
            jitter: 0.0,
            fitted: false,
        }
    }

    /// Whether `fit` has succeeded.
    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Diagonal jitter the last fit needed on top of the noise term.
    #[inline]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Number of training points.
    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.train_x.len() / self.dim
        }
    }

    /// Whether the model holds no training points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Squared-exponential kernel.
    #[inline]
    fn kernel(&self, a: &[f64], b: &[f64]) -> f64 {
        let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
        let ls = self.config.length_scale;
        self.config.signal_variance * (-sq / (2.0 * ls * ls)).exp()
    }

    /// Fit on `n` row-major points of width `dim`.
    pub fn fit(&mut self, x: &[f64], y: &[f64], dim: usize) -> SurrogateResult<()> {
        self.fitted = false;
        let n = y.len();
        if n == 0 {
            return Err(SurrogateError::Empty);
        }
        if dim == 0 || x.len() != n * dim {
            return Err(SurrogateError::DimensionMismatch {
                expected: n * dim.max(1),
                got: x.len(),
            });
        }
        if !x.iter().chain(y).all(|v| v.is_finite()) {
            return Err(SurrogateError::NonFinite);
        }

        let mut k = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let v = self.kernel(&x[i * dim..(i + 1) * dim], &x[j * dim..(j + 1) * dim]);
                k[i * n + j] = v;
                k[j * n + i] = v;
            }
            k[i * n + i] += self.config.noise_variance;
        }

        let (chol, jitter) = JITTER_LADDER
            .iter()
            .find_map(|&jitter| {
                let mut kj = k.clone();
                for i in 0..n {
                    kj[i * n + i] += jitter;
                }
                cholesky(&kj, n).map(|l| (l, jitter))
            })
            .ok_or(SurrogateError::NotPositiveDefinite {
                jitter: JITTER_LADDER[JITTER_LADDER.len() - 1],
            })?;

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let centred: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let z = forward_solve(&chol, n, &centred);
        let alpha = backward_solve(&chol, n, &z);

        self.dim = dim;
        self.train_x = x.to_vec();
        self.chol = chol;
        self.alpha = alpha;
        self.y_mean = y_mean;
        self.jitter = jitter;
        self.fitted = true;
        Ok(())
    }

    /// Posterior mean and standard deviation at each row-major query point.
    pub fn predict(&self, x: &[f64]) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
        if !self.fitted {
            return Err(SurrogateError::NotFitted);
        }
        let dim = self.dim;
        if x.len() % dim != 0 {
            return Err(SurrogateError::DimensionMismatch {
                expected: x.len().div_ceil(dim) * dim,
                got: x.len(),
            });
        }
        if !x.iter().all(|v| v.is_finite()) {
            return Err(SurrogateError::NonFinite);
        }

        let n = self.len();
        let m = x.len() / dim;
        let mut mean = Vec::with_capacity(m);
        let mut std = Vec::with_capacity(m);

        for q in x.chunks_exact(dim) {
            let k_star: Vec<f64> = self
                .train_x
                .chunks_exact(dim)
                .map(|row| self.kernel(q, row))
                .collect();
            let mu = k_star
                .iter()
                .zip(&self.alpha)
                .map(|(k, a)| k * a)
                .sum::<f64>()
                + self.y_mean;
            let v = forward_solve(&self.chol, n, &k_star);
            let var = self.kernel(q, q) - v.iter().map(|e| e * e).sum::<f64>();
            mean.push(mu);
            std.push(var.max(0.0).sqrt());
        }

        Ok((mean, std))
    }
}

/// Lower-triangular Cholesky factor of a symmetric `n × n` matrix.
fn cholesky(a: &[f64], n: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Some(l)
}

/// Solve `L z = b`.
fn forward_solve(l: &[f64], n: usize, b: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }
    z
}

/// Solve `Lᵀ x = z`.
fn backward_solve(l: &[f64], n: usize, z: &[f64]) -> Vec<f64> {
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in i + 1..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

/// Width of an encoded candidate.
pub const FEATURE_DIM: usize = 9;

/// Maps candidates onto fixed-width feature vectors.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder {
    max_demos: usize,
    num_instructions: usize,
    num_demo_sets: usize,
}

impl FeatureEncoder {
    /// Instruction length at which the length feature saturates at 1.0.
    const INSTRUCTION_CHARS: f64 = 500.0;

    /// Size the normalisers from a candidate pool.
    ///
    /// The demo feature counts injected demonstrations only, see
    /// [`CandidateConfiguration::demo_count`].
    pub fn for_candidates(candidates: &[CandidateConfiguration]) -> Self {
        let max_rank = |f: fn(&CandidateConfiguration) -> Option<usize>| {
            candidates.iter().filter_map(f).max().map_or(0, |r| r + 1)
        };
        Self {
            max_demos: candidates.iter().map(|c| c.demo_count()).max().unwrap_or(0),
            num_instructions: max_rank(|c| c.metadata.instruction_rank),
            num_demo_sets: max_rank(|c| c.metadata.demo_set_index),
        }
    }

    /// Encode one candidate.
    pub fn encode(&self, c: &CandidateConfiguration) -> [f64; FEATURE_DIM] {
        let frac = |value: Option<usize>, total: usize| match value {
            Some(v) if total > 0 => (v + 1) as f64 / total as f64,
            _ => 0.0,
        };

        let mut f = [0.0; FEATURE_DIM];
        f[0] = (c.instruction.chars().count() as f64 / Self::INSTRUCTION_CHARS).min(2.0);
        f[1] = if self.max_demos == 0 {
            0.0
        } else {
            c.demo_count() as f64 / self.max_demos as f64
        };
        f[2 + c.kind.index()] = 1.0;
        f[6] = frac(c.metadata.instruction_rank, self.num_instructions);
        f[7] = frac(c.metadata.demo_set_index, self.num_demo_sets);
        f[8] = (c.config_id.prefix_u64() % 1000) as f64 / 10_000.0;
        f
    }

    /// Encode many candidates into one row-major matrix.
    pub fn encode_all<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a CandidateConfiguration>,
    ) -> Vec<f64> {
        candidates
            .into_iter()
            .flat_map(|c| self.encode(c))
            .collect()
    }
}
