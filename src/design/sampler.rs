//! Samplers for generating input-factor combinations

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::scope::{Distribution, Parameter};
use crate::Error;

/// Strategy for drawing design points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampler {
    /// Latin hypercube honoring each parameter's distribution.
    Lhs,
    /// Latin hypercube treating every parameter as uniform.
    #[serde(alias = "ulhs")]
    UniformLhs,
    /// Independent draws from each parameter's distribution.
    #[serde(alias = "mc")]
    MonteCarlo,
    /// One row of default values.
    #[serde(alias = "ref")]
    Reference,
}

impl Sampler {
    /// Short name, also the default design name.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Lhs => "lhs",
            Self::UniformLhs => "ulhs",
            Self::MonteCarlo => "mc",
            Self::Reference => "ref",
        }
    }

    /// Draw `n` values for one parameter.
    pub(super) fn draw(self, parameter: &Parameter, n: usize, rng: &mut StdRng) -> Vec<f64> {
        match self {
            _ if parameter.is_constant() => vec![parameter.default_value(); n],
            Self::Reference => vec![parameter.default_value(); n],
            Self::MonteCarlo => (0..n).map(|_| parameter.quantile(rng.gen())).collect(),
            Self::Lhs => stratified(n, rng)
                .into_iter()
                .map(|u| parameter.quantile(u))
                .collect(),
            Self::UniformLhs => {
                let flat = parameter.clone().with_dist(Distribution::Uniform);
                stratified(n, rng)
                    .into_iter()
                    .map(|u| flat.quantile(u))
                    .collect()
            }
        }
    }

    /// Seeded generator for a design.
    pub(super) fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }
}

/// One uniform draw from each of `n` equal strata of `[0, 1)`, shuffled.
#[allow(clippy::cast_precision_loss)]
fn stratified(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut strata: Vec<usize> = (0..n).collect();
    strata.shuffle(rng);
    let width = 1.0 / n as f64;
    strata
        .into_iter()
        .map(|k| (k as f64 + rng.gen::<f64>()) * width)
        .collect()
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Sampler {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lhs" => Ok(Self::Lhs),
            "ulhs" | "uniform_lhs" => Ok(Self::UniformLhs),
            "mc" | "monte_carlo" => Ok(Self::MonteCarlo),
            "ref" | "reference" => Ok(Self::Reference),
            other => Err(Error::InvalidInput(format!("unknown sampler `{other}`"))),
        }
    }
}
