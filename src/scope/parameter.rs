//! Parameter - one input factor of a scope

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Role of an input factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Exogenous uncertainty outside the planner's control.
    #[serde(alias = "exogenous uncertainty")]
    Uncertainty,
    /// Policy lever the planner can set.
    #[serde(alias = "policy lever")]
    Lever,
    /// Fixed value; never sampled.
    Constant,
}

/// Declared storage type of an input factor.
///
/// All values are carried as `f64`; the dtype governs coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Continuous value.
    #[serde(alias = "float")]
    Real,
    /// Whole number.
    #[serde(alias = "int")]
    Integer,
    /// 0 or 1.
    #[serde(alias = "bool")]
    Boolean,
    /// Index into the parameter's value list.
    #[serde(alias = "cat")]
    Categorical,
}

/// Marginal distribution used when sampling a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Distribution {
    /// Uniform over `[min, max]`.
    Uniform,
    /// Triangular over `[min, max]` with mode `peak`.
    Triangular {
        /// Mode of the distribution.
        peak: f64,
    },
}

impl Default for Distribution {
    fn default() -> Self {
        Self::Uniform
    }
}

/// An input factor: uncertainty, lever, or constant.
///
/// Boolean parameters span `[0, 1]`; categorical parameters span
/// `[0, values.len() - 1]` and store the index of the chosen value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    name: String,
    ptype: ParameterType,
    dtype: DataType,
    min: f64,
    max: f64,
    default: f64,
    #[serde(default)]
    dist: Distribution,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    desc: String,
}

impl Parameter {
    /// Real-valued parameter on `[min, max]`, uniform, default at the midpoint.
    #[must_use]
    pub fn real(name: impl Into<String>, ptype: ParameterType, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            ptype,
            dtype: DataType::Real,
            min,
            max,
            default: midpoint(min, max),
            dist: Distribution::Uniform,
            values: Vec::new(),
            desc: String::new(),
        }
    }

    /// Integer parameter on `[min, max]`.
    #[must_use]
    pub fn integer(name: impl Into<String>, ptype: ParameterType, min: i64, max: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let (min, max) = (min as f64, max as f64);
        Self {
            dtype: DataType::Integer,
            default: midpoint(min, max).floor(),
            ..Self::real(name, ptype, min, max)
        }
    }

    /// Boolean parameter, default `false`.
    #[must_use]
    pub fn boolean(name: impl Into<String>, ptype: ParameterType) -> Self {
        Self {
            dtype: DataType::Boolean,
            default: 0.0,
            ..Self::real(name, ptype, 0.0, 1.0)
        }
    }

    /// Categorical parameter over `values`, default the first value.
    #[must_use]
    pub fn categorical(
        name: impl Into<String>,
        ptype: ParameterType,
        values: Vec<String>,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let max = values.len().saturating_sub(1) as f64;
        Self {
            dtype: DataType::Categorical,
            default: 0.0,
            values,
            ..Self::real(name, ptype, 0.0, max)
        }
    }

    /// Constant fixed at `value`.
    #[must_use]
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self::real(name, ParameterType::Constant, value, value)
    }

    /// Set the default value.
    #[must_use]
    pub const fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Set the sampling distribution.
    #[must_use]
    pub const fn with_dist(mut self, dist: Distribution) -> Self {
        self.dist = dist;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Get the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the parameter role.
    #[must_use]
    pub const fn ptype(&self) -> ParameterType {
        self.ptype
    }

    /// Get the declared dtype.
    #[must_use]
    pub const fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Default value.
    #[must_use]
    pub const fn default_value(&self) -> f64 {
        self.default
    }

    /// Sampling distribution.
    #[must_use]
    pub const fn dist(&self) -> Distribution {
        self.dist
    }

    /// Categorical labels (empty for other dtypes).
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Free-text description.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// True for constants and for any parameter whose range is a single point.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.ptype == ParameterType::Constant || self.max <= self.min
    }

    /// Map `x` onto `[0, 1]` using the declared bounds.
    #[must_use]
    pub fn normalize(&self, x: f64) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            (x - self.min) / span
        } else {
            0.0
        }
    }

    /// Coerce a raw value to this parameter's dtype.
    ///
    /// `NaN` (missing) passes through untouched.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` for a categorical index outside the value list.
    pub fn coerce(&self, x: f64) -> Result<f64> {
        if x.is_nan() {
            return Ok(x);
        }
        match self.dtype {
            DataType::Real => Ok(x),
            DataType::Integer => Ok(x.round()),
            DataType::Boolean => Ok(if x == 0.0 { 0.0 } else { 1.0 }),
            DataType::Categorical => {
                let idx = x.round();
                if idx < 0.0 || idx > self.max {
                    return Err(Error::SchemaMismatch(format!(
                        "{}: category index {x} outside 0..={}",
                        self.name, self.max
                    )));
                }
                Ok(idx)
            }
        }
    }

    /// Inverse CDF of the sampling distribution at `u` in `[0, 1)`.
    ///
    /// Discrete dtypes stratify over their support so that equal-width
    /// slices of `u` map to equally likely values.
    #[must_use]
    pub fn quantile(&self, u: f64) -> f64 {
        if self.is_constant() {
            return self.default;
        }
        let u = u.clamp(0.0, 1.0);
        match self.dtype {
            DataType::Real => self.continuous_quantile(u, self.min, self.max),
            DataType::Integer => self
                .continuous_quantile(u, self.min, self.max + 1.0)
                .floor()
                .min(self.max),
            DataType::Boolean | DataType::Categorical => {
                let levels = self.max - self.min + 1.0;
                (self.min + (u * levels).floor()).min(self.max)
            }
        }
    }

    fn continuous_quantile(&self, u: f64, lo: f64, hi: f64) -> f64 {
        match self.dist {
            Distribution::Uniform => lo + u * (hi - lo),
            Distribution::Triangular { peak } => {
                let span = hi - lo;
                let cut = (peak - lo) / span;
                if u < cut {
                    lo + (u * span * (peak - lo)).sqrt()
                } else {
                    hi - ((1.0 - u) * span * (hi - peak)).sqrt()
                }
            }
        }
    }

    /// Check bounds, default and distribution are consistent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` describing the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::InvalidScope(format!("{}: {msg}", self.name)));

        if self.name.is_empty() {
            return Err(Error::InvalidScope("parameter with empty name".to_string()));
        }
        if !self.min.is_finite() || !self.max.is_finite() || !self.default.is_finite() {
            return bad("bounds and default must be finite".to_string());
        }
        if self.min > self.max {
            return bad(format!("min {} > max {}", self.min, self.max));
        }
        if self.default < self.min || self.default > self.max {
            return bad(format!(
                "default {} outside [{}, {}]",
                self.default, self.min, self.max
            ));
        }
        if self.dtype == DataType::Categorical && self.values.is_empty() {
            return bad("categorical parameter needs at least one value".to_string());
        }
        if let Distribution::Triangular { peak } = self.dist {
            if matches!(self.dtype, DataType::Boolean | DataType::Categorical) {
                return bad("triangular distribution on a discrete parameter".to_string());
            }
            if peak < self.min || peak > self.max {
                return bad(format!("peak {peak} outside [{}, {}]", self.min, self.max));
            }
        }
        Ok(())
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_parameter_defaults_to_midpoint() {
        let p = Parameter::real("fuel", ParameterType::Uncertainty, 1.0, 3.0);
        assert!((p.default_value() - 2.0).abs() < f64::EPSILON);
        assert!(!p.is_constant());
        p.validate().unwrap();
    }

    #[test]
    fn test_coerce_by_dtype() {
        let int = Parameter::integer("lanes", ParameterType::Lever, 1, 4);
        assert!((int.coerce(2.6).unwrap() - 3.0).abs() < f64::EPSILON);

        let flag = Parameter::boolean("toll", ParameterType::Lever);
        assert!((flag.coerce(7.0).unwrap() - 1.0).abs() < f64::EPSILON);

        let cat = Parameter::categorical(
            "mode",
            ParameterType::Lever,
            vec!["bus".to_string(), "rail".to_string()],
        );
        assert!(cat.coerce(2.0).is_err());
        assert!(cat.coerce(f64::NAN).unwrap().is_nan());
    }

    #[test]
    fn test_quantile_stays_in_bounds() {
        let tri = Parameter::real("vot", ParameterType::Uncertainty, 0.0, 10.0)
            .with_dist(Distribution::Triangular { peak: 2.0 });
        for i in 0..=100 {
            let q = tri.quantile(f64::from(i) / 100.0);
            assert!((0.0..=10.0).contains(&q));
        }
        assert!((tri.quantile(0.2) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_integer_quantile_covers_support() {
        let p = Parameter::integer("k", ParameterType::Uncertainty, 1, 3);
        assert!((p.quantile(0.0) - 1.0).abs() < f64::EPSILON);
        assert!((p.quantile(0.5) - 2.0).abs() < f64::EPSILON);
        assert!((p.quantile(0.999) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_default_out_of_range() {
        let p = Parameter::real("x", ParameterType::Uncertainty, 0.0, 1.0).with_default(2.0);
        assert!(p.validate().is_err());
    }
}
