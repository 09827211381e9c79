//! Exploratory scope: the declared schema of a core model's inputs and outputs
//!
//! A scope names the exogenous uncertainties, policy levers and constants a
//! core model accepts, and the performance measures it produces. Everything
//! downstream (stored experiments, designs, meta-models) is keyed to a scope
//! by name and checked against its [`Scope::fingerprint`].
//!
//! ## YAML layout
//!
//! ```yaml
//! scope:
//!   name: SOABM
//!   desc: Southern Oregon ABM
//! inputs:
//!   fuel_price:
//!     ptype: exogenous uncertainty
//!     dtype: real
//!     min: 1.0
//!     max: 5.0
//!     default: 2.5
//!     dist:
//!       name: triangular
//!       peak: 2.0
//!   transit_fare_policy:
//!     ptype: policy lever
//!     dtype: cat
//!     values: [flat, zonal]
//!     default: flat
//!   year:
//!     ptype: constant
//!     value: 2040
//! outputs:
//!   region_vmt:
//!     kind: minimize
//!     transform: ln
//! ```

mod measure;
mod parameter;

pub use measure::{Measure, MeasureKind, Transform};
pub use parameter::{DataType, Distribution, Parameter, ParameterType};

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Declared inputs and outputs of a core model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scope {
    name: String,
    #[serde(default)]
    desc: String,
    parameters: Vec<Parameter>,
    measures: Vec<Measure>,
}

impl Scope {
    /// Start building a scope programmatically.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ScopeBuilder {
        ScopeBuilder::new(name)
    }

    /// Load a scope definition from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Yaml` if it does not parse,
    /// or `InvalidScope` if the definition is inconsistent.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let scope = Self::from_yaml_str(&text)?;
        tracing::info!(
            scope = %scope.name,
            path = %path.as_ref().display(),
            parameters = scope.parameters.len(),
            measures = scope.measures.len(),
            "loaded scope definition"
        );
        Ok(scope)
    }

    /// Parse a scope definition from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Yaml` on syntax errors and `InvalidScope` on inconsistent
    /// definitions.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: ScopeFile = serde_yaml::from_str(text)?;

        let mut builder = Self::builder(file.scope.name).desc(file.scope.desc);
        for (key, value) in file.inputs {
            let name = yaml_key(&key)?;
            let entry: InputEntry = serde_yaml::from_value(value)?;
            builder = builder.parameter(entry.into_parameter(name)?);
        }
        for (key, value) in file.outputs {
            let name = yaml_key(&key)?;
            let entry: OutputEntry = if value.is_null() {
                OutputEntry::default()
            } else {
                serde_yaml::from_value(value)?
            };
            builder = builder.measure(
                Measure::new(name)
                    .with_kind(entry.kind)
                    .with_transform(entry.transform)
                    .with_desc(entry.desc),
            );
        }
        builder.build()
    }

    /// Get the scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// All input factors in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// All performance measures in declaration order.
    #[must_use]
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Look up an input factor by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Look up a measure by name.
    #[must_use]
    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name() == name)
    }

    /// Input factors of the given role.
    pub fn parameters_of(&self, ptype: ParameterType) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.ptype() == ptype)
    }

    /// Names of every input factor, constants included.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(Parameter::name).collect()
    }

    /// Names of every measure.
    #[must_use]
    pub fn measure_names(&self) -> Vec<&str> {
        self.measures.iter().map(Measure::name).collect()
    }

    /// Stable 64-bit fingerprint of the full definition.
    ///
    /// Two scopes with the same name but different factors or measures have
    /// different fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        // Struct field order makes the JSON encoding canonical.
        let canonical = serde_json::to_string(self).unwrap_or_else(|_| self.name.clone());
        trueno::hash_key(&canonical)
    }

    /// Human-readable summary of the scope.
    #[must_use]
    pub fn info(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "name: {}", self.name);
        if !self.desc.is_empty() {
            let _ = writeln!(out, "desc: {}", self.desc);
        }
        for (label, ptype) in [
            ("uncertainties", ParameterType::Uncertainty),
            ("levers", ParameterType::Lever),
            ("constants", ParameterType::Constant),
        ] {
            let params: Vec<&Parameter> = self.parameters_of(ptype).collect();
            if params.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{label}:");
            for p in params {
                if ptype == ParameterType::Constant {
                    let _ = writeln!(out, "  {} = {}", p.name(), p.default_value());
                } else {
                    let _ = writeln!(
                        out,
                        "  {} [{:?}] {}..{} (default {})",
                        p.name(),
                        p.dtype(),
                        p.min(),
                        p.max(),
                        p.default_value()
                    );
                }
            }
        }
        if !self.measures.is_empty() {
            let _ = writeln!(out, "measures:");
            for m in &self.measures {
                let _ = writeln!(out, "  {} [{:?}, {:?}]", m.name(), m.kind(), m.transform());
            }
        }
        out
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidScope("scope name is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for p in &self.parameters {
            p.validate()?;
            if !seen.insert(p.name()) {
                return Err(Error::InvalidScope(format!("duplicate name: {}", p.name())));
            }
        }
        for m in &self.measures {
            if m.name().is_empty() {
                return Err(Error::InvalidScope("measure with empty name".to_string()));
            }
            if !seen.insert(m.name()) {
                return Err(Error::InvalidScope(format!("duplicate name: {}", m.name())));
            }
        }
        Ok(())
    }
}

/// Builder for `Scope`.
#[derive(Debug)]
pub struct ScopeBuilder {
    name: String,
    desc: String,
    parameters: Vec<Parameter>,
    measures: Vec<Measure>,
}

impl ScopeBuilder {
    /// Create a new builder with the scope name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            parameters: Vec::new(),
            measures: Vec::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Add an input factor.
    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add a performance measure.
    #[must_use]
    pub fn measure(mut self, measure: Measure) -> Self {
        self.measures.push(measure);
        self
    }

    /// Validate and build the `Scope`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` for an empty name, duplicate names, or an
    /// inconsistent parameter.
    pub fn build(self) -> Result<Scope> {
        let scope = Scope {
            name: self.name,
            desc: self.desc,
            parameters: self.parameters,
            measures: self.measures,
        };
        scope.validate()?;
        Ok(scope)
    }
}

#[derive(Deserialize)]
struct ScopeFile {
    scope: ScopeHeader,
    #[serde(default)]
    inputs: serde_yaml::Mapping,
    #[serde(default)]
    outputs: serde_yaml::Mapping,
}

#[derive(Deserialize)]
struct ScopeHeader {
    name: String,
    #[serde(default)]
    desc: String,
}

#[derive(Deserialize)]
struct InputEntry {
    ptype: ParameterType,
    dtype: Option<DataType>,
    min: Option<f64>,
    max: Option<f64>,
    default: Option<serde_yaml::Value>,
    value: Option<serde_yaml::Value>,
    dist: Option<serde_yaml::Value>,
    #[serde(default)]
    values: Vec<serde_yaml::Value>,
    #[serde(default)]
    desc: String,
}

#[derive(Deserialize, Default)]
struct OutputEntry {
    #[serde(default)]
    kind: MeasureKind,
    #[serde(default)]
    transform: Transform,
    #[serde(default)]
    desc: String,
}

impl InputEntry {
    fn into_parameter(self, name: String) -> Result<Parameter> {
        let missing = |field: &str| Error::InvalidScope(format!("{name}: missing `{field}`"));

        if self.ptype == ParameterType::Constant {
            let value = self
                .value
                .as_ref()
                .or(self.default.as_ref())
                .and_then(yaml_number)
                .ok_or_else(|| missing("value"))?;
            return Ok(Parameter::constant(name, value).with_desc(self.desc));
        }

        let dtype = self.dtype.unwrap_or(if self.values.is_empty() {
            DataType::Real
        } else {
            DataType::Categorical
        });

        let parameter = match dtype {
            DataType::Real => {
                let min = self.min.ok_or_else(|| missing("min"))?;
                let max = self.max.ok_or_else(|| missing("max"))?;
                Parameter::real(name.clone(), self.ptype, min, max)
            }
            DataType::Integer => {
                let min = self.min.ok_or_else(|| missing("min"))?;
                let max = self.max.ok_or_else(|| missing("max"))?;
                #[allow(clippy::cast_possible_truncation)]
                let (min, max) = (min.round() as i64, max.round() as i64);
                Parameter::integer(name.clone(), self.ptype, min, max)
            }
            DataType::Boolean => Parameter::boolean(name.clone(), self.ptype),
            DataType::Categorical => {
                let values = self
                    .values
                    .iter()
                    .map(yaml_label)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        Error::InvalidScope(format!("{name}: categorical values must be scalars"))
                    })?;
                Parameter::categorical(name.clone(), self.ptype, values)
            }
        };

        let parameter = match self.default.as_ref() {
            Some(default) => {
                let value = match dtype {
                    DataType::Categorical => yaml_label(default).and_then(|label| {
                        parameter
                            .values()
                            .iter()
                            .position(|v| *v == label)
                            .map(index_value)
                    }),
                    _ => yaml_number(default),
                }
                .ok_or_else(|| {
                    Error::InvalidScope(format!("{name}: unusable default {default:?}"))
                })?;
                parameter.with_default(value)
            }
            None => parameter,
        };

        let parameter = match self.dist {
            Some(serde_yaml::Value::String(kind)) if kind == "uniform" => parameter,
            Some(serde_yaml::Value::String(kind)) => {
                return Err(Error::InvalidScope(format!(
                    "{name}: distribution `{kind}` needs parameters"
                )));
            }
            Some(dist) => parameter.with_dist(serde_yaml::from_value(dist)?),
            None => parameter,
        };

        Ok(parameter.with_desc(self.desc))
    }
}

#[allow(clippy::cast_precision_loss)]
const fn index_value(idx: usize) -> f64 {
    idx as f64
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String> {
    yaml_label(key).ok_or_else(|| Error::InvalidScope(format!("non-scalar name: {key:?}")))
}

fn yaml_label(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_number(value: &serde_yaml::Value) -> Option<f64> {
    match value {
        serde_yaml::Value::Number(n) => n.as_f64(),
        serde_yaml::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
