//! Measure - one output performance measure of a scope

use serde::{Deserialize, Serialize};

/// Direction of preference for a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Reported only.
    #[default]
    Info,
    /// Smaller is better.
    Minimize,
    /// Larger is better.
    Maximize,
}

/// Transform applied to a measure before regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Fit on raw values.
    #[default]
    None,
    /// Fit on the natural log; values must be positive.
    #[serde(alias = "log")]
    Ln,
}

impl Transform {
    /// Map a raw value into fitting space.
    #[must_use]
    pub fn forward(self, y: f64) -> f64 {
        match self {
            Self::None => y,
            Self::Ln => y.ln(),
        }
    }

    /// Map a fitted value back to the measure's units.
    #[must_use]
    pub fn inverse(self, y: f64) -> f64 {
        match self {
            Self::None => y,
            Self::Ln => y.exp(),
        }
    }
}

/// An output performance measure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Measure {
    name: String,
    #[serde(default)]
    kind: MeasureKind,
    #[serde(default)]
    transform: Transform,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    desc: String,
}

impl Measure {
    /// Create an informational measure with no transform.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MeasureKind::Info,
            transform: Transform::None,
            desc: String::new(),
        }
    }

    /// Set the preference direction.
    #[must_use]
    pub const fn with_kind(mut self, kind: MeasureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the regression transform.
    #[must_use]
    pub const fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Get the measure name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the preference direction.
    #[must_use]
    pub const fn kind(&self) -> MeasureKind {
        self.kind
    }

    /// Get the regression transform.
    #[must_use]
    pub const fn transform(&self) -> Transform {
        self.transform
    }

    /// Free-text description.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }
}
