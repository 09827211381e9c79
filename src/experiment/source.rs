//! Source - provenance tag on every experiment row

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which model produced an experiment row.
///
/// Stored as a `u32` code: `0` for the core model, the meta-model id
/// (always `>= 1`) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// The original (expensive) simulation.
    CoreModel,
    /// A fitted meta-model, identified by its store-assigned id.
    MetaModel(u32),
}

impl Source {
    /// Numeric code used in the `source` column.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::CoreModel => 0,
            Self::MetaModel(id) => id,
        }
    }

    /// Decode a `source` column value.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        if code == 0 {
            Self::CoreModel
        } else {
            Self::MetaModel(code)
        }
    }

    /// True for rows produced by a meta-model.
    #[must_use]
    pub const fn is_metamodel(self) -> bool {
        matches!(self, Self::MetaModel(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoreModel => write!(f, "core"),
            Self::MetaModel(id) => write!(f, "metamodel-{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_codes() {
        assert_eq!(Source::CoreModel.code(), 0);
        assert_eq!(Source::from_code(0), Source::CoreModel);
        assert_eq!(Source::from_code(7), Source::MetaModel(7));
        assert!(Source::MetaModel(1).is_metamodel());
        assert!(!Source::CoreModel.is_metamodel());
    }
}
