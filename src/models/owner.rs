//! Owner of the watched project.

use serde::Deserialize;
use std::fmt;

/// Kind of account that holds the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Group,
    Individual,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Individual => write!(f, "individual"),
        }
    }
}

/// A group or an individual account, identified by name.
///
/// The name is validated as non-empty when the config is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Group { name: String },
    Individual { name: String },
}

impl Owner {
    pub fn new(kind: OwnerKind, name: impl Into<String>) -> Self {
        let name = name.into();
        match kind {
            OwnerKind::Group => Self::Group { name },
            OwnerKind::Individual => Self::Individual { name },
        }
    }

    pub fn kind(&self) -> OwnerKind {
        match self {
            Self::Group { .. } => OwnerKind::Group,
            Self::Individual { .. } => OwnerKind::Individual,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Group { name } | Self::Individual { name } => name,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}
