//! Domain primitive types used across the bcbio-vm workspace.

use std::fmt;
use std::str::FromStr;

use crate::error::BcbioError;

/// A single `host:container` bind mount declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountSpec {
    /// Path prefix on the host.
    pub host: String,
    /// Path prefix inside the container.
    pub container: String,
}

impl MountSpec {
    /// Creates a mount from its two halves.
    #[must_use]
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    /// Parses a `host:container` string, splitting on the first colon.
    ///
    /// Anything after the first colon belongs to the container side.
    ///
    /// # Errors
    ///
    /// Returns [`BcbioError::MalformedMount`] if there is no colon or
    /// either side is empty.
    pub fn parse(spec: &str) -> crate::error::Result<Self> {
        match spec.split_once(':') {
            Some((host, container)) if !host.is_empty() && !container.is_empty() => {
                Ok(Self::new(host, container))
            }
            _ => Err(BcbioError::MalformedMount { spec: spec.into() }),
        }
    }

    /// Returns the `(from, to)` pair for the given direction.
    #[must_use]
    pub fn oriented(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::ToInternal => (&self.host, &self.container),
            Direction::ToExternal => (&self.container, &self.host),
        }
    }
}

impl FromStr for MountSpec {
    type Err = BcbioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Which way paths are translated between namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host paths become container paths.
    ToInternal,
    /// Container paths become host paths.
    ToExternal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToInternal => write!(f, "internal"),
            Self::ToExternal => write!(f, "external"),
        }
    }
}
