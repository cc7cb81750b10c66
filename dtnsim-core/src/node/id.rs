use anyhow::{ensure, Result};
use std::{fmt, str, sync::Arc};

/// The symbolic identifier of a node in the [`Topology`] (e.g. `EARTH`,
/// `RELAY`, `MARS`).
///
/// Identifiers are validated at construction: non empty, no whitespace.
/// Cloning is cheap (shared allocation), so identifiers can be used freely
/// as lookup keys.
///
/// [`Topology`]: crate::topology::Topology
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Create a new identifier, validating its shape.
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        ensure!(!id.is_empty(), "Node identifier must not be empty");
        ensure!(
            !id.chars().any(char::is_whitespace),
            "Node identifier must not contain whitespace: {id:?}"
        );
        Ok(Self(Arc::from(id)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl str::FromStr for NodeId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", NodeId::new("EARTH").unwrap()), "EARTH");
    }

    #[test]
    fn parse() {
        assert_eq!(
            "RELAY".parse::<NodeId>().unwrap(),
            NodeId::new("RELAY").unwrap()
        );
    }

    #[test]
    fn reject_empty() {
        assert!(NodeId::new("").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(NodeId::new("EARTH STATION").is_err());
        assert!(NodeId::new(" MARS").is_err());
    }
}
