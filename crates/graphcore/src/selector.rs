use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Path of a value in the variable pool, e.g. `["node1", "value"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableSelector(Vec<String>);

impl VariableSelector {
    /// Build a selector from its parts. Empty parts are dropped.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            parts
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        )
    }

    /// Parse a dotted path such as `node1.value`.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').map(str::trim))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The namespace this path lives in (for node outputs, the node id).
    pub fn namespace(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn child(&self, part: impl Into<String>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        Self(parts)
    }

    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }
}

impl fmt::Display for VariableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for VariableSelector {
    fn from(parts: [S; N]) -> Self {
        Self::new(parts)
    }
}

impl From<Vec<String>> for VariableSelector {
    fn from(parts: Vec<String>) -> Self {
        Self::new(parts)
    }
}

impl From<&str> for VariableSelector {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl Serialize for VariableSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VariableSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Parts(Vec<String>),
            Dotted(String),
        }

        let selector = match Repr::deserialize(deserializer)? {
            Repr::Parts(parts) => VariableSelector::new(parts),
            Repr::Dotted(dotted) => VariableSelector::parse(&dotted),
        };
        if selector.is_empty() {
            return Err(serde::de::Error::custom("variable selector must not be empty"));
        }
        Ok(selector)
    }
}
