//! Last known authorized attribute state of one element.

use std::collections::BTreeMap;

use crate::host::Element;

/// Mapping from attribute name to its last authorized value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: BTreeMap<String, String>,
}

/// Write needed to bring one attribute back to its snapshot state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revert {
    /// Restore the recorded value.
    Set { name: String, value: String },
    /// The attribute was absent at the last save; remove it.
    Remove { name: String },
}

impl Snapshot {
    /// Captures the element's current attributes.
    pub fn capture<E: Element>(element: &E) -> Self {
        Self {
            values: element.attributes().into_iter().collect(),
        }
    }

    /// Returns the recorded value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns true if `name` was present at the last save.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of recorded attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no attributes were recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates recorded attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Computes the write that restores `name`.
    pub fn revert_for(&self, name: &str) -> Revert {
        match self.values.get(name) {
            Some(value) => Revert::Set {
                name: name.to_string(),
                value: value.clone(),
            },
            None => Revert::Remove {
                name: name.to_string(),
            },
        }
    }
}

impl Revert {
    /// Performs the write on `element`.
    pub fn apply<E: Element>(&self, element: &E) {
        match self {
            Self::Set { name, value } => element.set_attribute(name, value),
            Self::Remove { name } => element.remove_attribute(name),
        }
    }
}
