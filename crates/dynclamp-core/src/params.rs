//! Named numeric parameters of an entity.

use indexmap::IndexMap;

use crate::error::EntityError;

/// Insertion-ordered map from parameter name to value.
///
/// Names are semantic (`"tau"`, `"E"`, `"weight"`) so parameters can be
/// introspected and set from configuration without positional coupling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    values: IndexMap<String, f64>,
}

impl Parameters {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Set (or add) a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Value of `name`, if defined.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of `name`, or [`EntityError::MissingParameter`].
    pub fn require(&self, name: &str) -> Result<f64, EntityError> {
        self.get(name).ok_or_else(|| EntityError::MissingParameter {
            name: name.to_string(),
        })
    }

    /// Whether `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let p = Parameters::new().with("tau", 2e-3).with("E", 0.0).with("w", 1.0);
        let names: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["tau", "E", "w"]);
    }

    #[test]
    fn set_overwrites() {
        let mut p = Parameters::new().with("tau", 1.0);
        p.set("tau", 5.0);
        assert_eq!(p.get("tau"), Some(5.0));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn require_reports_missing_name() {
        let p: Parameters = [("a", 1.0)].into_iter().collect();
        assert_eq!(p.require("a"), Ok(1.0));
        assert_eq!(
            p.require("b"),
            Err(EntityError::MissingParameter {
                name: "b".to_string()
            })
        );
    }
}
