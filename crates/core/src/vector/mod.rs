//! Vector features: geometry plus attribute table row

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and objects are carried through untouched
    Json(serde_json::Value),
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => AttributeValue::String(s),
            other => AttributeValue::Json(other),
        }
    }
}

impl From<AttributeValue> for serde_json::Value {
    fn from(value: AttributeValue) -> Self {
        use serde_json::Value;
        match value {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(b),
            AttributeValue::Int(i) => Value::from(i),
            // NaN and infinities have no JSON form
            AttributeValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::String(s) => Value::String(s),
            AttributeValue::Json(v) => v,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// Feature identifier, numeric or textual as it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureId {
    Number(serde_json::Number),
    Text(String),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, ordered by name
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<FeatureId>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Keep only the named attributes; names the feature lacks are ignored
    pub fn retain_properties<S: AsRef<str>>(&mut self, names: &[S]) {
        self.properties
            .retain(|key, _| names.iter().any(|n| n.as_ref() == key));
    }
}

/// Collection of features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    #[test]
    fn test_retain_properties() {
        let mut feature = Feature::new(Geometry::Point(point!(x: 1.0, y: 2.0)));
        feature.set_property("NAME", "Bern");
        feature.set_property("POP", 133_115i64);
        feature.set_property("AREA", 51.6);

        feature.retain_properties(&["POP", "MISSING"]);
        assert_eq!(feature.properties.len(), 1);
        assert_eq!(feature.get_property("POP"), Some(&AttributeValue::Int(133_115)));

        feature.retain_properties::<&str>(&[]);
        assert!(feature.properties.is_empty());
    }

    #[test]
    fn test_json_value_conversion() {
        let v = serde_json::json!({"a": [1, 2]});
        let attr = AttributeValue::from(v.clone());
        assert_eq!(attr, AttributeValue::Json(v.clone()));
        assert_eq!(serde_json::Value::from(attr), v);

        assert_eq!(
            AttributeValue::from(serde_json::json!(2.5)),
            AttributeValue::Float(2.5)
        );
        assert_eq!(
            serde_json::Value::from(AttributeValue::Float(f64::NAN)),
            serde_json::Value::Null
        );
    }
}
