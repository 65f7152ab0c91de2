//! Feature schema and label taxonomy
//!
//! The schema fixes which measurements the model consumes and in which order.
//! Name-keyed feature maps are validated and projected into schema order once,
//! at the boundary; everything downstream works on plain `f64` rows.

use crate::error::{ExoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Canonical input measurements, in model order
pub const FEATURE_NAMES: [&str; 8] = [
    "radio_planeta",
    "temp_planeta",
    "periodo_orbital",
    "temp_estrella",
    "radio_estrella",
    "loc1_ra",
    "loc2_dec",
    "loc3_dist",
];

/// Name of the label column in training data
pub const DISPOSITION_COLUMN: &str = "disposition";

/// Non-feature identifier columns dropped before training
pub const IDENTIFIER_COLUMNS: [&str; 2] = ["id_obj", "id_objeto"];

/// Name-keyed feature values as received from callers
pub type FeatureVector = HashMap<String, f64>;

/// Untyped JSON object as received over the wire; may carry non-numeric extras
pub type RawFeatures = serde_json::Map<String, serde_json::Value>;

/// Anything that can be validated against a schema and projected into a row
pub trait FeatureInput {
    fn project_onto(&self, schema: &FeatureSchema) -> Result<Vec<f64>>;
}

impl FeatureInput for FeatureVector {
    fn project_onto(&self, schema: &FeatureSchema) -> Result<Vec<f64>> {
        schema.project(self)
    }
}

impl FeatureInput for RawFeatures {
    fn project_onto(&self, schema: &FeatureSchema) -> Result<Vec<f64>> {
        schema.project_json(self)
    }
}

/// Disposition of an exoplanet candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    #[serde(rename = "CANDIDATE")]
    Candidate,
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "FALSE POSITIVE")]
    FalsePositive,
    #[serde(rename = "REFUTED")]
    Refuted,
}

impl Disposition {
    /// All dispositions in default code order
    pub const ALL: [Disposition; 4] = [
        Disposition::Candidate,
        Disposition::Confirmed,
        Disposition::FalsePositive,
        Disposition::Refuted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Candidate => "CANDIDATE",
            Disposition::Confirmed => "CONFIRMED",
            Disposition::FalsePositive => "FALSE POSITIVE",
            Disposition::Refuted => "REFUTED",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposition {
    type Err = ExoError;

    fn from_str(s: &str) -> Result<Self> {
        Disposition::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ExoError::UnmappedLabels {
                values: vec![s.to_string()],
                expected: Disposition::ALL.iter().map(|d| d.as_str().to_string()).collect(),
            })
    }
}

/// Ordered list of feature names the pipeline expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Build a schema from an ordered list of names.
    /// Empty schemas and duplicate names are rejected.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ExoError::InvalidParameter {
                name: "feature_schema".into(),
                value: "[]".into(),
                reason: "schema must contain at least one feature".into(),
            });
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ExoError::InvalidParameter {
                    name: "feature_schema".into(),
                    value: name.clone(),
                    reason: "duplicate feature name".into(),
                });
            }
        }
        Ok(Self { names })
    }

    /// The canonical exoplanet schema
    pub fn canonical() -> Self {
        Self {
            names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Schema names absent from `available`, in schema order
    pub fn missing_from<'a, I>(&self, available: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: HashSet<&str> = available.into_iter().collect();
        self.names
            .iter()
            .filter(|n| !available.contains(n.as_str()))
            .cloned()
            .collect()
    }

    /// Validate a feature vector and project it into schema order.
    /// Extra keys are ignored.
    pub fn project(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let missing = self.missing_from(features.keys().map(String::as_str));
        if !missing.is_empty() {
            return Err(ExoError::MissingFeatures(missing));
        }
        Ok(self.names.iter().map(|n| features[n]).collect())
    }

    /// Like [`project`](Self::project) for a JSON object. Only schema keys must be
    /// numeric; extra keys of any type are ignored.
    pub fn project_json(&self, features: &RawFeatures) -> Result<Vec<f64>> {
        let missing = self.missing_from(features.keys().map(String::as_str));
        if !missing.is_empty() {
            return Err(ExoError::MissingFeatures(missing));
        }
        self.names
            .iter()
            .map(|name| {
                features[name.as_str()].as_f64().ok_or_else(|| {
                    ExoError::DataQuality(format!(
                        "feature '{}' is not numeric ({})",
                        name, features[name.as_str()]
                    ))
                })
            })
            .collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Bijective label name <-> class code mapping with contiguous codes `0..K`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, usize>",
    into = "BTreeMap<String, usize>"
)]
pub struct LabelMapping {
    /// Label names indexed by code
    labels: Vec<String>,
}

impl LabelMapping {
    /// Build a mapping from `(label, code)` pairs
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let pairs: Vec<(String, usize)> = pairs.into_iter().map(|(l, c)| (l.into(), c)).collect();
        if pairs.len() < 2 {
            return Err(ExoError::InvalidLabelMapping(
                "at least two labels are required".into(),
            ));
        }

        let mut labels: Vec<Option<String>> = vec![None; pairs.len()];
        let mut seen = HashSet::new();
        for (label, code) in pairs {
            if !seen.insert(label.clone()) {
                return Err(ExoError::InvalidLabelMapping(format!("duplicate label '{}'", label)));
            }
            let slot = labels.get_mut(code).ok_or_else(|| {
                ExoError::InvalidLabelMapping(format!(
                    "code {} for '{}' is outside the contiguous range",
                    code, label
                ))
            })?;
            if let Some(existing) = slot {
                return Err(ExoError::InvalidLabelMapping(format!(
                    "code {} assigned to both '{}' and '{}'",
                    code, existing, label
                )));
            }
            *slot = Some(label);
        }

        // Every slot is filled: n distinct labels with distinct codes in 0..n
        Ok(Self {
            labels: labels.into_iter().flatten().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label names ordered by code
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn code_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn label_of(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.labels
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code))
            .collect()
    }
}

impl Default for LabelMapping {
    fn default() -> Self {
        Self {
            labels: Disposition::ALL.iter().map(|d| d.as_str().to_string()).collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, usize>> for LabelMapping {
    type Error = ExoError;

    fn try_from(map: BTreeMap<String, usize>) -> Result<Self> {
        Self::new(map)
    }
}

impl From<LabelMapping> for BTreeMap<String, usize> {
    fn from(mapping: LabelMapping) -> Self {
        mapping.to_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vector() -> FeatureVector {
        FEATURE_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i as f64))
            .collect()
    }

    #[test]
    fn test_default_mapping_codes() {
        let mapping = LabelMapping::default();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.code_of("CANDIDATE"), Some(0));
        assert_eq!(mapping.code_of("CONFIRMED"), Some(1));
        assert_eq!(mapping.code_of("FALSE POSITIVE"), Some(2));
        assert_eq!(mapping.code_of("REFUTED"), Some(3));
        assert_eq!(mapping.label_of(2), Some("FALSE POSITIVE"));
        assert_eq!(mapping.code_of("MAYBE"), None);
    }

    #[test]
    fn test_mapping_rejects_gaps_and_duplicates() {
        assert!(LabelMapping::new([("A", 0), ("B", 2)]).is_err());
        assert!(LabelMapping::new([("A", 0), ("B", 0)]).is_err());
        assert!(LabelMapping::new([("A", 0), ("A", 1)]).is_err());
        assert!(LabelMapping::new([("A", 0)]).is_err());
        assert!(LabelMapping::new([("B", 1), ("A", 0)]).is_ok());
    }

    #[test]
    fn test_mapping_serializes_as_name_to_code() {
        let json = serde_json::to_value(LabelMapping::default()).unwrap();
        assert_eq!(json["REFUTED"], 3);
        let back: LabelMapping = serde_json::from_value(json).unwrap();
        assert_eq!(back, LabelMapping::default());

        let bad = serde_json::json!({"A": 0, "B": 5});
        assert!(serde_json::from_value::<LabelMapping>(bad).is_err());
    }

    #[test]
    fn test_project_orders_by_schema_and_ignores_extras() {
        let schema = FeatureSchema::canonical();
        let mut vector = full_vector();
        vector.insert("unrelated".into(), 99.0);
        let row = schema.project(&vector).unwrap();
        assert_eq!(row, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_project_names_exactly_the_missing_keys() {
        let schema = FeatureSchema::canonical();
        let mut vector = full_vector();
        vector.remove("loc2_dec");
        vector.remove("radio_planeta");
        match schema.project(&vector) {
            Err(ExoError::MissingFeatures(missing)) => {
                assert_eq!(missing, vec!["radio_planeta".to_string(), "loc2_dec".to_string()]);
            }
            other => panic!("expected MissingFeatures, got {:?}", other),
        }
    }

    #[test]
    fn test_project_json_ignores_non_numeric_extras() {
        let schema = FeatureSchema::canonical();
        let mut raw: RawFeatures = full_vector()
            .into_iter()
            .map(|(k, v)| (k, serde_json::json!(v)))
            .collect();
        raw.insert("kepler_name".into(), serde_json::json!("Kepler-22 b"));
        raw.insert("flags".into(), serde_json::json!([1, 2]));
        let row = schema.project_json(&raw).unwrap();
        assert_eq!(row, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        raw.remove("loc1_ra");
        assert!(matches!(
            schema.project_json(&raw),
            Err(ExoError::MissingFeatures(ref m)) if m == &vec!["loc1_ra".to_string()]
        ));
    }

    #[test]
    fn test_project_json_rejects_non_numeric_schema_value() {
        let schema = FeatureSchema::canonical();
        let mut raw: RawFeatures = full_vector()
            .into_iter()
            .map(|(k, v)| (k, serde_json::json!(v)))
            .collect();
        raw.insert("temp_planeta".into(), serde_json::json!("hot"));
        match schema.project_json(&raw) {
            Err(ExoError::DataQuality(msg)) => assert!(msg.contains("temp_planeta")),
            other => panic!("expected DataQuality, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        assert!(FeatureSchema::new(["a", "b", "a"]).is_err());
        assert!(FeatureSchema::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_disposition_parse() {
        assert_eq!("FALSE POSITIVE".parse::<Disposition>().unwrap(), Disposition::FalsePositive);
        assert!("confirmed".parse::<Disposition>().is_err());
    }
}
