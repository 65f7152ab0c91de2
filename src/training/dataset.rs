//! Training data ingestion and validation
//!
//! Raw tabular data arrives as a CSV file, CSV bytes from an upload, or a list of
//! JSON records. All three end up as a polars `DataFrame` or a record list that is
//! validated against the feature schema and label mapping, then converted into a
//! schema-ordered feature matrix and a vector of class codes.

use crate::error::{ExoError, Result};
use crate::schema::{FeatureSchema, LabelMapping, DISPOSITION_COLUMN, IDENTIFIER_COLUMNS};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Minimum number of records accepted by the training adapters
pub const MIN_TRAINING_RECORDS: usize = 100;

/// Reject datasets below [`MIN_TRAINING_RECORDS`]
pub fn check_min_records(n: usize) -> Result<()> {
    if n < MIN_TRAINING_RECORDS {
        return Err(ExoError::DataQuality(format!(
            "at least {} training records are required, got {}",
            MIN_TRAINING_RECORDS, n
        )));
    }
    Ok(())
}

/// One labelled training row as received over JSON.
///
/// Feature values may be `null` (imputed later); non-schema keys are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    #[serde(alias = "disposicion")]
    pub disposition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_obj: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_objeto: Option<serde_json::Value>,

    #[serde(flatten)]
    pub values: HashMap<String, serde_json::Value>,
}

impl TrainingRecord {
    /// Build a record from a label and fully observed feature values
    pub fn new(disposition: impl Into<String>, values: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            disposition: disposition.into(),
            id_obj: None,
            id_objeto: None,
            values: values
                .into_iter()
                .map(|(k, v)| (k, serde_json::json!(v)))
                .collect(),
        }
    }
}

/// Cast a feature column to `f64`. Empty cells become NaN; any other cell that
/// does not parse as a number is a data-quality error naming the first bad row.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name)?;
    let cast = column.cast(&DataType::Float64)?;
    let values = cast.f64()?;

    if values.null_count() > column.null_count() {
        let raw = column.cast(&DataType::String)?;
        let raw = raw.str()?;
        let bad = (0..values.len()).find_map(|i| match (values.get(i), raw.get(i)) {
            (None, Some(text)) => Some((i, text.to_string())),
            _ => None,
        });
        if let Some((row, text)) = bad {
            return Err(ExoError::DataQuality(format!(
                "row {}: feature '{}' is not numeric (\"{}\")",
                row, name, text
            )));
        }
    }

    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Validated training data in schema order
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    features: Array2<f64>,
    labels: Array1<usize>,
    feature_names: Vec<String>,
    dropped_columns: Vec<String>,
}

impl TrainingDataset {
    /// Read and validate a CSV file
    pub fn from_csv_path(
        path: impl AsRef<Path>,
        schema: &FeatureSchema,
        mapping: &LabelMapping,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(file)
            .finish()?;
        tracing::info!(path = %path.display(), rows = df.height(), "Loaded training CSV");
        Self::from_dataframe(&df, schema, mapping)
    }

    /// Read and validate CSV content held in memory
    pub fn from_csv_bytes(data: &[u8], schema: &FeatureSchema, mapping: &LabelMapping) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(data))
            .finish()?;
        tracing::info!(rows = df.height(), bytes = data.len(), "Parsed uploaded training CSV");
        Self::from_dataframe(&df, schema, mapping)
    }

    /// Validate a dataframe: label column, label values, then feature columns
    pub fn from_dataframe(df: &DataFrame, schema: &FeatureSchema, mapping: &LabelMapping) -> Result<Self> {
        let column_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        if !column_names.iter().any(|c| c == DISPOSITION_COLUMN) {
            return Err(ExoError::MissingColumns(vec![DISPOSITION_COLUMN.to_string()]));
        }

        let raw_labels = df.column(DISPOSITION_COLUMN)?.cast(&DataType::String)?;
        let labels = map_labels(
            raw_labels.str()?.into_iter().map(|v| v.unwrap_or(NULL_LABEL)),
            mapping,
        )?;

        let missing = schema.missing_from(column_names.iter().map(String::as_str));
        if !missing.is_empty() {
            return Err(ExoError::MissingColumns(missing));
        }

        let dropped_columns = dropped(&column_names, schema);
        log_dropped(&dropped_columns);

        let columns = schema
            .names()
            .iter()
            .map(|name| numeric_column(df, name))
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let features = Array2::from_shape_fn((df.height(), columns.len()), |(r, c)| columns[c][r]);
        Ok(Self {
            features,
            labels,
            feature_names: schema.names().to_vec(),
            dropped_columns,
        })
    }

    /// Validate JSON records. A schema key absent from every record is a missing
    /// column; a key absent from some records is treated as a missing value.
    pub fn from_records(records: &[TrainingRecord], schema: &FeatureSchema, mapping: &LabelMapping) -> Result<Self> {
        let labels = map_labels(records.iter().map(|r| r.disposition.as_str()), mapping)?;

        let mut seen: Vec<String> = Vec::new();
        for record in records {
            for key in record.values.keys() {
                if !seen.contains(key) {
                    seen.push(key.clone());
                }
            }
        }
        let missing = schema.missing_from(seen.iter().map(String::as_str));
        if !missing.is_empty() {
            return Err(ExoError::MissingColumns(missing));
        }

        seen.sort();
        let dropped_columns = dropped(&seen, schema);
        log_dropped(&dropped_columns);

        let mut features = Array2::from_elem((records.len(), schema.len()), f64::NAN);
        for (i, record) in records.iter().enumerate() {
            for (j, name) in schema.names().iter().enumerate() {
                features[[i, j]] = match record.values.get(name) {
                    None | Some(serde_json::Value::Null) => f64::NAN,
                    Some(value) => value.as_f64().ok_or_else(|| {
                        ExoError::DataQuality(format!(
                            "record {}: feature '{}' is not numeric ({})",
                            i, name, value
                        ))
                    })?,
                };
            }
        }

        Ok(Self {
            features,
            labels,
            feature_names: schema.names().to_vec(),
            dropped_columns,
        })
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<usize> {
        &self.labels
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Columns present in the input but not consumed by the model
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Number of samples per class code
    pub fn class_counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &c in self.labels.iter() {
            if c < n_classes {
                counts[c] += 1;
            }
        }
        counts
    }
}

const NULL_LABEL: &str = "<null>";

/// Map raw labels to codes, collecting every distinct unmapped value in order of appearance
fn map_labels<'a>(raw: impl Iterator<Item = &'a str>, mapping: &LabelMapping) -> Result<Array1<usize>> {
    let mut codes = Vec::new();
    let mut unmapped: Vec<String> = Vec::new();
    for value in raw {
        match mapping.code_of(value) {
            Some(code) => codes.push(code),
            None => {
                if !unmapped.iter().any(|u| u == value) {
                    unmapped.push(value.to_string());
                }
            }
        }
    }
    if !unmapped.is_empty() {
        return Err(ExoError::UnmappedLabels {
            values: unmapped,
            expected: mapping.labels().to_vec(),
        });
    }
    Ok(Array1::from_vec(codes))
}

fn dropped(columns: &[String], schema: &FeatureSchema) -> Vec<String> {
    columns
        .iter()
        .filter(|c| c.as_str() != DISPOSITION_COLUMN && !schema.contains(c))
        .cloned()
        .collect()
}

fn log_dropped(columns: &[String]) {
    for column in columns {
        if IDENTIFIER_COLUMNS.contains(&column.as_str()) {
            tracing::info!(column = %column, "Dropping identifier column");
        } else {
            tracing::info!(column = %column, "Dropping column not in feature schema");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FEATURE_NAMES;

    fn csv(rows: &[(&str, f64)]) -> String {
        let mut out = format!("id_obj,{},disposition\n", FEATURE_NAMES.join(","));
        for (i, (label, v)) in rows.iter().enumerate() {
            let values: Vec<String> = (0..FEATURE_NAMES.len()).map(|j| (v + j as f64).to_string()).collect();
            out.push_str(&format!("K{:05},{},{}\n", i, values.join(","), label));
        }
        out
    }

    fn record(label: &str, v: f64) -> TrainingRecord {
        TrainingRecord::new(label, FEATURE_NAMES.iter().map(|n| (n.to_string(), v)))
    }

    #[test]
    fn test_csv_bytes_ingest() {
        let data = csv(&[("CONFIRMED", 1.0), ("CANDIDATE", 2.0), ("FALSE POSITIVE", 3.0)]);
        let ds = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default()).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.labels().to_vec(), vec![1, 0, 2]);
        assert_eq!(ds.features().ncols(), 8);
        assert_eq!(ds.features()[[1, 7]], 9.0);
        assert_eq!(ds.dropped_columns(), &["id_obj".to_string()]);
    }

    #[test]
    fn test_csv_empty_cells_become_nan() {
        let data = format!(
            "{},disposition\n1,,3,4,5,6,7,8,CONFIRMED\n",
            FEATURE_NAMES.join(",")
        );
        let ds = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default()).unwrap();
        assert!(ds.features()[[0, 1]].is_nan());
        assert_eq!(ds.features()[[0, 2]], 3.0);
    }

    #[test]
    fn test_csv_non_numeric_cell_is_rejected() {
        let data = format!(
            "{},disposition\n1,2,3,4,5,6,7,8,CONFIRMED\nabc,2,3,4,5,6,7,8,CANDIDATE\n,2,3,4,5,6,7,8,CONFIRMED\n",
            FEATURE_NAMES.join(",")
        );
        let err = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default())
            .unwrap_err();
        match err {
            ExoError::DataQuality(msg) => {
                assert!(msg.contains("radio_planeta"), "{}", msg);
                assert!(msg.contains("row 1"), "{}", msg);
                assert!(msg.contains("abc"), "{}", msg);
            }
            other => panic!("expected DataQuality, got {:?}", other),
        }

        // Same rows without the bad cell: the empty cell is still imputed later
        let data = format!(
            "{},disposition\n1,2,3,4,5,6,7,8,CONFIRMED\n,2,3,4,5,6,7,8,CONFIRMED\n",
            FEATURE_NAMES.join(",")
        );
        let ds = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default())
            .unwrap();
        assert!(ds.features()[[1, 0]].is_nan());
        assert_eq!(ds.features()[[0, 0]], 1.0);
    }

    #[test]
    fn test_unmapped_labels_listed_once() {
        let data = csv(&[("CONFIRMED", 1.0), ("MAYBE", 2.0), ("MAYBE", 3.0), ("unknown", 4.0)]);
        let err = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default()).unwrap_err();
        match err {
            ExoError::UnmappedLabels { values, expected } => {
                assert_eq!(values, vec!["MAYBE".to_string(), "unknown".to_string()]);
                assert_eq!(expected.len(), 4);
            }
            other => panic!("expected UnmappedLabels, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_disposition_column() {
        let data = format!("{}\n1,2,3,4,5,6,7,8\n", FEATURE_NAMES.join(","));
        let err = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default()).unwrap_err();
        assert!(matches!(err, ExoError::MissingColumns(ref c) if c == &vec!["disposition".to_string()]));
    }

    #[test]
    fn test_missing_feature_column() {
        let data = "radio_planeta,disposition\n1.0,CONFIRMED\n";
        let err = TrainingDataset::from_csv_bytes(data.as_bytes(), &FeatureSchema::canonical(), &LabelMapping::default()).unwrap_err();
        match err {
            ExoError::MissingColumns(cols) => {
                assert_eq!(cols.len(), 7);
                assert!(!cols.contains(&"radio_planeta".to_string()));
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_records_ingest() {
        let mut with_null = record("CANDIDATE", 2.0);
        with_null.values.insert("temp_planeta".into(), serde_json::Value::Null);
        with_null.values.insert("kepler_name".into(), serde_json::json!("Kepler-22 b"));
        let records = vec![record("CONFIRMED", 1.0), with_null];

        let ds = TrainingDataset::from_records(&records, &FeatureSchema::canonical(), &LabelMapping::default()).unwrap();
        assert_eq!(ds.labels().to_vec(), vec![1, 0]);
        assert!(ds.features()[[1, 1]].is_nan());
        assert_eq!(ds.dropped_columns(), &["kepler_name".to_string()]);
    }

    #[test]
    fn test_record_json_accepts_spanish_label_key() {
        let json = serde_json::json!({
            "disposicion": "CONFIRMED",
            "id_objeto": "KOI-1",
            "radio_planeta": 1.0,
            "temp_planeta": 300.0,
        });
        let rec: TrainingRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.disposition, "CONFIRMED");
        assert_eq!(rec.values.len(), 2);
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let mut bad = record("CONFIRMED", 1.0);
        bad.values.insert("loc3_dist".into(), serde_json::json!("far"));
        let err = TrainingDataset::from_records(&[bad], &FeatureSchema::canonical(), &LabelMapping::default()).unwrap_err();
        assert!(matches!(err, ExoError::DataQuality(_)));
    }

    #[test]
    fn test_min_records() {
        assert!(check_min_records(99).is_err());
        assert!(check_min_records(100).is_ok());
    }
}
