//! On-disk model bundle
//!
//! File layout, all integers little endian:
//!
//! | bytes | content                        |
//! |-------|--------------------------------|
//! | 8     | magic `EXOBNDL\0`              |
//! | 4     | format version (u32)           |
//! | 8     | payload length (u64)           |
//! | 32    | SHA-256 of the payload         |
//! | n     | bincode-encoded [`ModelBundle`] |
//!
//! A bundle is written once and never overwritten: the bytes go to a temp file in
//! the target directory, which is then renamed into place only if nothing exists
//! at the target path yet.

use super::pipeline::ClassificationPipeline;
use crate::error::{ExoError, Result};
use crate::schema::{FeatureSchema, LabelMapping};
use crate::training::metrics::EvaluationMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

const BUNDLE_MAGIC: &[u8; 8] = b"EXOBNDL\0";
/// Current bundle format version
pub const BUNDLE_FORMAT_VERSION: u32 = 1;
const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = 8 + 4 + 8 + CHECKSUM_LEN;

/// Name reported for the classifier family
pub const MODEL_NAME: &str = "LightGBM";

/// Everything inference needs, produced once per training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
    pub feature_schema: FeatureSchema,
    pub label_mapping: LabelMapping,
    pub pipeline: ClassificationPipeline,
    /// Held-out evaluation recorded at training time
    pub metrics: Option<EvaluationMetrics>,
}

impl ModelBundle {
    pub fn new(
        feature_schema: FeatureSchema,
        label_mapping: LabelMapping,
        pipeline: ClassificationPipeline,
        metrics: Option<EvaluationMetrics>,
    ) -> Result<Self> {
        let bundle = Self {
            format_version: BUNDLE_FORMAT_VERSION,
            model_name: MODEL_NAME.to_string(),
            created_at: Utc::now(),
            feature_schema,
            label_mapping,
            pipeline,
            metrics,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Schema, mapping and pipeline must describe the same model
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.pipeline.preprocessor().columns() != self.feature_schema.names() {
            return Err(ExoError::ShapeError {
                expected: format!("pipeline columns {:?}", self.feature_schema.names()),
                actual: format!("{:?}", self.pipeline.preprocessor().columns()),
            });
        }
        if self.pipeline.n_classes() != self.label_mapping.len() {
            return Err(ExoError::ShapeError {
                expected: format!("{} classes", self.label_mapping.len()),
                actual: format!("{} classes", self.pipeline.n_classes()),
            });
        }
        Ok(())
    }

    /// Encode header and payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let checksum: [u8; CHECKSUM_LEN] = Sha256::digest(&payload).into();

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(BUNDLE_MAGIC);
        out.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&checksum);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode and verify a bundle
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ExoError::CorruptBundle(format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);

        if &header[..8] != BUNDLE_MAGIC {
            return Err(ExoError::CorruptBundle("bad magic, not a model bundle".into()));
        }
        let version = u32::from_le_bytes(read_array(&header[8..12]));
        if version != BUNDLE_FORMAT_VERSION {
            return Err(ExoError::CorruptBundle(format!(
                "unsupported format version {} (expected {})",
                version, BUNDLE_FORMAT_VERSION
            )));
        }
        let payload_len = u64::from_le_bytes(read_array(&header[12..20]));
        if payload_len != payload.len() as u64 {
            return Err(ExoError::CorruptBundle(format!(
                "payload length mismatch: header says {}, found {}",
                payload_len,
                payload.len()
            )));
        }
        let expected: [u8; CHECKSUM_LEN] = read_array(&header[20..HEADER_LEN]);
        let actual: [u8; CHECKSUM_LEN] = Sha256::digest(payload).into();
        if expected != actual {
            return Err(ExoError::CorruptBundle("checksum mismatch".into()));
        }

        let bundle: ModelBundle = bincode::deserialize(payload)
            .map_err(|e| ExoError::CorruptBundle(format!("payload decode failed: {}", e)))?;
        bundle
            .validate()
            .map_err(|e| ExoError::CorruptBundle(format!("inconsistent bundle: {}", e)))?;
        Ok(bundle)
    }

    /// Write the bundle to `path`, failing with `ModelExists` if anything is already there.
    /// Parent directories are created as needed.
    pub fn save_new(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".exobundle")
            .tempfile_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        temp.persist_noclobber(path).map_err(|err| {
            if err.error.kind() == std::io::ErrorKind::AlreadyExists {
                ExoError::ModelExists(path.to_path_buf())
            } else {
                ExoError::Io(err.error)
            }
        })?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "Model bundle written");
        Ok(())
    }

    /// Read and verify a bundle file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn features(&self) -> &[String] {
        self.feature_schema.names()
    }

    pub fn num_features(&self) -> usize {
        self.feature_schema.len()
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
