//! Application state management

use std::sync::Arc;

use crate::inference::InferenceService;
use crate::training::{TrainingConfig, TrainingService};

use super::ServerConfig;

/// Application state shared across handlers.
///
/// Both services are built once at startup and point at the same bundle path.
pub struct AppState {
    pub config: ServerConfig,
    pub inference: Arc<InferenceService>,
    pub training: Arc<TrainingService>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, training_config: TrainingConfig) -> Self {
        let inference = Arc::new(InferenceService::new(&config.model_path));
        let training = Arc::new(TrainingService::new(&config.model_path, training_config));
        Self {
            config,
            inference,
            training,
            started_at: chrono::Utc::now(),
        }
    }

    /// Attempt the initial model load; a missing or corrupt bundle is logged, not fatal
    pub fn load_model(&self) {
        match self.inference.load() {
            Ok(()) => tracing::info!(path = %self.config.model_path.display(), "Model ready"),
            Err(e) => tracing::warn!(
                error = %e,
                "Model not loaded. The service will start but predictions will fail until a model is trained or reloaded"
            ),
        }
    }
}
