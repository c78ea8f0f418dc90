use serde::{Deserialize, Serialize};

/// Host-side processing settings.
///
/// Missing JSON fields fall back to the defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessorConfig {
    pub sample_rate: f64,
    /// Largest block the host will pass in one call.
    pub max_block_size: usize,
    pub channels: usize,
    /// Upper bound on pooled audio buffers.
    pub pool_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            sample_rate: 48000.0,
            max_block_size: 512,
            channels: 2,
            pool_capacity: 32,
        }
    }
}

impl ProcessorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
