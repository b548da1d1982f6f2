use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tracing output settings for the session library.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct LoggingConfig {
    /// Minimum level to emit: "trace", "debug", "info", "warn" or "error".
    pub level: String,
    /// "json" for structured lines, "console" for human-readable output.
    pub format: String,
}
