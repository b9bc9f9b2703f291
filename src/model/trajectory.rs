use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::credits::Credits;

/// One recorded action in an entity's trajectory. The input/output hashes
/// bind the span to what the entity actually saw and produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrajectorySpan {
    pub id: String,
    pub action: String,
    pub input_hash: String,
    pub output_hash: String,
    pub cost: Credits,
    pub tokens: u64,
    pub duration_ms: u64,
    pub success: bool,
    /// Epoch milliseconds.
    pub started_at: i64,
}
