use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Relisten (post-reconnection) behaviour
///
/// ```toml
/// [recovery]
/// fail_fast = false
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RecoveryConfig {
    /// Abort the relisten pass on the first path that cannot be re-armed
    ///
    /// - `false` (default): log the failure, continue with the remaining
    ///   subscriptions and stubborn nodes, report every failed path at the end
    /// - `true`: return the first error, leaving later entries unrestored
    #[serde(default)]
    pub fail_fast: bool,
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
