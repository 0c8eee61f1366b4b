//! Outcome status of an executed task.

use serde::{Deserialize, Serialize};

/// Whether a task produced a value or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// The computation returned a value.
    Succeeded,
    /// The computation returned an error or panicked.
    Failed,
}

impl ResultStatus {
    /// Returns true if the task produced a value.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
