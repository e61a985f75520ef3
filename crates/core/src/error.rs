use thiserror::Error;

use crate::registry::PlantId;
use crate::MAX_ZONES;

/// Failure of a command issued against the controller.  None of these are
/// fatal: every variant means "nothing was changed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("all {max} zones are occupied", max = MAX_ZONES)]
    CapacityExceeded,
    #[error("plant {0} not found")]
    NotFound(PlantId),
    #[error("zone {0} out of range (0-{max})", max = MAX_ZONES - 1)]
    InvalidZone(usize),
    #[error("no plant configured on zone {0}")]
    EmptyZone(usize),
}
