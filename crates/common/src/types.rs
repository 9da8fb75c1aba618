use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin tag the orchestrator attaches to the calls it makes on its own behalf.
pub const ORIGIN_ORCHESTRATOR: &str = "orchestrator";

/// Default origin tag for replenishment runs triggered by the supplier side.
pub const ORIGIN_SUPPLIERS: &str = "proveedores";

/// Unique identifier for a single saga run.
///
/// Every log line and step record produced by one run carries this ID, so
/// overlapping runs can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a run ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
