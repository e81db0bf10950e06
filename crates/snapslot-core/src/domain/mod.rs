//! Domain model (IDs, identity, slot keys, captures, occupancy, outcomes).

pub mod capture;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod listing;
pub mod occupancy;
pub mod outcome;
pub mod plan;
pub mod slot_key;

pub use capture::{DEFAULT_MIME_TYPE, PendingCapture};
pub use errors::{CaptureError, ReconcileError, SessionError, StorageError, TransportError};
pub use identity::{EventId, Role, UploadIdentity};
pub use ids::{CaptureId, PassId};
pub use listing::{EventListing, RemotePhoto, RoleCaps, UploadAck};
pub use occupancy::{Occupancy, OccupancyView, SlotRecord};
pub use outcome::{PassOutcome, PassReport, RecordOutcome, RecordOutcomeKind, Trigger};
pub use plan::{PlanLimits, capacity_for};
pub use slot_key::{SlotKey, SlotNumber};
