pub mod states;
pub mod transcript;
pub mod update;

pub use states::{is_synthetic_call_id, CallStatus, SYNTHETIC_CALL_PREFIXES};
pub use update::{CallUpdate, FieldChanges, UpdateOrigin, UpdatePlan, UpdateRejection};
