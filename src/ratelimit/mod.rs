// Client-side rate limiting for the Perspective API.
//
// QuotaWindow tracks the fixed-window quota; AdmissionGate queues callers
// and releases them in order as the quota allows.

pub mod gate;
pub mod quota;

pub use gate::{AdmissionGate, PacerState};
pub use quota::QuotaWindow;
