// Perspective: rate-limited client for Google's comment analysis API
//
// This is the library root. The ratelimit module holds the quota window
// and admission gate every request passes through; client, models and
// scorer sit on top of it.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod scorer;

pub use client::{Client, ClientBuilder};
pub use error::{ConfigError, PerspectiveError};
pub use models::{AnalysisResponse, AnalyzeRequest, Attribute, AttributeName};
pub use ratelimit::{AdmissionGate, QuotaWindow};
