//! Endpoint probing and threshold evaluation
//!
//! - [`prober`] issues one HTTP request per endpoint and turns the outcome
//!   into an unpersisted check result
//! - [`evaluator`] decides which alerts a check result raises

pub mod evaluator;
pub mod prober;

pub use evaluator::evaluate;
pub use prober::{HttpTransport, Prober, Transport, TransportError, TransportResponse};
