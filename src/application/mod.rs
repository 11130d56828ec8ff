//! Application layer: orchestration of the domain services.
//!
//! [`pipeline::AuthorizationPipeline`] runs one payment request through
//! validation, risk, routing, fees and settlement; [`registry::ProcessorRegistry`]
//! maps payment methods to processor adapters.

pub mod pipeline;
pub mod registry;
