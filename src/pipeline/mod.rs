//! Poll-time pipeline.
//!
//! - `Orchestrator`: one poll cycle per call, with session-expiry recovery
//! - `CircuitBreaker`: pauses polling after repeated failures
//! - `ExtractorSet`: hands fetched bodies to content extractors

pub mod circuit_breaker;
pub mod extract;
pub mod orchestrator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerResult};
pub use extract::{
    ContentExtractor, ExtractorSelection, ExtractorSet, HnapListExtractor, HtmlTableExtractor,
    Record, Records,
};
pub use orchestrator::{Orchestrator, PollStats, TargetState};
