//! Rule-based router that turns free-text Turkish fleet-maintenance
//! questions into structured, backend-agnostic query plans.
//!
//! The pipeline is deterministic end to end: normalization, entity
//! extraction, trigger matching against a question catalog, an ordered
//! override chain, and plan synthesis. No model calls, no randomness.

pub mod catalog;
pub mod config;
pub mod extract;
pub mod matcher;
pub mod normalize;
pub mod plan;
pub mod refine;
pub mod router;
pub mod schema;
pub mod types;

// Re-export the router surface for convenience
pub use config::RouterConfig;
pub use router::{Analysis, PlannedQuery, QuestionRouter, RunnerUp};

// Re-export registry and plan types
pub use catalog::{CanonicalQuestion, QuestionCatalog};
pub use plan::{IncompletePlan, QueryPlan};
pub use schema::{RegistryError, SchemaRegistry};
pub use types::{EntityBag, FilterValue, QuestionType, SortSpec, TimeRange};

// Re-export pipeline stages for callers that compose their own flow
pub use extract::EntityExtractor;
pub use normalize::{normalize, NormalizedText};

// Re-export common types
pub use anyhow::{Error, Result};
