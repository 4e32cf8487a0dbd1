//! Transformation module.
//!
//! This module turns ordered rows into nested payloads:
//! - Resolve / Extract: column alias resolution and multi-value identifier columns
//! - Index / Grouper: foreign-key indexes and row grouping
//! - DSL: declarative mapping schemas and the rule executor
//! - Invoice / Entity: Header+Lines and Header+Children assembly
//! - Pipeline: batch orchestration with logging and validation

pub mod amount;
pub mod dsl;
pub mod entity;
pub mod extract;
pub mod grouper;
pub mod index;
pub mod invoice;
pub mod lookup;
pub mod pipeline;
pub mod prune;
pub mod resolve;

pub use entity::{assemble_entity, BatchIndexes};
pub use grouper::group_by;
pub use invoice::assemble_invoice;
pub use pipeline::*;
pub use prune::prune;
