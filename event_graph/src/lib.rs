//! # Event Graph
//!
//! The scenario model crate - contains the causality tree of events, the
//! stakeholders involved and the relations between them.
//! This crate is the single source of truth for graph integrity and does not
//! contain any retrieval or language-model logic.

pub mod error;
pub mod graph;
pub mod scoring;
pub mod stakeholders;

pub use error::*;
pub use graph::*;
pub use scoring::*;
pub use stakeholders::*;
