//! # Foresight Core
//!
//! The retrieval-augmented pipeline around the `event_graph` crate. It
//! gathers background material about a scenario, stores it for similarity
//! search, and asks a language model to expand events of the causality tree.
//!
//! ## Core Components
//!
//! - **analysis**: Reads a scenario prompt into stakeholders and relations
//! - **ingestion**: Search, fetch, extract and chunk sources for each relation
//! - **knowledge_base**: Chunking, embeddings and the vector store
//! - **retrieval**: Top-k context for a query
//! - **context_assembler**: Builds the generation request and prompt
//! - **orchestrator**: Runs one expansion and commits the new events
//!
//! ## Design Philosophy
//!
//! - **Graph-Owned Integrity**: Only `event_graph` assigns IDs and links nodes
//! - **Pluggable Providers**: Models, embedders, search and stores sit behind traits
//! - **Partial Progress**: Ingestion reports per-item failures instead of aborting

pub mod analysis;
pub mod config;
pub mod context_assembler;
pub mod error;
pub mod graph_handle;
pub mod ingestion;
pub mod knowledge_base;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod retry;
pub mod testing;

pub use analysis::*;
pub use config::*;
pub use context_assembler::*;
pub use error::*;
pub use graph_handle::*;
pub use ingestion::*;
pub use knowledge_base::*;
pub use llm::*;
pub use orchestrator::*;
pub use retrieval::*;
pub use retry::*;
