//! Knowledge Base module - retrieval memory for expansions.
//!
//! The knowledge base consists of:
//! - **Chunks**: bounded text segments cut from fetched source documents
//! - **Metadata**: provenance copied onto every chunk of a document
//! - **Embeddings**: vectors the store ranks chunks by

mod chunk;
mod chunker;
mod embedder;
mod store;

pub use chunk::*;
pub use chunker::*;
pub use embedder::*;
pub use store::*;
