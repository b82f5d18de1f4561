//! Core types and traits for the fundfacts engine
//!
//! This crate provides the foundational types shared by every other crate:
//! - Closed domain enums (scheme tags, source types, canonical fields)
//! - Chunk, fact and conflict records
//! - Immutable conversation context
//! - The tagged `Lookup` result used for expected absence of data
//! - Collaborator traits (embedding provider, cross-encoder)
//! - Error types and atomic file output

pub mod context;
pub mod document;
pub mod error;
pub mod fact;
pub mod lookup;
pub mod persist;
pub mod retrieval;
pub mod scheme;
pub mod traits;

pub use context::ConversationContext;
pub use document::{Chunk, SourceDocument};
pub use error::{Error, ErrorKind, Result};
pub use fact::{ConflictRecord, FactRecord};
pub use lookup::Lookup;
pub use persist::{write_atomic, write_atomic_bytes};
pub use retrieval::{QueryType, RetrievedChunk};
pub use scheme::{source_authority, source_priority, Field, FieldKind, SchemeTag, SourceType};
pub use traits::{CrossEncoder, EmbeddingProvider};
