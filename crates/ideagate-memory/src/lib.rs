//! Persistence for ideas, versions, evaluations and feature simulations.

pub mod migrations;
pub mod records;
pub mod repository;
pub mod store;

pub use records::RecordError;
pub use repository::IdeaRepository;
pub use store::{Collection, Direction, Document, DocumentStore, Query, SqliteDocumentStore};
