//! Strongly-typed entities shared by every ideagate crate.

pub mod error;
pub mod evaluation;
pub mod intake;
pub mod report;
pub mod scoring;
pub mod simulation;
pub mod version;

pub use error::{SchemaError, Validate};
pub use evaluation::*;
pub use intake::*;
pub use report::*;
pub use scoring::*;
pub use simulation::*;
pub use version::*;
