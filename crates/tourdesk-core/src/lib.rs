//! # Tourdesk Core
//!
//! Core types and the generic resource-access engine of the Tourdesk API.
//!
//! - [`document`]: stored documents and identifiers
//! - [`schema`]: typed resource schemas with validation
//! - [`query`]: query-string parameters to storage query descriptors
//! - [`store`]: the storage collaborator interface
//! - [`errors`]: application errors, classification and wire rendering
//!
//! # Example
//!
//! ```ignore
//! use tourdesk_core::query::{QueryFeatures, RawQuery};
//!
//! let raw = RawQuery::from_pairs([("price[lte]", "500"), ("sort", "-price")]);
//! let descriptor = QueryFeatures::new(&raw, &schema)
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .build();
//! let tours = store.find("tours", &descriptor).await?;
//! ```

pub mod document;
pub mod errors;
pub mod query;
pub mod schema;
pub mod store;

// Re-export commonly used types at crate root
pub use document::{Document, DocumentId};
pub use errors::{AppError, DisclosureMode, ErrorKind};
pub use query::{QueryDescriptor, QueryFeatures, RawQuery};
pub use schema::{FieldSpec, FieldType, ResourceSchema};
pub use store::{Aggregate, DocumentStore, StoreError, StoreResult};
