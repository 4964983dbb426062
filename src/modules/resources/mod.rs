//! Generic CRUD handlers parametrized by a [`ResourceDescriptor`].

pub mod controller;
pub mod model;
pub mod router;
pub mod service;

pub use model::*;
pub use router::{nested_resource_router, resource_router};
pub use service::ResourceService;
