//! Feature modules.
//!
//! - [`resources`]: generic CRUD engine shared by every resource
//! - [`ratings`]: tour rating summaries maintained from review mutations
//! - [`tours`], [`reviews`], [`users`]: resource descriptors and routes

pub mod ratings;
pub mod resources;
pub mod reviews;
pub mod tours;
pub mod users;
