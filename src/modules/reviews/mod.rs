pub mod model;

pub use model::{review_resource, review_schema};
