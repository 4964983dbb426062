pub mod controller;
pub mod model;
pub mod router;

pub use model::{tour_resource, tour_schema};
pub use router::init_tours_router;
