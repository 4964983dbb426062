pub mod controller;
pub mod model;
pub mod router;
pub mod service;

pub use model::{user_resource, user_schema};
pub use router::init_users_router;
pub use service::AccountClosureNotifier;
