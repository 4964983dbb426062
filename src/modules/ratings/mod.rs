//! Denormalized rating summaries of tours, maintained from review mutations.

pub mod locks;
pub mod service;

pub use locks::ParentLocks;
pub use service::{NEUTRAL_RATING, RatingsMaintainer, affected_parents, summarize};
