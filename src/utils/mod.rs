//! Shared utilities.
//!
//! - [`notifier`]: outbound notifications (SMTP or log)

pub mod notifier;
