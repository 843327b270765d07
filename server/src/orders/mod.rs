//! Order Lifecycle Module
//!
//! - **lifecycle**: creation, the status state machine, payment outcomes
//! - **retention**: archived-order purge with its daily scheduler

pub mod lifecycle;
pub mod retention;

pub use lifecycle::OrderService;
pub use retention::{CleanupPreview, CleanupReport, RetentionCleanup, RetentionScheduler};
