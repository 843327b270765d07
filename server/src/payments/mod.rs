//! Payment Reconciliation Module
//!
//! - **processor**: `CardProcessor` trait plus the HTTP client implementation
//! - **reconciler**: synchronous charges and webhook reconciliation
//! - **webhook**: HMAC signature verification and event parsing
//! - **sweep**: background cancellation of stale pending payments

pub mod processor;
pub mod reconciler;
pub mod sweep;
pub mod webhook;

pub use processor::{CardProcessor, HttpCardProcessor, ProcessorError, ProcessorErrorKind};
pub use reconciler::PaymentReconciler;
pub use sweep::PendingPaymentSweep;
