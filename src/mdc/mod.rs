//! Mapped diagnostic context and the adapter that feeds it.
//!
//! - [`store`]: the [`DiagnosticContext`] capability and the thread-local store
//! - [`adapter`]: [`LegacyContextAdapter`], which mirrors the current trace
//!   context into that store
//!
//! Applications read the store from their log formatters:
//!
//! ```
//! use log_trace_bridge::mdc;
//!
//! mdc::insert("request_id", "r-42").unwrap();
//! assert_eq!(mdc::get("request_id").as_deref(), Some("r-42"));
//! mdc::remove("request_id").unwrap();
//! ```

pub mod adapter;
pub mod store;

pub use adapter::{DiagnosticKeys, LegacyContextAdapter, SyncScope};
pub use store::{clear, get, insert, remove, snapshot, DiagnosticContext, ThreadLocalMdc};
