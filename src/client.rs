//! The NetWorker client.
//!
//! Keep the public surface small: a builder, the client handle and lazy
//! calls. Request execution, error classification and the verb set live in
//! submodules under `src/client/`.

pub mod builder;
pub mod call;
pub mod core;
pub(crate) mod error_classification;
mod execution;
mod verbs;

pub use builder::NetWorkerBuilder;
pub use call::{Call, CallHandle};
pub use core::NetWorker;
pub use error_classification::classify;
