//! Core application primitives (engine, refresh orchestration, HTTP surface)

pub mod engine;
pub mod http;
pub mod runtime;
pub mod scheduler;

pub use engine::*;
pub use http::*;
pub use runtime::*;
pub use scheduler::*;
