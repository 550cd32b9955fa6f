// Library exports for the binary, integration tests and benchmarks

pub mod behaviors;
pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod middleware;
pub mod predicate;
pub mod proxy;
pub mod recording;
pub mod request;
pub mod simulation;

pub use error::{ErrorKind, ProxyError};
