//! Prometheus metrics.

pub mod repository;

pub use repository::{Instrumented, RepositoryMetrics};
