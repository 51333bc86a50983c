//! Shared runtime plumbing for the authz engine: the HTTP-facing error type,
//! environment configuration, tracing setup, and health-check wiring. Every
//! other crate in the workspace depends on this one and nothing else does
//! (no crate above this in the dependency graph reaches into the others).

pub mod config;
pub mod error;
pub mod health;
pub mod tracing_setup;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;

pub type AppResult<T> = Result<T, AppError>;
