//! Windowguard - Fixed-Window Rate Limiting Guard
//!
//! This crate bounds how often named operations may run within a fixed
//! time window. Each operation is wrapped once under a caller-supplied key
//! and gets its own quota; every call through the wrapper is admitted
//! atomically before the operation runs.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use error::{LimiterError, Result};
pub use ratelimit::{Admission, OperationKey, RateLimited, RateLimiter};
