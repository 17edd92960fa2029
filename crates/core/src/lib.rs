//! Core library for Tasklane
//!
//! This crate contains the task tracking business logic, including:
//! - Task model, filters and the document store
//! - Attachment storage strategies
//! - The task service tying both together

pub mod attachment;
pub mod error;
pub mod service;
pub mod task;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
