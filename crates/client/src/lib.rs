//! Client side of Tasklane
//!
//! [`client::TaskClient`] speaks the REST API, [`view::TaskView`] keeps the
//! small amount of UI state a task list needs and reloads from the server
//! after every change.

pub mod client;
pub mod error;
pub mod view;

pub use client::{TaskApi, TaskClient};
pub use error::{ClientError, Result};
pub use view::{TaskView, ViewFilter};
