//! notekeeper library
//!
//! Note and folder store with snapshot persistence and reminder scheduling.
//! Build an [`app::AppState`] once at startup and hand it to every caller.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod services;
pub mod storage;

pub use app::AppState;
pub use error::{AppError, Result};
