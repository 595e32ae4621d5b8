//! TimeEdit Schedule Core Library
//!
//! Keeps an in-memory, daily refreshed view of a TimeEdit ICS feed and
//! answers day-relative lesson queries against it.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod jobs;
pub mod reminder;
pub mod schedule;
pub mod types;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        clock::*, config::*, feed::*, jobs::*, reminder::*, schedule::*, types::*,
    };
}
