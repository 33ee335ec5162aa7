//! Unified error codes for the queue engine
//!
//! - [`ErrorCode`]: standardized numeric codes shared with clients
//! - [`ErrorCategory`]: classification of codes by range
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 4xxx: Queue errors
//! - 9xxx: System errors

mod category;
mod codes;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
