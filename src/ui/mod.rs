//! Terminal output for transfers
//!
//! Progress goes to stderr; stdout is reserved for the JSON response.

mod context;
mod progress;

pub use context::UiContext;
pub use progress::{format_bytes, TransferProgress};
