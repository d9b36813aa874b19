//! Types shared across the forms-watcher workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
