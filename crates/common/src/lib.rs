//! Common types shared by the credential reader and the token-check CLI

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
