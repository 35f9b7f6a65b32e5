//! Account management functionality
//!
//! The sequential account list, the app-key cache and the address
//! normalization both of them rely on.

mod address;
mod store;
mod app_keys;

pub use address::*;
pub use store::*;
pub use app_keys::*;
