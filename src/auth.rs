//! Identity-domain identifiers, scope sets, and secret wrappers used by the login flow.

pub mod id;
pub mod scope;
pub mod secret;

pub use id::*;
pub use scope::*;
pub use secret::*;
