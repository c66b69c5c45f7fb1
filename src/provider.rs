//! OIDC provider metadata (endpoints, client authentication) and client registrations.
//!
//! `descriptor` exposes validated provider metadata; `registration` pairs a descriptor with
//! the client credentials, redirect URI, and scopes the login flow uses.

pub mod descriptor;
pub mod registration;

pub use descriptor::*;
pub use registration::*;
