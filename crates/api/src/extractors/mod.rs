//! Request extractors.
//!
//! [`UserAuth`](crate::middleware::UserAuth) is usable directly as a handler
//! argument; see [`user_auth`]. [`input`] wraps the body, query and path
//! extractors so their rejections share the API error format.

pub mod input;
pub mod user_auth;

pub use input::{ApiJson, ApiPath, ApiQuery};
