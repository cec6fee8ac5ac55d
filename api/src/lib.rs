//! Client for Panopto's SOAP public API.
//!
//! [`AuthenticationManager`] resolves endpoints, performs the cookie based login
//! and hands out [`ServiceProxy`] values, which expose the operations of a service
//! description by name and return plain [`Value`] results.

pub mod auth;
pub mod decode;
pub mod endpoints;
pub mod error;
pub mod proxy;
pub mod signature;

pub use auth::{AuthenticationManager, ClientOptions};
pub use error::{Error, Result};
pub use panopto_util::{arguments, Arguments, Client, RawResponse, Value};
pub use proxy::ServiceProxy;
