//! # Command Bridge Gateway
//!
//! Thin HTTP layer: parse a request, hand it to the configured
//! [`dispatch::Dispatcher`], shape the result into JSON.

pub mod assets;
pub mod dispatch;
pub mod extract;
pub mod response;
pub mod routes;

pub use routes::router;
