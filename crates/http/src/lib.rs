//! MOIM MOIM API types and client
//!
//! The `client` feature provides [`client::MoimClient`], which attaches the
//! stored access token to calls and transparently reissues it once when the
//! server reports it expired.

pub mod types;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "client")]
pub use client::{ApiRequest, ClientConfig, ClientError, MoimClient, TokenStore};
