pub mod client;
pub mod common;
pub mod error;
pub mod locations;
pub mod orders;
pub mod partners;
pub mod products;
pub mod tags;
pub mod users;
pub mod vxcs;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, ClientConfig, Environment, RetryConfig};
pub use error::ApiError;
