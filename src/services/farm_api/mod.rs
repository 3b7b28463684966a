//! Farm backend REST integration

pub mod client;
pub mod messages;

pub use client::FarmApiClient;
