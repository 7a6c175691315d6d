pub mod client;
pub mod models;
pub mod signer;

pub use client::{ExchangeApi, ExmoClient};
