mod client;
mod find;

pub use client::{Client, ClientConfig, ClientError};
pub use find::FindObjects;
