pub mod client;

pub use client::{ApiError, NeosClient};
pub use neosnoize_core;
