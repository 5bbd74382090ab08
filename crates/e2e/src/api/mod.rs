//! REST API access: endpoint paths, the stateful client and captured responses

pub mod client;
pub mod endpoints;
pub mod response;

pub use client::ApiClient;
pub use response::ApiResponse;
