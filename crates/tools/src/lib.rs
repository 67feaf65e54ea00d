//! Remote tool invocation for agentweave.
//!
//! Tool groups live behind JSON-RPC endpoints. [`ToolInvocationClient`] lists
//! and calls them with caching, tracing headers, timeouts, bounded retries and
//! auditing; [`ToolResource`] lets agents act through them.

pub mod client;
pub mod http;
pub mod resource;

pub use client::{ToolEndpoint, ToolInvocationClient, ToolTransport};
pub use http::HttpTransport;
pub use resource::ToolResource;
