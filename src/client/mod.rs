//! Client module - transport to the automation service
//!
//! Provides the service contract as a trait plus the HTTP implementation.

pub mod http;
pub mod traits;
pub mod wire;

pub use http::HttpAutomationClient;
pub use traits::AutomationApi;
pub use wire::*;
