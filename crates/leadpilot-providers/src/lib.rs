//! # LeadPilot Providers
//!
//! Thin HTTP clients for the three external systems:
//! - [`ZoomInfoClient`]: contact search/enrichment, JWT cached per client
//! - [`HubSpotClient`]: contact upsert, listing, notes
//! - [`AnthropicClient`]: Messages API completions
//!
//! Clients never retry on their own. Callers wrap them in
//! [`leadpilot_core::retry_with_backoff`].

pub mod anthropic;
mod http;
pub mod hubspot;
pub mod pagination;
pub mod zoominfo;

pub use anthropic::{AnthropicClient, parse_json_reply};
pub use hubspot::HubSpotClient;
pub use pagination::{Page, collect_pages};
pub use zoominfo::ZoomInfoClient;
