//! # LeadPilot Core
//!
//! Shared building blocks for the lead pipeline: configuration, the error
//! taxonomy, retry/backoff, domain types and the traits every other crate
//! plugs into.
//!
//! ## Architecture
//! ```text
//! ContactSource (ZoomInfo) ──► LeadStore ──► CrmSink (HubSpot)
//!                                  │
//!                                  └──► LanguageModel (scoring) ──► LeadStore
//! JobStore ◄── every phase records its lifecycle here
//! NotificationSink ◄── workflow summary
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use config::LeadPilotConfig;
pub use error::{LeadPilotError, NetworkErrorKind, ProviderKind, Result};
pub use retry::{RetryPolicy, retry_with_backoff};
