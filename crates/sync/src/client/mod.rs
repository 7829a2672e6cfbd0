//! How the local side talks to the upstream CRM.

mod http;
mod local;

pub use self::http::HttpCrmClient;
pub use self::local::InProcessClient;

use async_trait::async_trait;
use shadowcrm_model::{Contact, ContactDraft, ContactFilter, Deal, DealDraft, DealFilter};

/// Default deadline for one upstream call.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Upstream failure as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("Rate limit exceeded (429)")]
    RateLimited,

    #[error("CRM API is down (503)")]
    ServiceUnavailable,

    /// The upstream refused the payload; carries its message.
    #[error("{0}")]
    Validation(String),

    #[error("CRM API is unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected CRM response: {0}")]
    Protocol(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, UpstreamError::Validation(_))
    }
}

/// The four upstream record operations.
///
/// Creates take drafts: the upstream is the one that validates them.
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn list_contacts(&self, filter: &ContactFilter) -> Result<Vec<Contact>, UpstreamError>;

    async fn create_contact(&self, draft: &ContactDraft) -> Result<Contact, UpstreamError>;

    async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, UpstreamError>;

    async fn create_deal(&self, draft: &DealDraft) -> Result<Deal, UpstreamError>;
}
