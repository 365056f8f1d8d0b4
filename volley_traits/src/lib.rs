pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use async_trait::async_trait;
use indexmap::IndexMap;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical request shared read-only by calibration and dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Absolute URL (scheme + authority + path).
    pub url: String,
    /// Header name → value, names unique, case as supplied.
    pub headers: IndexMap<String, String>,
    /// JSON request body.
    pub body: serde_json::Value,
}

/// Raw reply as seen by the client: status line and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// Time from send until the response headers arrived, when the
    /// transport measures it. Excludes reading the body.
    pub headers_after: Option<std::time::Duration>,
}

/// Opens connection-pooled sessions bound to one request.
pub trait Connector: Send + Sync {
    type Session: Session;

    fn open(&self, request: &RequestDescriptor) -> Result<Self::Session, BoxError>;
}

/// One pooled session; every `send` posts the bound request once.
#[async_trait]
pub trait Session: Send + Sync {
    async fn send(&self) -> Result<Reply, BoxError>;
}
