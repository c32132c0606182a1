use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::SessionData;

/// The storage contract of an express-style session middleware.
///
/// The middleware owns cookies and id generation and only calls into the
/// store through these operations. `sid` is the raw session id; prefixing
/// is the store's business.
#[async_trait]
pub trait SessionRepository: Debug + Send + Sync + 'static {
    /// Writes `session`, replacing whatever is stored under `sid`.
    async fn set(&self, sid: &str, session: &SessionData) -> Result<()>;

    /// Reads the session stored under `sid`.
    ///
    /// Returns `Ok(None)` when nothing is stored or the stored session has
    /// expired.
    async fn get(&self, sid: &str) -> Result<Option<SessionData>>;

    /// Removes the session. Removing a missing session is not an error.
    async fn destroy(&self, sid: &str) -> Result<()>;

    /// Extends the lifetime of the session without rewriting its payload.
    async fn touch(&self, sid: &str, session: &SessionData) -> Result<()>;
}
