use thiserror::Error;

/// Failure modes reported by [`EventSource`](crate::source::EventSource) and
/// [`LocalStore`](crate::source::LocalStore) implementations.
///
/// The resolvers treat every variant except `Cancelled` as "zero new records
/// this round" and proceed to fallback/termination; `Cancelled` halts all
/// further rounds for the session.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
