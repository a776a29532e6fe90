/// Failures produced by the domain operations themselves.
///
/// These travel inside response envelopes rather than as call failures, so a
/// caller can tell "the lookup ran and found nothing" apart from "the call
/// never reached the service".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("could not find user {id}")]
    NotFound { id: String },
}

impl DomainError {
    /// Stable machine-readable code, used by the wire codecs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
        }
    }
}
