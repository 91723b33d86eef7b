/// Why a delivery to one chat failed.
///
/// The dispatcher treats each kind differently: gone chats are dropped from
/// the store, transient failures get one retry, anything else is logged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("destination gone: {0}")]
    DestinationGone(String),

    #[error("transient transport error: {0}")]
    Transient(String),

    #[error("send failed: {0}")]
    Other(String),
}

const GONE_MARKERS: &[&str] = &[
    "chat not found",
    "bot was blocked",
    "bot was kicked",
    "user is deactivated",
    "forbidden",
];

const TRANSIENT_MARKERS: &[&str] = &["timeout", "timed out", "connection"];

impl SendError {
    /// Classify a free-form transport error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if GONE_MARKERS.iter().any(|m| lower.contains(m)) {
            return SendError::DestinationGone(message.to_string());
        }
        if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            return SendError::Transient(message.to_string());
        }
        SendError::Other(message.to_string())
    }

    pub fn is_destination_gone(&self) -> bool {
        matches!(self, SendError::DestinationGone(_))
    }
}

pub type SendResult<T> = std::result::Result<T, SendError>;

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub max_message_len: usize,
    pub max_caption_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_gone_destinations() {
        assert!(SendError::classify("Bad Request: chat not found").is_destination_gone());
        assert!(
            SendError::classify("Forbidden: bot was blocked by the user").is_destination_gone()
        );
    }

    #[test]
    fn classifies_transient_failures() {
        assert_eq!(
            SendError::classify("Connection reset by peer"),
            SendError::Transient("Connection reset by peer".to_string())
        );
        assert!(matches!(
            SendError::classify("operation timed out"),
            SendError::Transient(_)
        ));
    }

    #[test]
    fn everything_else_is_other() {
        assert!(matches!(
            SendError::classify("Bad Request: wrong file identifier"),
            SendError::Other(_)
        ));
    }
}
