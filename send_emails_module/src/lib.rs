//! Outbound email transport.
//!
//! [`MailTransport`] is the single send primitive the reporting service
//! depends on. [`PostmarkTransport`] delivers through the Postmark HTTP API;
//! tests substitute their own implementation.

mod postmark;

pub use postmark::{PostmarkConfig, PostmarkTransport};

/// A named file attached to an outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A fully addressed plain-text email ready for transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundEmail {
    pub sender: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    /// Message-ID of the email this one continues, emitted as `In-Reply-To`.
    pub in_reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEmailResponse {
    pub message_id: String,
    pub submitted_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SendEmailError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("email has no recipients")]
    NoRecipients,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("postmark api error {status}: {message}")]
    Api { status: u16, message: String },
}

pub trait MailTransport: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<SendEmailResponse, SendEmailError>;
}
