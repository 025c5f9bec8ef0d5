//! Construction of every outbound email: reports, replies and rejections.
//!
//! The sender address always carries the bug id (`bot+<id>@host`), so a reply
//! names its bug through the address it is sent to.

use std::sync::Arc;

use send_emails_module::{Attachment, MailTransport, OutboundEmail, SendEmailError};
use tracing::info;

use crate::mail::{add_addr_context, form_reply, AddressError, ParsedMessage};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("failed to send email: {0}")]
    Send(#[from] SendEmailError),
}

pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    own_address: String,
}

impl Mailer {
    /// `own_address` is the untagged sender, e.g. `"bugbot" <bot@example.com>`.
    pub fn new(transport: Arc<dyn MailTransport>, own_address: impl Into<String>) -> Self {
        Self {
            transport,
            own_address: own_address.into(),
        }
    }

    pub fn own_address(&self) -> &str {
        &self.own_address
    }

    pub fn tagged_sender(&self, bug_id: &str) -> Result<String, AddressError> {
        add_addr_context(&self.own_address, bug_id)
    }

    /// Sends a rendered report. A non-empty `ext_id` threads it under an
    /// earlier email.
    pub fn send_report(
        &self,
        bug_id: &str,
        subject: &str,
        to: Vec<String>,
        ext_id: &str,
        attachments: Vec<Attachment>,
        body: String,
    ) -> Result<(), MailError> {
        let email = OutboundEmail {
            sender: self.tagged_sender(bug_id)?,
            to,
            cc: Vec::new(),
            subject: subject.to_string(),
            body,
            attachments,
            in_reply_to: Some(ext_id.to_string()).filter(|id| !id.is_empty()),
        };
        info!("sending email {:?} to {:?}", email.subject, email.to);
        self.transport.send(&email)?;
        Ok(())
    }

    /// Answers an inbound email: quotes it with `reply` inserted after the
    /// command and sends it back to the author, keeping the CC list.
    pub fn reply_to(
        &self,
        msg: &ParsedMessage,
        reply: &str,
        attachment: Option<Attachment>,
    ) -> Result<(), MailError> {
        let bug_id = msg.bug_id.as_deref().unwrap_or("");
        let email = OutboundEmail {
            sender: self.tagged_sender(bug_id)?,
            to: vec![msg.from.clone()],
            cc: msg.cc.clone(),
            subject: msg.subject.clone(),
            body: form_reply(&msg.body, reply),
            attachments: attachment.into_iter().collect(),
            in_reply_to: Some(msg.message_id.clone()).filter(|id| !id.is_empty()),
        };
        info!(
            "sending reply: to={:?} cc={:?} subject={:?} reply={:?}",
            msg.from, msg.cc, msg.subject, reply
        );
        self.transport.send(&email)?;
        Ok(())
    }
}
