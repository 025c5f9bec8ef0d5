use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{MailTransport, OutboundEmail, SendEmailError, SendEmailResponse};

const DEFAULT_API_BASE_URL: &str = "https://api.postmarkapp.com";

#[derive(Debug, Clone)]
pub struct PostmarkConfig {
    pub server_token: String,
    pub api_base_url: String,
}

impl PostmarkConfig {
    pub fn new(server_token: impl Into<String>) -> Self {
        Self {
            server_token: server_token.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, SendEmailError> {
        dotenvy::dotenv().ok();
        let server_token = env_var_non_empty("POSTMARK_SERVER_TOKEN")
            .ok_or(SendEmailError::MissingConfig("POSTMARK_SERVER_TOKEN"))?;
        let api_base_url = env_var_non_empty("POSTMARK_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Ok(Self {
            server_token,
            api_base_url,
        })
    }
}

/// Sends email through the Postmark `/email` endpoint.
#[derive(Debug, Clone)]
pub struct PostmarkTransport {
    config: PostmarkConfig,
    client: reqwest::blocking::Client,
}

impl PostmarkTransport {
    pub fn new(config: PostmarkConfig) -> Self {
        Self {
            config,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/email", self.config.api_base_url.trim_end_matches('/'))
    }
}

impl MailTransport for PostmarkTransport {
    fn send(&self, email: &OutboundEmail) -> Result<SendEmailResponse, SendEmailError> {
        if email.to.is_empty() {
            return Err(SendEmailError::NoRecipients);
        }
        let request = PostmarkEmailRequest::from_email(email);
        let response = self
            .client
            .post(self.endpoint())
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.config.server_token)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(SendEmailError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body: PostmarkEmailResponse = response.json()?;
        if body.error_code != 0 {
            return Err(SendEmailError::Api {
                status: status.as_u16(),
                message: body.message,
            });
        }
        Ok(SendEmailResponse {
            message_id: body.message_id,
            submitted_at: body.submitted_at,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmailRequest<'a> {
    from: &'a str,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<String>,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<PostmarkHeader<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<PostmarkAttachment>,
}

impl<'a> PostmarkEmailRequest<'a> {
    fn from_email(email: &'a OutboundEmail) -> Self {
        let cc = if email.cc.is_empty() {
            None
        } else {
            Some(email.cc.join(", "))
        };
        let headers = email
            .in_reply_to
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| PostmarkHeader {
                name: "In-Reply-To",
                value,
            })
            .into_iter()
            .collect();
        let attachments = email
            .attachments
            .iter()
            .map(|attachment| PostmarkAttachment {
                name: attachment.name.clone(),
                content: BASE64_STANDARD.encode(&attachment.data),
                content_type: content_type_for(&attachment.name),
            })
            .collect();
        Self {
            from: &email.sender,
            to: email.to.join(", "),
            cc,
            subject: &email.subject,
            text_body: &email.body,
            headers,
            attachments,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkHeader<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkAttachment {
    name: String,
    content: String,
    content_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmailResponse {
    #[serde(rename = "MessageID", default)]
    message_id: String,
    #[serde(default)]
    submitted_at: String,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    message: String,
}

fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_text_plain()
        .essence_str()
        .to_string()
}

fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
