//! Reports fetched from the dashboard and the pieces of an outbound email
//! derived from them.

use std::borrow::Cow;

use send_emails_module::Attachment;
use serde::{Deserialize, Serialize};

use crate::command::ReproLevel;
use crate::config::EmailConfig;

/// A bug occurrence the dashboard considers ready for this reporting channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugReport {
    pub id: String,
    #[serde(default)]
    pub ext_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub compiler_id: String,
    #[serde(default)]
    pub kernel_repo: String,
    #[serde(default)]
    pub kernel_branch: String,
    #[serde(default)]
    pub kernel_commit: String,
    #[serde(default)]
    pub crash_title: String,
    #[serde(default, with = "base64_bytes")]
    pub report: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub error: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub kernel_config: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub patch: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub log: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub repro_syz: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub repro_c: Vec<u8>,
    /// JSON-encoded [`EmailConfig`] of the reporting route.
    #[serde(default, with = "base64_bytes")]
    pub config: Vec<u8>,
}

/// A finished patch-testing job; rendered through the same path as bugs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    #[serde(flatten)]
    pub report: BugReport,
}

impl BugReport {
    /// C reproducers beat syzkaller programs, which beat nothing.
    pub fn repro_level(&self) -> ReproLevel {
        if !self.repro_c.is_empty() {
            ReproLevel::C
        } else if !self.repro_syz.is_empty() {
            ReproLevel::Syz
        } else {
            ReproLevel::None
        }
    }

    /// One attachment per non-empty blob; empty blobs are left out entirely.
    pub fn attachments(&self) -> Vec<Attachment> {
        [
            ("config.txt", &self.kernel_config),
            ("patch.txt", &self.patch),
            ("raw.log", &self.log),
            ("repro.txt", &self.repro_syz),
            ("repro.c", &self.repro_c),
        ]
        .into_iter()
        .filter(|(_, data)| !data.is_empty())
        .map(|(name, data)| Attachment::new(name, data.clone()))
        .collect()
    }

    pub fn template_data<'a>(&'a self, config: &EmailConfig) -> ReportData<'a> {
        ReportData {
            first: self.first,
            moderation: config.moderation,
            maintainers: &self.maintainers,
            compiler_id: &self.compiler_id,
            kernel_repo: &self.kernel_repo,
            kernel_branch: &self.kernel_branch,
            kernel_commit: &self.kernel_commit,
            crash_title: &self.crash_title,
            report: String::from_utf8_lossy(&self.report),
            error: String::from_utf8_lossy(&self.error),
            has_log: !self.log.is_empty(),
            repro_syz: !self.repro_syz.is_empty(),
            repro_c: !self.repro_c.is_empty(),
        }
    }
}

/// What the mail templates get to see. Attachments are reduced to presence
/// flags so the templates never touch raw blobs.
#[derive(Debug, Serialize)]
pub struct ReportData<'a> {
    pub first: bool,
    pub moderation: bool,
    pub maintainers: &'a [String],
    pub compiler_id: &'a str,
    pub kernel_repo: &'a str,
    pub kernel_branch: &'a str,
    pub kernel_commit: &'a str,
    pub crash_title: &'a str,
    pub report: Cow<'a, str>,
    pub error: Cow<'a, str>,
    pub has_log: bool,
    pub repro_syz: bool,
    pub repro_c: bool,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => BASE64_STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
