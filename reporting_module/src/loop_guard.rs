use std::collections::HashSet;

use crate::config::ReportingConfig;
use crate::mail::canonical_email;

/// Mailing lists the service posts reports to.
///
/// Lists echo our own reports back to us, sometimes more than once; commands
/// arriving from one of these addresses are dropped. Built once at startup
/// and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct MailingLists {
    addresses: HashSet<String>,
}

impl MailingLists {
    pub fn from_config(config: &ReportingConfig) -> Self {
        config
            .email_configs()
            .map(|email| email.email.as_str())
            .collect()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.addresses.contains(&canonical_email(email))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for MailingLists {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().map(canonical_email).collect(),
        }
    }
}
