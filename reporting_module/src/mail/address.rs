use std::collections::HashSet;
use std::fmt;

use mailparse::{MailAddrList, MailHeader};

const MAX_EMAIL_LEN: usize = 1000;
const MAX_EMAILS: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("bad email address {address:?}: {reason}")]
    Invalid { address: String, reason: String },
    #[error("can't embed {context:?} into an email address")]
    InvalidContext { context: String },
}

/// A single mailbox: optional display name plus bare `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let list = mailparse::addrparse(raw.trim()).map_err(|err| AddressError::Invalid {
            address: raw.to_string(),
            reason: err.to_string(),
        })?;
        Self::from_list(raw, list)
    }

    /// Parses an address header as received, decoding RFC 2047 words per
    /// token so an encoded display name cannot split the mailbox.
    pub fn from_header(header: &MailHeader<'_>) -> Result<Self, AddressError> {
        let raw = String::from_utf8_lossy(header.get_value_raw()).into_owned();
        let list = mailparse::addrparse_header(header).map_err(|err| AddressError::Invalid {
            address: raw.clone(),
            reason: err.to_string(),
        })?;
        Self::from_list(&raw, list)
    }

    fn from_list(raw: &str, list: MailAddrList) -> Result<Self, AddressError> {
        let invalid = |reason: &str| AddressError::Invalid {
            address: raw.to_string(),
            reason: reason.to_string(),
        };
        let info = list
            .extract_single_info()
            .ok_or_else(|| invalid("expected exactly one mailbox"))?;
        let address = info.addr.trim().to_string();
        if address.is_empty() || !address.contains('@') {
            return Err(invalid("no @"));
        }
        let name = info
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        Ok(Self { name, address })
    }

    fn split(&self) -> (&str, &str) {
        match self.address.rfind('@') {
            Some(at) => self.address.split_at(at),
            None => (self.address.as_str(), ""),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{}\" <{}>", escaped, self.address)
            }
            None => f.write_str(&self.address),
        }
    }
}

/// Embeds `context` into the local part of `email` as `local+context@domain`,
/// keeping the display name. An empty context leaves the address untagged.
pub fn add_addr_context(email: &str, context: &str) -> Result<String, AddressError> {
    let mut mailbox = Mailbox::parse(email)?;
    if context.is_empty() {
        return Ok(mailbox.to_string());
    }
    if !context
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
    {
        return Err(AddressError::InvalidContext {
            context: context.to_string(),
        });
    }
    let (local, domain) = mailbox.split();
    let tagged = format!("{}+{}{}", local, context, domain);
    mailbox.address = tagged;
    Ok(mailbox.to_string())
}

/// Reverses [`add_addr_context`]: returns the untagged mailbox and the
/// context that was embedded after the last `+` (empty if none).
pub fn remove_addr_context(email: &str) -> Result<(Mailbox, String), AddressError> {
    let mut mailbox = Mailbox::parse(email)?;
    let (local, domain) = mailbox.split();
    let Some(plus) = local.rfind('+') else {
        return Ok((mailbox, String::new()));
    };
    let context = local[plus + 1..].to_string();
    let untagged = format!("{}{}", &local[..plus], domain);
    mailbox.address = untagged;
    Ok((mailbox, context))
}

/// Normalizes an address so that two spellings of the same mailbox compare
/// equal: display name and the same `+context` [`remove_addr_context`]
/// strips are dropped, the rest lowercased.
pub fn canonical_email(email: &str) -> String {
    match remove_addr_context(email) {
        Ok((mailbox, _)) => mailbox.address.to_ascii_lowercase(),
        Err(_) => email.trim().to_ascii_lowercase(),
    }
}

/// Merges address lists into bare addresses. Matching is case-insensitive,
/// the first spelling and position of an address win, unparsable or overlong
/// entries are dropped and the result is capped.
pub fn merge_email_lists(lists: &[&[String]]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for email in lists.iter().flat_map(|list| list.iter()) {
        let Ok(mailbox) = Mailbox::parse(email) else {
            continue;
        };
        if mailbox.address.len() > MAX_EMAIL_LEN {
            continue;
        }
        if seen.insert(mailbox.address.to_ascii_lowercase()) {
            merged.push(mailbox.address);
        }
        if merged.len() == MAX_EMAILS {
            break;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn add_addr_context_keeps_display_name() {
        let tagged = add_addr_context("\"bugbot\" <bot@example.com>", "4ff3a1").expect("tag");
        assert_eq!(tagged, "\"bugbot\" <bot+4ff3a1@example.com>");
        let bare = add_addr_context("bot@example.com", "abc").expect("tag");
        assert_eq!(bare, "bot+abc@example.com");
    }

    #[test]
    fn add_addr_context_rejects_unroutable_context() {
        let err = add_addr_context("bot@example.com", "a b@c").expect_err("reject");
        assert_eq!(
            err,
            AddressError::InvalidContext {
                context: "a b@c".to_string()
            }
        );
        assert!(add_addr_context("not an address", "abc").is_err());
    }

    #[test]
    fn empty_context_leaves_address_untagged() {
        assert_eq!(
            add_addr_context("bot@example.com", "").expect("tag"),
            "bot@example.com"
        );
    }

    #[test]
    fn remove_addr_context_recovers_context() {
        let (mailbox, context) =
            remove_addr_context("\"bugbot\" <bot+deadbeef@example.com>").expect("parse");
        assert_eq!(mailbox.address, "bot@example.com");
        assert_eq!(mailbox.name.as_deref(), Some("bugbot"));
        assert_eq!(context, "deadbeef");

        let (mailbox, context) = remove_addr_context("user@example.com").expect("parse");
        assert_eq!(mailbox.address, "user@example.com");
        assert!(context.is_empty());
    }

    #[test]
    fn canonical_email_ignores_name_case_and_context() {
        assert_eq!(
            canonical_email("Kernel List <Kernel-Dev+bugs@Lists.Example.com>"),
            "kernel-dev@lists.example.com"
        );
        assert_eq!(canonical_email("  junk  "), "junk");
    }

    #[test]
    fn canonical_email_agrees_with_context_removal() {
        let tagged = "Bot <Bot+list+4ff3a1@Example.com>";
        let (mailbox, context) = remove_addr_context(tagged).expect("parse");
        assert_eq!(context, "4ff3a1");
        assert_eq!(canonical_email(tagged), mailbox.address.to_ascii_lowercase());
        assert_eq!(canonical_email(tagged), "bot+list@example.com");
    }

    #[test]
    fn merge_email_lists_dedupes_case_insensitively_and_keeps_order() {
        let to = strings(&["list@example.com", "a@x.org", "b@x.org"]);
        let cc = strings(&["A@X.org", "c@x.org", "not-an-address"]);
        let merged = merge_email_lists(&[to.as_slice(), cc.as_slice()]);
        assert_eq!(
            merged,
            strings(&["list@example.com", "a@x.org", "b@x.org", "c@x.org"])
        );
    }

    #[test]
    fn merge_email_lists_caps_result() {
        let many: Vec<String> = (0..80).map(|i| format!("user{}@example.com", i)).collect();
        let merged = merge_email_lists(&[many.as_slice()]);
        assert_eq!(merged.len(), MAX_EMAILS);
        assert_eq!(merged[0], "user0@example.com");
    }
}
