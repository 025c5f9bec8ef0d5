use std::sync::LazyLock;

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use regex::Regex;

use super::address::{merge_email_lists, remove_addr_context, AddressError, Mailbox};
use super::COMMAND_PREFIX;

// Footer Google Groups appends to every list delivery.
static GROUPS_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^To view this discussion on the web visit (https://groups\.google\.com/\S+?)\.?\r?$")
        .unwrap()
});

const DIFF_LINE_PREFIXES: [&str; 16] = [
    "diff ",
    "index ",
    "--- ",
    "+++ ",
    "@@",
    "+",
    "-",
    " ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "rename from",
    "rename to",
    "\\ No newline",
];

/// An inbound email reduced to what the command interpreter needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Bug identifier recovered from a tagged own address among the recipients.
    pub bug_id: Option<String>,
    pub message_id: String,
    pub link: Option<String>,
    pub subject: String,
    pub from: String,
    /// Recipients other than the bot itself, as bare addresses.
    pub cc: Vec<String>,
    pub body: String,
    pub patch: Option<String>,
    /// Command keyword; empty when the email carries no command.
    pub command: String,
    pub command_args: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to parse MIME structure: {0}")]
    Mime(#[from] mailparse::MailParseError),
    #[error("missing From header")]
    MissingFrom,
    #[error("bad From header: {0}")]
    BadFrom(AddressError),
    #[error("bad own address: {0}")]
    OwnAddress(AddressError),
}

/// Parses a raw RFC 5322 message received by `own_email`.
pub fn parse(raw: &[u8], own_email: &str) -> Result<ParsedMessage, ParseError> {
    let own = Mailbox::parse(own_email).map_err(ParseError::OwnAddress)?;
    let mail = mailparse::parse_mail(raw)?;

    let from_header = mail
        .headers
        .get_first_header("From")
        .ok_or(ParseError::MissingFrom)?;
    let from = Mailbox::from_header(from_header).map_err(ParseError::BadFrom)?;

    let mut bug_id = None;
    let mut cc = Vec::new();
    for recipient in recipients(&mail) {
        let Ok((mailbox, context)) = remove_addr_context(&recipient) else {
            continue;
        };
        if mailbox.address.eq_ignore_ascii_case(&own.address) {
            if bug_id.is_none() && !context.is_empty() {
                bug_id = Some(context);
            }
        } else {
            cc.push(recipient);
        }
    }
    let cc = merge_email_lists(&[cc.as_slice()]);

    let mut body = None;
    let mut attachments = Vec::new();
    collect_parts(&mail, &mut body, &mut attachments)?;
    let body = body.unwrap_or_default();
    let patch = attachments
        .iter()
        .find_map(|text| extract_patch(text))
        .or_else(|| extract_patch(&body));
    let (command, command_args) = extract_command(&body);
    let link = extract_link(&body);

    Ok(ParsedMessage {
        bug_id,
        message_id: header_or_empty(&mail, "Message-ID"),
        link,
        subject: header_or_empty(&mail, "Subject"),
        from: from.to_string(),
        cc,
        body,
        patch,
        command,
        command_args,
    })
}

fn header_or_empty(mail: &ParsedMail<'_>, name: &str) -> String {
    mail.headers
        .get_first_value(name)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn recipients(mail: &ParsedMail<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for name in ["To", "Cc"] {
        for header in mail.headers.get_all_headers(name) {
            let Ok(list) = mailparse::addrparse_header(header) else {
                continue;
            };
            for addr in list.iter() {
                match addr {
                    MailAddr::Single(info) => out.push(info.addr.clone()),
                    MailAddr::Group(group) => {
                        out.extend(group.addrs.iter().map(|info| info.addr.clone()))
                    }
                }
            }
        }
    }
    out
}

// The first inline text/plain part is the body; text attachments are kept
// as patch candidates.
fn collect_parts(
    part: &ParsedMail<'_>,
    body: &mut Option<String>,
    attachments: &mut Vec<String>,
) -> Result<(), mailparse::MailParseError> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, body, attachments)?;
        }
        return Ok(());
    }
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    if matches!(
        part.get_content_disposition().disposition,
        DispositionType::Attachment
    ) {
        if mimetype.starts_with("text/") {
            attachments.push(part.get_body()?);
        }
        return Ok(());
    }
    if body.is_none() && mimetype == "text/plain" {
        *body = Some(part.get_body()?);
    }
    Ok(())
}

fn extract_command(body: &str) -> (String, String) {
    for line in body.lines() {
        let Some(rest) = line.strip_prefix(COMMAND_PREFIX) else {
            continue;
        };
        let rest = rest.trim();
        return match rest.find(char::is_whitespace) {
            Some(pos) => (rest[..pos].to_string(), rest[pos..].trim().to_string()),
            None => (rest.to_string(), String::new()),
        };
    }
    (String::new(), String::new())
}

fn extract_link(body: &str) -> Option<String> {
    GROUPS_LINK_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|link| link.as_str().to_string())
}

/// Returns the first unified diff in `text`, if it contains at least one hunk.
fn extract_patch(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().enumerate().position(|(idx, line)| {
        line.starts_with("diff --git ")
            || (line.starts_with("--- ")
                && lines
                    .get(idx + 1)
                    .is_some_and(|next| next.starts_with("+++ ")))
    })?;
    let mut patch = String::new();
    let mut has_hunk = false;
    for line in &lines[start..] {
        if *line == "--" || *line == "-- " {
            break;
        }
        if !DIFF_LINE_PREFIXES
            .iter()
            .any(|prefix| line.starts_with(prefix))
        {
            break;
        }
        has_hunk |= line.starts_with("@@");
        patch.push_str(line);
        patch.push('\n');
    }
    has_hunk.then_some(patch)
}
