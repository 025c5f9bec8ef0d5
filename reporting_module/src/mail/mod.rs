//! Email plumbing shared by the report poller and the inbound interpreter:
//! address tagging, canonicalization, list merging, reply quoting and MIME
//! parsing of inbound messages.

mod address;
mod parse;
mod reply;

pub use address::{
    add_addr_context, canonical_email, merge_email_lists, remove_addr_context, AddressError,
    Mailbox,
};
pub use parse::{parse, ParseError, ParsedMessage};
pub use reply::form_reply;

/// Display name of every outbound email; also names the command prefix.
pub const BOT_NAME: &str = "bugbot";

/// Lines starting with this prefix carry a command to the bot. Always
/// `#` followed by [`BOT_NAME`] and a space.
pub const COMMAND_PREFIX: &str = "#bugbot ";
