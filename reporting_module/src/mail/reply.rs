use super::COMMAND_PREFIX;

/// Quotes `email` line by line and inserts `reply` right after the first
/// command line, or after the whole quote when the email has no command.
pub fn form_reply(email: &str, reply: &str) -> String {
    let mut out = String::with_capacity(email.len() + reply.len() + 16);
    let mut replied = false;
    for line in email.lines() {
        out.push_str("> ");
        out.push_str(line);
        out.push('\n');
        if !replied && line.starts_with(COMMAND_PREFIX) {
            replied = true;
            write_reply(&mut out, reply);
        }
    }
    if !replied {
        write_reply(&mut out, reply);
    }
    out
}

fn write_reply(out: &mut String, reply: &str) {
    out.push('\n');
    out.push_str(reply);
    if !reply.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
}
