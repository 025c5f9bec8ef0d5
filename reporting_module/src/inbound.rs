//! Inbound half of the channel: every email sent to the bot address lands
//! here, gets interpreted as a command and turns into a dashboard update or a
//! reply explaining what was wrong with it.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::command::{BugUpdate, Command, CommandAction};
use crate::loop_guard::MailingLists;
use crate::mail::{self, canonical_email, ParseError, ParsedMessage};
use crate::mailer::{MailError, Mailer};
use crate::store::{BugStore, TestRequest, TestRequests};

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("failed to parse incoming email: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to reply: {0}")]
    Reply(#[from] MailError),
}

pub struct InboundHandler {
    store: Arc<dyn BugStore>,
    tests: Arc<dyn TestRequests>,
    mailer: Arc<Mailer>,
    mailing_lists: Arc<MailingLists>,
    testing_enabled: bool,
}

impl InboundHandler {
    pub fn new(
        store: Arc<dyn BugStore>,
        tests: Arc<dyn TestRequests>,
        mailer: Arc<Mailer>,
        mailing_lists: Arc<MailingLists>,
        testing_enabled: bool,
    ) -> Self {
        Self {
            store,
            tests,
            mailer,
            mailing_lists,
            testing_enabled,
        }
    }

    /// Processes one raw RFC 5322 message. Failures end up in the log only;
    /// the relay that delivered the message always gets a success.
    pub fn handle(&self, raw: &[u8]) {
        if let Err(err) = self.incoming_mail(raw) {
            error!("{}", err);
        }
    }

    fn incoming_mail(&self, raw: &[u8]) -> Result<(), InboundError> {
        let msg = mail::parse(raw, self.mailer.own_address())?;
        info!(
            "received email: subject {:?}, from {:?}, cc {:?}, msg {:?}, bug {:?}, cmd {:?}, link {:?}",
            msg.subject, msg.from, msg.cc, msg.message_id, msg.bug_id, msg.command, msg.link
        );
        // Lists we post to can deliver a copy of a command back to us.
        if !msg.command.is_empty() && self.mailing_lists.contains(&msg.from) {
            info!("duplicate email from mailing list, ignoring");
            return Ok(());
        }

        let command = Command::from_keyword(&msg.command, &msg.command_args);
        let transition = match command.into_action(self.testing_enabled) {
            Ok(CommandAction::Transition(transition)) => transition,
            Ok(CommandAction::Test { repo, branch }) => return self.test_request(&msg, repo, branch),
            Err(rejection) => return self.reply(&msg, &rejection.to_string()),
        };

        let update = BugUpdate {
            id: msg.bug_id.clone().unwrap_or_default(),
            ext_id: msg.message_id.clone(),
            status: transition.status,
            repro_level: None,
            fix_commits: transition.fix_commits,
            dup_of: transition.dup_of,
            link: msg.link.clone(),
            cc: msg.cc.clone(),
        };
        let outcome = match self.store.apply_command(&update) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("update for bug {:?} failed: {}", update.id, err);
                return Ok(());
            }
        };
        if !outcome.accepted && !outcome.reason.is_empty() {
            return self.reply(&msg, &outcome.reason);
        }
        Ok(())
    }

    fn test_request(&self, msg: &ParsedMessage, repo: String, branch: String) -> Result<(), InboundError> {
        let request = TestRequest {
            bug_id: msg.bug_id.clone().unwrap_or_default(),
            user: canonical_email(&msg.from),
            ext_id: msg.message_id.clone(),
            patch: msg.patch.clone(),
            repo,
            branch,
        };
        match self.tests.handle_test_request(&request) {
            Ok(reply) if reply.is_empty() => Ok(()),
            Ok(reply) => self.reply(msg, &reply),
            Err(err) => {
                error!("test request for bug {:?} failed: {}", request.bug_id, err);
                Ok(())
            }
        }
    }

    fn reply(&self, msg: &ParsedMessage, reply: &str) -> Result<(), InboundError> {
        self.mailer.reply_to(msg, reply, None)?;
        Ok(())
    }
}
