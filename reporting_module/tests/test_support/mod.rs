#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reporting_module::{
    BugReport, BugStore, BugUpdate, CommandOutcome, InboundHandler, JobReport, MailTemplates,
    Mailer, MailingLists, ReportPoller, StoreError, TestRequest, TestRequests,
};
use send_emails_module::{MailTransport, OutboundEmail, SendEmailError, SendEmailResponse};

pub const OWN_ADDRESS: &str = "\"bugbot\" <bot@example.com>";
pub const LIST: &str = "kernel-bugs@lists.example.org";

/// Dashboard stand-in that records every write.
#[derive(Default)]
pub struct FakeStore {
    pub reports: Mutex<Vec<BugReport>>,
    pub jobs: Mutex<Vec<JobReport>>,
    pub updates: Mutex<Vec<BugUpdate>>,
    pub reported_jobs: Mutex<Vec<String>>,
    pub reject_with: Mutex<Option<String>>,
    pub fail_updates: AtomicBool,
}

impl FakeStore {
    pub fn updates(&self) -> Vec<BugUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl BugStore for FakeStore {
    fn reporting_poll(&self, channel: &str) -> Result<Vec<BugReport>, StoreError> {
        assert_eq!(channel, "email");
        Ok(self.reports.lock().unwrap().clone())
    }

    fn poll_completed_jobs(&self, channel: &str) -> Result<Vec<JobReport>, StoreError> {
        assert_eq!(channel, "email");
        Ok(self.jobs.lock().unwrap().clone())
    }

    fn apply_command(&self, update: &BugUpdate) -> Result<CommandOutcome, StoreError> {
        self.updates.lock().unwrap().push(update.clone());
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Other("dashboard unavailable".to_string()));
        }
        Ok(match self.reject_with.lock().unwrap().clone() {
            Some(reason) => CommandOutcome::rejected(reason),
            None => CommandOutcome::accepted(),
        })
    }

    fn mark_job_reported(&self, job_id: &str) -> Result<(), StoreError> {
        self.reported_jobs.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTests {
    pub requests: Mutex<Vec<TestRequest>>,
    pub reply: Mutex<String>,
}

impl TestRequests for FakeTests {
    fn handle_test_request(&self, request: &TestRequest) -> Result<String, StoreError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub fail: AtomicBool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, email: &OutboundEmail) -> Result<SendEmailResponse, SendEmailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendEmailError::Api {
                status: 500,
                message: "transport down".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(SendEmailResponse {
            message_id: format!("<sent-{}@example.com>", sent.len()),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
        })
    }
}

pub struct Harness {
    pub store: Arc<FakeStore>,
    pub tests: Arc<FakeTests>,
    pub transport: Arc<RecordingTransport>,
    pub poller: Arc<ReportPoller>,
    pub inbound: Arc<InboundHandler>,
}

pub fn harness(testing_enabled: bool) -> Harness {
    let store = Arc::new(FakeStore::default());
    let tests = Arc::new(FakeTests::default());
    let transport = Arc::new(RecordingTransport::default());
    let mailer = Arc::new(Mailer::new(transport.clone(), OWN_ADDRESS));
    let templates = Arc::new(MailTemplates::new().expect("templates"));
    let mailing_lists = Arc::new([LIST].into_iter().collect::<MailingLists>());
    Harness {
        poller: Arc::new(ReportPoller::new(store.clone(), mailer.clone(), templates)),
        inbound: Arc::new(InboundHandler::new(
            store.clone(),
            tests.clone(),
            mailer,
            mailing_lists,
            testing_enabled,
        )),
        store,
        tests,
        transport,
    }
}

pub fn email_config(moderation: bool, mail_maintainers: bool) -> Vec<u8> {
    serde_json::json!({
        "email": LIST,
        "moderation": moderation,
        "mail_maintainers": mail_maintainers,
    })
    .to_string()
    .into_bytes()
}

/// Builds a raw inbound email the way a mail client would.
pub fn inbound_email(from: &str, to: &str, cc: &[&str], body: &str) -> Vec<u8> {
    let mut builder = lettre::Message::builder()
        .from(from.parse().expect("from"))
        .to(to.parse().expect("to"))
        .subject("Re: KASAN: use-after-free Read in foo")
        .message_id(Some("<reply-1@example.org>".to_string()));
    for addr in cc {
        builder = builder.cc(addr.parse().expect("cc"));
    }
    builder.body(body.to_string()).expect("message").formatted()
}
