//! Email reporting channel for a bug dashboard.
//!
//! Outbound, [`poller::ReportPoller`] mails newly reportable bugs and finished
//! test jobs to their configured lists. Inbound, [`inbound::InboundHandler`]
//! turns replies to those emails into dashboard updates. The bug id travels in
//! the sender address (`bot+<id>@host`), so replies need no lookup to find
//! their bug.

pub mod command;
pub mod config;
pub mod inbound;
pub mod loop_guard;
pub mod mail;
pub mod mailer;
pub mod poller;
pub mod report;
pub mod server;
pub mod store;
pub mod templates;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use command::{BugStatus, BugUpdate, Command, CommandAction, CommandRejection, ReproLevel};
pub use config::{EmailConfig, ReportingConfig, ServiceConfig};
pub use inbound::InboundHandler;
pub use loop_guard::MailingLists;
pub use mailer::{MailError, Mailer};
pub use poller::{PollError, ReportError, ReportPoller};
pub use report::{BugReport, JobReport};
pub use server::{router, run_server, AppState};
pub use store::{BugStore, CommandOutcome, DashboardClient, StoreError, TestRequest, TestRequests};
pub use templates::{MailTemplates, ReportTemplate};
