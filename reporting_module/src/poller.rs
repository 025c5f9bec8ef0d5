//! Outbound half of the channel: turns reportable bugs and finished test
//! jobs into emails and tells the dashboard what was sent.

use std::sync::Arc;

use tracing::error;

use crate::command::{BugStatus, BugUpdate};
use crate::config::{ConfigError, EmailConfig, EMAIL_DESTINATION};
use crate::mail::merge_email_lists;
use crate::mailer::{MailError, Mailer};
use crate::report::BugReport;
use crate::store::{BugStore, StoreError};
use crate::templates::{MailTemplates, ReportTemplate};

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("bug poll failed: {0}")]
    Bugs(#[source] StoreError),
    #[error("job poll failed: {0}")]
    Jobs(#[source] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to render {template}: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },
    #[error(transparent)]
    Mail(#[from] MailError),
}

pub struct ReportPoller {
    store: Arc<dyn BugStore>,
    mailer: Arc<Mailer>,
    templates: Arc<MailTemplates>,
}

impl ReportPoller {
    pub fn new(store: Arc<dyn BugStore>, mailer: Arc<Mailer>, templates: Arc<MailTemplates>) -> Self {
        Self {
            store,
            mailer,
            templates,
        }
    }

    /// One cron tick: new bugs first, then finished jobs.
    pub fn run_poll_cycle(&self) -> Result<(), PollError> {
        self.poll_bugs()?;
        self.poll_jobs()?;
        Ok(())
    }

    fn poll_bugs(&self) -> Result<(), PollError> {
        let reports = self
            .store
            .reporting_poll(EMAIL_DESTINATION)
            .map_err(PollError::Bugs)?;
        for report in &reports {
            if let Err(err) = self.report_bug(report, ReportTemplate::Bug) {
                error!("failed to report bug {}: {}", report.id, err);
                continue;
            }
            let update = BugUpdate {
                id: report.id.clone(),
                status: BugStatus::Open,
                repro_level: Some(report.repro_level()),
                ..Default::default()
            };
            match self.store.apply_command(&update) {
                Ok(outcome) if outcome.accepted => {}
                Ok(outcome) => error!(
                    "failed to update reported bug {}: rejected: {}",
                    report.id, outcome.reason
                ),
                Err(err) => error!("failed to update reported bug {}: {}", report.id, err),
            }
        }
        Ok(())
    }

    fn poll_jobs(&self) -> Result<(), PollError> {
        let jobs = self
            .store
            .poll_completed_jobs(EMAIL_DESTINATION)
            .map_err(PollError::Jobs)?;
        for job in &jobs {
            if let Err(err) = self.report_bug(&job.report, ReportTemplate::TestResult) {
                error!("failed to report job {}: {}", job.job_id, err);
                continue;
            }
            if let Err(err) = self.store.mark_job_reported(&job.job_id) {
                error!("failed to mark job {} reported: {}", job.job_id, err);
            }
        }
        Ok(())
    }

    /// Renders and sends a single report to every destination its config
    /// and CC list name.
    pub fn report_bug(&self, report: &BugReport, template: ReportTemplate) -> Result<(), ReportError> {
        let config = EmailConfig::from_json(&report.config)?;
        let mut primary = vec![config.email.clone()];
        if config.mail_maintainers {
            primary.extend(report.maintainers.iter().cloned());
        }
        let to = merge_email_lists(&[primary.as_slice(), report.cc.as_slice()]);
        let body = self
            .templates
            .render(template, report.template_data(&config))
            .map_err(|source| ReportError::Template {
                template: template.name(),
                source,
            })?;
        self.mailer.send_report(
            &report.id,
            &report.title,
            to,
            &report.ext_id,
            report.attachments(),
            body,
        )?;
        Ok(())
    }
}
