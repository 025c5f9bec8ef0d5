use minijinja::Environment;
use serde::Serialize;

use crate::mail::BOT_NAME;

/// Which mail template renders a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTemplate {
    Bug,
    TestResult,
}

impl ReportTemplate {
    pub fn name(self) -> &'static str {
        match self {
            ReportTemplate::Bug => "mail_bug.txt",
            ReportTemplate::TestResult => "mail_test_result.txt",
        }
    }
}

pub struct MailTemplates {
    env: Environment<'static>,
}

impl MailTemplates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_global("bot_name", BOT_NAME);
        env.add_template(
            ReportTemplate::Bug.name(),
            include_str!("../templates/mail_bug.txt"),
        )?;
        env.add_template(
            ReportTemplate::TestResult.name(),
            include_str!("../templates/mail_test_result.txt"),
        )?;
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(
        &self,
        template: ReportTemplate,
        data: S,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template(template.name())?.render(data)
    }
}
