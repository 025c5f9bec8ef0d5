//! Vocabulary of bug state transitions and the inbound commands that request them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    #[default]
    Open,
    Update,
    Upstream,
    Invalid,
    Dup,
}

/// Strongest reproduction evidence available for a bug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproLevel {
    #[default]
    None,
    Syz,
    C,
}

/// State transition request sent to the dashboard. Built fresh for every
/// outbound report and every inbound command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ext_id: String,
    pub status: BugStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repro_level: Option<ReproLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_commits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dup_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
}

/// Command keyword found in an inbound email. Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// No keyword: the email is a plain comment on the bug.
    Update,
    Upstream,
    Invalid,
    Fix(String),
    Dup(String),
    Test(String),
    Unknown(String),
}

impl Command {
    pub fn from_keyword(keyword: &str, args: &str) -> Self {
        match keyword {
            "" => Command::Update,
            "upstream" => Command::Upstream,
            "invalid" => Command::Invalid,
            "fix:" => Command::Fix(args.trim().to_string()),
            "dup:" => Command::Dup(args.trim().to_string()),
            "test:" => Command::Test(args.to_string()),
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Resolves the command into what should happen, or into a rejection the
    /// sender can fix by resending a corrected command.
    pub fn into_action(self, testing_enabled: bool) -> Result<CommandAction, CommandRejection> {
        let transition = match self {
            Command::Update => Transition::status(BugStatus::Update),
            Command::Upstream => Transition::status(BugStatus::Upstream),
            Command::Invalid => Transition::status(BugStatus::Invalid),
            Command::Fix(title) => {
                if title.is_empty() {
                    return Err(CommandRejection::NoCommitTitle);
                }
                Transition {
                    status: BugStatus::Open,
                    fix_commits: vec![title],
                    dup_of: None,
                }
            }
            Command::Dup(title) => {
                if title.is_empty() {
                    return Err(CommandRejection::NoDupTitle);
                }
                Transition {
                    status: BugStatus::Dup,
                    fix_commits: Vec::new(),
                    dup_of: Some(title),
                }
            }
            Command::Test(args) => {
                if !testing_enabled {
                    return Err(CommandRejection::TestingDisabled);
                }
                let (repo, branch) = parse_test_args(&args)?;
                return Ok(CommandAction::Test { repo, branch });
            }
            Command::Unknown(keyword) => return Err(CommandRejection::Unknown(keyword)),
        };
        Ok(CommandAction::Transition(transition))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    Transition(Transition),
    /// Test a patch on the given tree; handled outside the update path.
    Test { repo: String, branch: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: BugStatus,
    pub fix_commits: Vec<String>,
    pub dup_of: Option<String>,
}

impl Transition {
    fn status(status: BugStatus) -> Self {
        Self {
            status,
            fix_commits: Vec::new(),
            dup_of: None,
        }
    }
}

/// Problems with the shape of a command. The message is mailed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    #[error("no commit title")]
    NoCommitTitle,
    #[error("no dup title")]
    NoDupTitle,
    #[error("testing is experimental")]
    TestingDisabled,
    #[error("want 2 args (repo, branch), got {0}")]
    TestArgCount(usize),
    #[error("unknown command {0:?}")]
    Unknown(String),
}

fn parse_test_args(args: &str) -> Result<(String, String), CommandRejection> {
    let parts: Vec<&str> = args.split(' ').collect();
    match parts.as_slice() {
        [repo, branch] => Ok((repo.to_string(), branch.to_string())),
        _ => Err(CommandRejection::TestArgCount(parts.len())),
    }
}
