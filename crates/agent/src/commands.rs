//! Recognising plan actions and role questions in free text.

use uuid::Uuid;

/// A plan lifecycle action typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanCommand {
    Approve { task_id: String },
    Modify { task_id: String, feedback: String },
    Cancel { task_id: String },
    Status { task_id: String },
}

impl PlanCommand {
    /// Parse `approve <id>`, `modify <id> <feedback>`, `cancel <id>` or
    /// `status <id>`, optionally with `plan` after the verb.
    ///
    /// The id must be a UUID, so ordinary sentences starting with one of
    /// the verbs are not mistaken for commands.
    pub fn parse(input: &str) -> Option<Self> {
        let mut words = input.split_whitespace();
        let verb = words.next()?.to_ascii_lowercase();
        let mut id = words.next()?;
        if id.eq_ignore_ascii_case("plan") {
            id = words.next()?;
        }
        let id = id.trim_matches(|c: char| c == '`' || c == '"' || c == '\'');
        let task_id = Uuid::parse_str(id).ok()?.to_string();
        let rest: Vec<&str> = words.collect();

        match verb.as_str() {
            "approve" if rest.is_empty() => Some(Self::Approve { task_id }),
            "cancel" if rest.is_empty() => Some(Self::Cancel { task_id }),
            "status" if rest.is_empty() => Some(Self::Status { task_id }),
            "modify" if !rest.is_empty() => Some(Self::Modify {
                task_id,
                feedback: rest.join(" "),
            }),
            _ => None,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Approve { task_id }
            | Self::Modify { task_id, .. }
            | Self::Cancel { task_id }
            | Self::Status { task_id } => task_id,
        }
    }
}

const ROLE_QUESTIONS: &[&str] = &[
    "who are you",
    "what are you",
    "what is your role",
    "what's your role",
    "what can you do",
    "what do you do",
    "introduce yourself",
];

/// Words that may open a role question without changing it.
const LEADING_FILLER: &[&str] = &["hey", "hi", "hello", "so", "ok", "okay", "and", "but"];

/// Words that may close a role question without turning it into a task.
const TRAILING_FILLER: &[&str] = &[
    "for", "me", "us", "here", "exactly", "please", "today", "now", "again", "then", "anyway", "actually",
];

/// Whether the user is asking the agent about itself.
///
/// The whole input has to be one of the role phrases, compared word by
/// word, optionally wrapped in greeting or filler words. A request that
/// merely contains such a phrase ("what are you able to compute: 12/4")
/// is a task, not a role question.
pub fn is_role_question(input: &str) -> bool {
    let normalized: String = input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let all: Vec<&str> = normalized.split_whitespace().collect();
    let mut words = all.as_slice();
    while let Some((first, rest)) = words.split_first() {
        if !LEADING_FILLER.contains(first) {
            break;
        }
        words = rest;
    }

    ROLE_QUESTIONS.iter().any(|question| {
        let phrase: Vec<&str> = question.split_whitespace().collect();
        words.len() >= phrase.len()
            && words[..phrase.len()] == phrase[..]
            && words[phrase.len()..].iter().all(|w| TRAILING_FILLER.contains(w))
    })
}
