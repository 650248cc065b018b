use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod away;

pub use away::*;

/// Who tapped the button.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Flags moments as evidence, never coaches live.
    #[default]
    Parent,
    /// Logs actions and confirms constraints.
    Coach,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Parent => "parent",
            Actor::Coach => "coach",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parent" => Ok(Actor::Parent),
            "coach" => Ok(Actor::Coach),
            other => Err(format!("unknown actor: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    #[default]
    Game,
    Practice,
    /// Check-in logged away from the parent (team practice, watching games).
    Away,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Game => "game",
            SessionKind::Practice => "practice",
            SessionKind::Away => "away",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "game" => Ok(SessionKind::Game),
            "practice" => Ok(SessionKind::Practice),
            "away" => Ok(SessionKind::Away),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// One logged rep or possession. Immutable once stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Row id assigned by the event store
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraint_labels: Vec<String>,
    /// Focus player id
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub actor: Actor,
    #[serde(default)]
    pub session: SessionKind,
    #[serde(default)]
    pub note: Option<String>,
}

impl Event {
    pub fn new(id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            ..Self::default()
        }
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = dedup_symbols(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_constraints<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint_labels = dedup_symbols(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_session(mut self, session: SessionKind) -> Self {
        self.session = session;
        self
    }
}

/// A tap that has not been stored yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEvent {
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraint_labels: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub actor: Actor,
    #[serde(default)]
    pub session: SessionKind,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewEvent {
    pub fn new(actor: Actor, session: SessionKind) -> Self {
        Self {
            actor,
            session,
            ..Self::default()
        }
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = dedup_symbols(tags.into_iter().map(Into::into));
        self
    }

    pub fn constraints<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraint_labels = dedup_symbols(labels.into_iter().map(Into::into));
        self
    }

    pub fn subject(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.subject = Some(id.into());
        self.subject_name = name;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        let trimmed = note.trim();
        self.note = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Attach the store-assigned identity.
    pub fn into_event(self, id: i64, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            created_at,
            outcome: self.outcome,
            tags: dedup_symbols(self.tags),
            constraint_labels: dedup_symbols(self.constraint_labels),
            subject: self.subject,
            subject_name: self.subject_name,
            actor: self.actor,
            session: self.session,
            note: self.note,
        }
    }
}

/// Trims symbols, drops blanks and repeats, keeps first occurrence order.
pub fn dedup_symbols<I>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for symbol in symbols {
        let trimmed = symbol.trim();
        if trimmed.is_empty() || out.iter().any(|s| s == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    EventLogged { event: Event },
    /// `id` and `subject` are unknown when the removal was only inferred
    /// from a shrinking row count.
    EventRemoved {
        id: Option<i64>,
        subject: Option<String>,
    },
}
