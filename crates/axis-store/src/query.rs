use axis_schema::{Actor, SessionKind};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;

/// Which rows form a window. Every filter is optional; `limit` bounds the
/// window to the newest N matching rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowQuery {
    pub limit: Option<usize>,
    pub subject: Option<String>,
    pub session: Option<SessionKind>,
    pub actor: Option<Actor>,
    pub since: Option<DateTime<Utc>>,
}

impl WindowQuery {
    pub fn last(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn session(mut self, session: SessionKind) -> Self {
        self.session = Some(session);
        self
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// WHERE clause (possibly empty) plus its bound values.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(subject) = &self.subject {
            values.push(Value::Text(subject.clone()));
            clauses.push(format!("subject_id = ?{}", values.len()));
        }
        if let Some(session) = self.session {
            values.push(Value::Text(session.as_str().to_string()));
            clauses.push(format!("session = ?{}", values.len()));
        }
        if let Some(actor) = self.actor {
            values.push(Value::Text(actor.as_str().to_string()));
            clauses.push(format!("actor = ?{}", values.len()));
        }
        if let Some(since) = self.since {
            values.push(Value::Text(format_ts(&since)));
            clauses.push(format!("created_at >= ?{}", values.len()));
        }

        let mut sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        if let Some(limit) = self.limit {
            // a negative LIMIT means "no limit" to SQLite
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(
                " ORDER BY created_at DESC, id DESC LIMIT ?{}",
                values.len()
            ));
        } else {
            sql.push_str(" ORDER BY created_at DESC, id DESC");
        }
        (sql, values)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
