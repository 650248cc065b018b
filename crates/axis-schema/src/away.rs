use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{Actor, NewEvent, SessionKind};

/// Where the player was when the parent checked in from a distance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AwayLocation {
    #[default]
    TeamPractice,
    Game,
    Home,
    Watching,
}

impl AwayLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            AwayLocation::TeamPractice => "team_practice",
            AwayLocation::Game => "game",
            AwayLocation::Home => "home",
            AwayLocation::Watching => "watching",
        }
    }
}

impl fmt::Display for AwayLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwayLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "team_practice" => Ok(AwayLocation::TeamPractice),
            "game" => Ok(AwayLocation::Game),
            "home" => Ok(AwayLocation::Home),
            "watching" => Ok(AwayLocation::Watching),
            other => Err(format!("unknown away location: {other}")),
        }
    }
}

/// ISO week key such as `2026-W07`.
pub fn week_key(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// A yes/no answer to "did the weekly rule hold under pressure", logged
/// while away from the player. Stored as an away-session event whose note
/// carries this record as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwayCheckIn {
    pub week_key: String,
    pub rule: String,
    #[serde(default)]
    pub focus_player: Option<String>,
    pub location: AwayLocation,
    pub held_under_pressure: bool,
    #[serde(default)]
    pub note: String,
    pub ts: DateTime<Utc>,
}

impl AwayCheckIn {
    pub fn new(
        rule: impl Into<String>,
        location: AwayLocation,
        held_under_pressure: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            week_key: week_key(at),
            rule: rule.into(),
            focus_player: None,
            location,
            held_under_pressure,
            note: String::new(),
            ts: at,
        }
    }

    pub fn focus_player(mut self, id: impl Into<String>) -> Self {
        self.focus_player = Some(id.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into().trim().to_string();
        self
    }

    /// Outcome label: `AWAY:<rule>:HOLD` or `AWAY:<rule>:CLEAN`.
    pub fn label(&self) -> String {
        let answer = if self.held_under_pressure {
            "HOLD"
        } else {
            "CLEAN"
        };
        format!("AWAY:{}:{answer}", self.rule)
    }

    pub fn into_draft(self, player_name: Option<String>) -> Result<NewEvent, serde_json::Error> {
        let mut draft = NewEvent::new(Actor::Parent, SessionKind::Away).outcome(self.label());
        if let Some(id) = &self.focus_player {
            draft = draft.subject(id.clone(), player_name);
        }
        draft.note = Some(serde_json::to_string(&self)?);
        Ok(draft)
    }

    /// Recover a check-in from a stored note. `None` for ordinary notes.
    pub fn from_note(note: &str) -> Option<Self> {
        serde_json::from_str(note).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 17, 0, 0).unwrap()
    }

    #[test]
    fn week_key_uses_iso_weeks() {
        assert_eq!(week_key(at()), "2026-W07");
        // Jan 1 2027 is a Friday, still in the last ISO week of 2026
        let new_year = Utc.with_ymd_and_hms(2027, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(week_key(new_year), "2026-W53");
    }

    #[test]
    fn label_reflects_answer() {
        let held = AwayCheckIn::new("SEE2", AwayLocation::Game, true, at());
        let clean = AwayCheckIn::new("SEE2", AwayLocation::Game, false, at());
        assert_eq!(held.label(), "AWAY:SEE2:HOLD");
        assert_eq!(clean.label(), "AWAY:SEE2:CLEAN");
    }

    #[test]
    fn draft_is_an_away_parent_event_with_packed_note() {
        let checkin = AwayCheckIn::new("SEE2", AwayLocation::Watching, true, at())
            .focus_player("cole")
            .note("  kept eyes up on the press ");
        let draft = checkin.clone().into_draft(Some("Cole".into())).unwrap();

        assert_eq!(draft.actor, Actor::Parent);
        assert_eq!(draft.session, SessionKind::Away);
        assert_eq!(draft.outcome.as_deref(), Some("AWAY:SEE2:HOLD"));
        assert_eq!(draft.subject_name.as_deref(), Some("Cole"));

        let note = draft.note.unwrap();
        let json: serde_json::Value = serde_json::from_str(&note).unwrap();
        assert_eq!(json["weekKey"], "2026-W07");
        assert_eq!(json["location"], "watching");
        assert_eq!(json["heldUnderPressure"], true);
        assert_eq!(AwayCheckIn::from_note(&note), Some(checkin));
    }

    #[test]
    fn plain_notes_are_not_checkins() {
        assert!(AwayCheckIn::from_note("moment=PANIC; suggest=HOLD").is_none());
        assert_eq!(
            "Team-Practice".parse::<AwayLocation>().unwrap(),
            AwayLocation::TeamPractice
        );
    }
}
