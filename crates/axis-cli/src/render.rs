use axis_engine::{HealthVerdict, RankedShare, Recap, TransferInsight};
use axis_schema::{AwayCheckIn, Event};

pub fn export_file_name(owner_label: &str) -> String {
    let owner: Vec<&str> = owner_label.split_whitespace().collect();
    format!("AXIS_INDEX_{}.json", owner.join("_"))
}

pub fn event_line(event: &Event) -> String {
    let mut line = format!(
        "#{:<5} {} {:<10}",
        event.id,
        event.created_at.format("%Y-%m-%d %H:%M:%S"),
        event.outcome.as_deref().unwrap_or("-"),
    );
    if let Some(subject) = event.subject_name.as_deref().or(event.subject.as_deref()) {
        line.push_str(&format!(" {subject}"));
    }
    line.push_str(&format!(" ({}, {})", event.session, event.actor));
    if !event.tags.is_empty() {
        line.push_str(&format!(" tags={}", event.tags.join(",")));
    }
    if !event.constraint_labels.is_empty() {
        line.push_str(&format!(" constraints={}", event.constraint_labels.join(",")));
    }
    if let Some(note) = &event.note {
        match AwayCheckIn::from_note(note) {
            Some(checkin) => {
                let answer = if checkin.held_under_pressure {
                    "held"
                } else {
                    "clean"
                };
                line.push_str(&format!(" {} {answer} {}", checkin.week_key, checkin.location));
                if !checkin.note.is_empty() {
                    line.push_str(&format!(" \"{}\"", checkin.note));
                }
            }
            None => line.push_str(&format!(" \"{note}\"")),
        }
    }
    line
}

fn shares_line(label: &str, shares: &[RankedShare]) -> String {
    if shares.is_empty() {
        return format!("{label:<12} -");
    }
    let parts: Vec<String> = shares
        .iter()
        .map(|s| format!("{} {} ({}%)", s.symbol, s.count, s.percent))
        .collect();
    format!("{label:<12} {}", parts.join(", "))
}

pub fn health_text(verdict: &HealthVerdict) -> String {
    if verdict.insufficient_data {
        return "Health: ok (not enough reps yet)".to_string();
    }
    if !verdict.is_warn() {
        return "Health: ok".to_string();
    }
    let mut out = String::from("Health: WARN");
    for flag in &verdict.flags {
        out.push_str(&format!("\n  ! {flag}"));
    }
    for suggestion in &verdict.suggestions {
        out.push_str(&format!("\n  > {suggestion}"));
    }
    out
}

pub fn recap_text(recap: &Recap) -> String {
    let mut lines = vec![format!("Reps in window: {}", recap.total)];
    lines.push(shares_line("Outcomes:", &recap.outcomes));
    lines.push(shares_line("Tags:", &recap.tags));
    lines.push(shares_line("Constraints:", &recap.constraints));
    if let Some(last) = &recap.last_event {
        lines.push(format!("Last: {}", event_line(last)));
    }
    if let Some(next) = &recap.next_constraint {
        lines.push(format!("Next constraint: {next}"));
    }
    lines.push(health_text(&recap.health));
    lines.join("\n")
}

pub fn transfer_text(insight: &TransferInsight) -> String {
    match insight {
        TransferInsight::Insufficient {
            practice_total,
            game_total,
        } => format!(
            "Not enough reps to compare ({practice_total} practice, {game_total} game)"
        ),
        TransferInsight::Transferring {
            outcome,
            practice_percent,
            game_percent,
        } => format!(
            "{outcome} is transferring: {practice_percent}% in practice, {game_percent}% in games"
        ),
        TransferInsight::NotTransferring { message, .. } => message.clone(),
    }
}
