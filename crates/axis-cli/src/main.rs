use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

use axis_bus::EventBus;
use axis_core::{load_config, AxisConfig, RecapService, StorePoller};
use axis_schema::{Actor, AwayCheckIn, AwayLocation, NewEvent, SessionKind};
use axis_store::{EventStore, WindowQuery};
use render::{event_line, export_file_name, health_text, recap_text, transfer_text};

#[derive(Parser)]
#[command(name = "axis", version, about = "Live constraint tracking for reps and possessions")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.axis",
        help = "Config root directory (contains config/, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[arg(long, global = true, help = "Print JSON instead of text")]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct WindowArgs {
    #[arg(long, help = "Focus player id")]
    player: Option<String>,
    #[arg(long, help = "Session filter: game, practice or away")]
    session: Option<SessionKind>,
    #[arg(long, help = "Actor filter: parent or coach")]
    actor: Option<Actor>,
    #[arg(long, help = "Window size (defaults to store.window_size)")]
    limit: Option<usize>,
}

impl WindowArgs {
    fn query(&self) -> WindowQuery {
        let mut query = match self.limit {
            Some(limit) => WindowQuery::last(limit),
            None => WindowQuery::default(),
        };
        if let Some(player) = &self.player {
            query = query.subject(player.clone());
        }
        if let Some(session) = self.session {
            query = query.session(session);
        }
        if let Some(actor) = self.actor {
            query = query.actor(actor);
        }
        query
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "List roster players and the buttons each actor gets")]
    Roster,
    #[command(about = "Log one rep or possession")]
    Log {
        #[arg(help = "Outcome label, e.g. PANIC or HOLD")]
        outcome: String,
        #[arg(long, default_value = "parent", help = "parent or coach")]
        actor: Actor,
        #[arg(long, default_value = "game", help = "game, practice or away")]
        session: SessionKind,
        #[arg(long, help = "Focus player id")]
        player: Option<String>,
        #[arg(long = "tag", value_delimiter = ',', help = "Tag (repeatable)")]
        tags: Vec<String>,
        #[arg(
            long = "constraint",
            value_delimiter = ',',
            help = "Active constraint label (repeatable)"
        )]
        constraints: Vec<String>,
        #[arg(long, help = "Free-form note")]
        note: Option<String>,
    },
    #[command(about = "Log an away check-in against the weekly rule")]
    Checkin {
        #[arg(value_enum, help = "Did the rule hold under pressure")]
        answer: CheckinAnswer,
        #[arg(
            long,
            default_value = "team_practice",
            help = "team_practice, game, home or watching"
        )]
        location: AwayLocation,
        #[arg(long, help = "Focus player id")]
        player: Option<String>,
        #[arg(long, help = "Rule to answer against (defaults to away.rule)")]
        rule: Option<String>,
        #[arg(long, help = "Optional one-sentence note")]
        note: Option<String>,
    },
    #[command(about = "Remove the most recent event")]
    Undo {
        #[arg(long, help = "Only undo this player's latest event")]
        player: Option<String>,
    },
    #[command(about = "Show the latest events, newest first")]
    Recent {
        #[command(flatten)]
        window: WindowArgs,
    },
    #[command(about = "Summarize the current window")]
    Recap {
        #[command(flatten)]
        window: WindowArgs,
    },
    #[command(about = "Run the health rules on the current window")]
    Health {
        #[command(flatten)]
        window: WindowArgs,
    },
    #[command(about = "Compare one outcome between practice and game windows")]
    Transfer {
        #[arg(long, help = "Outcome label to compare")]
        outcome: String,
        #[arg(long, help = "Focus player id")]
        player: Option<String>,
        #[arg(long, help = "Window size per session")]
        limit: Option<usize>,
    },
    #[command(about = "Write the recap and recent events to a JSON index file")]
    Export {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, help = "Output path (defaults to AXIS_INDEX_<owner>.json)")]
        out: Option<PathBuf>,
    },
    #[command(about = "Reprint the recap whenever the store changes")]
    Watch {
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value = "1000", help = "Store poll interval in milliseconds")]
        interval_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CheckinAnswer {
    Held,
    Clean,
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

fn open_service(root: &Path, config: &AxisConfig, bus: &EventBus) -> Result<RecapService> {
    let db_path = config.store_path(root);
    let store = EventStore::open(&db_path)
        .with_context(|| format!("failed to open event store at {}", db_path.display()))?
        .with_publisher(bus.publisher());
    Ok(RecapService::new(
        Arc::new(store),
        config.build_engine()?,
        config.store.window_size,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Player name from the roster. Any id is accepted when no roster is set.
fn resolve_player(config: &AxisConfig, id: &str) -> Result<Option<String>> {
    match config.player(id) {
        Some(player) => Ok(Some(player.name.clone())),
        None if config.roster.is_empty() => Ok(None),
        None => Err(anyhow!("unknown player: {id}")),
    }
}

/// Note stored with each tap: the moment and its suggested constraint for
/// parents, the action for coaches, then any free text.
fn tap_note(config: &AxisConfig, actor: Actor, outcome: &str, note: Option<&str>) -> String {
    let mut text = match actor {
        Actor::Parent => format!(
            "moment={outcome}; suggest={}",
            config.suggestions.suggest(outcome)
        ),
        Actor::Coach => format!("action={outcome}"),
    };
    if let Some(extra) = note.map(str::trim).filter(|n| !n.is_empty()) {
        text.push_str("; ");
        text.push_str(extra);
    }
    text
}

/// Checks labels against the configured vocabulary and resolves the player
/// name from the roster.
#[allow(clippy::too_many_arguments)]
fn build_draft(
    config: &AxisConfig,
    outcome: &str,
    actor: Actor,
    session: SessionKind,
    player: Option<String>,
    tags: Vec<String>,
    constraints: Vec<String>,
    note: Option<String>,
) -> Result<NewEvent> {
    let vocabulary = &config.vocabulary;
    vocabulary.check_outcome(actor, outcome)?;
    vocabulary.check_tags(&tags)?;
    vocabulary.check_constraints(&constraints)?;

    let mut draft = NewEvent::new(actor, session)
        .outcome(outcome)
        .tags(tags)
        .constraints(constraints)
        .note(tap_note(config, actor, outcome, note.as_deref()));

    if let Some(id) = player {
        let name = resolve_player(config, &id)?;
        draft = draft.subject(id, name);
    }
    Ok(draft)
}

fn build_checkin(
    config: &AxisConfig,
    answer: CheckinAnswer,
    location: AwayLocation,
    player: Option<String>,
    rule: Option<String>,
    note: Option<String>,
    at: DateTime<Utc>,
) -> Result<NewEvent> {
    let rule = rule.unwrap_or_else(|| config.away.rule.clone());
    if rule.trim().is_empty() || rule.contains(':') {
        return Err(anyhow!("rule must be non-empty and contain no ':'"));
    }

    let mut checkin = AwayCheckIn::new(rule.trim(), location, answer == CheckinAnswer::Held, at);
    if let Some(note) = note {
        checkin = checkin.note(note);
    }
    let mut name = None;
    if let Some(id) = player {
        name = resolve_player(config, &id)?;
        checkin = checkin.focus_player(id);
    }
    Ok(checkin.into_draft(name)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "axis.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let root = cli.config_root;
    let config = load_config(&root.join("config"))?;

    match command {
        Commands::Validate => {
            println!(
                "Config valid. {} players, {} moments, {} actions, {} suggestion rules.",
                config.roster.len(),
                config.vocabulary.moments.len(),
                config.vocabulary.actions.len(),
                config.suggestions.rules.len()
            );
        }
        Commands::Roster => {
            if cli.json {
                print_json(&serde_json::json!({
                    "roster": config.roster,
                    "vocabulary": config.vocabulary,
                }))?;
                return Ok(());
            }
            println!("{:<12} {:<20}", "PLAYER", "NAME");
            println!("{}", "-".repeat(32));
            for player in &config.roster {
                println!("{:<12} {:<20}", player.id, player.name);
            }
            for actor in [Actor::Parent, Actor::Coach] {
                let labels: Vec<&str> = config
                    .vocabulary
                    .buttons(actor)
                    .iter()
                    .map(|b| b.label.as_str())
                    .collect();
                println!("{actor} buttons: {}", labels.join(" "));
            }
        }
        Commands::Log {
            outcome,
            actor,
            session,
            player,
            tags,
            constraints,
            note,
        } => {
            let draft = build_draft(
                &config,
                &outcome,
                actor,
                session,
                player,
                tags,
                constraints,
                note,
            )?;
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let event = service.store().insert(draft).await?;

            let mut query = WindowQuery::default();
            if let Some(subject) = &event.subject {
                query = query.subject(subject.clone());
            }
            let recap = service.recap(&query).await?;
            if cli.json {
                print_json(&serde_json::json!({ "event": event, "recap": recap }))?;
            } else {
                println!("Logged {}", event_line(&event));
                println!(
                    "Next constraint: {}",
                    service.engine().suggestions().suggest(&outcome)
                );
                println!("{}", health_text(&recap.health));
            }
        }
        Commands::Checkin {
            answer,
            location,
            player,
            rule,
            note,
        } => {
            let draft = build_checkin(&config, answer, location, player, rule, note, Utc::now())?;
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let event = service.store().insert(draft).await?;
            if cli.json {
                print_json(&event)?;
            } else {
                println!("Saved {}", event_line(&event));
            }
        }
        Commands::Undo { player } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            match service.store().undo_last(player.as_deref()).await? {
                Some(event) => {
                    if cli.json {
                        print_json(&event)?;
                    } else {
                        println!("Removed {}", event_line(&event));
                    }
                }
                None => println!("Nothing to undo."),
            }
        }
        Commands::Recent { window } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let events = service
                .store()
                .recent(&service.bounded(&window.query()))
                .await?;
            if cli.json {
                print_json(&events)?;
            } else if events.is_empty() {
                println!("No events logged yet.");
            } else {
                for event in &events {
                    println!("{}", event_line(event));
                }
            }
        }
        Commands::Recap { window } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let recap = service.recap(&window.query()).await?;
            if cli.json {
                print_json(&recap)?;
            } else {
                println!("{}", recap_text(&recap));
            }
        }
        Commands::Health { window } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let verdict = service.health(&window.query()).await?;
            if cli.json {
                print_json(&verdict)?;
            } else {
                println!("{}", health_text(&verdict));
            }
        }
        Commands::Transfer {
            outcome,
            player,
            limit,
        } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let window = WindowArgs {
                player,
                limit,
                ..WindowArgs::default()
            };
            let insight = service.transfer(&window.query(), &outcome).await?;
            if cli.json {
                print_json(&insight)?;
            } else {
                println!("{}", transfer_text(&insight));
            }
        }
        Commands::Export { window, out } => {
            let bus = EventBus::new(16);
            let service = open_service(&root, &config, &bus)?;
            let export = service
                .export_index(&window.query(), &config.app.owner_label)
                .await?;
            let path =
                out.unwrap_or_else(|| PathBuf::from(export_file_name(&config.app.owner_label)));
            let body = serde_json::to_string_pretty(&export)?;
            std::fs::write(&path, body)
                .with_context(|| format!("failed to write export: {}", path.display()))?;
            tracing::info!(path = %path.display(), total = export.recap.total, "index exported");
            println!("Exported {} reps to {}", export.recap.total, path.display());
        }
        Commands::Watch {
            window,
            interval_ms,
        } => {
            let bus = EventBus::new(64);
            let service = open_service(&root, &config, &bus)?;
            let poller = StorePoller::new(Arc::clone(service.store()), bus.publisher()).await?;
            let poll_handle = poller.spawn(Duration::from_millis(interval_ms.max(50)));
            let rx = bus.subscribe_all().await;
            let json = cli.json;

            tracing::info!(interval_ms, "watching store for changes");
            let watch = service.watch(rx, window.query(), move |recap| {
                if json {
                    match serde_json::to_string(&recap) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!("failed to encode recap: {e}"),
                    }
                } else {
                    println!("{}\n", recap_text(&recap));
                }
            });

            tokio::select! {
                result = watch => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received Ctrl+C, stopping watch");
                }
            }
            poll_handle.abort();
        }
    }

    Ok(())
}
