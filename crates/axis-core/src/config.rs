use std::{collections::HashSet, fs, path::Path, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use axis_engine::{Engine, EngineConfig, EngineSettings, SuggestionMap};
use axis_schema::Actor;
use serde::{Deserialize, Serialize};

fn default_app_name() -> String {
    "axis".to_string()
}

fn default_owner_label() -> String {
    "Coach V".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Shown on exports
    #[serde(default = "default_owner_label")]
    pub owner_label: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            owner_label: default_owner_label(),
        }
    }
}

fn default_store_path() -> String {
    "data/axis.db".to_string()
}

fn default_window_size() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Relative paths resolve against the config root
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            window_size: default_window_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    #[serde(default)]
    pub sub: Option<String>,
}

fn default_away_rule() -> String {
    "SEE2".to_string()
}

/// Rule of the week that away check-ins answer against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwayConfig {
    #[serde(default = "default_away_rule")]
    pub rule: String,
}

impl Default for AwayConfig {
    fn default() -> Self {
        Self {
            rule: default_away_rule(),
        }
    }
}

/// Labels each front end offers. An empty list leaves that axis open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub moments: Vec<Button>,
    #[serde(default)]
    pub actions: Vec<Button>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl VocabularyConfig {
    /// Outcome buttons for this actor: parents flag moments, coaches log actions.
    pub fn buttons(&self, actor: Actor) -> &[Button] {
        match actor {
            Actor::Parent => &self.moments,
            Actor::Coach => &self.actions,
        }
    }

    pub fn check_outcome(&self, actor: Actor, label: &str) -> Result<()> {
        let buttons = self.buttons(actor);
        if buttons.is_empty() || buttons.iter().any(|b| b.label == label) {
            return Ok(());
        }
        let allowed: Vec<&str> = buttons.iter().map(|b| b.label.as_str()).collect();
        Err(anyhow!(
            "unknown {actor} label '{label}', expected one of: {}",
            allowed.join(", ")
        ))
    }

    pub fn check_tags(&self, tags: &[String]) -> Result<()> {
        check_open_set("tag", &self.tags, tags)
    }

    pub fn check_constraints(&self, labels: &[String]) -> Result<()> {
        check_open_set("constraint", &self.constraints, labels)
    }
}

fn check_open_set(kind: &str, allowed: &[String], given: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    for value in given {
        if !allowed.iter().any(|a| a == value) {
            return Err(anyhow!(
                "unknown {kind} '{value}', expected one of: {}",
                allowed.join(", ")
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxisConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub roster: Vec<Player>,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub suggestions: SuggestionMap,
    #[serde(default)]
    pub away: AwayConfig,
}

impl AxisConfig {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::try_from(self.engine.clone()).map_err(|e| anyhow!(e))
    }

    pub fn build_engine(&self) -> Result<Engine> {
        Ok(Engine::new(self.engine_config()?, self.suggestions.clone()))
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        let path = PathBuf::from(&self.store.path);
        if path.is_absolute() {
            path
        } else {
            root.join(path)
        }
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `main.yaml` from the config dir. A missing file yields defaults so a
/// fresh install can log taps right away.
pub fn load_config(config_dir: &Path) -> Result<AxisConfig> {
    let path = config_dir.join("main.yaml");
    let mut config = if path.exists() {
        read_yaml_file::<AxisConfig>(&path)?
    } else {
        tracing::debug!(path = %path.display(), "no main.yaml, using defaults");
        AxisConfig::default()
    };

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &AxisConfig) -> Result<()> {
    config
        .engine_config()
        .context("engine thresholds are invalid")?;

    if config.store.window_size == 0 {
        return Err(anyhow!("store.window_size must be at least 1"));
    }

    let mut seen = HashSet::new();
    for player in &config.roster {
        if !seen.insert(player.id.as_str()) {
            return Err(anyhow!("duplicate player id: {}", player.id));
        }
    }

    for (kind, buttons) in [
        ("moment", &config.vocabulary.moments),
        ("action", &config.vocabulary.actions),
    ] {
        let mut labels = HashSet::new();
        for button in buttons {
            if !labels.insert(button.label.as_str()) {
                return Err(anyhow!("duplicate {kind} label: {}", button.label));
            }
        }
    }

    if config.suggestions.fallback.trim().is_empty() {
        return Err(anyhow!("suggestions.fallback must not be empty"));
    }

    if config.away.rule.trim().is_empty() || config.away.rule.contains(':') {
        return Err(anyhow!("away.rule must be non-empty and contain no ':'"));
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_config_env(config: &mut AxisConfig) {
    config.app.name = resolve_env_var(&config.app.name);
    config.app.owner_label = resolve_env_var(&config.app.owner_label);
    config.store.path = resolve_env_var(&config.store.path);
    config.away.rule = resolve_env_var(&config.away.rule);
}
