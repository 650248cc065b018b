use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_fallback() -> String {
    "SPACING".to_string()
}

fn default_rules() -> BTreeMap<String, String> {
    [
        ("PANIC", "HOLD"),
        ("SPACE", "SPACING"),
        ("MISS", "WATCH"),
        ("FORCE", "RESET"),
        ("RUSH", "HOLD"),
        ("TALK", "SILENCE"),
        ("DIDNTSEE2", "HOLD"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

/// Maps a logged moment to the constraint worth trying next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionMap {
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default = "default_rules")]
    pub rules: BTreeMap<String, String>,
}

impl Default for SuggestionMap {
    fn default() -> Self {
        Self {
            fallback: default_fallback(),
            rules: default_rules(),
        }
    }
}

impl SuggestionMap {
    pub fn suggest(&self, label: &str) -> &str {
        self.rules
            .get(label)
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_moments_map_to_constraints() {
        let map = SuggestionMap::default();
        assert_eq!(map.suggest("PANIC"), "HOLD");
        assert_eq!(map.suggest("DIDNTSEE2"), "HOLD");
        assert_eq!(map.suggest("TALK"), "SILENCE");
    }

    #[test]
    fn unknown_and_lowercase_labels_fall_back() {
        let map = SuggestionMap::default();
        assert_eq!(map.suggest("GOOD"), "SPACING");
        assert_eq!(map.suggest("panic"), "SPACING");
        assert_eq!(map.suggest(""), "SPACING");
    }

    #[test]
    fn yaml_can_override_fallback_only() {
        let map: SuggestionMap = serde_yaml::from_str("fallback: WATCH\n").unwrap();
        assert_eq!(map.suggest("GOOD"), "WATCH");
        assert_eq!(map.suggest("MISS"), "WATCH");
        assert_eq!(map.suggest("FORCE"), "RESET");
    }
}
