use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for one match. Every field has a default, so a config file only needs the
/// fields it changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    /// Executable of the UCI analysis engine.
    pub engine_path: String,

    /// Time budget of a play search, in milliseconds.
    pub play_movetime_ms: u64,
    /// How long past its movetime a play search may run before the engine is given up on.
    pub engine_grace_ms: u64,
    /// How long an analysis search may run before the engine is given up on.
    pub analysis_timeout_ms: u64,
    /// Depth of the analysis search run while the human is thinking.
    pub analysis_depth: u32,
    /// Send `stop` before a dispatch that supersedes a search still running.
    pub stop_superseded_search: bool,

    pub min_rating: u32,
    pub max_rating: u32,
    pub default_rating: u32,
    /// Rating difference that spans the whole skill range.
    pub rating_span: u32,
    pub max_skill: u8,

    /// Magnitude a mate score is encoded around.
    pub mate_score: i32,
    pub eval_steepness: f64,
    pub eval_clamp: f64,
    pub win_probability_floor: f64,
    pub win_probability_ceiling: f64,

    pub advisory_fallback_text: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            engine_path: "stockfish".to_owned(),
            play_movetime_ms: 1000,
            engine_grace_ms: 5000,
            analysis_timeout_ms: 30_000,
            analysis_depth: 12,
            stop_superseded_search: true,
            min_rating: 250,
            max_rating: 3250,
            default_rating: 250,
            rating_span: 3000,
            max_skill: 20,
            mate_score: 10_000,
            eval_steepness: 0.004,
            eval_clamp: 10_000.0,
            win_probability_floor: 0.05,
            win_probability_ceiling: 0.95,
            advisory_fallback_text: "Systems busy. Please try again.".to_owned(),
        }
    }
}

impl MatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));
        if self.rating_span == 0 {
            return invalid("rating_span must be positive");
        }
        if !(self.min_rating <= self.default_rating && self.default_rating <= self.max_rating) {
            return invalid("default_rating must lie within min_rating..=max_rating");
        }
        if self.max_skill > 20 {
            return invalid("max_skill must be at most 20");
        }
        if self.mate_score <= 1000 {
            return invalid("mate_score must exceed 1000");
        }
        if !(0.0..=self.win_probability_ceiling).contains(&self.win_probability_floor)
            || self.win_probability_ceiling > 1.0
        {
            return invalid("win probability bounds must satisfy 0 <= floor <= ceiling <= 1");
        }
        if !(self.eval_steepness > 0.0 && self.eval_clamp > 0.0) {
            return invalid("eval_steepness and eval_clamp must be positive");
        }
        if self.play_movetime_ms == 0 || self.analysis_depth == 0 || self.analysis_timeout_ms == 0
        {
            return invalid("search limits must be positive");
        }
        Ok(())
    }

    /// Keeps a requested rating inside the configured range.
    pub fn clamp_rating(&self, rating: u32) -> u32 {
        rating.clamp(self.min_rating, self.max_rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_files_keep_defaults() {
        let config =
            MatchConfig::from_json_str(r#"{ "engine_path": "/usr/games/stockfish", "analysis_depth": 16 }"#)
                .unwrap();
        assert_eq!(config.engine_path, "/usr/games/stockfish");
        assert_eq!(config.analysis_depth, 16);
        assert_eq!(config.play_movetime_ms, 1000);
    }

    #[test]
    fn nonsense_is_rejected() {
        assert!(matches!(
            MatchConfig::from_json_str(r#"{ "rating_span": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MatchConfig::from_json_str(r#"{ "default_rating": 10 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MatchConfig::from_json_str(r#"{ "max_skill": 25 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MatchConfig::from_json_str(r#"{ "analysis_timeout_ms": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MatchConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn ratings_are_clamped() {
        let config = MatchConfig::default();
        assert_eq!(config.clamp_rating(0), 250);
        assert_eq!(config.clamp_rating(9000), 3250);
        assert_eq!(config.clamp_rating(1500), 1500);
    }
}
