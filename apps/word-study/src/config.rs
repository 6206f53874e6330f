//! Configuration for word study.

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use study_core::{Doubling, Ladder, ReviewScheduler, StudyCalendar, StudyPolicy};
use tracing::warn;

const APP_NAME: &str = "word-study";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from `path`, or the default location. A missing or unreadable
    /// file yields the defaults; a file that fails to parse is an error.
    pub fn try_load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::config_path);
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("Invalid config {}", path.display())),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.config_dir().join("config.toml"))
    }

    pub fn db_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.data_dir().join("words.db"))
    }

    pub fn to_study_policy(&self) -> anyhow::Result<StudyPolicy> {
        Ok(StudyPolicy {
            count_completed_toward_target: self.study.count_completed_toward_target,
            adaptive_target: self.study.adaptive_target,
            min_session_seconds: self.sessions.min_duration_seconds,
            calendar: StudyCalendar::from_offset_minutes(self.study.utc_offset_minutes)?,
        })
    }

    /// Build the configured interval curve. Invalid curve settings fall
    /// back to that curve's defaults.
    pub fn scheduler(&self) -> Box<dyn ReviewScheduler> {
        let sched = &self.scheduler;
        match sched.algorithm.to_lowercase().as_str() {
            "doubling" => {
                let curve = Doubling::new(
                    Duration::minutes(sched.doubling_base_minutes),
                    Duration::days(sched.doubling_cap_days),
                );
                match curve {
                    Ok(curve) => Box::new(curve),
                    Err(err) => {
                        warn!(error = %err, "rejected doubling settings, using defaults");
                        Box::new(Doubling::default())
                    }
                }
            }
            other => {
                if other != "ladder" {
                    warn!(algorithm = other, "unknown scheduler, using ladder");
                }
                match Ladder::from_minutes(&sched.ladder_minutes) {
                    Ok(curve) => Box::new(curve),
                    Err(err) => {
                        warn!(error = %err, "rejected ladder_minutes, using defaults");
                        Box::new(Ladder::default())
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_daily_target")]
    pub daily_target: u32,
    #[serde(default = "default_new_word_ratio")]
    pub new_word_ratio: u32,
    #[serde(default = "default_true")]
    pub count_completed_toward_target: bool,
    #[serde(default)]
    pub adaptive_target: bool,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_daily_target() -> u32 { 20 }
fn default_new_word_ratio() -> u32 { 30 }
fn default_true() -> bool { true }

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            daily_target: 20,
            new_word_ratio: 30,
            count_completed_toward_target: true,
            adaptive_target: false,
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_ladder_minutes")]
    pub ladder_minutes: Vec<i64>,
    #[serde(default = "default_doubling_base")]
    pub doubling_base_minutes: i64,
    #[serde(default = "default_doubling_cap")]
    pub doubling_cap_days: i64,
}

fn default_algorithm() -> String { "ladder".to_string() }
fn default_ladder_minutes() -> Vec<i64> { Ladder::DEFAULT_MINUTES.to_vec() }
fn default_doubling_base() -> i64 { 1_440 }
fn default_doubling_cap() -> i64 { 30 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            ladder_minutes: default_ladder_minutes(),
            doubling_base_minutes: 1_440,
            doubling_cap_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_min_duration")]
    pub min_duration_seconds: u32,
}

fn default_min_duration() -> u32 { 10 }

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            min_duration_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [study]
            daily_target = 50

            [scheduler]
            algorithm = "doubling"
            "#,
        )
        .unwrap();
        assert_eq!(config.study.daily_target, 50);
        assert_eq!(config.study.new_word_ratio, 30);
        assert!(config.study.count_completed_toward_target);
        assert_eq!(config.sessions.min_duration_seconds, 10);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scheduler().name(), "doubling");
    }

    #[test]
    fn test_decreasing_ladder_falls_back() {
        let config = Config::parse(
            r#"
            [scheduler]
            ladder_minutes = [10, 5, 20, 30, 40, 50]
            "#,
        )
        .unwrap();
        let sched = config.scheduler();
        assert_eq!(sched.name(), "ladder");
        assert_eq!(sched.interval_for(1), Duration::days(1));
    }

    #[test]
    fn test_custom_ladder_is_used() {
        let config = Config::parse(
            r#"
            [scheduler]
            ladder_minutes = [5, 60, 120, 240, 480, 960]
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler().interval_for(0), Duration::minutes(5));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        config.study.utc_offset_minutes = 480;
        config.study.adaptive_target = true;
        config.sessions.min_duration_seconds = 30;

        let policy = config.to_study_policy().unwrap();
        assert!(policy.adaptive_target);
        assert_eq!(policy.min_session_seconds, 30);
        assert_eq!(policy.calendar.offset_minutes(), 480);

        config.study.utc_offset_minutes = 24 * 60;
        assert!(config.to_study_policy().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let missing = Config::try_load(Some(&path)).unwrap();
        assert_eq!(missing.study.daily_target, 20);

        std::fs::write(&path, "[study]\nnew_word_ratio = 60\n").unwrap();
        assert_eq!(Config::try_load(Some(&path)).unwrap().study.new_word_ratio, 60);

        std::fs::write(&path, "study = 3").unwrap();
        assert!(Config::try_load(Some(&path)).is_err());
    }
}
