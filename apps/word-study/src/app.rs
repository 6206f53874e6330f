//! Application state shared by all subcommands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_core::{PlanRequest, StudyService};
use study_store::Database;
use tracing::debug;

use crate::config::Config;

pub struct App {
    pub config: Config,
    pub service: StudyService,
    pub user: String,
}

impl App {
    /// Open the database and wire the service from config.
    pub fn new(config: Config, db_path: Option<&Path>, user: String) -> Result<Self> {
        let db_path = db_path
            .map(Path::to_path_buf)
            .or_else(Config::db_path)
            .unwrap_or_else(|| PathBuf::from("words.db"));
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let db = Database::open(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        debug!(path = %db_path.display(), "database opened");
        Self::with_database(config, db, user)
    }

    pub fn with_database(config: Config, db: Database, user: String) -> Result<Self> {
        let service = StudyService::new(Arc::new(db))
            .with_scheduler(config.scheduler())
            .with_policy(config.to_study_policy()?);
        Ok(Self {
            config,
            service,
            user,
        })
    }

    /// Plan request from config, with command line overrides.
    pub fn plan_request(&self, target: Option<u32>, ratio: Option<u32>) -> PlanRequest {
        PlanRequest::new(
            target.unwrap_or(self.config.study.daily_target),
            ratio.unwrap_or(self.config.study.new_word_ratio),
        )
    }
}

/// `$USER`, else `default`.
pub fn default_user() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "default".to_string())
}
