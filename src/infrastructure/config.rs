//! Player configuration

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::services::{parse_overrides, DEFAULT_MAX_WALK_STEPS};

/// Player configuration loaded from environment
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Path of the experience JSON document
    pub experience_path: PathBuf,
    /// Story to play; the document's first story when unset
    pub story_id: Option<String>,

    /// Directory for per-story session files
    pub session_dir: Option<PathBuf>,
    /// Resume from and write to the session directory
    pub save_session: bool,

    /// Upper bound on steps played and on shadow walks
    pub max_steps: usize,
    /// Element to jump to once the story has started
    pub jump_to: Option<String>,
    /// Variable overrides, `name=value` pairs
    pub story_variables: Vec<(String, String)>,
}

impl PlayerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            experience_path: env::var("EXPERIENCE_PATH")
                .context("EXPERIENCE_PATH environment variable is required")?
                .into(),
            story_id: non_empty("STORY_ID"),

            session_dir: non_empty("SESSION_DIR").map(PathBuf::from),
            save_session: env::var("SAVE_SESSION")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("SAVE_SESSION must be true or false")?,

            max_steps: match env::var("MAX_STEPS") {
                Ok(raw) => raw.parse().context("MAX_STEPS must be a positive integer")?,
                Err(_) => DEFAULT_MAX_WALK_STEPS,
            },
            jump_to: non_empty("JUMP_TO"),
            story_variables: env::var("STORY_VARIABLES")
                .map(|raw| parse_overrides(&raw))
                .unwrap_or_default(),
        })
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
