//! Optional JSONL log of session lifecycle events for one CLI run.
//!
//! Only logins, restores, logouts, expiries and reload outcomes are written.
//! Credentials, tokens, bank details and admin changes are never recorded.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ActivityLog {
    pub path: PathBuf,
    run_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    run_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl ActivityLog {
    pub fn new(path: &Path, run_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            run_id: run_id.to_string(),
            file,
        })
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            run_id: &self.run_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn login(&mut self, user_id: &str, role: &str) -> Result<()> {
        self.log(
            "login",
            serde_json::json!({ "user_id": user_id, "role": role }),
        )
    }

    pub fn session_restored(&mut self, user_id: &str) -> Result<()> {
        self.log("session_restored", serde_json::json!({ "user_id": user_id }))
    }

    pub fn logout(&mut self) -> Result<()> {
        self.log("logout", serde_json::json!({}))
    }

    pub fn session_expired(&mut self) -> Result<()> {
        self.log("session_expired", serde_json::json!({}))
    }

    /// Log a finished reload with the size of each collection
    pub fn reload(
        &mut self,
        contributions: usize,
        announcements: usize,
        members: Option<usize>,
    ) -> Result<()> {
        self.log(
            "reload",
            serde_json::json!({
                "contributions": contributions,
                "announcements": announcements,
                "members": members,
            }),
        )
    }

    pub fn reload_failed(&mut self, error: &str) -> Result<()> {
        self.log("reload_failed", serde_json::json!({ "error": error }))
    }
}
