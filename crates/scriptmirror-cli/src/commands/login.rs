//! Login command - Verify credentials against the remote script server

use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;

use scriptmirror_core::config::Config;
use scriptmirror_sync::SessionGuard;

use super::{ensure_valid, script_server};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct LoginCommand {}

impl LoginCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        ensure_valid(config)?;
        let formatter = get_formatter(format);

        let session = SessionGuard::from_config(script_server(config)?, &config.remote);
        session.warm_up().await;
        let status = session.status();

        if format.is_json() {
            formatter.print_json(&json!({
                "server": config.remote.url,
                "username": config.remote.username,
                "logged_in": status.logged_in,
                "last_login_at": status.last_login_at,
                "consecutive_failures": status.consecutive_failures,
            }));
        } else if status.logged_in {
            formatter.success(&format!(
                "Logged in to {} as {}",
                config.remote.url, config.remote.username
            ));
        } else {
            formatter.error(&format!(
                "Login to {} as {} failed",
                config.remote.url, config.remote.username
            ));
        }

        if !status.logged_in {
            bail!("Login failed");
        }
        session.logout().await;
        Ok(())
    }
}
