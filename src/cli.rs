use clap::{Parser, Subcommand};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::instagram::Credentials;

#[derive(Parser, Debug)]
#[command(name = "igrelay")]
#[command(author, version, about = "Relays Instagram posts shared in direct messages as JSON records", long_about = None)]
pub struct Cli {
    /// Instagram username (falls back to INSTAGRAM_USERNAME)
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Instagram password (falls back to INSTAGRAM_PASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Extract one post and print it as JSON
    Extract {
        /// Post or reel URL
        #[arg(short, long)]
        url: String,
    },

    /// Watch direct messages and print one CONTENT_EXTRACTED line per shared post
    Monitor,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Command-line values first, then the environment.
    pub fn credentials(&self) -> AppResult<Credentials> {
        resolve_credentials(
            self.username.clone(),
            self.password.clone(),
            config::INSTAGRAM_USERNAME.clone(),
            config::INSTAGRAM_PASSWORD.clone(),
        )
    }
}

fn resolve_credentials(
    cli_username: Option<String>,
    cli_password: Option<String>,
    env_username: Option<String>,
    env_password: Option<String>,
) -> AppResult<Credentials> {
    let username = cli_username
        .filter(|s| !s.trim().is_empty())
        .or(env_username)
        .ok_or_else(|| AppError::Config("Instagram username missing (--username or INSTAGRAM_USERNAME)".into()))?;
    let password = cli_password
        .filter(|s| !s.is_empty())
        .or(env_password)
        .ok_or_else(|| AppError::Config("Instagram password missing (--password or INSTAGRAM_PASSWORD)".into()))?;
    Ok(Credentials::new(username.trim(), password))
}
