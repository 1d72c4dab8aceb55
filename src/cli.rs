//! Command-line argument parsing for db-chat.

use clap::Parser;
use std::path::PathBuf;

use crate::backend::{AuthMode, Credentials};
use crate::config::Config;

/// Chat with your databases in plain language.
#[derive(Parser, Debug)]
#[command(name = "db-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config and DB_CHAT_API_URL)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Username to log in with (prompted for when omitted)
    #[arg(short = 'u', long, value_name = "USER")]
    pub username: Option<String>,

    /// Create an account instead of logging in
    #[arg(long)]
    pub register: bool,

    /// Email address for --register
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Keep transcripts in memory only
    #[arg(long)]
    pub memory: bool,

    /// Write logs to stderr instead of the log file
    #[arg(long)]
    pub stderr_log: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    pub fn auth_mode(&self) -> AuthMode {
        if self.register {
            AuthMode::Register
        } else {
            AuthMode::Login
        }
    }

    /// Builds the credentials form from flags and a password read elsewhere.
    pub fn credentials(&self, username: String, password: String) -> Credentials {
        let credentials = Credentials::new(username, password);
        match &self.email {
            Some(email) => credentials.with_email(email.clone()),
            None => credentials,
        }
    }

    /// Applies flag overrides to a loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if self.memory {
            config.storage.in_memory = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let cli = parse_args(&["db-chat"]);
        assert_eq!(cli.auth_mode(), AuthMode::Login);
        assert!(!cli.memory);
        assert!(!cli.stderr_log);
        assert_eq!(cli.config_path(), Config::default_path());
    }

    #[test]
    fn test_parse_register() {
        let cli = parse_args(&[
            "db-chat",
            "--register",
            "-u",
            "ann",
            "--email",
            "ann@example.com",
        ]);
        assert_eq!(cli.auth_mode(), AuthMode::Register);
        assert_eq!(cli.username.as_deref(), Some("ann"));

        let creds = cli.credentials("ann".into(), "pw".into());
        assert!(creds.validate(AuthMode::Register).is_ok());
    }

    #[test]
    fn test_parse_config_path() {
        let cli = parse_args(&["db-chat", "--config", "/path/to/config.toml"]);
        assert_eq!(cli.config_path(), PathBuf::from("/path/to/config.toml"));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse_args(&["db-chat", "--api-url", "https://chat.internal", "--memory"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.api.base_url, "https://chat.internal");
        assert!(config.storage.in_memory);
    }
}
