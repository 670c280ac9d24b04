//! CLI commands

use anyhow::{Context as _, Result};
use chrono::NaiveDateTime;
use clap::{Subcommand, ValueEnum};
use moim_http::client::{FileTokenStore, MoimClient, MoimClientBuilder, TokenStore};
use moim_http::types::{LoginRequest, MeetingCreateRequest, ProbeRole, RegisterRequest};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{self, CliConfig};
use crate::session::CookieFile;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "MOIM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, env = "MOIM_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        nickname: String,

        #[arg(long)]
        age: Option<u32>,

        #[arg(long)]
        region_id: Option<i64>,

        #[arg(long)]
        bio: Option<String>,
    },

    /// End the session on the server and forget local credentials
    Logout,

    /// Reissue the access token from the saved refresh cookie
    Reissue,

    /// Show whether an access token is stored
    Status,

    /// Meeting operations
    Meeting {
        #[command(subcommand)]
        command: MeetingCommands,
    },

    /// Check role authorization against the test endpoints
    Probe {
        #[arg(value_enum)]
        target: ProbeTarget,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
pub enum MeetingCommands {
    /// Create a meeting
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        capacity: u32,

        #[arg(long)]
        category_id: i64,

        /// Local start time, e.g. 2026-11-01T12:00:00
        #[arg(long)]
        start: Option<NaiveDateTime>,

        /// Local end time
        #[arg(long)]
        end: Option<NaiveDateTime>,
    },

    /// List meetings
    List,

    /// Show one meeting
    Show { id: i64 },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ProbeTarget {
    User,
    Admin,
    Me,
}

/// Everything a command needs to reach the API
struct Session {
    client: MoimClient,
    cookies: CookieFile,
}

impl Session {
    fn open(settings: &CliConfig, data_dir: &std::path::Path) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(settings.session_file(data_dir)));
        let cookies = CookieFile::load(settings.cookie_file(data_dir), &settings.client.base_url)
            .with_context(|| format!("invalid base_url {}", settings.client.base_url))?;

        let client = MoimClientBuilder::from_config(&settings.client)
            .token_store(store)
            .cookie_jar(cookies.jar())
            .on_session_expired(|| {
                eprintln!("Session expired. Run `moim login` to sign in again.");
            })
            .build()?;

        Ok(Self { client, cookies })
    }
}

impl Commands {
    pub async fn execute(self, settings: CliConfig, data_dir: PathBuf) -> Result<()> {
        // These only read local state, so a bad base_url must not stop them
        match self {
            Self::Config => return show_config(&settings),
            Self::Status => {
                let store = FileTokenStore::new(settings.session_file(&data_dir));
                show_status(store.get().is_some());
                return Ok(());
            }
            _ => {}
        }

        let session = Session::open(&settings, &data_dir)?;
        let logging_out = matches!(self, Self::Logout);
        let result = self.run(&session.client, &settings).await;

        // Keep whatever the server set, even if the command itself failed
        let persisted = if logging_out {
            session.cookies.clear()
        } else {
            session.cookies.save()
        };
        if let Err(e) = persisted {
            warn!(path = %session.cookies.path().display(), "Failed to persist cookies: {e}");
        }

        result
    }

    async fn run(self, client: &MoimClient, settings: &CliConfig) -> Result<()> {
        match self {
            Self::Login { email, password } => {
                client.login(LoginRequest { email: email.clone(), password }).await?;
                println!("Logged in as {email}");
            }
            Self::Register {
                email,
                password,
                nickname,
                age,
                region_id,
                bio,
            } => {
                let response = client
                    .register(RegisterRequest {
                        email,
                        password,
                        nickname,
                        age,
                        region_id,
                        bio,
                    })
                    .await?;
                println!("{}", response.message);
            }
            Self::Logout => {
                if !client.is_authenticated() {
                    println!("Not logged in");
                    return Ok(());
                }
                let message = client.logout().await?;
                info!("Server acknowledged logout");
                println!(
                    "{}",
                    if message.is_empty() { "Logged out" } else { message.as_str() }
                );
            }
            Self::Reissue => {
                client.reissue().await?;
                println!("Access token reissued");
            }
            Self::Status => show_status(client.is_authenticated()),
            Self::Meeting { command } => command.run(client).await?,
            Self::Probe { target } => match target {
                ProbeTarget::User => println!("{}", client.probe(ProbeRole::User).await?),
                ProbeTarget::Admin => println!("{}", client.probe(ProbeRole::Admin).await?),
                ProbeTarget::Me => print_json(&client.me().await?)?,
            },
            Self::Config => show_config(settings)?,
        }
        Ok(())
    }
}

impl MeetingCommands {
    async fn run(self, client: &MoimClient) -> Result<()> {
        match self {
            Self::Create {
                title,
                description,
                capacity,
                category_id,
                start,
                end,
            } => {
                let id = client
                    .create_meeting(&MeetingCreateRequest {
                        title,
                        description,
                        capacity,
                        start_date: start,
                        end_date: end,
                        category_id,
                    })
                    .await?;
                println!("Created meeting {id}");
            }
            Self::List => print_json(&client.list_meetings().await?)?,
            Self::Show { id } => print_json(&client.get_meeting(id).await?)?,
        }
        Ok(())
    }
}

fn show_status(authenticated: bool) {
    if authenticated {
        println!("Logged in");
    } else {
        println!("Not logged in");
    }
}

fn show_config(settings: &CliConfig) -> Result<()> {
    println!("{}", config::render(settings)?);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken_settings() -> CliConfig {
        let mut settings = CliConfig::default();
        settings.client.base_url = "not a url".to_string();
        settings
    }

    #[tokio::test]
    async fn local_commands_ignore_a_bad_base_url() {
        let dir = tempfile::tempdir().unwrap();

        Commands::Config
            .execute(broken_settings(), dir.path().to_path_buf())
            .await
            .unwrap();
        Commands::Status
            .execute(broken_settings(), dir.path().to_path_buf())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_commands_report_a_bad_base_url() {
        let dir = tempfile::tempdir().unwrap();

        let err = Commands::Reissue
            .execute(broken_settings(), dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));
    }
}
