use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::CONFIG_PATH_ENV;

#[derive(Parser, Debug)]
#[command(name = "idgate")]
#[command(about = "idgate - OAuth 2.0 and OpenID Connect identity provider")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to idgate.toml)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Register an OAuth client and print its credentials
    RegisterClient(RegisterClientArgs),
    /// List registered clients
    ListClients(ListClientsArgs),
    /// Show one client's settings (never its secret)
    ShowClient(ShowClientArgs),
    /// Create a user
    CreateUser(CreateUserArgs),
    /// Disable a user and revoke their refresh tokens
    DisableUser(DisableUserArgs),
    /// Delete expired codes, refresh tokens and sessions
    PurgeExpired,
}

#[derive(clap::Args, Debug)]
pub struct RegisterClientArgs {
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Allowed redirect URI (repeatable)
    #[arg(long = "redirect-uri", required = true)]
    pub redirect_uris: Vec<String>,
    /// Register a public client without a secret
    #[arg(long)]
    pub public: bool,
    /// Scopes the client may request, space delimited
    #[arg(long, default_value = "openid profile email")]
    pub scopes: String,
}

#[derive(clap::Args, Debug)]
pub struct ListClientsArgs {
    /// Maximum number of clients to print
    #[arg(long, default_value_t = 50)]
    pub limit: i64,
    /// Number of clients to skip, oldest first
    #[arg(long, default_value_t = 0)]
    pub offset: i64,
}

#[derive(clap::Args, Debug)]
pub struct ShowClientArgs {
    /// Public client identifier
    #[arg(long = "client-id")]
    pub client_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CreateUserArgs {
    /// Login name
    #[arg(long)]
    pub username: String,
    /// Email address
    #[arg(long)]
    pub email: Option<String>,
    /// Password; omit for social-only users
    #[arg(long, env = "IDGATE_USER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DisableUserArgs {
    /// Login name
    #[arg(long)]
    pub username: String,
}

impl Cli {
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
