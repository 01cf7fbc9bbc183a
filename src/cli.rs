use clap::{Args, Parser, Subcommand};

/// glsecrets: GitLab access token lifecycle manager
#[derive(Parser)]
#[command(name = "glsecrets", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the background rotation job
    Serve {
        /// Port to bind (defaults to GLSECRETS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage stored configurations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Rotate the administrative token of a configuration now
    Rotate {
        #[arg(long, default_value = "default")]
        name: String,
    },

    /// Rotate every configuration that is due, once
    RotateDue,

    /// Revoke a derived token from its lease metadata
    Revoke {
        #[arg(long)]
        lease_id: String,
        /// Lease internal data as a JSON object
        #[arg(long)]
        metadata: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or replace a configuration
    Write {
        #[arg(long, default_value = "default")]
        name: String,
        #[command(flatten)]
        fields: ConfigFields,
    },
    /// Show a configuration (token fingerprint only)
    Read {
        #[arg(long, default_value = "default")]
        name: String,
    },
    /// Update selected fields of a configuration
    Patch {
        #[arg(long, default_value = "default")]
        name: String,
        #[command(flatten)]
        fields: ConfigFields,
    },
    /// Delete a configuration
    Delete {
        #[arg(long, default_value = "default")]
        name: String,
    },
    /// List configuration names
    List,
}

#[derive(Args)]
pub struct ConfigFields {
    /// Administrative access token
    #[arg(long, env = "GLSECRETS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// self-managed, saas or dedicated
    #[arg(long = "type")]
    pub platform: Option<String>,
    #[arg(long)]
    pub auto_rotate_token: Option<bool>,
    /// e.g. 24h, 7d
    #[arg(long)]
    pub auto_rotate_before: Option<String>,
}

impl From<ConfigFields> for glsecrets::models::ConfigInput {
    fn from(fields: ConfigFields) -> Self {
        Self {
            token: fields.token,
            base_url: fields.base_url,
            platform: fields.platform,
            auto_rotate_token: fields.auto_rotate_token,
            auto_rotate_before: fields.auto_rotate_before,
        }
    }
}
