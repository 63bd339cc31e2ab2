use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use secrets_api::api;
use secrets_api::config::Settings;
use secrets_api::security::codec::EncryptionKey;
use secrets_api::security::token_client::TokenClient;
use secrets_api::utils;

#[derive(Parser)]
#[command(name = "secrets-api", version, about = "Encrypted secrets vault behind bearer-token access control")]
struct AppCli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve {
        /// Overrides PORT from the environment
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a fresh random ENCRYPTION_KEY
    GenKey,
    /// Obtain an access token via the client-credentials grant
    Token {
        #[arg(long, env = "AUTH_DOMAIN")]
        domain: String,
        #[arg(long, env = "AUTH_AUDIENCE")]
        audience: String,
        #[arg(long, env = "AUTH_CLIENT_ID")]
        client_id: String,
        #[arg(long, env = "AUTH_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
        /// Token endpoint; defaults to https://{domain}/oauth/token
        #[arg(long)]
        token_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    utils::logging::init();

    let args = AppCli::parse();

    match args.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let mut settings = Settings::from_env().context("loading configuration")?;
            if let Some(port) = port {
                settings.port = port;
            }
            info!(version = secrets_api::VERSION, port = settings.port, "starting secrets API");
            api::serve(settings).await?;
        }
        Commands::GenKey => {
            println!("{}", EncryptionKey::generate_hex());
        }
        Commands::Token {
            domain,
            audience,
            client_id,
            client_secret,
            token_url,
        } => {
            let client = match token_url {
                Some(url) => TokenClient::new(url, audience)?,
                None => TokenClient::for_domain(&domain, audience)?,
            };
            let token = client.fetch_token(&client_id, &client_secret).await?;
            println!("{token}");
        }
    }

    Ok(())
}
