// Operator tooling for credentials and user records

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use keymaster::model::User;
use keymaster::{
    Capabilities, CredentialManager, EntityStore, RedisDocumentStore, RedisRevocationStore,
    Settings, SystemClock,
};
use log::{error, info};

#[derive(Debug, Parser)]
#[command(name = "key-master")]
#[command(about = "Issue, verify and revoke signed credentials", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Issue a fifteen-minute access credential
    Issue {
        email: String,
        /// Display name carried in the credential
        name: String,
        /// Grant admin capability
        #[arg(long)]
        admin: bool,
    },

    /// Issue a four-hour refresh credential
    IssueRefresh { email: String },

    /// Verify an access credential and print its claims
    Verify { token: String },

    /// Exchange a refresh credential for a new access credential
    Refresh {
        access_token: String,
        refresh_token: String,
    },

    /// Revoke every credential of the token's subject
    Revoke { token: String },

    /// Create a user record
    CreateUser {
        email: String,
        first_name: String,
        last_name: String,
        password: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let settings = Settings::from_env()?;
    let material = settings.key_material()?;
    let redis_client = Arc::new(redis::Client::open(settings.redis_url.as_str())?);
    let clock = Arc::new(SystemClock);

    // A signing key that does not parse is fatal before anything else runs
    let credentials = CredentialManager::configure(
        settings.signing_method,
        &material,
        Arc::new(RedisRevocationStore::new(redis_client.clone())),
        clock.clone(),
    )?
    .with_store_timeout(settings.store_timeout);
    info!("Configured credential signing with {}", credentials.algorithm());

    match command {
        Commands::Issue { email, name, admin } => {
            let credential = credentials.issue(&email, &name, Capabilities { admin })?;
            println!("{}", credential.token());
        }
        Commands::IssueRefresh { email } => {
            println!("{}", credentials.issue_refresh(&email)?.token());
        }
        Commands::Verify { token } => {
            let credential = credentials.verify_access(&token).await?;
            println!("{}", serde_json::to_string_pretty(credential.claims())?);
        }
        Commands::Refresh {
            access_token,
            refresh_token,
        } => {
            let renewed = credentials.refresh(&access_token, &refresh_token).await?;
            println!("{}", renewed.token());
        }
        Commands::Revoke { token } => {
            // Expired or already revoked tokens are still accepted here
            let credential = credentials.decode_access(&token)?;
            credentials.revoke(&credential).await?;
            println!(
                "revoked {} until {}",
                credential.subject(),
                credential.expires_at()
            );
        }
        Commands::CreateUser {
            email,
            first_name,
            last_name,
            password,
        } => {
            let documents = Arc::new(RedisDocumentStore::new(
                redis_client.clone(),
                settings.namespace.clone(),
            ));
            let entities =
                EntityStore::new(documents, clock.clone()).with_store_timeout(settings.store_timeout);
            entities.register::<User>().await?;

            let mut user = User::new(email, first_name, last_name);
            user.set_password(&password);
            let user = entities.create(user).await?;
            if let Some(id) = user.audit.id {
                println!("{}", id);
            }
        }
    }
    Ok(())
}
