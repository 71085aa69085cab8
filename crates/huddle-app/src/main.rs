mod boot;
mod cli;
mod probe;

use std::process::ExitCode;

use huddle_call::ApiClient;
use huddle_common::{HuddleError, RoomId};
use huddle_config::HuddleConfig;

use crate::cli::Command;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let (config, config_error) = boot::load_config(args.config.as_deref());

    // Logs go to stderr so stdout stays clean for tokens and room IDs.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(boot::env_filter(
            args.log_level.as_deref(),
            config_error.is_none().then_some(config.logging.level.as_str()),
        ))
        .init();

    tracing::info!("huddle v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = &config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    match run(args.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &HuddleConfig) -> Result<(), HuddleError> {
    match command {
        Command::Join { room, name } => probe::run(config, RoomId::new(room), &name).await,
        Command::Login { username, password } => {
            let api = ApiClient::new(config.api.base_url.clone())?;
            let token = api.login(&username, &password).await?;
            println!("{}", token.access_token);
            Ok(())
        }
        Command::CreateRoom { token } => {
            let api = ApiClient::new(config.api.base_url.clone())?;
            let room = api.create_room(&token).await?;
            println!("{room}");
            Ok(())
        }
        Command::Config => {
            println!("{}", huddle_config::config_to_json(config));
            Ok(())
        }
    }
}
