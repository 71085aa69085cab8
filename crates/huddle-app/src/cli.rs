use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// huddle: join a room, chat, and manage rooms from the terminal.
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. `debug` or `huddle_call=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join a room's signaling channel. Prints roster and chat; stdin lines
    /// are sent as chat (`/who` lists participants, `/quit` leaves).
    Join {
        #[arg(long)]
        room: String,
        /// Display name for this login session.
        #[arg(long, default_value = "guest")]
        name: String,
    },
    /// Log in and print an access token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Create a room and print its ID.
    CreateRoom {
        #[arg(long)]
        token: String,
    },
    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
