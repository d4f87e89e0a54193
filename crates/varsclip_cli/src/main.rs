//! varsclip CLI
//!
//! Runs the varsclip server and talks to a running one.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP server
//! - `admin` - Print the admin overview of a running server
//! - `delete` - Delete a session on a running server
//! - `hash-password` - Print the stored form of a password
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Realtime shared clipboard server and tools.
#[derive(Parser)]
#[command(name = "varsclip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "VARSCLIP_BIND")]
        bind: Option<SocketAddr>,

        /// Shared secret for admin endpoints
        #[arg(long, env = "VARSCLIP_ADMIN_SECRET", hide_env_values = true)]
        admin_secret: Option<String>,

        /// Directory for uploaded files (memory if unset)
        #[arg(long, env = "VARSCLIP_BLOB_DIR")]
        blob_dir: Option<PathBuf>,

        /// Base URL used in file links
        #[arg(long, env = "VARSCLIP_PUBLIC_URL")]
        public_url: Option<String>,

        /// Seconds between expired-session sweeps
        #[arg(long, env = "VARSCLIP_SWEEP_SECS")]
        sweep_secs: Option<u64>,
    },

    /// Print the admin overview of a running server
    Admin {
        /// Server URL
        #[arg(short, long, env = "VARSCLIP_SERVER", default_value = "http://127.0.0.1:8080")]
        server: String,

        /// Admin secret
        #[arg(long, env = "VARSCLIP_ADMIN_SECRET", hide_env_values = true)]
        secret: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a session on a running server
    Delete {
        /// Session code
        code: String,

        /// Server URL
        #[arg(short, long, env = "VARSCLIP_SERVER", default_value = "http://127.0.0.1:8080")]
        server: String,

        /// Admin secret
        #[arg(long, env = "VARSCLIP_ADMIN_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Print the stored form of a password
    HashPassword {
        /// Password (read from stdin if omitted)
        #[arg(long)]
        password: Option<String>,

        /// PBKDF2 iterations
        #[arg(long, default_value_t = varsclip_core::DEFAULT_PASSWORD_ITERATIONS)]
        iterations: u32,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            admin_secret,
            blob_dir,
            public_url,
            sweep_secs,
        } => {
            let options = commands::serve::ServeOptions {
                bind,
                admin_secret,
                blob_dir,
                public_url,
                sweep_secs,
            };
            commands::serve::run(options).await?;
        }
        Commands::Admin {
            server,
            secret,
            format,
        } => {
            commands::admin::run(&server, &secret, &format).await?;
        }
        Commands::Delete {
            code,
            server,
            secret,
        } => {
            commands::delete::run(&server, &secret, &code).await?;
        }
        Commands::HashPassword {
            password,
            iterations,
        } => {
            commands::hash_password::run(password, iterations)?;
        }
        Commands::Version => {
            println!("varsclip CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("varsclip core v{}", varsclip_core::VERSION);
        }
    }

    Ok(())
}
