//! gsuite-group-lister - Lists Google Workspace groups and their memberships
//!
//! Authenticates as a service account impersonating a domain admin, lists
//! every group of the domain (or of one user) and prints each group with its
//! members.

use std::io::Write;

use clap::Parser;
use gsuite_directory::{CancellationToken, GoogleDirectoryClient, GroupLister};
use tracing::{info, warn};

mod config;
mod error;
mod logging;
mod output;

use config::ListArgs;
use error::CliResult;
use logging::{LogFormat, LogLevel};

/// Lists gsuite groups and memberships
#[derive(Parser)]
#[command(name = "gsuite-group-lister")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    list: ListArgs,

    /// Log line format on stderr (text or json)
    #[arg(long, env = "GSUITE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Show traversal progress
    #[arg(short, long)]
    verbose: bool,

    /// Show each page request
    #[arg(long)]
    debug: bool,

    /// Show everything, including HTTP client internals
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_logging(
        LogLevel::from_flags(cli.verbose, cli.debug, cli.trace),
        cli.log_format,
    );

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let args = cli.list;

    let credentials = args.credentials()?;
    let client = GoogleDirectoryClient::new(credentials, args.directory_config()?)?;
    let lister = GroupLister::with_options(client, args.traversal_options()?);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        })
    };

    let user_key = args.user_key();
    info!(
        admin = %args.google_impersonate_admin,
        user_key = %user_key,
        "Listing groups"
    );
    let result = lister.list_groups_for_user(user_key, &cancel).await;
    ctrl_c.abort();
    let report = result?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        output::write_json(&mut out, &report)?;
    } else {
        output::write_text(&mut out, &report)?;
    }
    out.flush()?;

    Ok(())
}
