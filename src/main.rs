use clap::Parser;
use mirage::{Args, ClientIdentity, DoraClient, MirageError};
use std::{error::Error as _, process::ExitCode};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> Result<(), MirageError> {
    let config = args.into_config()?;
    let identity = ClientIdentity::generate();
    println!("Generated MAC: {}", identity.mac());

    let mut client = DoraClient::bind(config, identity)?;
    let lease = client.run().await?;

    println!("\n{lease}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
