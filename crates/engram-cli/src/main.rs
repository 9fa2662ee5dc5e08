use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod context;

fn main() {
    if let Err(error) = run() {
        eprintln!("engram error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let config = engram_config::load()?;

    match &cli.command {
        cli::Commands::Redact(args) => commands::redact::handle(args, cli.json),
        cli::Commands::Search(args) => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::search::handle(&ctx, args, cli.json)
        }
        cli::Commands::Health => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::health::handle(&ctx, cli.json)
        }
        cli::Commands::Rebuild(args) => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::rebuild::handle(&ctx, args, cli.json)
        }
        cli::Commands::Import(args) => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::import::handle(&ctx, &config, args, cli.json)
        }
        cli::Commands::Expand(args) => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::expand::handle(&ctx, args, cli.json)
        }
        cli::Commands::Delete(args) => {
            let ctx = context::EngineContext::build(&config, cli.model.as_deref())?;
            commands::delete::handle(&ctx, args, cli.json)
        }
    }
}

fn init_tracing(quiet: bool, verbose: u8) {
    if quiet {
        return;
    }
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("ENGRAM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("engram={default_level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
