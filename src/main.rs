use anyhow::Result;
use clap::{CommandFactory, Parser};

use smart_pick::cache::store::StateStore;
use smart_pick::cli::{Cli, Commands};
use smart_pick::config::{Config, ConfigService};
use smart_pick::doctor;
use smart_pick::error::PickError;
use smart_pick::service::{AppService, PickRequest, ServiceOptions};
use smart_pick::session::RunOptions;
use smart_pick::vcs::{GitCli, Vcs};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let (code, message) = classify_error(&e);
        eprintln!("[{code}] {message}");
        std::process::exit(1);
    }
}

fn classify_error(e: &anyhow::Error) -> (String, String) {
    if let Some(pe) = e.downcast_ref::<PickError>() {
        (pe.code.to_string(), pe.message.clone())
    } else {
        ("IO_ERROR".to_string(), format!("{e:#}"))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

fn run(cli: Cli) -> Result<()> {
    // Commands that need neither configuration nor logging
    match &cli.command {
        Some(Commands::Init { path }) => return cmd_init(path.as_deref()),
        Some(Commands::Doctor) => return cmd_doctor(),
        _ => {}
    }

    if !cli.has_action() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let service = AppService::open(
        &cwd,
        &ServiceOptions {
            config_file: cli.config.clone(),
            overrides: cli.set.clone(),
            debug: cli.debug,
            verbose: cli.verbose,
        },
    )?;

    if matches!(cli.command, Some(Commands::History)) {
        return service.history();
    }

    let range = cli.range_pair();
    if cli.commits.is_empty() && range.is_none() && !cli.apply_saved {
        // only --set was given
        return Ok(());
    }

    let request = PickRequest {
        commits: cli.commits,
        range,
        skip: cli.skip,
        apply_saved: cli.apply_saved,
        record_stats: !cli.no_stats,
        options: RunOptions {
            auto: cli.auto,
            dry_run: cli.dry_run,
            remote: cli.remote,
        },
    };
    service.pick(request)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(path: Option<&std::path::Path>) -> Result<()> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let cwd = std::env::current_dir()?;
            let vcs = GitCli::discover(&cwd, &Config::default())?;
            ConfigService::default_path(StateStore::in_git_dir(vcs.git_dir()).dir())
        }
    };
    ConfigService::generate_at(&config_path)?;
    eprintln!("Configuration file created at: {}", config_path.display());
    Ok(())
}

fn cmd_doctor() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let report = doctor::run_doctor(&cwd);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
