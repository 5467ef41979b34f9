mod actions;
mod admin;
mod builder;
mod cli;
mod config;
mod producers;
mod topology;
mod ui;
mod validate;

use anyhow::Result;
use builder::TopologyBuilder;
use clap::Parser;
use cli::Cli;
use reconcile::ReportSink;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let topology = cli.topology_path().ok_or_else(|| {
        reconcile::Error::config("no topology given (pass a TOPOLOGY path or --topology)")
    })?;

    let config = cli.builder_config(topology);
    let mut builder = TopologyBuilder::build(config, ReportSink::stdout())?;

    if cli.validate {
        let topology = builder.topology();
        ui::success(&format!(
            "Topology '{}' is valid ({} projects, {} topics)",
            topology.context,
            topology.projects.len(),
            topology.topics().count()
        ));
        return Ok(());
    }

    if !cli.quiet {
        ui::header("Topology Builder");
        ui::kv("Context", &builder.topology().context);
        if let Some(brokers) = builder.properties().get(config::BOOTSTRAP_SERVERS) {
            ui::kv("Brokers", brokers);
        }
        ui::kv("State backend", &builder.backend().kind().to_string());
        ui::kv(
            "Mode",
            if builder.config().dry_run {
                "dry run"
            } else {
                "apply"
            },
        );
        println!();
    }

    let summary = builder.run()?;
    builder.close();

    if !cli.quiet && !cli.dry_run {
        if summary.executed == 0 {
            ui::success("Cluster already matches the topology");
        } else {
            ui::success(&format!(
                "Applied {} actions ({} bindings granted, {} revoked)",
                summary.executed, summary.granted, summary.revoked
            ));
        }
    }

    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<reconcile::Error>() {
        Some(e) => {
            let category = e.category();
            ui::error(&format!(
                "[{}] {}: {e}",
                category.label(),
                category.description()
            ));
            ui::hint(category.advice());
        }
        None => ui::error(&format!("{err:#}")),
    }
}
