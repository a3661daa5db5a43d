use anyhow::{Context as _, Result};
use clap::Parser;
use dtnsim::{FromSettings as _, RouterConfig, Scenario, Settings, Simulation};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// run a disaster router scenario and print its summary
#[derive(Parser)]
struct Command {
    /// settings file (`Namespace.key = value` lines)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// override `Scenario.seed`
    #[arg(long)]
    seed: Option<u64>,

    /// override `Scenario.nrofHosts`
    #[arg(long)]
    hosts: Option<usize>,

    /// override `Scenario.endTime`, e.g. `2h`
    #[arg(long)]
    end_time: Option<String>,

    /// override `DisasterRouter.messageChooser` (`utility` or `epidemic`)
    #[arg(long)]
    chooser: Option<String>,

    /// hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cmd = Command::parse();

    let mut settings = match &cmd.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(seed) = cmd.seed {
        settings.set("Scenario.seed", seed.to_string());
    }
    if let Some(hosts) = cmd.hosts {
        settings.set("Scenario.nrofHosts", hosts.to_string());
    }
    if let Some(end_time) = &cmd.end_time {
        settings.set("Scenario.endTime", end_time.as_str());
    }
    if let Some(chooser) = &cmd.chooser {
        settings.set("DisasterRouter.messageChooser", chooser.as_str());
    }

    let scenario = Scenario::from_settings(&settings).context("Invalid scenario settings")?;
    let config = RouterConfig::from_settings(&settings).context("Invalid router settings")?;
    let steps = scenario.steps();

    let pb = if cmd.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(steps)
    };
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} steps [{elapsed_precise}] {msg}")
            .context("Invalid progress bar template")?,
    );

    let summary = Simulation::new(scenario, config)?.run(|now| {
        pb.inc(1);
        pb.set_message(format!("t={now}"));
    })?;
    pb.finish_and_clear();

    println!("{summary}");
    Ok(())
}
