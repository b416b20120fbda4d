//! nonopaint CLI entry point.

mod args;
mod device;
mod runner;

use std::time::Duration;

use clap::Parser;
use nonopaint_core::geometry::Point;
use nonopaint_core::grid::PuzzleSize;
use tracing::error;

use crate::args::{Cli, Commands, PuzzleArgs};
use crate::device::{AdbBridge, AgentConfig, ArtifactPaths};
use crate::runner::{load_calibration, Runner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn puzzle_size(args: &PuzzleArgs) -> anyhow::Result<PuzzleSize> {
    Ok(PuzzleSize::new(args.width, args.height)?)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    let paths = ArtifactPaths::resolve(global.work_dir.as_deref());
    let agent = AgentConfig::resolve(global.agent.as_deref(), paths.root());
    let bridge = AdbBridge::new(global.adb, global.serial);
    let calibration = load_calibration(global.calibration.as_deref())?;
    let runner = Runner::new(bridge, calibration, paths, agent);

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Capture(args) => {
                runner.capture(puzzle_size(&args)?, args.colored).await?;
            }
            Commands::Paint(args) => {
                runner.paint(puzzle_size(&args)?, args.colored).await?;
            }
            Commands::Analyze(args) => {
                let size = puzzle_size(&args.puzzle)?;
                let analysis = runner.analyze_file(&args.screenshot, size, args.puzzle.colored)?;
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            }
            Commands::Devices => {
                let devices = runner.bridge().list_devices().await?;
                println!("{}", serde_json::to_string_pretty(&devices)?);
            }
            Commands::Tap(args) => {
                runner.bridge().tap(Point::new(args.x, args.y)).await?;
            }
            Commands::Swipe(args) => {
                runner
                    .bridge()
                    .swipe(
                        Point::new(args.x1, args.y1),
                        Point::new(args.x2, args.y2),
                        Duration::from_millis(args.duration),
                    )
                    .await?;
            }
        }
        Ok(())
    })
}
