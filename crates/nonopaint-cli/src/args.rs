//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Copy a nonogram's answer picture and paint it onto the puzzle.
///
/// Works against an Android device over adb. Capture the answer screen
/// first, then open the puzzle in its default state and paint.
#[derive(Debug, Parser)]
#[command(name = "nonopaint", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Args)]
pub struct GlobalArgs {
    /// Directory for screenshots, the bitmap and diagnostic masks
    #[arg(long, global = true, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// JSON file overriding thresholds, kernels and timings
    #[arg(long, global = true, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// adb executable
    #[arg(long, global = true, default_value = "adb", value_name = "PATH")]
    pub adb: PathBuf,

    /// Target device serial (see 'nonopaint devices')
    #[arg(short, long, global = true)]
    pub serial: Option<String>,

    /// scrcpy-server binary pushed to the device for fast input
    #[arg(long, global = true, value_name = "FILE")]
    pub agent: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Screenshot the answer picture and save it as the target bitmap
    #[command(after_help = "\
Examples:
  nonopaint capture 15 15               # Monochrome 15x15 puzzle
  nonopaint capture 20 10 --colored     # Coloured 20 wide, 10 high
  nonopaint capture 15 15 --work-dir .  # Keep artifacts in the current dir")]
    Capture(PuzzleArgs),

    /// Paint the saved bitmap onto the puzzle on screen
    #[command(after_help = "\
The puzzle must be open in its default state: nothing painted, no zoom.

Examples:
  nonopaint paint 15 15                          # Monochrome puzzle
  nonopaint paint 20 10 --colored                # Coloured puzzle
  nonopaint paint 15 15 --agent ./scrcpy-server  # Explicit agent binary")]
    Paint(PuzzleArgs),

    /// Locate nonogram, grid and palette on a saved screenshot
    #[command(after_help = "\
Prints the located geometry as JSON. Useful for tuning --calibration
without a device.

Examples:
  nonopaint analyze screenshot.png 15 15
  nonopaint analyze shot.png 20 10 --colored --calibration tuned.json")]
    Analyze(AnalyzeArgs),

    /// List connected devices
    Devices,

    /// Tap once through adb (slow)
    #[command(after_help = "\
Examples:
  nonopaint tap 540 1200
  nonopaint tap -s emulator-5554 100 100")]
    Tap(TapArgs),

    /// Swipe once through adb (slow)
    #[command(after_help = "\
Examples:
  nonopaint swipe 200 1800 800 1800              # Default 300ms
  nonopaint swipe 200 1800 800 1800 --duration 200")]
    Swipe(SwipeArgs),
}

#[derive(Debug, clap::Args)]
pub struct PuzzleArgs {
    /// Puzzle width in cells
    pub width: u32,

    /// Puzzle height in cells
    pub height: u32,

    /// The puzzle uses a colour palette
    #[arg(short, long)]
    pub colored: bool,
}

#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// PNG screenshot of the puzzle screen
    pub screenshot: PathBuf,

    #[command(flatten)]
    pub puzzle: PuzzleArgs,
}

#[derive(Debug, clap::Args)]
pub struct TapArgs {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, clap::Args)]
pub struct SwipeArgs {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,

    /// Swipe duration in milliseconds
    #[arg(long, default_value_t = 300, value_name = "MS")]
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_paint_parses_size_and_colored() {
        let cli = Cli::parse_from(["nonopaint", "paint", "20", "10", "--colored"]);

        match cli.command {
            Commands::Paint(args) => {
                assert_eq!((args.width, args.height), (20, 10));
                assert!(args.colored);
            }
            _ => panic!("Expected paint command"),
        }
        assert_eq!(cli.global.adb, PathBuf::from("adb"));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "nonopaint",
            "capture",
            "15",
            "15",
            "--work-dir",
            "/tmp/work",
            "-s",
            "emulator-5554",
        ]);

        assert_eq!(cli.global.work_dir, Some(PathBuf::from("/tmp/work")));
        assert_eq!(cli.global.serial.as_deref(), Some("emulator-5554"));
        assert!(matches!(cli.command, Commands::Capture(ref a) if !a.colored));
    }

    #[test]
    fn test_analyze_takes_screenshot_path() {
        let cli = Cli::parse_from(["nonopaint", "analyze", "shot.png", "5", "5", "-c"]);

        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.screenshot, PathBuf::from("shot.png"));
                assert!(args.puzzle.colored);
            }
            _ => panic!("Expected analyze command"),
        }
    }

    #[test]
    fn test_swipe_default_duration() {
        let cli = Cli::parse_from(["nonopaint", "swipe", "200", "1800", "800", "1800"]);

        match cli.command {
            Commands::Swipe(args) => {
                assert_eq!((args.x1, args.y2), (200, 1800));
                assert_eq!(args.duration, 300);
            }
            _ => panic!("Expected swipe command"),
        }
    }
}
