//! Synthualizer CLI - play and render the polyphonic synth from a terminal.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synthualizer")]
#[command(author, version, about = "Polyphonic synth player and renderer", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play notes on an audio device
    Play(commands::play::PlayArgs),

    /// Render notes to a WAV file
    Render(commands::render::RenderArgs),

    /// List audio output devices
    Devices,

    /// List presets, or print one as TOML
    Presets(commands::presets::PresetsArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Play(args) => commands::play::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Devices => commands::devices::run(),
        Commands::Presets(args) => commands::presets::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_render_with_defaults() {
        let cli = Cli::try_parse_from(["synthualizer", "render", "out.wav"]).unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.output.to_str(), Some("out.wav"));
        assert_eq!(args.engine.notes, ["C3", "E3", "G3"]);
        assert_eq!(args.hold, 1.0);
        assert!(args.tail.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_play_options() {
        let cli = Cli::try_parse_from([
            "synthualizer",
            "-v",
            "play",
            "--preset",
            "pad",
            "--device",
            "1",
            "--notes",
            "C2,E2,G2",
            "--hold",
            "2.5",
            "--duration",
            "4",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.engine.preset.as_deref(), Some("pad"));
        assert_eq!(args.engine.notes, ["C2", "E2", "G2"]);
        assert_eq!(args.device.as_deref(), Some("1"));
        assert_eq!(args.hold, 2.5);
        assert_eq!(args.duration, Some(4.0));
    }

    #[test]
    fn preset_and_config_conflict() {
        let result = Cli::try_parse_from([
            "synthualizer",
            "render",
            "out.wav",
            "--preset",
            "pad",
            "--config",
            "mine.toml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["synthualizer", "presets", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Presets(_)));
    }
}
