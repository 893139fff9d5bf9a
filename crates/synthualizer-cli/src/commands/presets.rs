//! Preset listing.

use anyhow::Context;
use clap::Args;
use synthualizer_config::{
    factory_presets, list_user_presets, load_preset, preset_name_from_path, user_presets_dir,
    EngineConfig,
};

#[derive(Args, Debug)]
pub struct PresetsArgs {
    /// Print a preset as TOML instead of listing
    #[arg(long, value_name = "NAME")]
    pub show: Option<String>,

    /// List as JSON (factory presets first, then readable user presets)
    #[arg(long, conflicts_with = "show")]
    pub json: bool,
}

pub fn run(args: PresetsArgs) -> anyhow::Result<()> {
    match args.show {
        Some(name) => show_preset(&name),
        None if args.json => list_presets_json(),
        None => list_presets(),
    }
}

fn list_presets_json() -> anyhow::Result<()> {
    let mut presets = factory_presets();
    presets.extend(
        list_user_presets()
            .iter()
            .filter_map(|path| EngineConfig::load(path).ok()),
    );
    println!("{}", serde_json::to_string_pretty(&presets)?);
    Ok(())
}

fn show_preset(name: &str) -> anyhow::Result<()> {
    let preset = load_preset(name).with_context(|| format!("loading preset '{name}'"))?;
    print!("{}", preset.to_toml()?);
    Ok(())
}

fn list_presets() -> anyhow::Result<()> {
    println!("Factory Presets:");
    println!("================");
    for preset in factory_presets() {
        println!("  {}", summary(&preset));
    }
    println!();

    println!("User Presets ({}):", user_presets_dir().display());
    println!("=============");
    let user_presets = list_user_presets();
    if user_presets.is_empty() {
        println!("  (none)");
    }
    for path in user_presets {
        let name = preset_name_from_path(&path).unwrap_or_else(|| "unknown".to_string());
        match EngineConfig::load(&path) {
            Ok(preset) => println!("  {name:12} {}", summary(&preset)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable preset");
                println!("  {name:12} (invalid: {e})");
            }
        }
    }
    Ok(())
}

fn summary(preset: &EngineConfig) -> String {
    let desc = preset.description.as_deref().unwrap_or("");
    format!(
        "{:12} {:11} {:2} voices  {}",
        preset.name, preset.variant, preset.polyphony, desc
    )
}
