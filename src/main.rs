//! incmount - replay a scene through the incremental mount engine

use clap::Parser;
use incmount::config::{
    apply_cli_overrides, apply_env_overrides, load_config_with_precedence, merge_config,
};
use incmount::scene::{load_scene, replay, SceneStep, StepReport};
use incmount::AppError;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Replay a scene fixture and print the mount operations of every step
#[derive(Parser, Debug)]
#[command(name = "incmount")]
#[command(version)]
#[command(about = "Replay viewport changes against a measured tree and print mount operations")]
pub struct Args {
    /// Path to the scene JSON file
    pub scene: PathBuf,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mount every output on each update instead of only visible ones
    #[arg(long)]
    pub no_incremental: bool,

    /// Fail on host-ordering violations instead of repairing them
    #[arg(long)]
    pub strict: bool,

    /// Print the render tree before the operations
    #[arg(long)]
    pub dump_tree: bool,

    /// Print step reports as JSON
    #[arg(long)]
    pub json: bool,
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Defaults → Config File → Env Vars → CLI Args
    let config = {
        let config_file = load_config_with_precedence(args.config.clone())?;
        let merged = merge_config(config_file);
        let with_env = apply_env_overrides(merged);
        let incremental_override = args.no_incremental.then_some(false);
        let strict_override = args.strict.then_some(true);
        apply_cli_overrides(with_env, incremental_override, strict_override)
    };

    incmount::logging::init(&config.log_file_path)?;
    info!(config = ?config, "Configuration loaded and resolved");

    let scene = load_scene(&args.scene)?;
    let replay = replay(&scene, config.mount_options())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.dump_tree {
        writeln!(out, "{}", replay.tree.dump())?;
        for conflict in replay.tree.diagnostics() {
            writeln!(out, "warning: {conflict}")?;
        }
        writeln!(out)?;
    }

    if args.json {
        serde_json::to_writer_pretty(&mut out, &replay.steps).map_err(std::io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    for report in &replay.steps {
        write_report(&mut out, report)?;
    }
    if !replay.teardown.is_empty() {
        writeln!(out, "# teardown")?;
        for event in &replay.teardown {
            writeln!(out, "{event}")?;
        }
    }
    Ok(())
}

fn write_report(out: &mut impl Write, report: &StepReport) -> std::io::Result<()> {
    writeln!(out, "# {}", step_label(report.step.as_ref()))?;
    for op in &report.ops {
        writeln!(out, "{op}")?;
    }
    for event in &report.events {
        writeln!(out, "{event}")?;
    }
    Ok(())
}

fn step_label(step: Option<&SceneStep>) -> String {
    match step {
        None => "attach".to_string(),
        Some(SceneStep::Rect(rect)) => format!("rect {rect}"),
        Some(SceneStep::MountAll) => "mount_all".to_string(),
        Some(SceneStep::UnmountAll) => "unmount_all".to_string(),
        Some(SceneStep::Layout { root }) => format!("layout {}", root.name),
        Some(SceneStep::Position(position)) => format!(
            "position {} visible {}..={}",
            position.position, position.first_visible, position.last_visible
        ),
    }
}
