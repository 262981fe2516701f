//! robosim CLI - load robot descriptions and tick them from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use robosim_description::{urdf, ModelDescription};
use robosim_physics::{GripperCommand, JointTarget, Model, PrimitiveGeometry, SimConfig, Simulation};

#[derive(Parser)]
#[command(name = "robosim")]
#[command(about = "Build and simulate robot models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the links, joints and load report of a description
    Info {
        /// Description file (.json, .toml or .urdf)
        file: PathBuf,
        /// Simulation config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Tick a model and print the final observation as JSON
    Run {
        /// Description file (.json, .toml or .urdf)
        file: PathBuf,
        /// Simulation config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to step
        #[arg(short, long, default_value_t = 60)]
        frames: u64,
        /// Frame length in seconds
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f64,
        /// Host the model in the physics world
        #[arg(long)]
        physics: bool,
        /// Position target, as JOINT=VALUE (repeatable)
        #[arg(short, long, value_parser = parse_target)]
        target: Vec<(String, f64)>,
        /// Close a gripper at the first frame (repeatable)
        #[arg(long)]
        close: Vec<String>,
        /// Print an observation every N frames
        #[arg(long)]
        every: Option<u64>,
    },
    /// Convert a URDF file to a JSON description
    ConvertUrdf {
        /// Input .urdf file
        input: PathBuf,
        /// Output .json file
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robosim_physics=info,robosim_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file, config } => {
            show_info(&file, config.as_deref())?;
        }
        Commands::Run {
            file,
            config,
            frames,
            dt,
            physics,
            target,
            close,
            every,
        } => {
            let run = RunOptions {
                frames,
                dt,
                physics,
                targets: target,
                close,
                every,
            };
            run_model(&file, config.as_deref(), &run)?;
        }
        Commands::ConvertUrdf { input, output } => {
            convert_urdf(&input, &output)?;
        }
    }

    Ok(())
}

struct RunOptions {
    frames: u64,
    dt: f64,
    physics: bool,
    targets: Vec<(String, f64)>,
    close: Vec<String>,
    every: Option<u64>,
}

fn parse_target(arg: &str) -> Result<(String, f64), String> {
    let (joint, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected JOINT=VALUE, got '{}'", arg))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("bad target value '{}': {}", value, e))?;
    Ok((joint.trim().to_string(), value))
}

fn load_description(file: &Path) -> Result<ModelDescription> {
    ModelDescription::load(file).with_context(|| format!("Failed to load description {}", file.display()))
}

fn load_config(config: Option<&Path>) -> Result<SimConfig> {
    match config {
        Some(path) => SimConfig::load(path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

fn show_info(file: &Path, config: Option<&Path>) -> Result<()> {
    let description = load_description(file)?;
    let config = load_config(config)?;

    let mut model = Model::new(description.name.clone(), config);
    let report = model.load(&description, &PrimitiveGeometry::new())?;

    println!("robosim model: {} ({})", description.name, file.display());
    println!("  Links: {} built, {} skipped", report.links_built, report.links_skipped);
    println!("  Joints: {} built, {} skipped", report.joints_built, report.joints_skipped);
    println!("  Shapes skipped: {}", report.shapes_skipped);
    println!("  Scene bodies: {}", model.scene().len());

    println!("\nLinks:");
    for (name, link) in model.links() {
        let p = link.world_pose().translation.vector;
        let flag = if link.is_virtual { " (virtual)" } else { "" };
        println!(
            "  {}: {} collision, {} visual at [{:.3}, {:.3}, {:.3}]{}",
            name,
            link.collisions.len(),
            link.visuals.len(),
            p.x,
            p.y,
            p.z,
            flag
        );
    }

    if model.joint_count() > 0 {
        println!("\nJoints:");
        for (name, joint) in model.joints() {
            let limits = &joint.limits;
            println!(
                "  {}: {:?} [{}, {}]",
                name, joint.kind, limits.lower, limits.upper
            );
        }
    }

    Ok(())
}

fn run_model(file: &Path, config: Option<&Path>, run: &RunOptions) -> Result<()> {
    let description = load_description(file)?;
    let config = load_config(config)?;
    let controllers: Vec<String> = config.joint_controllers.keys().cloned().collect();

    let mut sim = Simulation::new(description, PrimitiveGeometry::new(), config, run.physics)
        .context("Failed to build simulation")?;

    for (joint, value) in &run.targets {
        let controller = controllers
            .iter()
            .find(|name| {
                sim.model()
                    .joint_controller(name)
                    .is_some_and(|c| c.controls(joint))
            })
            .with_context(|| format!("No joint controller drives '{}'", joint))?;
        sim.set_joint_target(controller, joint, JointTarget::Position(*value))?;
    }
    for gripper in &run.close {
        sim.command_gripper(gripper, GripperCommand::Close)?;
    }

    for _ in 0..run.frames {
        for event in sim.step(run.dt)? {
            tracing::info!("{}", serde_json::to_string(&event)?);
        }
        if let Some(every) = run.every.filter(|n| *n > 0) {
            if sim.frame() % every == 0 {
                println!("{}", serde_json::to_string(&sim.observe())?);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&sim.observe())?);
    Ok(())
}

fn convert_urdf(input: &Path, output: &Path) -> Result<()> {
    let description =
        urdf::from_urdf_file(input).with_context(|| format!("Failed to read URDF {}", input.display()))?;
    std::fs::write(output, description.to_json()?)?;
    println!(
        "Converted {} ({} links, {} joints) to {}",
        description.name,
        description.links.len(),
        description.joints.len(),
        output.display()
    );
    Ok(())
}
