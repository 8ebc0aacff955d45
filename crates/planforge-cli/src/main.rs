mod config;
mod generate_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use planforge_core::PlanPipeline;

use config::{CliOverrides, PlanforgeConfig};

#[derive(Parser)]
#[command(name = "planforge", about = "Draft and audit project plans with two LLMs")]
struct Cli {
    /// Config file path (defaults to ~/.config/planforge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a commented config file template
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Start the HTTP service
    Serve {
        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate one plan and print it as JSON
    Generate {
        /// What the project should achieve
        #[arg(long)]
        description: String,
        /// Scheduling strategy (defaults to "Standard")
        #[arg(long)]
        strategy: Option<String>,
    },
}

/// Execute the `planforge init` command: write config file.
fn cmd_init(path_override: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path_override
        .map(Path::to_path_buf)
        .unwrap_or_else(config::config_path);

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    config::write_default_config(&path)?;

    println!("Config written to {}", path.display());
    println!();
    println!(
        "Set {} and {} (or edit the file), then run `planforge serve`.",
        config::ENV_GENERATION_API_KEY,
        config::ENV_AUDIT_API_KEY
    );
    Ok(())
}

/// Resolve config and build the pipeline shared by `serve` and `generate`.
fn build_pipeline(
    config_path: Option<&Path>,
    cli: &CliOverrides,
) -> anyhow::Result<(PlanforgeConfig, PlanPipeline)> {
    let resolved = PlanforgeConfig::resolve(config_path, cli)?;
    for which in resolved.service.missing_api_keys() {
        tracing::warn!(
            provider = which,
            "no {which} API key configured; upstream calls will be rejected"
        );
    }
    let pipeline = PlanPipeline::from_config(&resolved.service)?;
    Ok((resolved, pipeline))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(config_path, force)?;
        }
        Commands::Serve { bind, port } => {
            let overrides = CliOverrides { bind, port };
            let (resolved, pipeline) = build_pipeline(config_path, &overrides)?;
            serve_cmd::run_serve(pipeline, &resolved.bind, resolved.port).await?;
        }
        Commands::Generate {
            description,
            strategy,
        } => {
            let (_, pipeline) = build_pipeline(config_path, &CliOverrides::default())?;
            generate_cmd::run_generate(&pipeline, &description, strategy).await?;
        }
    }

    Ok(())
}
