use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agent_deck::conductor::{conductor_session_title, ConductorRegistry, ConfigRoot};
use agent_deck::config::DeckConfig;
use agent_deck::daemon::{bridge_daemon_hint, write_unit_file, DaemonScheduler};
use agent_deck::session::{IdentityAllocator, Instance};
use agent_deck::tmux::strip_ansi;

#[derive(Debug, Parser)]
#[command(name = "agent-deck", version)]
#[command(about = "Status detection, session forking and conductors for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a captured pane snapshot (reads stdin without --file)
    Status {
        #[arg(long, default_value = "claude")]
        tool: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    #[command(subcommand)]
    Session(SessionCommand),
    #[command(subcommand)]
    Conductor(ConductorCommand),
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    /// Create a session and print its launch command
    New {
        title: String,
        #[arg(long, default_value = ".")]
        path: PathBuf,
        #[arg(long, default_value = "claude")]
        tool: String,
    },
    /// Fork an existing conversation into a new session
    Fork {
        title: String,
        /// Conversation ID of the session being forked
        #[arg(long)]
        from: String,
        #[arg(long, default_value = ".")]
        parent_path: PathBuf,
        /// Project path for the fork (defaults to the parent's)
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long, default_value = "claude")]
        tool: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConductorCommand {
    /// Create or refresh a conductor
    Setup {
        name: String,
        #[arg(long, default_value = "default")]
        profile: String,
        #[arg(long, default_value_t = false)]
        no_heartbeat: bool,
        #[arg(long, default_value = "")]
        description: String,
        /// Custom CLAUDE.md location (absolute or ~/...)
        #[arg(long)]
        claude_md: Option<String>,
        /// Also write the heartbeat units for this platform
        #[arg(long, default_value_t = false)]
        install: bool,
    },
    Show {
        name: String,
    },
    List,
    Teardown {
        name: String,
    },
    /// Print (or write) the heartbeat units for a conductor
    Units {
        name: String,
        #[arg(long, default_value_t = false)]
        write: bool,
    },
    BridgeHint,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = ConfigRoot::detect().context("Failed to locate home directory")?;
    let config = DeckConfig::load(&root)?;

    match cli.command {
        Command::Status { tool, file } => {
            let raw = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read snapshot from stdin")?;
                    buf
                }
            };
            let status = config.status_classifier().classify(&tool, &strip_ansi(&raw))?;
            println!("{status}");
        }
        Command::Session(command) => run_session(command)?,
        Command::Conductor(command) => run_conductor(command, root, config).await?,
    }

    Ok(())
}

fn run_session(command: SessionCommand) -> Result<()> {
    let (instance, launch) = match command {
        SessionCommand::New { title, path, tool } => {
            let instance = Instance::new_with_tool(&title, &path, &tool);
            let launch = instance.launch_command();
            (instance, launch)
        }
        SessionCommand::Fork {
            title,
            from,
            parent_path,
            path,
            tool,
        } => {
            let parent = Instance::restore(IdentityAllocator::global(), "fork-parent", &parent_path, &tool, &from)?;
            parent.create_forked_instance(&title, path.as_deref())?
        }
    };

    println!("{}", serde_json::to_string_pretty(&instance)?);
    println!("{}", launch.to_shell()?);
    Ok(())
}

async fn run_conductor(command: ConductorCommand, root: ConfigRoot, config: DeckConfig) -> Result<()> {
    let interval = config.conductor.get_heartbeat_interval();
    let scheduler = DaemonScheduler::new(root.clone());
    let registry = ConductorRegistry::with_settings(root, config.conductor);

    match command {
        ConductorCommand::Setup {
            name,
            profile,
            no_heartbeat,
            description,
            claude_md,
            install,
        } => {
            let meta = registry
                .setup_conductor(&name, &profile, !no_heartbeat, &description, claude_md.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            println!("session: {}", conductor_session_title(&name));
            println!("CLAUDE.md: {}", registry.resolve_claude_md_path(&meta)?.display());

            if install && meta.heartbeat_enabled {
                for unit in scheduler.heartbeat_units(&name, interval)? {
                    write_unit_file(&unit).await?;
                    println!("wrote {}", unit.path.display());
                }
                println!("{}", scheduler.heartbeat_hint(&name));
            }
        }
        ConductorCommand::Show { name } => {
            let meta = registry.load_conductor_meta(&name).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            println!("CLAUDE.md: {}", registry.get_conductor_claude_md_path(&name).await?.display());
        }
        ConductorCommand::List => {
            for meta in registry.list_conductors().await? {
                let heartbeat = if meta.heartbeat_enabled { "heartbeat" } else { "-" };
                println!("{}\t{}\t{}\t{}", meta.name, meta.profile, heartbeat, meta.description);
            }
        }
        ConductorCommand::Teardown { name } => {
            if registry.teardown_conductor(&name).await? {
                println!("removed conductor {name}");
            } else {
                println!("conductor {name} does not exist");
            }
        }
        ConductorCommand::Units { name, write } => {
            for unit in scheduler.heartbeat_units(&name, interval)? {
                if write {
                    write_unit_file(&unit).await?;
                    println!("wrote {}", unit.path.display());
                } else {
                    println!("# {}\n{}", unit.path.display(), unit.contents);
                }
            }
            if write {
                println!("{}", scheduler.heartbeat_hint(&name));
            }
        }
        ConductorCommand::BridgeHint => println!("{}", bridge_daemon_hint()),
    }

    Ok(())
}
