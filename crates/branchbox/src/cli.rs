use crate::commands::{self, CommandContext};
use anyhow::Result;
use branchbox_core::config::Config;
use branchbox_core::docker::Docker;
use branchbox_core::errors::BranchboxError;
use branchbox_core::logging::{self, LogSettings};
use branchbox_core::runtime::{RuntimeFactory, RuntimeKind};
use branchbox_core::sync::interrupt_signal;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Runtime selection options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum RuntimeOption {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl From<RuntimeOption> for RuntimeKind {
    fn from(runtime: RuntimeOption) -> Self {
        match runtime {
            RuntimeOption::Docker => RuntimeKind::Docker,
            RuntimeOption::Podman => RuntimeKind::Podman,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

impl LogFormat {
    fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Per-branch containerized development workspaces
#[derive(Debug, Parser)]
#[command(name = "branchbox")]
#[command(version, about)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "Examples:\n  \
    branchbox https://github.com/acme/api.git feature/login\n  \
    branchbox ./api\n  \
    branchbox claude api-feature-login\n  \
    branchbox push api-feature-login")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format (text or json, can be set via BRANCHBOX_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Configuration file path (can be set via BRANCHBOX_CONFIG env var)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Container runtime to use (docker or podman, can be set via BRANCHBOX_RUNTIME env var)
    #[arg(long, global = true, value_enum)]
    pub runtime: Option<RuntimeOption>,

    /// Path to the container engine executable
    #[arg(long, global = true, value_name = "PATH")]
    pub docker_path: Option<String>,

    #[command(flatten)]
    pub create: CreateArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Repository and branch of a workspace to create
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Repository URL or local path
    pub repo: Option<String>,
    /// Branch name (defaults to the current branch of a local repository, or main)
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Create a workspace (the default when no subcommand is given)
    #[command(hide = true)]
    Create {
        /// Repository URL or local path
        repo: String,
        /// Branch name
        branch: Option<String>,
    },
    /// List all workspaces
    Ls {
        /// Print the listing as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Open claude-code in a workspace
    Claude {
        /// Workspace name
        name: String,
    },
    /// Start a workspace and open VS Code
    Code {
        /// Workspace name
        name: String,
    },
    /// Remove a workspace
    Rm {
        /// Workspace name
        name: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Push repository changes to the remote
    Push {
        /// Workspace name
        name: String,
    },
    /// Run git commands in a workspace
    Git {
        /// Workspace name
        name: String,
        /// Arguments to pass to git
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Start a workspace
    Start {
        /// Workspace name
        name: String,
    },
    /// Stop a workspace
    Stop {
        /// Workspace name
        name: String,
    },
}

impl Cli {
    /// The subcommand to run, with a bare `<repo> [branch]` meaning `create`
    pub fn resolved_command(&self) -> Option<Commands> {
        match (&self.command, &self.create.repo) {
            (Some(command), _) => Some(command.clone()),
            (None, Some(repo)) => Some(Commands::Create {
                repo: repo.clone(),
                branch: self.create.branch.clone(),
            }),
            (None, None) => None,
        }
    }

    /// Dispatch the parsed command
    ///
    /// Initializes logging, loads configuration, selects the container runtime and
    /// checks that the engine is reachable before any workspace operation. Without
    /// a command the help text is printed.
    pub async fn dispatch(self) -> Result<()> {
        let Some(command) = self.resolved_command() else {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        };

        let logger = logging::init(&LogSettings {
            verbose: self.verbose,
            format: self.log_format.map(|f| f.as_str().to_string()),
        })?;
        tracing::debug!("CLI initialized (verbose: {})", self.verbose);

        let config = Config::load(self.config.as_deref())?;
        let runtime_kind = RuntimeFactory::detect_runtime(self.runtime.map(Into::into));
        let docker = RuntimeFactory::create_runtime(runtime_kind, self.docker_path.clone());
        docker.ping().await?;

        let ctx = CommandContext {
            docker,
            config,
            logger,
        };

        match command {
            // These manage their own interruption so the running guard is always released
            Commands::Push { .. } | Commands::Git { .. } | Commands::Claude { .. } => {
                run(&ctx, command).await
            }
            other => {
                let interrupted = interrupt_signal();
                tokio::select! {
                    result = run(&ctx, other) => result,
                    _ = interrupted => Err(BranchboxError::Cancelled.into()),
                }
            }
        }
    }
}

async fn run(ctx: &CommandContext, command: Commands) -> Result<()> {
    match command {
        Commands::Create { repo, branch } => commands::create::execute_create(ctx, repo, branch).await,
        Commands::Ls { json } => commands::list::execute_list(ctx, json).await,
        Commands::Code { name } => commands::attach::execute_code(ctx, &name).await,
        Commands::Rm { name, yes } => commands::remove::execute_remove(ctx, &name, yes).await,
        Commands::Start { name } => commands::lifecycle::execute_start(ctx, &name).await,
        Commands::Stop { name } => commands::lifecycle::execute_stop(ctx, &name).await,
        Commands::Push { name } => commands::sync::execute_push(ctx, &name).await,
        Commands::Git { name, args } => commands::sync::execute_git(ctx, &name, &args).await,
        Commands::Claude { name } => commands::attach::execute_claude(ctx, &name).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_repo_means_create() {
        let cli = Cli::parse_from(["branchbox", "https://github.com/acme/api.git", "feature/x"]);
        match cli.resolved_command() {
            Some(Commands::Create { repo, branch }) => {
                assert_eq!(repo, "https://github.com/acme/api.git");
                assert_eq!(branch.as_deref(), Some("feature/x"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_arguments_has_no_command() {
        let cli = Cli::parse_from(["branchbox"]);
        assert!(cli.resolved_command().is_none());
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::parse_from(["branchbox", "-v", "ls", "--json"]);
        assert!(cli.verbose);
        assert!(matches!(cli.resolved_command(), Some(Commands::Ls { json: true })));

        let cli = Cli::parse_from(["branchbox", "rm", "api-main", "--yes"]);
        assert!(matches!(
            cli.resolved_command(),
            Some(Commands::Rm { ref name, yes: true }) if name == "api-main"
        ));
    }

    #[test]
    fn test_git_passes_hyphenated_arguments() {
        let cli = Cli::parse_from(["branchbox", "git", "api-main", "log", "--oneline", "-n", "5"]);
        match cli.resolved_command() {
            Some(Commands::Git { name, args }) => {
                assert_eq!(name, "api-main");
                assert_eq!(args, vec!["log", "--oneline", "-n", "5"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_runtime_option_conversion() {
        let cli = Cli::parse_from(["branchbox", "--runtime", "podman", "ls"]);
        assert_eq!(cli.runtime.map(RuntimeKind::from), Some(RuntimeKind::Podman));
    }
}
