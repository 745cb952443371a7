//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fanout_core::operation::{DEFAULT_INTERPRETER, DEFAULT_REMOTE_TEMP_DIR};
use fanout_core::{CopySpec, ExecutionMode, Operation, ScriptSpec};

#[derive(Parser, Debug)]
#[command(name = "fanout", version)]
#[command(about = "Run one operation across many hosts over SSH", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Host selection and run settings shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Comma-separated list of hostnames or IPs
    #[arg(short = 'H', long)]
    pub hosts: Option<String>,

    /// Auto-scaling group to resolve instead of --hosts
    #[arg(short = 'g', long, visible_alias = "asg")]
    pub fleet_group: Option<String>,

    /// Region for the fleet lookup
    #[arg(short = 'r', long, visible_alias = "region-name")]
    pub region: Option<String>,

    /// SSH username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// SSH port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// parallel or serial
    #[arg(short = 'e', long)]
    pub execution_mode: Option<ExecutionMode>,

    /// Timeout per operation in seconds (0 disables it)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Maximum concurrent hosts in parallel mode
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(short = 'f', long)]
    pub config: Option<PathBuf>,

    /// Also write debug logs to this file
    #[arg(short = 'l', long)]
    pub log_file: Option<PathBuf>,

    /// Show what would run without contacting any host
    #[arg(long)]
    pub dry_run: bool,

    /// Debug logging on stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Read the SSH password from this environment variable
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a shell command on every host
    Exec {
        #[command(flatten)]
        target: TargetArgs,

        /// Command line to run
        command: String,
    },

    /// Upload one file to every host
    Upload {
        #[command(flatten)]
        target: TargetArgs,

        /// Local file
        local_path: PathBuf,

        /// Remote path
        remote_path: String,
    },

    /// Copy a file or directory to every host
    Copy {
        #[command(flatten)]
        target: TargetArgs,

        /// Local file or directory
        source: PathBuf,

        /// Remote destination
        destination: String,

        /// Copy a directory tree
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Remote directory the archive is staged in
        #[arg(long, default_value = DEFAULT_REMOTE_TEMP_DIR)]
        remote_staging_dir: String,
    },

    /// Upload and run a script on every host
    Script {
        #[command(flatten)]
        target: TargetArgs,

        /// Local script
        script: PathBuf,

        /// Argument string passed to the script
        #[arg(short = 'a', long, allow_hyphen_values = true)]
        args: Option<String>,

        /// Absolute path of the interpreter
        #[arg(short = 'i', long, default_value = DEFAULT_INTERPRETER)]
        interpreter: String,

        /// Remote directory the script is uploaded to
        #[arg(long, default_value = DEFAULT_REMOTE_TEMP_DIR)]
        remote_temp_dir: String,

        /// Keep the uploaded script after it runs
        #[arg(long)]
        no_cleanup: bool,

        /// Skip chmod +x on the uploaded script
        #[arg(long)]
        no_chmod: bool,
    },
}

impl Commands {
    /// Title used in the summary and in logs
    pub fn label(&self) -> &'static str {
        match self {
            Commands::Exec { .. } => "Command execution",
            Commands::Upload { .. } => "File upload",
            Commands::Copy {
                recursive: true, ..
            } => "Directory copy",
            Commands::Copy { .. } => "File copy",
            Commands::Script { .. } => "Script execution",
        }
    }

    /// Split into run settings and the operation to perform
    pub fn into_parts(self) -> (TargetArgs, Operation) {
        match self {
            Commands::Exec { target, command } => (target, Operation::RunCommand { command }),
            Commands::Upload {
                target,
                local_path,
                remote_path,
            } => (
                target,
                Operation::Upload {
                    local_path,
                    remote_path,
                },
            ),
            Commands::Copy {
                target,
                source,
                destination,
                recursive,
                remote_staging_dir,
            } => (
                target,
                Operation::Copy(
                    CopySpec::new(source, destination)
                        .recursive(recursive)
                        .with_remote_staging_dir(remote_staging_dir),
                ),
            ),
            Commands::Script {
                target,
                script,
                args,
                interpreter,
                remote_temp_dir,
                no_cleanup,
                no_chmod,
            } => {
                let mut spec = ScriptSpec::new(script)
                    .with_interpreter(interpreter)
                    .with_remote_temp_dir(remote_temp_dir)
                    .with_cleanup(!no_cleanup)
                    .with_make_executable(!no_chmod);
                spec.args = args;
                (target, Operation::RunScript(spec))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_exec() {
        let cli = Cli::try_parse_from([
            "fanout", "exec", "-H", "web-1,web-2", "-u", "deploy", "-e", "serial", "uptime",
        ])
        .unwrap();

        assert_eq!(cli.command.label(), "Command execution");
        let (target, op) = cli.command.into_parts();
        assert_eq!(target.hosts.as_deref(), Some("web-1,web-2"));
        assert_eq!(target.execution_mode, Some(ExecutionMode::Serial));
        assert_eq!(
            op,
            Operation::RunCommand {
                command: "uptime".into()
            }
        );
    }

    #[test]
    fn test_parse_script_with_hyphenated_args() {
        let cli = Cli::try_parse_from([
            "fanout",
            "script",
            "--asg",
            "web-asg",
            "--region-name",
            "us-west-2",
            "--args",
            "--env prod",
            "--no-cleanup",
            "./setup.sh",
        ])
        .unwrap();

        let (target, op) = cli.command.into_parts();
        assert_eq!(target.fleet_group.as_deref(), Some("web-asg"));
        assert_eq!(target.region.as_deref(), Some("us-west-2"));

        let Operation::RunScript(spec) = op else {
            panic!("expected script operation");
        };
        assert_eq!(spec.args.as_deref(), Some("--env prod"));
        assert_eq!(spec.interpreter, DEFAULT_INTERPRETER);
        assert!(!spec.cleanup_after_execution);
        assert!(spec.make_executable);
    }

    #[test]
    fn test_parse_recursive_copy() {
        let cli = Cli::try_parse_from([
            "fanout", "copy", "-H", "web-1", "-R", "./site", "/srv/www",
        ])
        .unwrap();

        assert_eq!(cli.command.label(), "Directory copy");
        let (_, op) = cli.command.into_parts();
        let Operation::Copy(spec) = op else {
            panic!("expected copy operation");
        };
        assert!(spec.recursive);
        assert_eq!(spec.remote_staging_dir, "/tmp");
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Cli::try_parse_from(["fanout", "exec", "-e", "batch", "uptime"]);
        assert!(result.is_err());
    }
}
