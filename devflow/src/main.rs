//! `devflow`: run the local dev server, then optionally commit, push and open
//! the deploy dashboard.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use devflow::exit_codes;
use devflow::io::browser::SystemBrowser;
use devflow::io::config::{CONFIG_FILE_NAME, DevflowConfig, load_config, write_config};
use devflow::io::console::TerminalConsole;
use devflow::io::git::Git;
use devflow::io::interrupt;
use devflow::io::readiness::HttpProbe;
use devflow::io::server::ProcessLauncher;
use devflow::logging;
use devflow::plan::{Overrides, WorkflowPlan, resolve_plan};
use devflow::workflow::{Collaborators, Stages, run_check, run_workflow};

#[derive(Parser)]
#[command(
    name = "devflow",
    version,
    about = "Local dev server and deploy workflow runner"
)]
struct Cli {
    /// Config file (defaults to ./devflow.toml; built-in defaults if missing).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project directory to run in (overrides `project_dir`).
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Named profile from the config file (e.g. `pro-features`).
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Exit immediately on fatal errors instead of waiting for Enter.
    #[arg(long, global = true)]
    no_pause: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct ServerArgs {
    /// Check out this branch before launching.
    #[arg(short, long)]
    branch: Option<String>,

    /// Bind host for the app server.
    #[arg(long)]
    host: Option<String>,

    /// Bind port for the app server.
    #[arg(long)]
    port: Option<u16>,

    /// Start the server in its own window and don't wait for it.
    #[arg(long, conflicts_with = "attached")]
    detached: bool,

    /// Run the server on this console until it is stopped.
    #[arg(long)]
    attached: bool,

    /// Disable hot reload.
    #[arg(long)]
    no_reload: bool,

    /// Skip `git pull` after checkout.
    #[arg(long)]
    no_pull: bool,
}

#[derive(Args, Debug, Default)]
struct DeployArgs {
    /// Commit message (prompted for when omitted; blank means default + date).
    #[arg(short, long)]
    message: Option<String>,

    /// Deploy without asking for confirmation.
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Preflight, optional branch switch, server, then deploy prompt.
    Run {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Check that the interpreter, git and required packages are available.
    Check,
    /// Preflight, optional branch switch, and server only.
    Serve {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Check out a branch and pull it.
    Switch {
        branch: String,
        /// Skip `git pull` after checkout.
        #[arg(long)]
        no_pull: bool,
    },
    /// Commit, push and open the deploy dashboard.
    Deploy {
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Write the default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// List configured profiles.
    Profiles,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    let mut overrides = Overrides {
        project_dir: cli.project_dir.clone(),
        no_pause: cli.no_pause,
        ..Overrides::default()
    };
    let stages = match &cli.command {
        Command::Init { force } => return cmd_init(&config_path, *force),
        Command::Profiles => return cmd_profiles(&config_path),
        Command::Check => None,
        Command::Run { server, deploy } => {
            apply_server_args(&mut overrides, server);
            apply_deploy_args(&mut overrides, deploy);
            Some(Stages::RUN)
        }
        Command::Serve { server } => {
            apply_server_args(&mut overrides, server);
            Some(Stages::SERVE)
        }
        Command::Switch { branch, no_pull } => {
            overrides.branch = Some(branch.clone());
            if *no_pull {
                overrides.pull_after_checkout = Some(false);
            }
            Some(Stages::SWITCH)
        }
        Command::Deploy { deploy } => {
            apply_deploy_args(&mut overrides, deploy);
            Some(Stages::DEPLOY)
        }
    };

    let cfg = load_config(&config_path)?;
    let plan = resolve_plan(&cfg, cli.profile.as_deref(), &overrides)?;
    if !plan.project_dir.is_dir() {
        bail!(
            "project directory {} does not exist",
            plan.project_dir.display()
        );
    }
    debug!(?plan, "resolved plan");

    interrupt::install()?;
    let outcome = with_system_collaborators(&plan, |deps| match stages {
        Some(stages) => run_workflow(&plan, stages, deps),
        None => run_check(&plan, deps),
    })?;
    Ok(outcome.exit_code())
}

fn apply_server_args(overrides: &mut Overrides, args: &ServerArgs) {
    overrides.branch = args.branch.clone();
    overrides.host = args.host.clone();
    overrides.port = args.port;
    if args.detached {
        overrides.spawn_detached = Some(true);
    } else if args.attached {
        overrides.spawn_detached = Some(false);
    }
    if args.no_reload {
        overrides.reload = Some(false);
    }
    if args.no_pull {
        overrides.pull_after_checkout = Some(false);
    }
}

fn apply_deploy_args(overrides: &mut Overrides, args: &DeployArgs) {
    overrides.commit_message = args.message.clone();
    overrides.assume_yes = args.yes;
}

fn with_system_collaborators<T>(
    plan: &WorkflowPlan,
    f: impl FnOnce(Collaborators<'_>) -> Result<T>,
) -> Result<T> {
    let preflight = plan.system_preflight();
    let git = Git::new(&plan.project_dir).with_program(&plan.git_program);
    let readiness = HttpProbe::new()?;
    f(Collaborators {
        preflight: &preflight,
        vcs: &git,
        launcher: &ProcessLauncher,
        readiness: &readiness,
        browser: &SystemBrowser,
        console: &TerminalConsole,
    })
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &DevflowConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    println!(
        "note: `deploy` stages everything with `git add -A`; list {} in .gitignore \
         to keep it out of deploy commits",
        path.display()
    );
    Ok(exit_codes::OK)
}

fn cmd_profiles(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    if cfg.profiles.is_empty() {
        println!("no profiles configured");
    }
    for (name, profile) in &cfg.profiles {
        let mut parts = Vec::new();
        if let Some(branch) = &profile.branch {
            parts.push(format!("branch={branch}"));
        }
        if let Some(host) = &profile.host {
            parts.push(format!("host={host}"));
        }
        if let Some(port) = profile.port {
            parts.push(format!("port={port}"));
        }
        if let Some(detached) = profile.spawn_detached {
            parts.push(format!("detached={detached}"));
        }
        println!("{name}\t{}", parts.join(" "));
    }
    Ok(exit_codes::OK)
}
