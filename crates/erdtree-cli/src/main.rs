//! ErdTree operator CLI.
//!
//! Drives a version-tree database directly: start conversations, append,
//! fork, and inspect branches.
//!
//! Usage:
//!   erdtree new "You are terse." --role system
//!   erdtree append main user "hello"
//!   erdtree fork main 0190a1b2 --label retry
//!   erdtree history retry
//!   erdtree tree
//!   erdtree --json history main
//!
//! Branches may be given by label, label prefix, or id prefix; nodes by id
//! prefix. The database defaults to `$XDG_DATA_HOME/erdtree/erdtree.db`.

mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use erdtree_kernel::api::{AppendResponse, BranchView, CreateChatResponse, ForkResponse, HistoryResponse, MessageView};
use erdtree_kernel::{Branch, Engine, ErdConfig, Role};

/// Conversation version-tree tool.
#[derive(Parser, Debug)]
#[command(name = "erdtree")]
#[command(about = "Branching conversation history store")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/erdtree/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    db: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a conversation
    New {
        content: String,
        #[arg(long, default_value = "system", value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        label: Option<String>,
    },
    /// Append a message to a branch
    Append {
        branch: String,
        #[arg(value_parser = parse_role)]
        role: Role,
        content: String,
    },
    /// Fork a branch at a node in its history
    Fork {
        branch: String,
        node: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Show a branch's messages
    History { branch: String },
    /// List branches
    Branches,
    /// Relabel a branch
    Rename { branch: String, label: String },
    /// Show the whole forest
    Tree {
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Show the context window a model would get for a branch
    Context {
        branch: String,
        #[arg(long)]
        window: Option<usize>,
    },
}

fn parse_role(s: &str) -> std::result::Result<Role, String> {
    Role::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = Role::all().iter().map(|r| r.as_str()).collect();
        format!("unknown role '{s}' (expected one of: {})", known.join(", "))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("erdtree: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("erdtree: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ErdConfig> {
    let mut config = ErdConfig::load_or_default(cli.config.as_deref()).context("loading config")?;
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }
    if config.db_path.is_none() {
        let default = ErdConfig::default_db_path().context("no data directory for the default database")?;
        config.db_path = Some(default.to_string_lossy().into_owned());
    }
    Ok(config)
}

fn run(cli: Cli, config: ErdConfig) -> Result<()> {
    let engine = Engine::open(config).context("opening engine")?;
    let ctl = engine.controller();
    let out = Output { json: cli.json };

    match cli.command {
        Command::New { content, role, label } => {
            let (root, branch) = match label {
                Some(label) => ctl.create_root_labeled(role, content, label)?,
                None => ctl.create_root(role, content)?,
            };
            out.emit(
                &CreateChatResponse {
                    branch_id: branch.id,
                    node_id: root.id,
                    label: branch.label.clone(),
                },
                || vec![format!("{} {} (root {})", branch.id.short(), branch.label, root.id.short())],
            )
        }
        Command::Append { branch, role, content } => {
            let branch = find_branch(&engine, &branch)?;
            let node = ctl.append_message(branch.id, role, content)?;
            out.emit(&AppendResponse::from(node.as_ref()), || {
                vec![format!("{} -> {}", branch.display_name(), node.id.short())]
            })
        }
        Command::Fork { branch, node, label } => {
            let source = find_branch(&engine, &branch)?;
            let at = engine.find_node(&node).with_context(|| format!("node '{node}'"))?;
            let fork = ctl.fork_branch(source.id, at, label)?;
            out.emit(&ForkResponse::from(&fork), || {
                vec![format!("{} {} (from {} @ {})", fork.id.short(), fork.label, source.display_name(), at.short())]
            })
        }
        Command::History { branch } => {
            let branch = find_branch(&engine, &branch)?;
            let history = engine.history().resolve(branch.id)?;
            out.emit(&HistoryResponse::new(&branch, &history), || render::format_history(&history))
        }
        Command::Branches => {
            let branches = engine.branches().list();
            let views: Vec<BranchView> = branches.iter().map(BranchView::from).collect();
            out.emit(&views, || render::format_branches(&branches))
        }
        Command::Rename { branch, label } => {
            let branch = find_branch(&engine, &branch)?;
            let renamed = ctl.rename_branch(branch.id, label)?;
            out.emit(&BranchView::from(&renamed), || {
                vec![format!("{} -> {}", branch.display_name(), renamed.label)]
            })
        }
        Command::Tree { max_depth } => {
            let branches = engine.branches().list();
            let tree = engine.tree();
            let views: Vec<MessageView> = tree.iter_dfs().map(|(_, n)| MessageView::from(n.as_ref())).collect();
            out.emit(&views, || render::format_tree(&tree, &branches, max_depth))
        }
        Command::Context { branch, window } => {
            let branch = find_branch(&engine, &branch)?;
            let context = engine.context(branch.id, window)?;
            let views: Vec<MessageView> = context.messages.iter().map(|n| MessageView::from(n.as_ref())).collect();
            out.emit(&views, || render::format_context(&context))
        }
    }
}

fn find_branch(engine: &Engine, query: &str) -> Result<Branch> {
    engine.find_branch(query).with_context(|| format!("branch '{query}'"))
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> Vec<String>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in text() {
                println!("{line}");
            }
        }
        Ok(())
    }
}
