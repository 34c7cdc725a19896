use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "taskwarden")]
#[command(author, version, about = "Task store warden for multi-agent coding sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Path to the task document (default: .taskwarden/warden.json)
    #[arg(long, global = true, env = "TASKWARDEN_STORE")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the task store in the current project
    Init,

    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Longer task description
        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, value_enum)]
        category: Option<CategoryArg>,

        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,

        /// Task IDs that must complete first (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,

        /// Agent whose work an audit task reviews
        #[arg(long)]
        original_implementer: Option<String>,

        /// Creating agent, recorded in the task history
        #[arg(long)]
        agent: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<StatusFilterArg>,
    },

    /// Claim a pending task for an agent
    Claim {
        /// Task ID
        task_id: String,

        /// Claiming agent
        #[arg(long)]
        agent: String,

        /// Bypass the audit-objectivity rule (flagged in task history)
        #[arg(long)]
        allow_out_of_order: bool,
    },

    /// Transition a task to a new status
    UpdateStatus {
        /// Task ID
        task_id: String,

        /// Target status
        #[arg(value_enum)]
        status: StatusArg,

        /// Acting agent
        #[arg(long)]
        agent: String,
    },

    /// Ask what the given agent should do next
    Guidance {
        /// Agent ID
        #[arg(long)]
        agent: String,
    },

    /// Revert in-progress tasks whose owners went quiet
    RevertStale {
        /// Override the configured staleness threshold
        #[arg(long)]
        threshold_minutes: Option<u64>,
    },

    /// List registered agents with derived liveness
    ListAgents,

    /// Record activity for an agent
    Heartbeat {
        /// Agent ID
        #[arg(long)]
        agent: String,

        /// Optional role metadata on first registration
        #[arg(long)]
        role: Option<String>,
    },

    /// Remove inactive agents from the registry (writes a backup first)
    CleanupAgents {
        /// Override the configured inactivity threshold
        #[arg(long)]
        threshold_minutes: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset to defaults
    Reset,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CategoryArg {
    Implementation,
    Audit,
    Research,
    Maintenance,
}

impl From<CategoryArg> for crate::task::TaskCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Implementation => Self::Implementation,
            CategoryArg::Audit => Self::Audit,
            CategoryArg::Research => Self::Research,
            CategoryArg::Maintenance => Self::Maintenance,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum PriorityArg {
    P1,
    P2,
    P3,
}

impl From<PriorityArg> for crate::task::Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::P1 => Self::P1,
            PriorityArg::P2 => Self::P2,
            PriorityArg::P3 => Self::P3,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl From<StatusArg> for crate::task::TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Completed => Self::Completed,
            StatusArg::Blocked => Self::Blocked,
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum StatusFilterArg {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl From<StatusFilterArg> for crate::task::TaskStatus {
    fn from(arg: StatusFilterArg) -> Self {
        match arg {
            StatusFilterArg::Pending => Self::Pending,
            StatusFilterArg::InProgress => Self::InProgress,
            StatusFilterArg::Completed => Self::Completed,
            StatusFilterArg::Blocked => Self::Blocked,
        }
    }
}
