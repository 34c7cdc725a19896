use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskwarden::audit::{validate_claim, ClaimValidation};
use taskwarden::cli::{
    CategoryArg, Cli, Commands, ConfigAction, Display, OutputFormat, PriorityArg, StatusArg,
    StatusFilterArg,
};
use taskwarden::config::WardenConfig;
use taskwarden::error::{Result, WardenError};
use taskwarden::guidance::{GuidanceEngine, RepetitionCheck};
use taskwarden::registry::AgentRegistry;
use taskwarden::store::{JsonStore, TaskDocument, TaskRepository};
use taskwarden::sweep::StalenessDetector;
use taskwarden::task::{AccessAction, Task, TaskStatus};

const DEFAULT_STORE_DIR: &str = ".taskwarden";
const STORE_FILE: &str = "warden.json";

struct Context {
    store: JsonStore,
    config: WardenConfig,
    display: Display,
    output: OutputFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("taskwarden=debug")
    } else {
        EnvFilter::new("taskwarden=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

fn store_path(cli_store: Option<PathBuf>) -> PathBuf {
    cli_store.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR).join(STORE_FILE))
}

fn warden_dir(path: &std::path::Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let path = store_path(cli.store);
    let dir = warden_dir(&path);
    let config = WardenConfig::load(&dir).await?;
    let store = JsonStore::new(path)
        .with_lock_timeout(Duration::from_secs(config.store.lock_timeout_secs));

    let ctx = Context {
        store,
        config,
        display: Display::new(),
        output: cli.output,
    };

    match cli.command {
        Commands::Init => cmd_init(&ctx).await,
        Commands::Create {
            title,
            description,
            category,
            priority,
            depends_on,
            original_implementer,
            agent,
        } => {
            cmd_create(
                &ctx,
                title,
                description,
                category,
                priority,
                depends_on,
                original_implementer,
                agent,
            )
            .await
        }
        Commands::List { status } => cmd_list(&ctx, status).await,
        Commands::Claim {
            task_id,
            agent,
            allow_out_of_order,
        } => cmd_claim(&ctx, &task_id, &agent, allow_out_of_order).await,
        Commands::UpdateStatus {
            task_id,
            status,
            agent,
        } => cmd_update_status(&ctx, &task_id, status, &agent).await,
        Commands::Guidance { agent } => cmd_guidance(&ctx, &agent).await,
        Commands::RevertStale { threshold_minutes } => {
            cmd_revert_stale(&ctx, threshold_minutes).await
        }
        Commands::ListAgents => cmd_list_agents(&ctx).await,
        Commands::Heartbeat { agent, role } => cmd_heartbeat(&ctx, &agent, role).await,
        Commands::CleanupAgents { threshold_minutes } => {
            cmd_cleanup_agents(&ctx, threshold_minutes).await
        }
        Commands::Config { action } => cmd_config(&ctx, action).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Context {
    fn registry(&self) -> AgentRegistry {
        AgentRegistry::from_minutes(self.config.registry.inactive_minutes as i64)
    }

    fn guidance_engine(&self) -> GuidanceEngine {
        GuidanceEngine::new(
            RepetitionCheck::new(
                chrono::Duration::minutes(self.config.guidance.repetition_window_minutes as i64),
                self.config.guidance.repetition_threshold,
            ),
            self.config.store.history_cap,
        )
    }
}

async fn cmd_init(ctx: &Context) -> Result<ExitCode> {
    if ctx.store.exists() {
        if ctx.output == OutputFormat::Text {
            ctx.display
                .print_warning("taskwarden is already initialized here.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    ctx.store.init().await?;
    ctx.store.save(&TaskDocument::default()).await?;
    let dir = warden_dir(ctx.store.path());
    ctx.config.save(&dir).await?;

    match ctx.output {
        OutputFormat::Text => {
            ctx.display.print_success("Initialized taskwarden.");
            ctx.display
                .print_info(&format!("Store: {}", ctx.store.path().display()));
            ctx.display
                .print_info(&format!("Configuration: {}", dir.join("config.toml").display()));
        }
        OutputFormat::Json => print_json(&json!({
            "success": true,
            "store": ctx.store.path(),
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_create(
    ctx: &Context,
    title: String,
    description: String,
    category: Option<CategoryArg>,
    priority: Option<PriorityArg>,
    depends_on: Vec<String>,
    original_implementer: Option<String>,
    agent: Option<String>,
) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();

    for dep in &depends_on {
        if doc.task(dep).is_none() {
            return Err(WardenError::TaskNotFound(dep.clone()));
        }
    }

    let mut task = Task::new(title)
        .with_description(description)
        .with_dependencies(depends_on);
    if let Some(category) = category {
        task = task.with_category(category.into());
    }
    if let Some(priority) = priority {
        task = task.with_priority(priority.into());
    }
    if let Some(implementer) = original_implementer {
        task = task.with_original_implementer(implementer);
    }
    if let Some(agent_id) = &agent {
        task.push_access(agent_id, AccessAction::Created, now, ctx.config.store.history_cap);
    }

    let created = task.clone();
    doc.tasks.push(task);
    if let Some(agent_id) = &agent {
        ctx.registry().record_activity(&mut doc, agent_id, now);
    }
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => {
            ctx.display
                .print_success(&format!("Created task {}", created.id));
        }
        OutputFormat::Json => print_json(&created)?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(ctx: &Context, status: Option<StatusFilterArg>) -> Result<ExitCode> {
    let doc = ctx.store.load().await?;
    let filter: Option<TaskStatus> = status.map(Into::into);
    let tasks: Vec<&Task> = doc
        .tasks
        .iter()
        .filter(|t| filter.map_or(true, |s| t.status == s))
        .collect();

    match ctx.output {
        OutputFormat::Text => {
            if tasks.is_empty() {
                ctx.display.print_info("No tasks.");
            }
            for task in tasks {
                ctx.display.print_task_line(task);
            }
        }
        OutputFormat::Json => print_json(&tasks)?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_claim(
    ctx: &Context,
    task_id: &str,
    agent_id: &str,
    allow_out_of_order: bool,
) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();
    let history_cap = ctx.config.store.history_cap;

    let task = doc
        .task(task_id)
        .ok_or_else(|| WardenError::TaskNotFound(task_id.to_string()))?;

    let validation = validate_claim(task, agent_id, allow_out_of_order);
    if let ClaimValidation::Refused { reason } = &validation {
        doc.counters.review_strikes += 1;
        ctx.store.save(&doc).await?;
        return refuse(ctx, reason);
    }

    if let Some(held) = doc.in_progress_for(agent_id) {
        let reason = format!(
            "agent '{}' already holds in-progress task '{}'",
            agent_id, held.id
        );
        return refuse(ctx, &reason);
    }

    let completed = doc.completed_ids().into_iter().map(String::from).collect::<Vec<_>>();
    let completed_refs: Vec<&str> = completed.iter().map(String::as_str).collect();
    let task = doc
        .task_mut(task_id)
        .ok_or_else(|| WardenError::TaskNotFound(task_id.to_string()))?;
    if !task.is_claimable(&completed_refs) {
        let reason = format!(
            "task '{}' is not claimable (status {}, unmet dependencies included)",
            task_id, task.status
        );
        return refuse(ctx, &reason);
    }

    task.claim(agent_id, now, history_cap);
    if validation == ClaimValidation::AllowedWithOverride {
        task.push_access(agent_id, AccessAction::OverrideClaimed, now, history_cap);
    }
    let claimed = task.clone();

    ctx.registry().record_activity(&mut doc, agent_id, now);
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => {
            ctx.display.print_success(&format!(
                "Task {} claimed by {}",
                claimed.id, agent_id
            ));
            if validation == ClaimValidation::AllowedWithOverride {
                ctx.display
                    .print_warning("Audit objectivity overridden; flagged in task history.");
            }
        }
        OutputFormat::Json => print_json(&json!({
            "success": true,
            "task": claimed,
            "override": validation == ClaimValidation::AllowedWithOverride,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Business-rule refusals are data, not faults: reported with success=false
/// and a zero exit, never a crash.
fn refuse(ctx: &Context, reason: &str) -> Result<ExitCode> {
    match ctx.output {
        OutputFormat::Text => ctx.display.print_warning(reason),
        OutputFormat::Json => print_json(&json!({
            "success": false,
            "reason": reason,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_update_status(
    ctx: &Context,
    task_id: &str,
    status: StatusArg,
    agent_id: &str,
) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();
    let history_cap = ctx.config.store.history_cap;
    let target: TaskStatus = status.into();

    let task = doc
        .task_mut(task_id)
        .ok_or_else(|| WardenError::TaskNotFound(task_id.to_string()))?;

    if !task.status.can_transition_to(target) {
        return Err(WardenError::InvalidTransition {
            from: task.status.to_string(),
            to: target.to_string(),
            allowed: task
                .status
                .allowed_transitions()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    task.status = target;
    match target {
        TaskStatus::Pending => {
            task.assigned_agent = None;
        }
        TaskStatus::InProgress => {
            task.assigned_agent = Some(agent_id.to_string());
        }
        TaskStatus::Completed | TaskStatus::Blocked => {}
    }
    task.touch(now);
    task.push_access(agent_id, AccessAction::StatusChanged, now, history_cap);
    let updated = task.clone();

    ctx.registry().record_activity(&mut doc, agent_id, now);
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => ctx.display.print_success(&format!(
            "Task {} is now {}",
            updated.id, updated.status
        )),
        OutputFormat::Json => print_json(&updated)?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_guidance(ctx: &Context, agent_id: &str) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();

    let engine = ctx.guidance_engine();
    let decision = engine.decide(&doc, agent_id, now);
    engine.apply(&mut doc, agent_id, &decision, now);
    ctx.registry().record_activity(&mut doc, agent_id, now);
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => ctx.display.print_guidance(&decision),
        OutputFormat::Json => print_json(&decision)?,
    }
    Ok(ExitCode::from(decision.exit_code()))
}

async fn cmd_revert_stale(ctx: &Context, threshold_minutes: Option<u64>) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();

    let minutes = threshold_minutes.unwrap_or(ctx.config.staleness.threshold_minutes);
    let detector = StalenessDetector::from_minutes(minutes as i64)
        .with_history_cap(ctx.config.store.history_cap);
    let reverted = detector.sweep(&mut doc, now);

    // Stats and task mutations land in this one save.
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => {
            if reverted.is_empty() {
                ctx.display.print_info("No stale tasks.");
            } else {
                ctx.display.print_success(&format!(
                    "Reverted {} stale task(s): {}",
                    reverted.len(),
                    reverted.join(", ")
                ));
            }
        }
        OutputFormat::Json => print_json(&json!({
            "reverted": reverted,
            "stats": doc.stale_stats,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list_agents(ctx: &Context) -> Result<ExitCode> {
    let doc = ctx.store.load().await?;
    let now = Utc::now();
    let threshold = chrono::Duration::minutes(ctx.config.registry.inactive_minutes as i64);

    let mut agents: Vec<_> = doc.agents.values().collect();
    agents.sort_by(|a, b| a.id.cmp(&b.id));

    match ctx.output {
        OutputFormat::Text => {
            if agents.is_empty() {
                ctx.display.print_info("No agents registered.");
            }
            for agent in agents {
                ctx.display
                    .print_agent_line(agent, agent.status_at(now, threshold));
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = agents
                .into_iter()
                .map(|agent| {
                    json!({
                        "agent": agent,
                        "status": agent.status_at(now, threshold),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_heartbeat(ctx: &Context, agent_id: &str, role: Option<String>) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();

    ctx.registry().record_activity(&mut doc, agent_id, now);
    if let (Some(role), Some(agent)) = (role, doc.agents.get_mut(agent_id)) {
        agent.role.get_or_insert(role);
    }
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => ctx
            .display
            .print_success(&format!("Recorded activity for {}", agent_id)),
        OutputFormat::Json => print_json(&json!({ "success": true, "agent": agent_id }))?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_cleanup_agents(ctx: &Context, threshold_minutes: Option<u64>) -> Result<ExitCode> {
    let _guard = ctx.store.lock().await?;
    let mut doc = ctx.store.load().await?;
    let now = Utc::now();

    // Snapshot before the destructive prune.
    let backup = ctx.store.write_backup().await?;

    let minutes = threshold_minutes.unwrap_or(ctx.config.registry.inactive_minutes);
    let report = AgentRegistry::from_minutes(minutes as i64).sweep_inactive(&mut doc, now);
    ctx.store.save(&doc).await?;

    match ctx.output {
        OutputFormat::Text => {
            ctx.display.print_registry_sweep(&report);
            ctx.display
                .print_info(&format!("Backup: {}", backup.display()));
        }
        OutputFormat::Json => print_json(&json!({
            "removed": report.removed,
            "remaining": report.remaining,
            "removed_ids": report.removed_ids,
            "backup": backup,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_config(ctx: &Context, action: ConfigAction) -> Result<ExitCode> {
    let dir = warden_dir(ctx.store.path());
    match action {
        ConfigAction::Show => match ctx.output {
            OutputFormat::Text => {
                let content = toml::to_string_pretty(&ctx.config)
                    .map_err(|e| WardenError::Config(e.to_string()))?;
                print!("{}", content);
            }
            OutputFormat::Json => print_json(&ctx.config)?,
        },
        ConfigAction::Reset => {
            tokio::fs::create_dir_all(&dir).await?;
            WardenConfig::default().save(&dir).await?;
            ctx.display.print_success("Configuration reset to defaults.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
