use chrono::{Duration, Utc};
use console::{style, Style};

use crate::guidance::Guidance;
use crate::registry::RegistrySweepReport;
use crate::task::{Agent, AgentStatus, Task, TaskStatus};

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_success(&self, text: &str) {
        println!("{} {}", style("✓").green().bold(), text);
    }

    pub fn print_warning(&self, text: &str) {
        println!("{} {}", style("!").yellow().bold(), text);
    }

    pub fn print_error(&self, text: &str) {
        eprintln!("{} {}", style("✗").red().bold(), text);
    }

    pub fn print_info(&self, text: &str) {
        println!("{} {}", style("·").dim(), text);
    }

    pub fn print_task_line(&self, task: &Task) {
        let status_style = self.status_style(task.status);
        println!(
            "{}  {}  [{}] [{}] {}",
            style(&task.id).dim(),
            status_style.apply_to(task.status.to_string()),
            task.priority,
            task.category,
            style(&task.title).white()
        );
        if let Some(agent) = &task.assigned_agent {
            println!("    owner: {}", style(agent).cyan());
        }
        if !task.dependencies.is_empty() {
            println!("    deps: {}", style(task.dependencies.join(", ")).dim());
        }
    }

    pub fn print_agent_line(&self, agent: &Agent, status: AgentStatus) {
        let status_style = match status {
            AgentStatus::Active => Style::new().green(),
            AgentStatus::Inactive => Style::new().dim(),
        };
        let last_seen = match agent.last_activity {
            Some(at) => {
                let elapsed = Utc::now() - at;
                if elapsed < Duration::minutes(1) {
                    "just now".to_string()
                } else {
                    format!("{}m ago", elapsed.num_minutes())
                }
            }
            None => "never".to_string(),
        };
        println!(
            "{}  {}  last seen {}{}",
            style(&agent.id).bold(),
            status_style.apply_to(status.to_string()),
            last_seen,
            agent
                .role
                .as_deref()
                .map(|r| format!("  ({})", r))
                .unwrap_or_default()
        );
    }

    pub fn print_guidance(&self, guidance: &Guidance) {
        match guidance {
            Guidance::ContinueTask { task_id, title } => {
                self.print_info(&format!("Continue task {}: {}", task_id, title));
            }
            Guidance::StartNewTask { task_id, title } => {
                self.print_success(&format!("Claimed task {}: {}", task_id, title));
            }
            Guidance::NoTasksAvailable => {
                self.print_info("No tasks available.");
            }
            Guidance::StuckTaskIntervention { guidance, .. } => {
                self.print_warning(guidance);
            }
        }
    }

    pub fn print_registry_sweep(&self, report: &RegistrySweepReport) {
        if report.removed == 0 {
            self.print_info(&format!(
                "No inactive agents ({} remaining).",
                report.remaining
            ));
        } else {
            self.print_success(&format!(
                "Removed {} inactive agent(s), {} remaining: {}",
                report.removed,
                report.remaining,
                report.removed_ids.join(", ")
            ));
        }
    }

    fn status_style(&self, status: TaskStatus) -> Style {
        match status {
            TaskStatus::Pending => Style::new().white(),
            TaskStatus::InProgress => Style::new().yellow(),
            TaskStatus::Completed => Style::new().green(),
            TaskStatus::Blocked => Style::new().red(),
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
