//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use docstream_domain::TaskStatus;
use docstream_orchestrator::{CancelReport, TaskSnapshot};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest result excerpt shown in a table cell
const EXCERPT_CHARS: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format final task results.
    pub fn format_results(&self, snapshots: &[TaskSnapshot]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_results_json(snapshots),
            OutputFormat::Table => Ok(self.format_results_table(snapshots)),
            OutputFormat::Quiet => Ok(self.format_results_quiet(snapshots)),
        }
    }

    fn format_results_json(&self, snapshots: &[TaskSnapshot]) -> Result<String> {
        let results: Vec<serde_json::Value> = snapshots
            .iter()
            .map(|s| {
                serde_json::json!({
                    "document_id": s.document_id.as_str(),
                    "task_id": s.upstream_task_id.as_ref().map(|t| t.as_str()),
                    "status": s.status.as_str(),
                    "text": s.rendered_text(),
                    "parsed": s.parsed,
                    "error": s.error.as_ref().map(|e| e.to_string()),
                    "warning": s.warning,
                    "frames": s.frames_received,
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&results)?)
    }

    fn format_results_table(&self, snapshots: &[TaskSnapshot]) -> String {
        if snapshots.is_empty() {
            return self.colorize("No analyses.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Document", "Status", "Task", "Frames", "Result"]);

        for snapshot in snapshots {
            let task = snapshot
                .upstream_task_id
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            builder.push_record([
                snapshot.document_id.to_string(),
                self.status_label(snapshot.status),
                task,
                snapshot.frames_received.to_string(),
                result_summary(snapshot),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    fn format_results_quiet(&self, snapshots: &[TaskSnapshot]) -> String {
        snapshots
            .iter()
            .map(|s| format!("{}\t{}", s.document_id, s.status))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One progress line for a status change.
    pub fn progress(&self, snapshot: &TaskSnapshot) -> String {
        let mut line = format!("{} {}", snapshot.document_id, self.status_label(snapshot.status));
        if let Some(task_id) = &snapshot.upstream_task_id {
            line.push_str(&format!(" (task {})", task_id));
        }
        if let Some(error) = &snapshot.error {
            line.push_str(&format!(": {}", error));
        }
        line
    }

    /// Summarize the cancellations made on interrupt.
    pub fn cancel_reports(&self, reports: &[CancelReport]) -> String {
        let lines: Vec<String> = reports
            .iter()
            .filter(|r| r.was_active)
            .map(|r| match &r.upstream_stopped {
                Some(Ok(())) => self.info(&format!("{}: cancelled, upstream stopped", r.document_id)),
                Some(Err(e)) => self.warning(&format!("{}: cancelled, upstream stop failed: {}", r.document_id, e)),
                None => self.info(&format!("{}: cancelled", r.document_id)),
            })
            .collect();

        if lines.is_empty() {
            self.info("Nothing to cancel.")
        } else {
            lines.join("\n")
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status_label(&self, status: TaskStatus) -> String {
        let color = match status {
            TaskStatus::Completed => "green",
            TaskStatus::Failed => "red",
            TaskStatus::Cancelled => "yellow",
            TaskStatus::Streaming => "cyan",
            TaskStatus::Queued | TaskStatus::Connecting => "blue",
        };
        self.colorize(status.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Short single-line description of a task's outcome
fn result_summary(snapshot: &TaskSnapshot) -> String {
    if let Some(error) = &snapshot.error {
        return truncate(&error.to_string());
    }
    if let Some(parsed) = &snapshot.parsed {
        return truncate(&parsed.to_string());
    }
    let mut summary = truncate(snapshot.rendered_text().trim());
    if let Some(warning) = &snapshot.warning {
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(&format!("[{}]", warning));
    }
    summary
}

fn truncate(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(EXCERPT_CHARS - 1).collect();
    cut.push('…');
    cut
}
