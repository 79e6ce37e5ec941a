//! Analyze command implementation.
//!
//! Submits a batch through the relay, reports status changes on stderr and
//! prints the final results on stdout. Ctrl+C cancels every task.

use crate::cli::AnalyzeArgs;
use crate::config::{Profile, Settings};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use docstream_domain::{DocumentId, TaskStatus};
use docstream_orchestrator::{AnalysisManager, JsonLinesSink, OrchestratorConfig, RelayTransport, TaskSnapshot};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Execute the analyze command.
pub async fn execute_analyze(
    args: AnalyzeArgs,
    profile: &Profile,
    settings: &Settings,
    formatter: &Formatter,
) -> Result<()> {
    let mut config = OrchestratorConfig::interactive();
    config.user = profile.user.clone();
    if let Some(secs) = args.timeout.or(settings.idle_timeout_secs) {
        config.idle_timeout_secs = secs;
    }

    let transport = RelayTransport::new(&profile.relay_url, &config)?;
    let mut manager = AnalysisManager::new(transport, config)?;
    if let Some(path) = &args.output {
        manager = manager.with_sink(JsonLinesSink::new(path));
    }

    let snapshots = run_analysis(
        &manager,
        &args.document_ids,
        formatter,
        !args.quiet,
        tokio::signal::ctrl_c(),
    )
    .await?;

    println!("{}", formatter.format_results(&snapshots)?);

    let failed = snapshots
        .iter()
        .filter(|s| s.status == TaskStatus::Failed)
        .count();
    if failed > 0 {
        return Err(CliError::AnalysisFailed {
            failed,
            total: snapshots.len(),
        });
    }
    Ok(())
}

/// Drive one batch until every task is terminal or `interrupt` resolves
///
/// On interrupt every task goes through the full cancel path before the
/// final snapshots are returned.
pub async fn run_analysis<F>(
    manager: &AnalysisManager,
    document_ids: &[String],
    formatter: &Formatter,
    show_progress: bool,
    interrupt: F,
) -> Result<Vec<TaskSnapshot>>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut updates = manager.subscribe();
    let started = manager.submit(document_ids.iter().map(String::as_str));
    if started.is_empty() {
        return Err(CliError::InvalidInput("no document ids to analyze".to_string()));
    }

    let all_done = manager.wait_all();
    tokio::pin!(all_done);
    tokio::pin!(interrupt);
    let mut last_seen: HashMap<DocumentId, TaskStatus> = HashMap::new();

    loop {
        tokio::select! {
            _ = &mut all_done => break,
            signal = &mut interrupt => {
                signal?;
                eprintln!("{}", formatter.warning("Interrupted, cancelling all analyses"));
                let reports = manager.shutdown().await;
                eprintln!("{}", formatter.cancel_reports(&reports));
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    let changed = last_seen.insert(update.document_id, update.snapshot.status)
                        != Some(update.snapshot.status);
                    if show_progress && changed {
                        eprintln!("{}", formatter.progress(&update.snapshot));
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Progress display skipped {} update(s)", skipped),
                Err(RecvError::Closed) => {
                    (&mut all_done).await;
                    break;
                }
            }
        }
    }

    Ok(manager.statuses())
}
