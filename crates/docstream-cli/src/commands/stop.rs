//! Stop command implementation.

use crate::cli::StopArgs;
use crate::config::Profile;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use docstream_domain::UpstreamTaskId;
use docstream_orchestrator::{AnalysisTransport, OrchestratorConfig, RelayTransport};

/// Execute the stop command: one upstream stop request through the relay.
pub async fn execute_stop(args: StopArgs, profile: &Profile, formatter: &Formatter) -> Result<()> {
    let task_id = UpstreamTaskId::parse(&args.task_id)
        .ok_or_else(|| CliError::InvalidInput("task id must not be empty".to_string()))?;

    let config = OrchestratorConfig {
        user: profile.user.clone(),
        ..OrchestratorConfig::default()
    };
    let transport = RelayTransport::new(&profile.relay_url, &config)?;
    transport.stop(&task_id).await?;

    println!("{}", formatter.success(&format!("Stop requested for task {}", task_id)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    #[tokio::test]
    async fn test_blank_task_id_rejected() {
        let profile = Profile {
            relay_url: "http://127.0.0.1:1".to_string(),
            user: "docstream".to_string(),
        };
        let formatter = Formatter::new(OutputFormat::Table, false);
        let result = execute_stop(StopArgs { task_id: "  ".to_string() }, &profile, &formatter).await;
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let profile = Profile {
            relay_url: "http://127.0.0.1:1".to_string(),
            user: "docstream".to_string(),
        };
        let formatter = Formatter::new(OutputFormat::Table, false);
        let result = execute_stop(StopArgs { task_id: "t-1".to_string() }, &profile, &formatter).await;
        assert!(matches!(result, Err(CliError::Transport(_))));
    }
}
