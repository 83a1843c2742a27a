//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;

use actrelay_coordinator::{CoordinatorStats, RunCoordinator};
use actrelay_core::RunStatus;

/// Collect all metrics from the coordinator and format as Prometheus text.
pub async fn collect_metrics(coordinator: &RunCoordinator) -> String {
    let stats = coordinator.stats().await;
    let mut output = String::new();

    write_run_metrics(&stats, &mut output);
    write_channel_metrics(&stats, &mut output);

    output
}

/// Runs by status, including zero counts.
fn write_run_metrics(stats: &CoordinatorStats, output: &mut String) {
    writeln!(
        output,
        "# HELP actrelay_runs_total Total number of runs by status"
    )
    .ok();
    writeln!(output, "# TYPE actrelay_runs_total gauge").ok();

    for status in RunStatus::ALL {
        let count = stats
            .runs_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, count)| *count)
            .unwrap_or(0);
        writeln!(
            output,
            "actrelay_runs_total{{status=\"{}\"}} {count}",
            status.as_str()
        )
        .ok();
    }
}

/// Attached channels and open approval exchanges.
fn write_channel_metrics(stats: &CoordinatorStats, output: &mut String) {
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP actrelay_channels_attached Number of runs with an attached client channel"
    )
    .ok();
    writeln!(output, "# TYPE actrelay_channels_attached gauge").ok();
    writeln!(
        output,
        "actrelay_channels_attached {}",
        stats.attached_channels
    )
    .ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP actrelay_pending_requests Number of approval requests awaiting a response"
    )
    .ok();
    writeln!(output, "# TYPE actrelay_pending_requests gauge").ok();
    writeln!(
        output,
        "actrelay_pending_requests {}",
        stats.pending_exchanges
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrelay_coordinator::{ChannelHandle, CoordinatorConfig};
    use actrelay_core::RunMetadata;

    #[tokio::test]
    async fn test_collect_metrics_empty_state() {
        let coordinator = RunCoordinator::new(CoordinatorConfig::default());
        let output = collect_metrics(&coordinator).await;

        assert!(output.contains("# TYPE actrelay_runs_total gauge"));
        assert!(output.contains("actrelay_runs_total{status=\"running\"} 0"));
        assert!(output.contains("actrelay_runs_total{status=\"completed\"} 0"));
        assert!(output.contains("actrelay_channels_attached 0"));
        assert!(output.contains("actrelay_pending_requests 0"));
    }

    #[tokio::test]
    async fn test_collect_metrics_counts_runs_and_channels() {
        let coordinator = RunCoordinator::new(CoordinatorConfig::default());
        let run_id = coordinator
            .start_run(RunMetadata::new(), |ctx| async move {
                ctx.cancelled().await;
            })
            .await;
        let (handle, _rx) = ChannelHandle::channel(4);
        coordinator.connect(run_id, handle).await;

        let output = collect_metrics(&coordinator).await;
        assert!(output.contains("actrelay_runs_total{status=\"running\"} 1"));
        assert!(output.contains("actrelay_channels_attached 1"));
    }
}
