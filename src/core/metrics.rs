use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_branch(status: &'static str) {
    metrics::counter!("report_branches_total", "status" => status).increment(1);
}

pub(crate) fn record_report(report: &'static str, elapsed: Duration) {
    metrics::histogram!("report_build_duration_seconds", "report" => report)
        .record(elapsed.as_secs_f64());
}

pub(crate) fn record_hierarchy_fallback(level: &'static str) {
    metrics::counter!("hierarchy_fallbacks_total", "level" => level).increment(1);
}
