//! Metrics collection
//!
//! Prometheus-compatible metrics behind the `metrics` facade. Every label
//! value passed here comes from a closed set of `&'static str` labels
//! (action kinds, error kinds, outcomes), so cardinality is bounded.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::DuelJackError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Label recorded for an accepted intent.
pub const RESULT_OK: &str = "ok";

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `DuelJackError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), DuelJackError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| DuelJackError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("dueljack_challenges_total", "Challenges successfully issued");
    describe_counter!(
        "dueljack_actions_total",
        "Intents handled, by action and result"
    );
    describe_counter!(
        "dueljack_duels_finished_total",
        "Sessions that reached FINISHED, by outcome"
    );
    describe_counter!(
        "dueljack_timer_fires_total",
        "Timer deliveries, by timer kind and effect"
    );
    describe_counter!(
        "dueljack_stats_errors_total",
        "Failed stats repository writes"
    );
    describe_gauge!("dueljack_sessions_live", "Pending and active sessions");
    describe_histogram!("dueljack_duel_turns", "Moves per combat-finished duel");
}

/// Records a successfully issued challenge.
pub fn record_challenge() {
    counter!("dueljack_challenges_total").increment(1);
}

/// Records a handled intent. `result` is [`RESULT_OK`] or an error kind.
pub fn record_action(action: &'static str, result: &'static str) {
    counter!("dueljack_actions_total", "action" => action, "result" => result).increment(1);
}

/// Records a session reaching FINISHED.
pub fn record_duel_finished(outcome: &'static str) {
    counter!("dueljack_duels_finished_total", "outcome" => outcome).increment(1);
}

/// Records a timer delivery. `effect` is `"applied"` or `"stale"`.
pub fn record_timer_fire(kind: &'static str, effect: &'static str) {
    counter!("dueljack_timer_fires_total", "kind" => kind, "effect" => effect).increment(1);
}

/// Records a failed stats write.
pub fn record_stats_error() {
    counter!("dueljack_stats_errors_total").increment(1);
}

/// Sets the live session gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_live(count: usize) {
    gauge!("dueljack_sessions_live").set(count as f64);
}

/// Records how many moves a combat-finished duel took.
pub fn record_duel_turns(turns: usize) {
    #[allow(clippy::cast_precision_loss)]
    histogram!("dueljack_duel_turns").record(turns as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_challenge();
        record_action("attack", RESULT_OK);
        record_action("heal", "invalid_action");
        record_duel_finished("timed_out");
        record_timer_fire("challenge_expiry", "stale");
        record_stats_error();
        set_sessions_live(3);
        record_duel_turns(12);
    }
}
