//! Per-controller pass counters and their JSON telemetry line.

use core::time::Duration;

use serde::Serialize;
use style_engine::PassReport;

/// What caused a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    Once,
    Start,
    Mutation,
    Settle,
    /// Requested while another pass was in flight and run right after it.
    Rerun,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassCounters {
    pub passes_total: u64,
    pub passes_once: u64,
    pub passes_start: u64,
    pub passes_mutation: u64,
    pub passes_settle: u64,
    pub passes_rerun: u64,
    /// Pass requests folded into an in-flight pass.
    pub coalesced_requests: u64,
    pub frames_waited: u64,
    /// Scheduled passes dropped because the controller was paused at the frame boundary.
    pub cancelled_frames: u64,
    /// Relevant mutations ignored while paused.
    pub dropped_while_paused: u64,
    pub elements_styled_last: u64,
    pub elements_styled_total: u64,
    pub properties_written_last: u64,
    pub properties_written_total: u64,
    pub failures_total: u64,
    pub pass_time_last_us: u64,
    pub pass_time_total_us: u64,
}

fn count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

impl PassCounters {
    pub fn record(&mut self, trigger: PassTrigger, report: &PassReport, elapsed: Duration) {
        self.passes_total += 1;
        let per_trigger = match trigger {
            PassTrigger::Once => &mut self.passes_once,
            PassTrigger::Start => &mut self.passes_start,
            PassTrigger::Mutation => &mut self.passes_mutation,
            PassTrigger::Settle => &mut self.passes_settle,
            PassTrigger::Rerun => &mut self.passes_rerun,
        };
        *per_trigger += 1;
        self.elements_styled_last = count(report.elements_styled);
        self.elements_styled_total += self.elements_styled_last;
        self.properties_written_last = count(report.properties_written);
        self.properties_written_total += self.properties_written_last;
        self.failures_total += count(report.failures.len());
        self.pass_time_last_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.pass_time_total_us = self.pass_time_total_us.saturating_add(self.pass_time_last_us);
    }
}

/// Render counters as one JSON object line.
pub fn counters_json(counters: &PassCounters) -> String {
    serde_json::to_string(counters).unwrap_or_else(|_| String::from("{}"))
}

pub fn maybe_emit(enabled: bool, json_line: &str) {
    if enabled {
        log::info!(target: "rawss::telemetry", "{json_line}");
    }
}
