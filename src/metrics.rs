// This file is part of LaminaDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

use prometheus::{Histogram, IntCounter, Registry};

/// Prometheus metrics for the append path.
///
/// # Metrics
/// - `laminadb_events_appended_total`: Counter of committed events.
/// - `laminadb_appends_rejected_total`: Counter of aborted append calls.
/// - `laminadb_append_duration_seconds`: Histogram of append latency.
#[derive(Debug, Clone)]
pub struct AppendMetrics {
    pub events_appended: IntCounter,
    pub appends_rejected: IntCounter,
    pub append_latency: Histogram,
}

impl AppendMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let events_appended = IntCounter::new(
            "laminadb_events_appended_total",
            "Total number of events committed",
        )?;
        let appends_rejected = IntCounter::new(
            "laminadb_appends_rejected_total",
            "Total number of aborted append calls",
        )?;
        let append_latency = Histogram::with_opts(prometheus::HistogramOpts::new(
            "laminadb_append_duration_seconds",
            "Duration of append operations",
        ))?;

        registry.register(Box::new(events_appended.clone()))?;
        registry.register(Box::new(appends_rejected.clone()))?;
        registry.register(Box::new(append_latency.clone()))?;

        Ok(Self {
            events_appended,
            appends_rejected,
            append_latency,
        })
    }
}
