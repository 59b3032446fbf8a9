//! Summary Collector - Count/Sum Summary for the `prometheus` Registry
//!
//! The `prometheus` crate ships counters, gauges and histograms but no
//! summary. This collector exposes `<name>_sum` and `<name>_count` with
//! the SUMMARY type and no quantiles. Count and sum sit behind one mutex
//! so a scrape never sees one updated without the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use prometheus::core::{Collector, Desc};
use prometheus::proto;

#[derive(Debug, Default, Clone, Copy)]
struct SummaryState {
    count: u64,
    sum: f64,
}

/// Unlabelled summary metric. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Summary {
    desc: Arc<Desc>,
    state: Arc<Mutex<SummaryState>>,
}

impl Summary {
    /// Create a summary with the given fully-qualified name and help text.
    pub fn new(name: &str, help: &str) -> prometheus::Result<Self> {
        let desc = Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())?;
        Ok(Self {
            desc: Arc::new(desc),
            state: Arc::new(Mutex::new(SummaryState::default())),
        })
    }

    /// Record one sample.
    pub fn observe(&self, value: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.count += 1;
        state.sum += value;
    }

    /// Number of samples observed.
    pub fn get_sample_count(&self) -> u64 {
        self.snapshot().count
    }

    /// Sum of all samples observed.
    pub fn get_sample_sum(&self) -> f64 {
        self.snapshot().sum
    }

    fn snapshot(&self) -> SummaryState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Collector for Summary {
    fn desc(&self) -> Vec<&Desc> {
        vec![self.desc.as_ref()]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let state = self.snapshot();

        let mut summary = proto::Summary::default();
        summary.set_sample_count(state.count);
        summary.set_sample_sum(state.sum);

        let mut metric = proto::Metric::default();
        metric.set_summary(summary);

        let mut family = proto::MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(proto::MetricType::SUMMARY);
        family.set_metric(vec![metric].into());

        vec![family]
    }
}
