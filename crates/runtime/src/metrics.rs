use std::collections::BTreeMap;

/// Deterministic operation counters and value distributions.
///
/// Names are static strings chosen by the caller. Both maps are sorted so a
/// snapshot has stable ordering for tests and log lines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    distributions: BTreeMap<&'static str, Distribution>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Distribution {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Distribution {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(&'static str, u64)>,
    pub distributions: Vec<(&'static str, Distribution)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn record(&mut self, name: &'static str, value: u64) {
        self.distributions.entry(name).or_default().record(value);
    }

    pub fn distribution(&self, name: &str) -> Option<Distribution> {
        self.distributions.get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (*k, *v)).collect(),
            distributions: self.distributions.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn counters_default_to_zero_and_accumulate() {
        let mut m = Metrics::new();
        assert_eq!(m.counter("layers.created"), 0);
        m.inc("layers.created");
        m.add("layers.created", 2);
        assert_eq!(m.counter("layers.created"), 3);
    }

    #[test]
    fn distribution_tracks_min_max_mean() {
        let mut m = Metrics::new();
        m.record("fetch.attempts", 4);
        m.record("fetch.attempts", 1);
        let d = m.distribution("fetch.attempts").unwrap();
        assert_eq!((d.count, d.min, d.max, d.sum), (2, 1, 4, 5));
        assert_eq!(d.mean(), Some(2.5));
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let mut m = Metrics::new();
        m.inc("b");
        m.inc("a");
        let names: Vec<_> = m.snapshot().counters.into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
