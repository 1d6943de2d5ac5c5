use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics for one open index
#[derive(Clone)]
pub struct IndexMetrics {
    // Counters
    pub lookups_total: CounterVec,
    pub lookup_errors: CounterVec,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub corrupt_records: Counter,

    // Gauges
    pub index_size_bytes: Gauge,
    pub token_count: Gauge,

    // Histograms
    pub lookup_latency: HistogramVec,
    pub matched_tokens: HistogramVec,

    registry: Arc<Registry>,
}

impl IndexMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let lookups_total = CounterVec::new(
            Opts::new("textrie_lookups_total", "Total number of lookups by mode"),
            &["mode"],
        )?;
        registry.register(Box::new(lookups_total.clone()))?;

        let lookup_errors = CounterVec::new(
            Opts::new("textrie_lookup_errors_total", "Failed lookups by mode"),
            &["mode"],
        )?;
        registry.register(Box::new(lookup_errors.clone()))?;

        let cache_hits = Counter::with_opts(Opts::new(
            "textrie_token_cache_hits_total",
            "Literal lookups answered from the token cache",
        ))?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = Counter::with_opts(Opts::new(
            "textrie_token_cache_misses_total",
            "Literal lookups that descended the trie",
        ))?;
        registry.register(Box::new(cache_misses.clone()))?;

        let corrupt_records = Counter::with_opts(Opts::new(
            "textrie_corrupt_records_total",
            "Lookups that hit a corrupt on-disk structure",
        ))?;
        registry.register(Box::new(corrupt_records.clone()))?;

        let index_size_bytes = Gauge::with_opts(Opts::new(
            "textrie_index_size_bytes",
            "Size of the three index regions in bytes",
        ))?;
        registry.register(Box::new(index_size_bytes.clone()))?;

        let token_count = Gauge::with_opts(Opts::new(
            "textrie_tokens",
            "Number of distinct indexed tokens",
        ))?;
        registry.register(Box::new(token_count.clone()))?;

        let lookup_latency = HistogramVec::new(
            HistogramOpts::new("textrie_lookup_latency_seconds", "Lookup latency")
                .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["mode"],
        )?;
        registry.register(Box::new(lookup_latency.clone()))?;

        let matched_tokens = HistogramVec::new(
            HistogramOpts::new(
                "textrie_matched_tokens",
                "Number of index tokens matched by one lookup",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 1000.0]),
            &["mode"],
        )?;
        registry.register(Box::new(matched_tokens.clone()))?;

        Ok(Self {
            lookups_total,
            lookup_errors,
            cache_hits,
            cache_misses,
            corrupt_records,
            index_size_bytes,
            token_count,
            lookup_latency,
            matched_tokens,
            registry: Arc::new(registry),
        })
    }

    /// Record a finished lookup
    pub fn record_lookup(&self, mode: &str, duration_secs: f64, tokens: usize) {
        self.lookups_total.with_label_values(&[mode]).inc();
        self.lookup_latency
            .with_label_values(&[mode])
            .observe(duration_secs);
        self.matched_tokens
            .with_label_values(&[mode])
            .observe(tokens as f64);
    }

    /// Record a failed lookup
    pub fn record_error(&self, mode: &str, corrupt: bool) {
        self.lookup_errors.with_label_values(&[mode]).inc();
        if corrupt {
            self.corrupt_records.inc();
        }
    }

    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    pub fn set_index_shape(&self, size_bytes: u64, tokens: u32) {
        self.index_size_bytes.set(size_bytes as f64);
        self.token_count.set(tokens as f64);
    }

    /// Text exposition of every registered metric
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let metrics = IndexMetrics::new().unwrap();
        metrics.record_lookup("literal", 0.0002, 1);
        metrics.record_lookup("literal", 0.0004, 0);
        metrics.record_cache(true);
        metrics.record_cache(false);
        metrics.record_error("range", false);
        metrics.record_error("literal", true);

        assert_eq!(metrics.lookups_total.with_label_values(&["literal"]).get(), 2.0);
        assert_eq!(metrics.cache_hits.get(), 1.0);
        assert_eq!(metrics.cache_misses.get(), 1.0);
        assert_eq!(metrics.corrupt_records.get(), 1.0);

        let text = metrics.gather().unwrap();
        assert!(text.contains("textrie_lookups_total"));
        assert!(text.contains("textrie_lookup_latency_seconds"));
    }

    #[test]
    fn test_independent_registries() {
        let a = IndexMetrics::new().unwrap();
        let b = IndexMetrics::new().unwrap();
        a.set_index_shape(1024, 12);
        assert_eq!(a.token_count.get(), 12.0);
        assert_eq!(b.token_count.get(), 0.0);
    }
}
