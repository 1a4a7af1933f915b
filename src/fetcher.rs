use crate::config::RetryPolicy;
use crate::endpoint::Endpoint;
use crate::error::{EiaError, Result};
use crate::loader::{ApiPage, RawRowSet, Transport};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Fetch every endpoint on a pool of at most `concurrency` workers.
///
/// Row sets come back in endpoint order whatever order the requests finish
/// in. The first failure stops requests that have not started yet; requests
/// already in flight finish and their rows are dropped.
pub fn fetch_all<T: Transport>(
    transport: &T,
    api_key: &str,
    endpoints: &[Endpoint],
    concurrency: usize,
    retry: &RetryPolicy,
) -> Result<Vec<RawRowSet>> {
    if concurrency == 0 {
        return Err(EiaError::invalid("concurrency must be at least 1"));
    }
    if endpoints.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.min(endpoints.len()))
        .thread_name(|i| format!("eia-fetch-{i}"))
        .build()?;
    let cancelled = AtomicBool::new(false);

    // Indexed collect: each result lands in the slot of its endpoint.
    let slots: Vec<Option<Result<ApiPage>>> = pool.install(|| {
        endpoints
            .par_iter()
            .enumerate()
            .map(|(index, endpoint)| {
                if cancelled.load(Ordering::Acquire) {
                    debug!(index, "skipping chunk, query already failed");
                    return None;
                }
                let result = fetch_one(transport, api_key, endpoint, retry, &cancelled);
                if result.is_err() {
                    cancelled.store(true, Ordering::Release);
                }
                Some(result)
            })
            .collect()
    });

    let mut row_sets = Vec::with_capacity(endpoints.len());
    let mut first_error = None;
    for slot in slots {
        match slot {
            Some(Ok(page)) => row_sets.push(page.rows),
            Some(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            // Only skipped after some other slot failed.
            None => {}
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(row_sets),
    }
}

fn fetch_one<T: Transport>(
    transport: &T,
    api_key: &str,
    endpoint: &Endpoint,
    retry: &RetryPolicy,
    cancelled: &AtomicBool,
) -> Result<ApiPage> {
    let url = endpoint.url();
    let mut attempt = 0u32;
    loop {
        debug!(%url, attempt, "requesting chunk");
        match transport.get(&url, api_key) {
            Ok(page) => {
                if page.is_truncated() {
                    warn!(
                        %url,
                        returned = page.rows.len(),
                        total = page.total,
                        "server holds more rows than it returned; lower max rows per request"
                    );
                }
                for warning in &page.warnings {
                    warn!(%url, %warning, "api warning");
                }
                return Ok(page);
            }
            Err(e)
                if e.is_retryable()
                    && attempt < retry.max_retries
                    && !cancelled.load(Ordering::Acquire) =>
            {
                let wait = retry.delay_for(attempt);
                attempt += 1;
                warn!(
                    %url,
                    error = %e,
                    "chunk request failed, retrying in {wait:?} (attempt {attempt}/{})",
                    retry.max_retries
                );
                std::thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::PageControls;
    use crate::facets::FacetSet;
    use crate::loader::Row;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves one row per endpoint, keyed by the `offset=` index in the URL.
    #[derive(Default)]
    struct Scripted {
        delays_ms: HashMap<usize, u64>,
        failures: HashMap<usize, (u16, usize)>,
        attempts: Mutex<HashMap<usize, usize>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    fn index_of(url: &str) -> usize {
        url.rsplit("offset=").next().unwrap().parse().unwrap()
    }

    impl Transport for Scripted {
        fn get(&self, url: &str, _api_key: &str) -> Result<ApiPage> {
            let index = index_of(url);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(*self.delays_ms.get(&index).unwrap_or(&5)));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                let n = attempts.entry(index).or_default();
                *n += 1;
                *n
            };
            if let Some((status, failing_attempts)) = self.failures.get(&index) {
                if attempt <= *failing_attempts {
                    return Err(EiaError::TransportFailure {
                        url: url.to_string(),
                        status: Some(*status),
                        reason: "scripted".into(),
                    });
                }
            }
            let mut row = Row::new();
            row.insert("chunk".into(), index.into());
            Ok(ApiPage::new(vec![row]))
        }
    }

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| {
                Endpoint::new("http://eia.test/v2/", "data", &FacetSet::new())
                    .page(PageControls { length: None, offset: Some(i) })
            })
            .collect()
    }

    fn chunk_ids(sets: &[RawRowSet]) -> Vec<u64> {
        sets.iter().map(|s| s[0]["chunk"].as_u64().unwrap()).collect()
    }

    #[test]
    fn test_order_survives_reversed_completion() {
        let transport = Scripted {
            delays_ms: (0..6).map(|i| (i, 60 - 10 * i as u64)).collect(),
            ..Default::default()
        };
        let sets = fetch_all(&transport, "k", &endpoints(6), 6, &RetryPolicy::default()).unwrap();
        assert_eq!(chunk_ids(&sets), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_failure_stops_unstarted_chunks() {
        let transport = Scripted {
            failures: HashMap::from([(2, (500, usize::MAX))]),
            ..Default::default()
        };
        let err =
            fetch_all(&transport, "k", &endpoints(5), 1, &RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, EiaError::TransportFailure { status: Some(500), .. }));
        // A single worker runs chunks in order: 0, 1, then the failing 2.
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let transport = Scripted {
            delays_ms: (0..8).map(|i| (i, 30)).collect(),
            ..Default::default()
        };
        fetch_all(&transport, "k", &endpoints(8), 2, &RetryPolicy::default()).unwrap();
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_retry_recovers_transient_failures() {
        let transport = Scripted {
            failures: HashMap::from([(1, (503, 2))]),
            ..Default::default()
        };
        let retry = RetryPolicy { max_retries: 2, base_delay_ms: 1 };
        let sets = fetch_all(&transport, "k", &endpoints(3), 2, &retry).unwrap();
        assert_eq!(chunk_ids(&sets), vec![0, 1, 2]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let transport = Scripted {
            failures: HashMap::from([(0, (429, 3))]),
            ..Default::default()
        };
        let retry = RetryPolicy { max_retries: 1, base_delay_ms: 1 };
        let err = fetch_all(&transport, "k", &endpoints(1), 1, &retry).unwrap_err();
        assert!(matches!(err, EiaError::TransportFailure { status: Some(429), .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let transport = Scripted {
            failures: HashMap::from([(0, (404, 1))]),
            ..Default::default()
        };
        let retry = RetryPolicy { max_retries: 5, base_delay_ms: 1 };
        assert!(fetch_all(&transport, "k", &endpoints(1), 1, &retry).is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let transport = Scripted::default();
        let err =
            fetch_all(&transport, "k", &endpoints(1), 0, &RetryPolicy::default()).unwrap_err();
        assert!(matches!(err, EiaError::InvalidArgument(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
