use crate::endpoint::Endpoint;
use crate::error::{EiaError, Result};
use crate::facets::FacetSet;
use crate::loader::{Row, Transport};
use crate::period::Bound;
use std::collections::HashMap;
use tracing::info;

/// Endpoint covering `anchor` and the period right after it.
pub fn probe_endpoint(
    base_url: &str,
    path: &str,
    facets: &FacetSet,
    anchor: Bound,
) -> Result<Endpoint> {
    Ok(Endpoint::new(base_url, path, facets)
        .start(Some(anchor))
        .end(Some(anchor.shift(1)?))
        .frequency(Some(anchor.frequency())))
}

/// Concurrent series in a probe response: the most rows sharing one period.
pub fn count_series(rows: &[Row]) -> usize {
    let mut per_period: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let key = match row.get("period") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        *per_period.entry(key).or_default() += 1;
    }
    per_period.values().copied().max().unwrap_or(0)
}

/// Ask the API how many series the facet selection yields.
///
/// Fails with [`EiaError::EmptyResult`] when nothing matches, before any
/// chunk is planned.
pub fn probe_series<T: Transport>(
    transport: &T,
    api_key: &str,
    endpoint: &Endpoint,
) -> Result<usize> {
    let url = endpoint.url();
    let page = transport.get(&url, api_key)?;
    let n = count_series(&page.rows);
    if n == 0 {
        return Err(EiaError::EmptyResult(format!(
            "probe returned no rows for {url}; the facet selection matches nothing"
        )));
    }
    info!(series = n, "probe complete");
    Ok(n)
}
