use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, PageControls};
use crate::error::{EiaError, Result};
use crate::facets::FacetSet;
use crate::fetcher::fetch_all;
use crate::loader::{HttpTransport, Transport};
use crate::period::{Bound, Frequency, TimeRange};
use crate::planner::{chunk_size_for, plan_chunks};
use crate::prober::{probe_endpoint, probe_series};
use crate::stitcher::stitch_chunks;
use polars::prelude::DataFrame;
use tracing::info;

/// Entry point: probe, plan, fetch concurrently, stitch.
pub struct EiaClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl EiaClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Self::with_transport(config, transport)
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }
}

impl<T: Transport> EiaClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Backfill `[start, end]` in as many requests as the row cap demands.
    ///
    /// One probe request sizes the chunks so that each request stays within
    /// `max_rows_per_request` rows across all series the facets select.
    pub fn fetch(
        &self,
        path: &str,
        facets: &FacetSet,
        start: Bound,
        end: Bound,
        frequency: Frequency,
        max_rows_per_request: usize,
    ) -> Result<DataFrame> {
        check_path(path)?;
        facets.validate()?;
        let range = TimeRange::new(start, end)?;
        check_frequency(Some(start), frequency)?;
        if max_rows_per_request == 0 {
            return Err(EiaError::invalid("max rows per request must be positive"));
        }

        let probe = probe_endpoint(&self.config.base_url, path, facets, range.start())?;
        let n_series = probe_series(&self.transport, &self.config.api_key, &probe)?;
        let chunk_size = chunk_size_for(max_rows_per_request, n_series)?;
        let chunks = plan_chunks(&range, chunk_size)?;
        info!(
            %path,
            periods = range.len(),
            chunk_size,
            chunks = chunks.len(),
            "planned backfill"
        );

        let endpoints: Vec<Endpoint> = chunks
            .iter()
            .map(|chunk| {
                self.endpoint(path, facets, frequency)
                    .start(Some(chunk.range.start()))
                    .end(Some(chunk.range.end()))
            })
            .collect();

        let row_sets = fetch_all(
            &self.transport,
            &self.config.api_key,
            &endpoints,
            self.config.max_concurrency,
            &self.config.retry,
        )?;
        let frame = stitch_chunks(row_sets, frequency)?;
        info!(%path, rows = frame.height(), "backfill complete");
        Ok(frame)
    }

    /// One request, no probing or chunking. For ranges known to fit a page.
    pub fn fetch_unbounded(
        &self,
        path: &str,
        facets: &FacetSet,
        start: Option<Bound>,
        end: Option<Bound>,
        frequency: Frequency,
    ) -> Result<DataFrame> {
        self.fetch_page(path, facets, start, end, frequency, PageControls::default())
    }

    /// One request with explicit `length`/`offset` paging.
    pub fn fetch_page(
        &self,
        path: &str,
        facets: &FacetSet,
        start: Option<Bound>,
        end: Option<Bound>,
        frequency: Frequency,
        page: PageControls,
    ) -> Result<DataFrame> {
        check_path(path)?;
        facets.validate()?;
        if let (Some(start), Some(end)) = (start, end) {
            TimeRange::new(start, end)?;
        }
        check_frequency(start, frequency)?;
        check_frequency(end, frequency)?;

        let endpoint = self
            .endpoint(path, facets, frequency)
            .start(start)
            .end(end)
            .page(page);
        let row_sets = fetch_all(
            &self.transport,
            &self.config.api_key,
            std::slice::from_ref(&endpoint),
            1,
            &self.config.retry,
        )?;
        stitch_chunks(row_sets, frequency)
    }

    fn endpoint(&self, path: &str, facets: &FacetSet, frequency: Frequency) -> Endpoint {
        Endpoint::new(&self.config.base_url, path, facets).frequency(Some(frequency))
    }
}

fn check_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(EiaError::invalid("api path is empty"));
    }
    Ok(())
}

fn check_frequency(bound: Option<Bound>, frequency: Frequency) -> Result<()> {
    match bound {
        Some(b) if b.frequency() != frequency => Err(EiaError::invalid(format!(
            "{frequency} data needs {} bounds, got {b}",
            match frequency {
                Frequency::Hourly => "YYYY-MM-DDTHH",
                Frequency::Daily => "YYYY-MM-DD",
            }
        ))),
        _ => Ok(()),
    }
}
