use crate::facets::FacetSet;
use crate::period::{Bound, Frequency};

/// Explicit `length`/`offset` paging for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageControls {
    pub length: Option<usize>,
    pub offset: Option<usize>,
}

/// Immutable request descriptor. Renders to exactly one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    path: String,
    data_columns: Vec<String>,
    facets: FacetSet,
    start: Option<Bound>,
    end: Option<Bound>,
    frequency: Option<Frequency>,
    page: PageControls,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, facets: &FacetSet) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            data_columns: vec!["value".to_string()],
            facets: facets.clone(),
            start: None,
            end: None,
            frequency: None,
            page: PageControls::default(),
        }
    }

    pub fn start(mut self, start: Option<Bound>) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: Option<Bound>) -> Self {
        self.end = end;
        self
    }

    pub fn frequency(mut self, frequency: Option<Frequency>) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn page(mut self, page: PageControls) -> Self {
        self.page = page;
        self
    }

    /// Replace the default `data[]=value` selection.
    pub fn data_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn bounds(&self) -> (Option<Bound>, Option<Bound>) {
        (self.start, self.end)
    }

    /// Full URL. Absent inputs produce no parameter at all.
    pub fn url(&self) -> String {
        let mut params: Vec<String> = self
            .data_columns
            .iter()
            .map(|c| format!("data[]={c}"))
            .collect();

        let facets = self.facets.encode();
        if !facets.is_empty() {
            params.push(facets);
        }
        if let Some(start) = &self.start {
            params.push(format!("start={}", start.to_param()));
        }
        if let Some(end) = &self.end {
            params.push(format!("end={}", end.to_param()));
        }
        if let Some(freq) = &self.frequency {
            params.push(format!("frequency={freq}"));
        }
        if let Some(length) = self.page.length {
            params.push(format!("length={length}"));
        }
        if let Some(offset) = self.page.offset {
            params.push(format!("offset={offset}"));
        }

        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if params.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{path}?{}", params.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.eia.gov/v2/";
    const PATH: &str = "electricity/rto/region-sub-ba-data/data/";

    #[test]
    fn test_hourly_url() {
        let facets = FacetSet::new().with("parent", "CISO").with("subba", "SDGE");
        let url = Endpoint::new(BASE, PATH, &facets)
            .start(Some("2024-01-01T00".parse().unwrap()))
            .end(Some("2024-01-02T05".parse().unwrap()))
            .frequency(Some(Frequency::Hourly))
            .url();
        assert_eq!(
            url,
            "https://api.eia.gov/v2/electricity/rto/region-sub-ba-data/data/?data[]=value\
             &facets[parent][]=CISO&facets[subba][]=SDGE\
             &start=2024-01-01T00&end=2024-01-02T05&frequency=hourly"
        );
    }

    #[test]
    fn test_daily_url_with_paging() {
        let url = Endpoint::new(BASE, PATH, &FacetSet::new())
            .start(Some("2024-01-01".parse().unwrap()))
            .end(Some("2024-01-10".parse().unwrap()))
            .frequency(Some(Frequency::Daily))
            .page(PageControls { length: Some(5000), offset: Some(0) })
            .url();
        assert!(url.ends_with(
            "?data[]=value&start=2024-01-01&end=2024-01-10&frequency=daily&length=5000&offset=0"
        ));
    }

    #[test]
    fn test_facet_values_are_escaped_in_url() {
        let facets = FacetSet::new().with("respondent", "A&B").with("subba", "SDGE");
        let url = Endpoint::new(BASE, PATH, &facets)
            .start(Some("2024-01-01".parse().unwrap()))
            .url();
        assert!(url.ends_with(
            "?data[]=value&facets[respondent][]=A%26B&facets[subba][]=SDGE&start=2024-01-01"
        ));
    }

    #[test]
    fn test_absent_inputs_are_omitted() {
        let url = Endpoint::new(BASE, PATH, &FacetSet::new()).url();
        assert_eq!(url, format!("{BASE}{PATH}?data[]=value"));
        assert!(!url.contains("start="));
        assert!(!url.contains("facets"));

        let only_end = Endpoint::new(BASE, PATH, &FacetSet::new())
            .end(Some("2024-02-01".parse().unwrap()))
            .url();
        assert!(only_end.ends_with("?data[]=value&end=2024-02-01"));
    }
}
