use crate::error::{EiaError, Result};
use serde_json::Value;

/// One facet's selection: a single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FacetValue {
    fn values(&self) -> &[String] {
        match self {
            FacetValue::Single(v) => std::slice::from_ref(v),
            FacetValue::Multiple(vs) => vs,
        }
    }
}

impl From<&str> for FacetValue {
    fn from(v: &str) -> Self {
        FacetValue::Single(v.to_string())
    }
}

impl From<String> for FacetValue {
    fn from(v: String) -> Self {
        FacetValue::Single(v)
    }
}

impl From<Vec<String>> for FacetValue {
    fn from(vs: Vec<String>) -> Self {
        FacetValue::Multiple(vs)
    }
}

impl From<Vec<&str>> for FacetValue {
    fn from(vs: Vec<&str>) -> Self {
        FacetValue::Multiple(vs.into_iter().map(str::to_string).collect())
    }
}

/// Facet filters in insertion order. Repeated names and values are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSet {
    entries: Vec<(String, FacetValue)>,
}

impl FacetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, keeps the call order.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FacetValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FacetValue>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FacetValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Parse a JSON object such as `{"parent": "CISO", "subba": ["SDGE"]}`.
    ///
    /// `null` means no facets. Any value that is not a string or an array of
    /// strings is rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(map) => map,
            other => {
                return Err(EiaError::invalid(format!(
                    "facets must be an object, got {other}"
                )))
            }
        };

        let mut set = Self::new();
        for (name, raw) in map {
            let facet = match raw {
                Value::String(s) => FacetValue::Single(s.clone()),
                Value::Array(items) => FacetValue::Multiple(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.clone()),
                            other => Err(EiaError::invalid(format!(
                                "facet '{name}' list holds a non-string value {other}"
                            ))),
                        })
                        .collect::<Result<_>>()?,
                ),
                other => {
                    return Err(EiaError::invalid(format!(
                        "facet '{name}' must be a string or a list of strings, got {other}"
                    )))
                }
            };
            set.push(name.clone(), facet);
        }
        set.validate()?;
        Ok(set)
    }

    /// Parse `name=value` pairs; a repeated name accumulates into a list.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| EiaError::invalid(format!("facet '{pair}' is not name=value")))?;
            let name = name.trim();
            let value = value.trim().to_string();
            match set.entries.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => {
                    let mut merged = existing.values().to_vec();
                    merged.push(value);
                    *existing = FacetValue::Multiple(merged);
                }
                None => set.push(name, value),
            }
        }
        set.validate()?;
        Ok(set)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.entries.iter().find(|(n, _)| n.trim().is_empty()) {
            return Err(EiaError::invalid(format!("empty facet name '{name}'")));
        }
        Ok(())
    }

    /// Render as `facets[name][]=value` tokens joined by `&`.
    ///
    /// Values are percent-encoded; the `facets[name][]` key stays literal.
    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .flat_map(|(name, value)| {
                value
                    .values()
                    .iter()
                    .map(move |v| format!("facets[{name}][]={}", urlencoding::encode(v)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
