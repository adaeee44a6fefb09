//! Artifact dispatch: maps a type tag to a renderer that normalises the
//! payload into one canonical shape.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::payload::{array_or_wrapped, field, number, scalar_text};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactView {
    pub kind: String,
    pub title: String,
    pub body: ArtifactBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactBody {
    PriceSeries(Vec<PricePoint>),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Metrics(Vec<MetricEntry>),
    News(Vec<NewsItem>),
    /// The renderer found nothing usable in the payload.
    Empty,
    /// Fallback for unregistered tags: the pretty-printed payload.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub headline: String,
    pub source: Option<String>,
    pub url: Option<String>,
}

/// A pure function of `{title, data}` producing a normalised body.
pub trait ArtifactRenderer: Send + Sync {
    fn render(&self, title: &str, data: &Value) -> ArtifactBody;
}

#[derive(Clone)]
pub struct ArtifactDispatcher {
    renderers: BTreeMap<String, Arc<dyn ArtifactRenderer>>,
}

impl fmt::Debug for ArtifactDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactDispatcher")
            .field("tags", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ArtifactDispatcher {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ArtifactDispatcher {
    /// A dispatcher with no renderers: every artifact renders raw.
    pub fn empty() -> Self {
        Self {
            renderers: BTreeMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut dispatcher = Self::empty();
        let price: Arc<dyn ArtifactRenderer> = Arc::new(PriceChartRenderer);
        dispatcher.renderers.insert("price_chart".to_string(), price.clone());
        dispatcher.renderers.insert("chart".to_string(), price);
        let metrics: Arc<dyn ArtifactRenderer> = Arc::new(MetricsRenderer);
        dispatcher.renderers.insert("metrics".to_string(), metrics.clone());
        dispatcher.renderers.insert("key_metrics".to_string(), metrics);
        dispatcher.register("table", TableRenderer);
        dispatcher.register("news", NewsRenderer);
        dispatcher
    }

    pub fn register(&mut self, tag: impl Into<String>, renderer: impl ArtifactRenderer + 'static) {
        self.renderers.insert(tag.into(), Arc::new(renderer));
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }

    /// Never panics: a misbehaving renderer degrades to the raw view.
    pub fn dispatch(&self, kind: &str, title: &str, data: &Value) -> ArtifactView {
        let body = match self.renderers.get(kind) {
            Some(renderer) => {
                match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(title, data))) {
                    Ok(body) => body,
                    Err(_) => {
                        research_logging::research_warn!(
                            "artifact renderer for '{}' panicked; showing raw payload",
                            kind
                        );
                        raw_body(data)
                    }
                }
            }
            None => raw_body(data),
        };
        ArtifactView {
            kind: kind.to_string(),
            title: title.to_string(),
            body,
        }
    }
}

fn raw_body(data: &Value) -> ArtifactBody {
    ArtifactBody::Raw(serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => scalar_text(other).unwrap_or_else(|| other.to_string()),
    }
}

pub struct PriceChartRenderer;

impl ArtifactRenderer for PriceChartRenderer {
    fn render(&self, _title: &str, data: &Value) -> ArtifactBody {
        let points: Vec<PricePoint> =
            match array_or_wrapped(data, &["data", "series", "prices", "points", "values"]) {
                Some(items) => items.iter().filter_map(price_point).collect(),
                // `{ "2024-01-02": 187.1, ... }`
                None => data
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .filter_map(|(date, close)| {
                                number(close).map(|close| PricePoint {
                                    date: date.clone(),
                                    close,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            };
        if points.is_empty() {
            ArtifactBody::Empty
        } else {
            ArtifactBody::PriceSeries(points)
        }
    }
}

fn price_point(item: &Value) -> Option<PricePoint> {
    if let Some(pair) = item.as_array() {
        let date = pair.first().and_then(scalar_text)?;
        let close = pair.get(1).and_then(number)?;
        return Some(PricePoint { date, close });
    }
    let date = field(item, &["date", "time", "timestamp", "t", "x"]).and_then(scalar_text)?;
    let close = field(item, &["close", "price", "value", "c", "y"]).and_then(number)?;
    Some(PricePoint { date, close })
}

pub struct TableRenderer;

impl ArtifactRenderer for TableRenderer {
    fn render(&self, _title: &str, data: &Value) -> ArtifactBody {
        let Some(items) = array_or_wrapped(data, &["rows", "data", "items", "records"]) else {
            return ArtifactBody::Empty;
        };
        let mut columns: Vec<String> = field(data, &["columns", "headers"])
            .and_then(Value::as_array)
            .map(|headers| headers.iter().map(cell_text).collect())
            .unwrap_or_default();
        if columns.is_empty() {
            for item in items {
                if let Some(object) = item.as_object() {
                    for key in object.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
            }
        }

        let rows: Vec<Vec<String>> = items
            .iter()
            .filter_map(|item| match item {
                Value::Array(cells) => Some(cells.iter().map(cell_text).collect()),
                Value::Object(object) => Some(
                    columns
                        .iter()
                        .map(|column| object.get(column).map(cell_text).unwrap_or_default())
                        .collect(),
                ),
                _ => None,
            })
            .collect();

        if rows.is_empty() {
            ArtifactBody::Empty
        } else {
            ArtifactBody::Table { columns, rows }
        }
    }
}

pub struct MetricsRenderer;

impl ArtifactRenderer for MetricsRenderer {
    fn render(&self, _title: &str, data: &Value) -> ArtifactBody {
        let entries: Vec<MetricEntry> =
            match array_or_wrapped(data, &["metrics", "entries", "items", "data"]) {
                Some(items) => items
                    .iter()
                    .filter_map(|item| {
                        let label = field(item, &["label", "name", "key", "metric"])
                            .and_then(scalar_text)?;
                        let value = field(item, &["value", "val"]).map(cell_text)?;
                        Some(MetricEntry { label, value })
                    })
                    .collect(),
                None => field(data, &["metrics", "entries"])
                    .filter(|inner| inner.is_object())
                    .unwrap_or(data)
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .filter(|(_, value)| !value.is_null())
                            .map(|(label, value)| MetricEntry {
                                label: label.clone(),
                                value: cell_text(value),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            };
        if entries.is_empty() {
            ArtifactBody::Empty
        } else {
            ArtifactBody::Metrics(entries)
        }
    }
}

pub struct NewsRenderer;

impl ArtifactRenderer for NewsRenderer {
    fn render(&self, _title: &str, data: &Value) -> ArtifactBody {
        let items: Vec<NewsItem> = array_or_wrapped(
            data,
            &["articles", "items", "news", "data", "results"],
        )
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let headline = field(item, &["headline", "title"]).and_then(scalar_text)?;
                    let source = field(item, &["source", "publisher"]).and_then(|source| {
                        scalar_text(source)
                            .or_else(|| field(source, &["name"]).and_then(scalar_text))
                    });
                    let url = field(item, &["url", "link"]).and_then(scalar_text);
                    Some(NewsItem {
                        headline,
                        source,
                        url,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
        if items.is_empty() {
            ArtifactBody::Empty
        } else {
            ArtifactBody::News(items)
        }
    }
}
