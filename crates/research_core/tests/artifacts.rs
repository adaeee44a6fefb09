use research_core::artifact::{MetricEntry, NewsItem, PricePoint};
use research_core::{ArtifactBody, ArtifactDispatcher, ArtifactRenderer};
use serde_json::{json, Value};

fn body(kind: &str, data: Value) -> ArtifactBody {
    ArtifactDispatcher::default().dispatch(kind, "title", &data).body
}

#[test]
fn price_series_from_bare_array_and_wrapper_agree() {
    let expected = ArtifactBody::PriceSeries(vec![
        PricePoint {
            date: "2024-01-02".to_string(),
            close: 185.2,
        },
        PricePoint {
            date: "2024-01-03".to_string(),
            close: 184.25,
        },
    ]);

    let bare = json!([
        { "date": "2024-01-02", "close": 185.2 },
        { "date": "2024-01-03", "close": "184.25" }
    ]);
    let wrapped = json!({ "symbol": "AAPL", "prices": [
        { "time": "2024-01-02", "price": "185.2" },
        { "t": "2024-01-03", "c": 184.25 }
    ] });
    let pairs = json!({ "series": [["2024-01-02", 185.2], ["2024-01-03", 184.25]] });

    assert_eq!(body("price_chart", bare), expected);
    assert_eq!(body("price_chart", wrapped), expected);
    assert_eq!(body("chart", pairs), expected);
}

#[test]
fn unusable_points_are_skipped_and_empty_is_explicit() {
    let data = json!([{ "date": "2024-01-02", "close": "n/a" }, { "close": 3 }]);
    assert_eq!(body("price_chart", data), ArtifactBody::Empty);
    assert_eq!(body("price_chart", json!(null)), ArtifactBody::Empty);
    assert_eq!(body("table", json!({ "rows": [] })), ArtifactBody::Empty);
    assert_eq!(body("news", json!("nothing")), ArtifactBody::Empty);
    assert_eq!(body("metrics", json!([])), ArtifactBody::Empty);
}

#[test]
fn table_columns_come_from_headers_or_object_keys() {
    let from_objects = body(
        "table",
        json!([
            { "ticker": "AAPL", "pe": 29.1 },
            { "ticker": "MSFT", "pe": "34", "yield": 0.7 }
        ]),
    );
    assert_eq!(
        from_objects,
        ArtifactBody::Table {
            columns: vec!["ticker".to_string(), "pe".to_string(), "yield".to_string()],
            rows: vec![
                vec!["AAPL".to_string(), "29.1".to_string(), String::new()],
                vec!["MSFT".to_string(), "34".to_string(), "0.7".to_string()],
            ],
        }
    );

    let from_arrays = body(
        "table",
        json!({ "headers": ["Quarter", "EPS"], "data": [["Q1", 1.52], ["Q2", null]] }),
    );
    assert_eq!(
        from_arrays,
        ArtifactBody::Table {
            columns: vec!["Quarter".to_string(), "EPS".to_string()],
            rows: vec![
                vec!["Q1".to_string(), "1.52".to_string()],
                vec!["Q2".to_string(), String::new()],
            ],
        }
    );
}

#[test]
fn metrics_from_map_or_list() {
    let expected = ArtifactBody::Metrics(vec![
        MetricEntry {
            label: "pe".to_string(),
            value: "31.2".to_string(),
        },
        MetricEntry {
            label: "market_cap".to_string(),
            value: "2.9T".to_string(),
        },
    ]);
    assert_eq!(
        body("metrics", json!({ "pe": 31.2, "market_cap": "2.9T" })),
        expected
    );
    assert_eq!(
        body(
            "key_metrics",
            json!({ "metrics": [{ "name": "pe", "value": 31.2 }, { "label": "market_cap", "value": "2.9T" }] })
        ),
        expected
    );
}

#[test]
fn news_items_accept_nested_source() {
    let data = json!({ "articles": [
        { "title": "Chipmaker beats estimates", "source": { "name": "Wire" }, "link": "https://example.com/a" },
        { "headline": "Guidance raised", "publisher": "Daily" },
        { "summary": "no headline" }
    ] });
    assert_eq!(
        body("news", data),
        ArtifactBody::News(vec![
            NewsItem {
                headline: "Chipmaker beats estimates".to_string(),
                source: Some("Wire".to_string()),
                url: Some("https://example.com/a".to_string()),
            },
            NewsItem {
                headline: "Guidance raised".to_string(),
                source: Some("Daily".to_string()),
                url: None,
            },
        ])
    );
}

#[test]
fn unknown_tag_falls_back_to_raw_with_tag_name() {
    let view = ArtifactDispatcher::default().dispatch("sankey", "Flows", &json!({ "a": 1 }));
    assert_eq!(view.kind, "sankey");
    assert_eq!(view.title, "Flows");
    assert_eq!(view.body, ArtifactBody::Raw("{\n  \"a\": 1\n}".to_string()));
}

struct PanickingRenderer;

impl ArtifactRenderer for PanickingRenderer {
    fn render(&self, _title: &str, _data: &Value) -> ArtifactBody {
        panic!("renderer bug");
    }
}

#[test]
fn panicking_renderer_degrades_to_raw() {
    research_logging::initialize_for_tests();
    let mut dispatcher = ArtifactDispatcher::empty();
    dispatcher.register("broken", PanickingRenderer);

    let view = dispatcher.dispatch("broken", "Oops", &json!([1]));
    assert!(matches!(view.body, ArtifactBody::Raw(_)));
    assert_eq!(dispatcher.tags().collect::<Vec<_>>(), vec!["broken"]);
}
