//! End-to-end tests for the session pipeline.
//!
//! These tests validate the full data flow:
//! protosessions → ProtosessionCloser → DirectWriter (columns, filters,
//! splitter, layout) → warehouse rows
//!
//! The warehouse is a recording in-memory driver whose tables were created
//! by the schema guard, so every production code path runs except the
//! network transport to ClickHouse.

use engine_core::{Error, Hit, Value};
use integration_tests::fixtures::{self, text, PROPERTY_ID};
use integration_tests::setup::{PipelineOptions, TestContext, EVENTS_TABLE};
use splitter::SplitSettings;

const S5_FILTERS: &str = r#"
filters:
  fields: [ip_address]
  conditions:
    - name: vpn_only
      type: allow
      active: true
      expression: 'in_cidr(ip_address, "100.64.0.0/10")'
    - name: test_office
      type: exclude
      active: false
      expression: 'ip_address == "203.0.113.50"'
"#;

#[tokio::test]
async fn test_campaign_change_splits_session() {
    let ctx = TestContext::new().await.unwrap();
    let hits = fixtures::campaign_hits(PROPERTY_ID, &["A", "A", "B", "B"]);
    let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();

    ctx.close(vec![hits]).await.unwrap();

    let sessions = ctx.rows_by_session();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].len(), 2);
    assert_eq!(sessions[1].len(), 2);

    // Session ID is the ID of the session's first event
    assert_eq!(text(&sessions[0][0], "session_id"), Some(ids[0].as_str()));
    assert_eq!(text(&sessions[1][0], "session_id"), Some(ids[2].as_str()));

    assert_eq!(sessions[0][0].get("session_split_cause"), Some(&Value::Null));
    for row in &sessions[1] {
        assert_eq!(text(row, "session_split_cause"), Some("utm_campaign_changed"));
        assert_eq!(text(row, "utm_campaign"), Some("B"));
    }
    assert_eq!(sessions[1][0].get("session_is_entry"), Some(&Value::Bool(true)));
    assert_eq!(sessions[1][1].get("session_is_entry"), Some(&Value::Bool(false)));
}

#[tokio::test]
async fn test_max_events_split() {
    let split = SplitSettings {
        split_by_max_events: 2,
        ..Default::default()
    };
    let ctx = TestContext::with_options(PipelineOptions::default().with_override(PROPERTY_ID, split))
        .await
        .unwrap();

    ctx.close(vec![fixtures::page_views(PROPERTY_ID, 7)])
        .await
        .unwrap();

    let sizes: Vec<usize> = ctx.rows_by_session().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 2, 1]);

    let totals: Vec<i64> = ctx
        .rows_by_session()
        .iter()
        .filter_map(|rows| fixtures::int(&rows[0], "total_events"))
        .collect();
    assert_eq!(totals, vec![2, 2, 2, 1]);

    for rows in ctx.rows_by_session().iter().skip(1) {
        assert_eq!(text(&rows[0], "session_split_cause"), Some("max_events_reached"));
    }
}

#[tokio::test]
async fn test_gclid_attribution() {
    let ctx = TestContext::new().await.unwrap();
    let hit = fixtures::landing(
        PROPERTY_ID,
        "https://x.example/landing?gclid=abc&utm_medium=banner",
        "",
    );

    ctx.close(vec![vec![hit]]).await.unwrap();

    let rows = ctx.event_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(text(&rows[0], "session_source"), Some("google"));
    assert_eq!(text(&rows[0], "session_medium"), Some("banner"));
    assert_eq!(text(&rows[0], "session_term").unwrap_or_default(), "");
    assert_eq!(text(&rows[0], "params_gclid"), Some("abc"));
}

#[tokio::test]
async fn test_referral_attribution() {
    let ctx = TestContext::new().await.unwrap();
    ctx.close(vec![vec![fixtures::landing(
        PROPERTY_ID,
        fixtures::LANDING_PAGE,
        "https://news.example.com/article",
    )]])
    .await
    .unwrap();

    let rows = ctx.event_rows();
    assert_eq!(text(&rows[0], "session_source"), Some("news.example.com"));
    assert_eq!(text(&rows[0], "session_medium"), Some("referral"));
    assert_eq!(
        text(&rows[0], "session_referrer"),
        Some("https://news.example.com/article")
    );
}

#[tokio::test]
async fn test_same_host_referrer_is_direct() {
    let ctx = TestContext::new().await.unwrap();
    ctx.close(vec![vec![fixtures::landing(
        PROPERTY_ID,
        fixtures::LANDING_PAGE,
        "https://shop.example.com/cart",
    )]])
    .await
    .unwrap();

    let rows = ctx.event_rows();
    assert_eq!(text(&rows[0], "session_source"), Some("direct"));
    assert_eq!(text(&rows[0], "session_medium"), Some("none"));
}

#[tokio::test]
async fn test_allow_filter_and_testing_mode() {
    let options = PipelineOptions::default()
        .with_filters_yaml(S5_FILTERS)
        .unwrap();
    let ctx = TestContext::with_options(options).await.unwrap();

    ctx.close(vec![fixtures::hits_from_ips(
        PROPERTY_ID,
        &["100.65.0.1", "8.8.8.8", "203.0.113.50", "100.127.255.254"],
    )])
    .await
    .unwrap();

    let rows = ctx.event_rows();
    let ips: Vec<&str> = rows.iter().filter_map(|r| text(r, "ip_address")).collect();
    assert_eq!(ips, vec!["100.65.0.1", "100.127.255.254"]);
    assert!(rows
        .iter()
        .all(|r| r.get("traffic_filter_name") == Some(&Value::Null)));
    assert!(rows.iter().all(|r| fixtures::int(r, "total_events") == Some(2)));
}

#[tokio::test]
async fn test_testing_mode_tags_without_dropping() {
    let yaml = r#"
filters:
  fields: [ip_address]
  conditions:
    - name: test_office
      type: exclude
      active: false
      expression: 'ip_address == "203.0.113.50"'
"#;
    let options = PipelineOptions::default().with_filters_yaml(yaml).unwrap();
    let ctx = TestContext::with_options(options).await.unwrap();

    ctx.close(vec![fixtures::hits_from_ips(
        PROPERTY_ID,
        &["8.8.8.8", "203.0.113.50"],
    )])
    .await
    .unwrap();

    let rows = ctx.event_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("traffic_filter_name"), Some(&Value::Null));
    assert_eq!(text(&rows[1], "traffic_filter_name"), Some("test_office"));
}

#[tokio::test]
async fn test_fully_filtered_session_writes_nothing() {
    let options = PipelineOptions::default()
        .with_filters_yaml(S5_FILTERS)
        .unwrap();
    let ctx = TestContext::with_options(options).await.unwrap();

    ctx.close(vec![fixtures::hits_from_ips(PROPERTY_ID, &["8.8.8.8"])])
        .await
        .unwrap();

    assert_eq!(ctx.driver.write_count(), 0);
}

#[tokio::test]
async fn test_broken_event_is_dropped() {
    let ctx = TestContext::new().await.unwrap();
    let mut hits = fixtures::page_views(PROPERTY_ID, 3);
    hits[1] = hits[1].clone().with_event_name("");

    ctx.close(vec![hits]).await.unwrap();

    let rows = ctx.event_rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| text(r, "event_name") == Some("page_view")));
}

#[tokio::test]
async fn test_properties_written_separately() {
    let options = PipelineOptions {
        properties: vec!["prop1".to_string(), "prop2".to_string()],
        ..Default::default()
    };
    let ctx = TestContext::with_options(options).await.unwrap();

    ctx.close(vec![
        fixtures::page_views("prop1", 2),
        fixtures::page_views("prop2", 3),
        fixtures::page_views("prop1", 1),
    ])
    .await
    .unwrap();

    let writes = ctx.driver.captured_writes();
    assert_eq!(writes.len(), 2);
    for (table, rows) in &writes {
        assert_eq!(table, EVENTS_TABLE);
        let property = text(&rows[0], "property_id");
        assert!(rows.iter().all(|r| text(r, "property_id") == property));
    }
    assert_eq!(writes[0].1.len(), 3);
    assert_eq!(writes[1].1.len(), 3);
}

#[tokio::test]
async fn test_warehouse_failure_propagates() {
    let ctx = TestContext::new().await.unwrap();
    ctx.set_warehouse_failure(true);

    let err = ctx
        .close(vec![fixtures::page_views(PROPERTY_ID, 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Warehouse(_)));
    assert!(ctx.event_rows().is_empty());

    ctx.set_warehouse_failure(false);
    ctx.close(vec![fixtures::page_views(PROPERTY_ID, 2)])
        .await
        .unwrap();
    assert_eq!(ctx.event_rows().len(), 2);
}

#[tokio::test]
async fn test_guard_created_events_table() {
    let ctx = TestContext::new().await.unwrap();
    let fields = ctx.driver.fields(EVENTS_TABLE).unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();

    for expected in [
        "event_id",
        "page_location",
        "session_id",
        "duration",
        "session_source",
        "session_hit_number",
        "traffic_filter_name",
    ] {
        assert!(names.contains(&expected), "missing column {}", expected);
    }
    assert!(!names.iter().any(|n| n.starts_with("session_session_")));
}

#[tokio::test]
async fn test_mixed_protosession_is_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let err = ctx
        .close(vec![vec![Hit::new("prop1"), Hit::new("prop2")]])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("mixed property IDs"));
    assert_eq!(ctx.driver.write_count(), 0);
}

#[tokio::test]
async fn test_tables_created_on_first_write() {
    let ctx = TestContext::with_options(PipelineOptions {
        lazy_tables: true,
        ..Default::default()
    })
    .await
    .unwrap();
    assert!(ctx.driver.fields(EVENTS_TABLE).is_none());

    ctx.close(vec![fixtures::page_views(PROPERTY_ID, 3)])
        .await
        .unwrap();
    ctx.close(vec![fixtures::page_views("prop-unlisted", 2)])
        .await
        .unwrap();

    assert!(ctx.driver.fields(EVENTS_TABLE).is_some());
    assert_eq!(ctx.event_rows().len(), 5);
}
