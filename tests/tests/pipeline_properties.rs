//! Properties that hold across crates: layout, splitter, filter and closer
//! working together over the default column set.

use chrono::Duration;
use columns::{default_columns, ColumnDeps};
use engine_core::{Event, Hit, Session, Value};
use integration_tests::fixtures::{self, text, PROPERTY_ID};
use integration_tests::setup::{PipelineOptions, TestContext};
use schema::{EmbeddedSessionColumnsLayout, Layout};
use splitter::SplitSettings;

const SPLIT_CAUSES: [&str; 4] = [
    "utm_campaign_changed",
    "user_id_changed",
    "max_events_reached",
    "max_time_since_first_event_reached",
];

/// Deterministic campaign sequences of varying length and churn.
fn campaign_sequences() -> Vec<Vec<&'static str>> {
    let names = ["spring", "summer", "autumn"];
    (1..=12)
        .map(|len| {
            (0..len)
                .map(|i| names[(i * 7 / (len % 4 + 1)) % names.len()])
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_split_preserves_every_event_in_order() {
    let split = SplitSettings {
        split_by_max_events: 3,
        ..Default::default()
    };
    for campaigns in campaign_sequences() {
        let ctx = TestContext::with_options(
            PipelineOptions::default().with_override(PROPERTY_ID, split.clone()),
        )
        .await
        .unwrap();
        let hits = fixtures::campaign_hits(PROPERTY_ID, &campaigns);
        let expected: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();

        ctx.close(vec![hits]).await.unwrap();

        let written: Vec<String> = ctx
            .event_rows()
            .iter()
            .filter_map(|r| text(r, "event_id").map(str::to_string))
            .collect();
        assert_eq!(written, expected, "campaigns {:?}", campaigns);
    }
}

#[tokio::test]
async fn test_split_cause_only_on_successors() {
    let split = SplitSettings {
        split_by_max_events: 4,
        ..Default::default()
    };
    for campaigns in campaign_sequences() {
        let ctx = TestContext::with_options(
            PipelineOptions::default().with_override(PROPERTY_ID, split.clone()),
        )
        .await
        .unwrap();
        ctx.close(vec![fixtures::campaign_hits(PROPERTY_ID, &campaigns)])
            .await
            .unwrap();

        let sessions = ctx.rows_by_session();
        for row in &sessions[0] {
            assert_eq!(row.get("session_split_cause"), Some(&Value::Null));
        }
        for rows in sessions.iter().skip(1) {
            let cause = text(&rows[0], "session_split_cause").unwrap();
            assert!(SPLIT_CAUSES.contains(&cause), "unexpected cause {}", cause);
        }
    }
}

#[tokio::test]
async fn test_user_id_change_splits() {
    let hits = vec![
        fixtures::page_view(PROPERTY_ID, 0).with_user_id("u1"),
        fixtures::page_view(PROPERTY_ID, 1).with_user_id("u1"),
        fixtures::page_view(PROPERTY_ID, 2).with_user_id("u2"),
    ];
    let ctx = TestContext::new().await.unwrap();
    ctx.close(vec![hits]).await.unwrap();

    let sessions = ctx.rows_by_session();
    assert_eq!(sessions.len(), 2);
    assert_eq!(text(&sessions[1][0], "session_split_cause"), Some("user_id_changed"));
}

#[tokio::test]
async fn test_allow_filter_keeps_only_matching_events() {
    let yaml = r#"
filters:
  fields: [ip_address]
  conditions:
    - name: vpn_only
      type: allow
      active: true
      expression: 'in_cidr(ip_address, "100.64.0.0/10")'
    - name: blocked
      type: exclude
      active: true
      expression: 'ip_address == "100.64.0.8"'
"#;
    let ips: Vec<String> = (0..20)
        .map(|i| match i % 4 {
            0 => format!("100.64.0.{}", i),
            1 => format!("100.127.{}.1", i),
            2 => format!("10.0.0.{}", i),
            _ => format!("100.128.0.{}", i),
        })
        .collect();
    let ip_refs: Vec<&str> = ips.iter().map(String::as_str).collect();

    let options = PipelineOptions::default().with_filters_yaml(yaml).unwrap();
    let ctx = TestContext::with_options(options).await.unwrap();
    ctx.close(vec![fixtures::hits_from_ips(PROPERTY_ID, &ip_refs)])
        .await
        .unwrap();

    let kept: Vec<String> = ctx
        .event_rows()
        .iter()
        .filter_map(|r| text(r, "ip_address").map(str::to_string))
        .collect();
    let expected: Vec<String> = ips
        .iter()
        .filter(|ip| {
            (ip.starts_with("100.64.") || ip.starts_with("100.127.")) && *ip != "100.64.0.8"
        })
        .cloned()
        .collect();
    assert_eq!(kept, expected);
}

#[tokio::test]
async fn test_identical_receive_times_keep_input_order() {
    let t0 = fixtures::base_time();
    let hits = vec![
        Hit::new(PROPERTY_ID).at(t0 + Duration::seconds(1)).with_event_name("d"),
        Hit::new(PROPERTY_ID).at(t0).with_event_name("a"),
        Hit::new(PROPERTY_ID).at(t0).with_event_name("b"),
        Hit::new(PROPERTY_ID).at(t0 + Duration::seconds(1)).with_event_name("e"),
        Hit::new(PROPERTY_ID).at(t0).with_event_name("c"),
    ];
    let ctx = TestContext::new().await.unwrap();
    ctx.close(vec![hits]).await.unwrap();

    let names: Vec<String> = ctx
        .event_rows()
        .iter()
        .filter_map(|r| text(r, "event_name").map(str::to_string))
        .collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_embedded_layout_is_idempotent_over_default_columns() {
    let columns = default_columns(&ColumnDeps::new().unwrap()).unwrap();
    let layout = EmbeddedSessionColumnsLayout::new("events", "s_");

    let first: Vec<String> = layout.tables(&columns)[0]
        .schema
        .names()
        .map(str::to_string)
        .collect();
    let second: Vec<String> = layout.tables(&columns)[0]
        .schema
        .names()
        .map(str::to_string)
        .collect();
    assert_eq!(first, second);
    assert!(first.contains(&"s_session_id".to_string()));
    assert!(!first.iter().any(|n| n.starts_with("s_s_")));

    let mut session = Session::new(vec![Event::new(Hit::new(PROPERTY_ID))]);
    session.set_value("session_id", "abc");
    session.events[0].set_value("event_id", "abc");

    for _ in 0..2 {
        let rows = layout.to_rows(&columns, vec![session.clone()]).unwrap();
        let row = &rows[0].rows[0];
        assert_eq!(row.get("s_session_id"), Some(&Value::from("abc")));
        assert!(!row.keys().any(|k| k.starts_with("s_s_")));
    }
}
