//! Test fixtures and hit generators.

use chrono::{DateTime, Duration, TimeZone, Utc};
use engine_core::{Hit, Row, Session, Value};

pub const PROPERTY_ID: &str = "prop1";
pub const LANDING_PAGE: &str = "https://shop.example.com/";

/// Fixed reference time so sorted output is predictable.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A page view `offset_secs` after [`base_time`].
pub fn page_view(property_id: &str, offset_secs: i64) -> Hit {
    Hit::new(property_id)
        .with_client_id("client-1")
        .with_page_url(LANDING_PAGE)
        .at(base_time() + Duration::seconds(offset_secs))
}

/// `n` page views one second apart.
pub fn page_views(property_id: &str, n: usize) -> Vec<Hit> {
    (0..n).map(|i| page_view(property_id, i as i64)).collect()
}

/// A closed session of `n` page views.
pub fn session(property_id: &str, n: usize) -> Session {
    Session::from_hits(page_views(property_id, n))
}

/// One page view per campaign, one second apart.
pub fn campaign_hits(property_id: &str, campaigns: &[&str]) -> Vec<Hit> {
    campaigns
        .iter()
        .enumerate()
        .map(|(i, campaign)| {
            page_view(property_id, i as i64)
                .with_page_url(format!("{}?utm_campaign={}", LANDING_PAGE, campaign))
        })
        .collect()
}

/// One page view per client IP, one second apart.
pub fn hits_from_ips(property_id: &str, ips: &[&str]) -> Vec<Hit> {
    ips.iter()
        .enumerate()
        .map(|(i, ip)| page_view(property_id, i as i64).with_ip(*ip))
        .collect()
}

/// A landing hit with the given page URL and referrer.
pub fn landing(property_id: &str, page_url: &str, referer: &str) -> Hit {
    let hit = page_view(property_id, 0).with_page_url(page_url);
    if referer.is_empty() {
        hit
    } else {
        hit.with_header("Referer", referer)
    }
}

/// String value of `field` in `row`, `None` for null or absent.
pub fn text<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

pub fn int(row: &Row, field: &str) -> Option<i64> {
    row.get(field).and_then(Value::as_i64)
}

/// The NDJSON form of a protosession, as read by the binary.
pub fn protosession_line(hits: &[Hit]) -> String {
    serde_json::to_string(hits).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_views_are_ordered() {
        let hits = page_views(PROPERTY_ID, 3);
        assert!(hits
            .windows(2)
            .all(|w| w[0].server_received_time < w[1].server_received_time));
    }

    #[test]
    fn test_session_takes_property_from_hits() {
        let session = session("prop9", 2);
        assert_eq!(session.property_id, "prop9");
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_campaign_hits_carry_param() {
        let hits = campaign_hits(PROPERTY_ID, &["A", "B"]);
        assert_eq!(hits[1].query_params.get("utm_campaign"), Some("B"));
    }

    #[test]
    fn test_protosession_line_round_trips() {
        let hits = page_views(PROPERTY_ID, 2);
        let parsed: Vec<Hit> = serde_json::from_str(&protosession_line(&hits)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, hits[0].id);
    }
}
