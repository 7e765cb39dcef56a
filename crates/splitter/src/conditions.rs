//! Split conditions evaluated event by event.

use std::collections::HashMap;
use std::time::Duration;

use engine_core::{Event, SplitCause, Value};

/// State of the sub-session being built.
pub struct SplitContext<'a> {
    /// Events in the current sub-session, the current one excluded.
    pub event_count: usize,
    pub first_event: &'a Event,
    /// Last observed value per watched column.
    pub column_values: HashMap<String, String>,
}

impl<'a> SplitContext<'a> {
    pub fn new(first_event: &'a Event) -> Self {
        Self {
            event_count: 1,
            first_event,
            column_values: HashMap::new(),
        }
    }
}

pub trait SplitCondition: Send + Sync {
    /// `Some(cause)` when the sub-session must end before `current`.
    fn should_split(&self, ctx: &mut SplitContext<'_>, current: &Event) -> Option<SplitCause>;
}

/// Splits when a string column changes value.
///
/// Null and absent values are never observations. Empty strings are
/// observations only when `empty_splits` is set.
pub struct ValueChangedCondition {
    column: String,
    cause: SplitCause,
    empty_splits: bool,
}

impl ValueChangedCondition {
    pub fn new(column: impl Into<String>, cause: SplitCause, empty_splits: bool) -> Self {
        Self {
            column: column.into(),
            cause,
            empty_splits,
        }
    }

    pub fn utm_campaign() -> Self {
        Self::new("utm_campaign", SplitCause::UtmCampaignChanged, true)
    }

    pub fn user_id() -> Self {
        Self::new("user_id", SplitCause::UserIdChanged, false)
    }
}

impl SplitCondition for ValueChangedCondition {
    fn should_split(&self, ctx: &mut SplitContext<'_>, current: &Event) -> Option<SplitCause> {
        let value = match current.value(&self.column) {
            Some(Value::String(s)) => s,
            _ => return None,
        };
        if value.is_empty() && !self.empty_splits {
            return None;
        }
        let previous = ctx.column_values.insert(self.column.clone(), value.clone());
        match previous {
            Some(previous) if previous != *value => Some(self.cause),
            _ => None,
        }
    }
}

/// Splits once the sub-session holds `max` events.
pub struct MaxEventsCondition {
    max: usize,
}

impl MaxEventsCondition {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl SplitCondition for MaxEventsCondition {
    fn should_split(&self, ctx: &mut SplitContext<'_>, _current: &Event) -> Option<SplitCause> {
        (ctx.event_count >= self.max).then_some(SplitCause::MaxEventsReached)
    }
}

/// Splits when `current` arrived `max` or later after the first event.
pub struct ElapsedTimeCondition {
    max: Duration,
}

impl ElapsedTimeCondition {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

impl SplitCondition for ElapsedTimeCondition {
    fn should_split(&self, ctx: &mut SplitContext<'_>, current: &Event) -> Option<SplitCause> {
        let elapsed = current
            .hit
            .server_received_time
            .signed_duration_since(ctx.first_event.hit.server_received_time)
            .to_std()
            .ok()?;
        (elapsed >= self.max).then_some(SplitCause::MaxTimeSinceFirstEventReached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use engine_core::Hit;

    fn with_value(field: &str, value: Value) -> Event {
        let mut event = Event::new(Hit::new("p1"));
        event.set_value(field, value);
        event
    }

    #[test]
    fn test_campaign_empty_counts() {
        let first = with_value("utm_campaign", Value::from("x"));
        let condition = ValueChangedCondition::utm_campaign();
        let mut ctx = SplitContext::new(&first);
        assert_eq!(condition.should_split(&mut ctx, &first), None);
        assert_eq!(
            condition.should_split(&mut ctx, &with_value("utm_campaign", Value::from(""))),
            Some(SplitCause::UtmCampaignChanged)
        );
    }

    #[test]
    fn test_campaign_null_is_no_observation() {
        let first = with_value("utm_campaign", Value::from("x"));
        let condition = ValueChangedCondition::utm_campaign();
        let mut ctx = SplitContext::new(&first);
        condition.should_split(&mut ctx, &first);
        let null = with_value("utm_campaign", Value::Null);
        assert_eq!(condition.should_split(&mut ctx, &null), None);
        assert_eq!(ctx.column_values.get("utm_campaign").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_user_id_appearing_does_not_split() {
        let first = with_value("user_id", Value::from(""));
        let condition = ValueChangedCondition::user_id();
        let mut ctx = SplitContext::new(&first);
        condition.should_split(&mut ctx, &first);
        assert_eq!(condition.should_split(&mut ctx, &with_value("user_id", Value::from("u1"))), None);
        assert_eq!(
            condition.should_split(&mut ctx, &with_value("user_id", Value::from("u2"))),
            Some(SplitCause::UserIdChanged)
        );
    }

    #[test]
    fn test_max_events() {
        let first = Event::new(Hit::new("p1"));
        let condition = MaxEventsCondition::new(2);
        let mut ctx = SplitContext::new(&first);
        assert_eq!(condition.should_split(&mut ctx, &first), None);
        ctx.event_count = 2;
        assert_eq!(
            condition.should_split(&mut ctx, &first),
            Some(SplitCause::MaxEventsReached)
        );
    }

    #[test]
    fn test_elapsed_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = Event::new(Hit::new("p1").at(t0));
        let condition = ElapsedTimeCondition::new(Duration::from_secs(60));
        let mut ctx = SplitContext::new(&first);

        let early = Event::new(Hit::new("p1").at(t0 + chrono::Duration::seconds(59)));
        let on_time = Event::new(Hit::new("p1").at(t0 + chrono::Duration::seconds(60)));
        let before = Event::new(Hit::new("p1").at(t0 - chrono::Duration::seconds(5)));
        assert_eq!(condition.should_split(&mut ctx, &early), None);
        assert_eq!(
            condition.should_split(&mut ctx, &on_time),
            Some(SplitCause::MaxTimeSinceFirstEventReached)
        );
        assert_eq!(condition.should_split(&mut ctx, &before), None);
    }
}
