use chrono::{Local, NaiveDate, TimeZone};

use crate::types::Message;

/// Messages of one calendar day, in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    /// Calendar date in the grouping time zone.
    pub date: NaiveDate,
    /// Messages of that day, preserving input order.
    pub messages: Vec<Message>,
}

/// Partition an ordered message sequence into calendar-day groups using the
/// viewer's local time zone.
pub fn group_by_day(messages: &[Message]) -> Vec<DayGroup> {
    group_by_day_in(messages, &Local)
}

/// Time-zone-generic grouping core.
///
/// Groups are keyed by calendar date and ordered by first appearance;
/// relative message order is preserved within and across groups.
pub fn group_by_day_in<Tz: TimeZone>(messages: &[Message], tz: &Tz) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for message in messages {
        let date = date_in(message.record.created_at, tz);
        match groups.iter_mut().find(|group| group.date == date) {
            Some(group) => group.messages.push(message.clone()),
            None => groups.push(DayGroup {
                date,
                messages: vec![message.clone()],
            }),
        }
    }
    groups
}

fn date_in<Tz: TimeZone>(created_at_ms: i64, tz: &Tz) -> NaiveDate {
    tz.timestamp_millis_opt(created_at_ms)
        .earliest()
        .map(|datetime| datetime.date_naive())
        .unwrap_or_default()
}
