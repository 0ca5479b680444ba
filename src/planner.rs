//! Backward day-window planning.
//!
//! A channel's history is walked from its newest message back to its
//! creation, one calendar day at a time. Each window is derived from the one
//! before it, so planning is an iterator rather than a precomputed list;
//! calling [`plan`] again with the same channel yields the same windows.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};

use crate::resolver::Channel;

/// Slack's `latest` bound is exclusive; pad it so the newest message is kept.
const LATEST_EPSILON: f64 = 1.0;

/// History bounds for one calendar day, in epoch seconds.
///
/// `oldest` is exclusive and `latest` inclusive from the archive's point of
/// view, matching how consecutive windows share a boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub day: NaiveDate,
    pub oldest: f64,
    pub latest: f64,
}

#[derive(Debug, Clone)]
pub struct DayWindows<Z: TimeZone> {
    zone: Z,
    created_ts: f64,
    next: Option<(NaiveDate, f64)>,
}

/// Plan the backward sequence of day windows for `channel`, with day
/// boundaries computed in `zone`.
pub fn plan<Z: TimeZone>(channel: &Channel, zone: Z) -> DayWindows<Z> {
    let latest = channel.latest_ts + LATEST_EPSILON;
    let next = day_of(&zone, latest).map(|day| (day, latest));

    DayWindows {
        zone,
        created_ts: channel.created_ts as f64,
        next,
    }
}

impl<Z: TimeZone> Iterator for DayWindows<Z> {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        let (day, latest) = self.next.take()?;
        if latest <= self.created_ts {
            return None;
        }

        let start = day_start(&self.zone, day)? as f64;
        if start <= self.created_ts {
            return Some(TimeWindow {
                day,
                oldest: self.created_ts,
                latest,
            });
        }

        self.next = day.pred_opt().map(|previous| (previous, start));
        Some(TimeWindow {
            day,
            oldest: start,
            latest,
        })
    }
}

/// Calendar day containing the epoch instant `secs` in `zone`.
pub fn day_of<Z: TimeZone>(zone: &Z, secs: f64) -> Option<NaiveDate> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .map(|utc| utc.with_timezone(zone).date_naive())
}

/// Epoch seconds of the first instant of `day` in `zone`.
///
/// Zones that skip midnight on a DST change start the day at the first
/// wall-clock hour that exists.
pub fn day_start<Z: TimeZone>(zone: &Z, day: NaiveDate) -> Option<i64> {
    (0..3)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| zone.from_local_datetime(&day.and_time(time)).earliest())
        .map(|start| start.timestamp())
}
