//! # Time Layout Resolver
//!
//! Parses textual timestamps by trying an ordered list of `chrono` format
//! strings. The first layout that accepts the input is swapped into position 0,
//! so under skewed traffic the common format is tried first on later calls.
//! This is front-of-list promotion, not an LRU: a single hit is enough to move
//! a layout to the front.
//!
//! Layouts without an offset are read as UTC, date-only layouts resolve to
//! midnight and time-only layouts land on `0000-01-01`. A layout holding
//! both a date and a time never falls back to either half, so an impossible
//! calendar date is rejected. A leading `%a` weekday has to be a weekday name
//! but is not checked against the date.
//!
//! ## Default order
//!
//! [`DATE_TIME`], [`RFC3339`], [`RFC3339_NANO`], [`RFC1123`], [`RFC1123Z`],
//! [`ANSIC`], [`DATE_ONLY`], [`TIME_ONLY`]
//!
//! ## Concurrency
//!
//! Parsing holds the read lock. Promotion and [`TimeLayouts::set_layouts`]
//! take the write lock, so readers never see a partially replaced list.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::trace;

/// Timestamp type bound by the converter.
pub type Timestamp = DateTime<Utc>;

/// `2006-01-02 15:04:05`
pub const DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";
/// `2006-01-02T15:04:05Z07:00`
pub const RFC3339: &str = "%+";
/// `2006-01-02T15:04:05.999999999Z07:00`
pub const RFC3339_NANO: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
/// `Mon, 02 Jan 2006 15:04:05 MST`
pub const RFC1123: &str = "%a, %d %b %Y %H:%M:%S %Z";
/// `Mon, 02 Jan 2006 15:04:05 -0700`
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";
/// `Mon Jan _2 15:04:05 2006`
pub const ANSIC: &str = "%a %b %e %H:%M:%S %Y";
/// `2006-01-02`
pub const DATE_ONLY: &str = "%Y-%m-%d";
/// `15:04:05`
pub const TIME_ONLY: &str = "%H:%M:%S";

/// Layouts in their initial trial order.
pub const DEFAULT_LAYOUTS: [&str; 8] = [
    DATE_TIME,
    RFC3339,
    RFC3339_NANO,
    RFC1123,
    RFC1123Z,
    ANSIC,
    DATE_ONLY,
    TIME_ONLY,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("no time layouts configured for parsing")]
    NoLayoutsConfigured,
    #[error("unable to parse time with provided layouts")]
    NoMatchingLayout,
}

/// Ordered, self-tuning list of timestamp layouts.
#[derive(Debug)]
pub struct TimeLayouts {
    layouts: RwLock<Vec<String>>,
}

impl Default for TimeLayouts {
    fn default() -> Self {
        Self::new(DEFAULT_LAYOUTS)
    }
}

impl TimeLayouts {
    pub fn new<I, S>(layouts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            layouts: RwLock::new(layouts.into_iter().map(Into::into).collect()),
        }
    }

    /// Replace the whole list atomically.
    pub fn set_layouts<I, S>(&self, layouts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replacement: Vec<String> = layouts.into_iter().map(Into::into).collect();
        *self.layouts.write() = replacement;
    }

    /// Snapshot of the current order.
    #[must_use]
    pub fn layouts(&self) -> Vec<String> {
        self.layouts.read().clone()
    }

    /// Parse `value` with the first layout that accepts it.
    pub fn parse(&self, value: &str) -> Result<Timestamp, TimeError> {
        let (parsed, index, layout) = {
            let layouts = self.layouts.read();
            if layouts.is_empty() {
                return Err(TimeError::NoLayoutsConfigured);
            }

            let hit = layouts
                .iter()
                .enumerate()
                .find_map(|(index, layout)| parse_with_layout(value, layout).map(|t| (t, index)));

            match hit {
                Some((parsed, 0)) => return Ok(parsed),
                Some((parsed, index)) => (parsed, index, layouts[index].clone()),
                None => return Err(TimeError::NoMatchingLayout),
            }
        };

        self.promote(&layout, index);
        Ok(parsed)
    }

    fn promote(&self, layout: &str, matched_at: usize) {
        let mut layouts = self.layouts.write();
        // The list may have been replaced or reordered between the two locks.
        if let Some(position) = layouts.iter().position(|l| l == layout) {
            if position != 0 {
                layouts.swap(0, position);
                trace!(layout, matched_at, "Promoted time layout to front");
            }
        }
    }
}

/// Conversion characters that carry a calendar date.
const DATE_SPECIFIERS: &str = "YCyGgmbBhdejUWVFDx+cs";
/// Conversion characters that carry a time of day.
const TIME_SPECIFIERS: &str = "HMSIklpPfTRXr+cs";

/// Conversion characters of `layout`, with padding and width flags skipped.
fn specifiers(layout: &str) -> impl Iterator<Item = char> + '_ {
    let mut chars = layout.chars();
    std::iter::from_fn(move || {
        while let Some(c) = chars.next() {
            if c != '%' {
                continue;
            }
            for spec in chars.by_ref() {
                if !matches!(spec, '-' | '_' | '0' | '#' | ':' | '.' | '3' | '6' | '9') {
                    return Some(spec);
                }
            }
        }
        None
    })
}

fn parse_with_layout(value: &str, layout: &str) -> Option<Timestamp> {
    // The weekday name must be spelled right but is not checked against the date.
    for separator in [", ", " "] {
        if let Some(rest_layout) = layout
            .strip_prefix("%a")
            .and_then(|rest| rest.strip_prefix(separator))
        {
            let (weekday, rest) = value.split_once(separator)?;
            weekday.parse::<Weekday>().ok()?;
            return parse_with_layout(rest, rest_layout);
        }
    }
    // chrono skips any token for `%Z`. Only alphabetic zone names are taken
    // here, read as UTC; numeric offsets are left to `%z` layouts.
    if let Some(prefix) = layout.strip_suffix(" %Z") {
        let (head, zone) = value.rsplit_once(' ')?;
        if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        return parse_with_layout(head, prefix);
    }
    if let Ok(with_offset) = DateTime::parse_from_str(value, layout) {
        return Some(with_offset.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
        return Some(Utc.from_utc_datetime(&naive));
    }

    let (has_date, has_time) = specifiers(layout).fold((false, false), |(date, time), spec| {
        (
            date || DATE_SPECIFIERS.contains(spec),
            time || TIME_SPECIFIERS.contains(spec),
        )
    });
    if has_date && !has_time {
        let date = NaiveDate::parse_from_str(value, layout).ok()?;
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    if has_time && !has_date {
        let time = NaiveTime::parse_from_str(value, layout).ok()?;
        return NaiveDate::from_ymd_opt(0, 1, 1)
            .map(|date| Utc.from_utc_datetime(&date.and_time(time)));
    }
    None
}

static GLOBAL_LAYOUTS: Lazy<TimeLayouts> = Lazy::new(TimeLayouts::default);

/// Process-wide layouts used by the type converter.
#[must_use]
pub fn global_layouts() -> &'static TimeLayouts {
    &GLOBAL_LAYOUTS
}

/// Parse with the process-wide layouts.
pub fn parse_time(value: &str) -> Result<Timestamp, TimeError> {
    GLOBAL_LAYOUTS.parse(value)
}

/// Replace the process-wide layouts.
pub fn set_time_layouts<I, S>(layouts: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    GLOBAL_LAYOUTS.set_layouts(layouts);
}
