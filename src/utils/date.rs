//! UTC datetime utilities without timezone dependencies.
//!
//! Provides a lightweight `DateTimeUtc` struct used for HTTP caching headers
//! (`Last-Modified`, `X-Created-Date`) and the build stamp embedded in the
//! generated entrypoint.
//!
//! # Examples
//!
//! ```ignore
//! let dt = DateTimeUtc::from_system_time(SystemTime::now());
//! assert_eq!(dt.to_rfc2822(), "Sat, 15 Jun 2024 14:30:45 GMT");
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// UTC datetime without timezone complexity
///
/// Field order makes the derived `Ord` chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTimeUtc {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTimeUtc {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Convert a `SystemTime` to UTC calendar time (second precision).
    ///
    /// Times before the Unix epoch clamp to the epoch.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;

        // Civil-from-days (proleptic Gregorian), era-based.
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = (yoe + era * 400 + i64::from(month <= 2)) as u16;

        Self::new(
            year,
            month,
            day,
            (rem / 3600) as u8,
            ((rem / 60) % 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Format as RFC 3339 (ISO 8601).
    ///
    /// Returns: `YYYY-MM-DDTHH:MM:SSZ`
    pub fn to_rfc3339(self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    /// Format as an HTTP date (`Sat, 15 Jun 2024 14:30:45 GMT`).
    pub fn to_rfc2822(self) -> String {
        const WEEKDAYS: [&str; 7] = ["Sat", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri"];

        let weekday = self.weekday_index();

        format!(
            "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
            WEEKDAYS[weekday],
            self.day,
            MONTHS[(self.month - 1) as usize],
            self.year,
            self.hour,
            self.minute,
            self.second
        )
    }

    /// Parse an HTTP date as produced by [`Self::to_rfc2822`].
    ///
    /// The weekday is not checked. Other formats yield `None`.
    pub fn parse_rfc2822(s: &str) -> Option<Self> {
        let (_, rest) = s.trim().split_once(", ")?;
        let mut parts = rest.split_whitespace();

        let day = parts.next()?.parse().ok()?;
        let month_name = parts.next()?;
        let month = MONTHS.iter().position(|m| *m == month_name)?;
        let year = parts.next()?.parse().ok()?;

        let mut clock = parts.next()?.split(':').map(|p| p.parse::<u8>().ok());
        let hour = clock.next()??;
        let minute = clock.next()??;
        let second = clock.next()??;

        if parts.next()? != "GMT" || parts.next().is_some() {
            return None;
        }

        #[allow(clippy::cast_possible_truncation)]
        Some(Self::new(year, month as u8 + 1, day, hour, minute, second))
    }

    /// Human readable stamp: `2024-06-15 14:30:45 UTC`
    pub fn to_display(self) -> String {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    // Zeller's congruence, 0 = Saturday
    #[allow(clippy::cast_sign_loss)]
    fn weekday_index(self) -> usize {
        let (y, m) = if self.month < 3 {
            (i32::from(self.year) - 1, i32::from(self.month) + 12)
        } else {
            (i32::from(self.year), i32::from(self.month))
        };
        let d = i32::from(self.day);
        ((d + (13 * (m + 1)) / 5 + y + y / 4 - y / 100 + y / 400) % 7) as usize
    }
}
