use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

pub const SECONDS_PER_DAY: f64 = 86400.0;

fn mjd_epoch() -> NaiveDate {
    // 1858-11-17 is always a valid calendar date.
    NaiveDate::from_ymd_opt(1858, 11, 17).unwrap_or_default()
}

/// Modified Julian Date of a calendar date plus seconds since midnight UT.
pub fn mjd_from_date_ut(date: NaiveDate, ut_seconds: f64) -> f64 {
    let days = date.signed_duration_since(mjd_epoch()).num_days() as f64;
    days + ut_seconds / SECONDS_PER_DAY
}

pub fn mjd_cal(time: DateTime<Utc>) -> f64 {
    let seconds = time.hour() as f64 * 3600.0
        + time.minute() as f64 * 60.0
        + time.second() as f64
        + time.nanosecond() as f64 * 1e-9;
    mjd_from_date_ut(time.date_naive(), seconds)
}

pub fn date_from_mjd(mjd: f64) -> NaiveDate {
    mjd_epoch() + Duration::days(mjd.floor() as i64)
}

/// Seconds since midnight for the day the MJD falls on.
pub fn ut_seconds_from_mjd(mjd: f64) -> f64 {
    (mjd - mjd.floor()) * SECONDS_PER_DAY
}

pub fn datetime_from_mjd(mjd: f64) -> Option<DateTime<Utc>> {
    let date = date_from_mjd(mjd);
    let millis = (ut_seconds_from_mjd(mjd) * 1000.0).round() as i64;
    let naive: NaiveDateTime = date.and_hms_opt(0, 0, 0)? + Duration::milliseconds(millis);
    Some(Utc.from_utc_datetime(&naive))
}

/// Accepts `YYYY-MM-DD` and the correlator's `YYYY/MM/DD`.
pub fn parse_obs_date(text: &str) -> Option<NaiveDate> {
    let normalised = text.trim().replace('/', "-");
    NaiveDate::parse_from_str(&normalised, "%Y-%m-%d").ok()
}

/// Parses `HH:MM` or `HH:MM:SS` into seconds after midnight.
pub fn parse_time_of_day(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: f64 = match parts.get(2) {
        Some(s) => s.parse().ok()?,
        None => 0.0,
    };
    if hour > 23 || minute > 59 || !(0.0..60.0).contains(&second) {
        return None;
    }
    Some(hour as f64 * 3600.0 + minute as f64 * 60.0 + second)
}

/// `HH:MM:SS` for a number of seconds after midnight.
pub fn format_ut(ut_seconds: f64) -> String {
    let total = ut_seconds.max(0.0).round() as i64 % 86400;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

pub fn format_mjd(mjd: f64) -> String {
    format!(
        "{} {}",
        date_from_mjd(mjd).format("%Y-%m-%d"),
        format_ut(ut_seconds_from_mjd(mjd))
    )
}

/// Timestamp used for automatically named dump files.
pub fn dump_timestamp(now: DateTime<Utc>) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Case-insensitive minimum match: `token` must be a prefix of `keyword`
/// at least `min_chars` long.
pub fn minmatch(keyword: &str, token: &str, min_chars: usize) -> bool {
    let token_len = token.chars().count();
    if token_len < min_chars || token_len > keyword.chars().count() {
        return false;
    }
    keyword
        .chars()
        .zip(token.chars())
        .all(|(k, t)| k.eq_ignore_ascii_case(&t))
}

pub fn unwrap_phase(phases: &mut [f32]) {
    if phases.len() < 2 {
        return;
    }
    let mut offset = 0.0;
    let mut original_prev = phases[0];

    for i in 1..phases.len() {
        let original_current = phases[i];
        let diff = original_current - original_prev;
        if diff > 180.0 {
            offset -= 360.0;
        } else if diff < -180.0 {
            offset += 360.0;
        }
        phases[i] += offset;
        original_prev = original_current;
    }
}

/// Wraps an angle in degrees into (-180, 180].
pub fn wrap_degrees(mut value: f32) -> f32 {
    while value > 180.0 {
        value -= 360.0;
    }
    while value <= -180.0 {
        value += 360.0;
    }
    value
}

/// Min and max of the finite values, or `None` when there are none.
pub fn finite_range<I: IntoIterator<Item = f32>>(values: I) -> Option<(f32, f32)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}
