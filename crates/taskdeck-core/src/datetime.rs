use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  NaiveDate,
  SubsecRound,
  Utc,
  Weekday
};
use chrono_tz::Tz;

/// Layout used for every persisted
/// timestamp. Matches what browsers
/// emit from `Date.toISOString()`.
pub const TIMESTAMP_FORMAT: &str =
  "%Y-%m-%dT%H:%M:%S%.3fZ";

pub const DUE_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Drops sub-millisecond precision so a
/// stamped value survives a round-trip
/// through [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn stamp(
  now: DateTime<Utc>
) -> DateTime<Utc> {
  now.trunc_subsecs(3)
}

pub fn parse_timestamp(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(
    raw.trim()
  )
  .map(|dt| dt.with_timezone(&Utc))
  .map_err(|err| {
    anyhow!(
      "invalid timestamp '{raw}': {err}"
    )
  })
}

/// Parses a due date expression
/// relative to `today`.
///
/// Accepts `YYYY-MM-DD`, `today`,
/// `tomorrow`, `yesterday`, offsets
/// like `+3d` / `+2w`, and weekday
/// names (next occurrence, never
/// today).
pub fn parse_due_date(
  expr: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let trimmed =
    expr.trim().to_ascii_lowercase();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "due date cannot be empty"
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      &trimmed,
      DUE_DATE_FORMAT
    )
  {
    return Ok(date);
  }

  match trimmed.as_str() {
    | "today" | "now" => {
      return Ok(today);
    }
    | "tomorrow" => {
      return add_days(today, 1);
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "due date out of range"
          )
        });
    }
    | _ => {}
  }

  if let Some(rest) =
    trimmed.strip_prefix('+')
  {
    return parse_offset(rest, today)
      .ok_or_else(|| {
        anyhow!(
          "invalid due date offset: \
           {expr}"
        )
      })?;
  }

  if let Some(weekday) =
    parse_weekday(&trimmed)
  {
    let mut ahead = (7
      + weekday.num_days_from_monday()
      - today
        .weekday()
        .num_days_from_monday())
      % 7;
    if ahead == 0 {
      ahead = 7;
    }
    return add_days(
      today,
      u64::from(ahead)
    );
  }

  Err(anyhow!(
    "unrecognized due date: {expr}"
  ))
}

fn parse_offset(
  rest: &str,
  today: NaiveDate
) -> Option<anyhow::Result<NaiveDate>> {
  let unit = rest.chars().last()?;
  let digits = &rest[..rest.len()
    - unit.len_utf8()];
  let count = digits.parse::<u64>().ok()?;
  let days = match unit {
    | 'd' => count,
    | 'w' => count.checked_mul(7)?,
    | _ => return None
  };
  Some(add_days(today, days))
}

fn add_days(
  date: NaiveDate,
  days: u64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_days(Days::new(days))
    .ok_or_else(|| {
      anyhow!("due date out of range")
    })
}

fn parse_weekday(
  s: &str
) -> Option<Weekday> {
  match s {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Resolves the configured display zone.
/// `None` means "use the system local
/// zone".
pub fn parse_timezone(
  raw: Option<&str>
) -> Option<Tz> {
  let trimmed = raw?.trim();
  if trimmed.is_empty()
    || trimmed
      .eq_ignore_ascii_case("local")
  {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id; using local time"
      );
      None
    }
  }
}

/// Calendar date of `now` in the display
/// zone; the anchor for relative due
/// dates.
#[must_use]
pub fn display_today(
  now: DateTime<Utc>,
  tz: Option<&Tz>
) -> NaiveDate {
  match tz {
    | Some(tz) => {
      now.with_timezone(tz).date_naive()
    }
    | None => {
      now
        .with_timezone(&Local)
        .date_naive()
    }
  }
}

#[must_use]
pub fn format_display_date(
  dt: DateTime<Utc>,
  tz: Option<&Tz>
) -> String {
  match tz {
    | Some(tz) => {
      dt.with_timezone(tz)
        .format(DUE_DATE_FORMAT)
        .to_string()
    }
    | None => {
      dt.with_timezone(&Local)
        .format(DUE_DATE_FORMAT)
        .to_string()
    }
  }
}

pub mod iso_timestamp_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt
        .format(super::TIMESTAMP_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_timestamp(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if !raw.trim().is_empty() =>
        {
          super::super::parse_timestamp(
            &raw
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
        | _ => Ok(None)
      }
    }
  }
}

/// Due dates are stored the way a date
/// input reports them: `YYYY-MM-DD`, or
/// an empty string when unset.
pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => {
        serializer.serialize_str(
          &value
            .format(
              super::DUE_DATE_FORMAT
            )
            .to_string()
        )
      }
      | None => {
        serializer.serialize_str("")
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    let Some(raw) = opt else {
      return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Ok(None);
    }

    if let Ok(date) =
      NaiveDate::parse_from_str(
        trimmed,
        super::DUE_DATE_FORMAT
      )
    {
      return Ok(Some(date));
    }

    super::parse_timestamp(trimmed)
      .map(|dt| Some(dt.date_naive()))
      .map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    parse_due_date,
    parse_timestamp,
    stamp
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  #[test]
  fn parses_iso_due_date() {
    let parsed = parse_due_date(
      "2026-03-01",
      today()
    )
    .expect("parse iso date");
    assert_eq!(
      parsed,
      NaiveDate::from_ymd_opt(
        2026, 3, 1
      )
      .expect("valid date")
    );
  }

  #[test]
  fn parses_relative_due_dates() {
    assert_eq!(
      parse_due_date("tomorrow", today())
        .expect("tomorrow")
        .to_string(),
      "2026-02-18"
    );
    assert_eq!(
      parse_due_date("+2w", today())
        .expect("offset")
        .to_string(),
      "2026-03-03"
    );
    // 2026-02-17 is a Tuesday.
    assert_eq!(
      parse_due_date("tue", today())
        .expect("weekday")
        .to_string(),
      "2026-02-24"
    );
    assert_eq!(
      parse_due_date("friday", today())
        .expect("weekday")
        .to_string(),
      "2026-02-20"
    );
  }

  #[test]
  fn rejects_garbage_due_date() {
    assert!(
      parse_due_date("someday", today())
        .is_err()
    );
    assert!(
      parse_due_date("+3x", today())
        .is_err()
    );
    assert!(
      parse_due_date("  ", today())
        .is_err()
    );
  }

  #[test]
  fn reads_browser_timestamps() {
    let parsed = parse_timestamp(
      "2024-05-06T07:08:09.123Z"
    )
    .expect("parse timestamp");
    let expected = Utc
      .with_ymd_and_hms(
        2024, 5, 6, 7, 8, 9
      )
      .single()
      .expect("valid time")
      + chrono::Duration::milliseconds(
        123
      );
    assert_eq!(parsed, expected);
  }

  #[test]
  fn stamp_keeps_millis_only() {
    let raw = Utc
      .with_ymd_and_hms(
        2024, 5, 6, 7, 8, 9
      )
      .single()
      .expect("valid time")
      + chrono::Duration::nanoseconds(
        123_456_789
      );
    let stamped = stamp(raw);
    assert_eq!(
      stamped
        .timestamp_subsec_nanos(),
      123_000_000
    );
  }
}
