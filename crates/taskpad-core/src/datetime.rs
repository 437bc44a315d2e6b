use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  SubsecRound,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const DEFAULT_TIMEZONE: &str =
  "UTC";

/// Slot timestamps carry millisecond
/// precision, so in-memory values are
/// clamped to match before they are
/// stored.
#[must_use]
pub fn truncate_to_millis(
  dt: DateTime<Utc>
) -> DateTime<Utc> {
  dt.trunc_subsecs(3)
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_timestamp(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a due date expression relative
/// to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return shift_days(today, 1);
    }
    | "yesterday" => {
      return shift_days(today, -1);
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => {
        num.saturating_mul(7)
      }
      | _ => num
    };
    let signed = match caps
      .name("sign")
      .map(|m| m.as_str())
    {
      | Some("-") => -days,
      | _ => days
    };
    return shift_days(today, signed);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.date_naive());
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/+Nw, YYYY-MM-DD, RFC3339"
  })
}

fn shift_days(
  from: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  Duration::try_days(days)
    .and_then(|offset| {
      from.checked_add_signed(offset)
    })
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {from} \
         {days:+} day(s)"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
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

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

/// Serde adapter for the slot's
/// `YYYY-MM-DDTHH:MM:SS.mmmZ` timestamps.
/// Any RFC 3339 value is accepted on
/// read.
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

  const FORMAT: &str =
    "%Y-%m-%dT%H:%M:%S%.3fZ";

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.format(FORMAT).to_string()
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
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
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
        | Some(raw) => {
          DateTime::parse_from_rfc3339(
            &raw
          )
          .map(|dt| {
            Some(dt.with_timezone(&Utc))
          })
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
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
    truncate_to_millis
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 17)
      .expect("valid date")
  }

  #[test]
  fn parses_named_days() {
    assert_eq!(
      parse_due_date("Tomorrow", today())
        .expect("parse tomorrow"),
      NaiveDate::from_ymd_opt(2026, 2, 18)
        .expect("valid date")
    );
    assert_eq!(
      parse_due_date("yesterday", today())
        .expect("parse yesterday"),
      NaiveDate::from_ymd_opt(2026, 2, 16)
        .expect("valid date")
    );
  }

  #[test]
  fn parses_weekday_name() {
    // 2026-02-17 is a Tuesday; the same
    // weekday rolls a full week forward.
    assert_eq!(
      parse_due_date("wednesday", today())
        .expect("parse weekday"),
      NaiveDate::from_ymd_opt(2026, 2, 18)
        .expect("valid date")
    );
    assert_eq!(
      parse_due_date("tue", today())
        .expect("parse weekday"),
      NaiveDate::from_ymd_opt(2026, 2, 24)
        .expect("valid date")
    );
  }

  #[test]
  fn parses_relative_offsets() {
    assert_eq!(
      parse_due_date("+3d", today())
        .expect("parse +3d"),
      NaiveDate::from_ymd_opt(2026, 2, 20)
        .expect("valid date")
    );
    assert_eq!(
      parse_due_date("+2w", today())
        .expect("parse +2w"),
      NaiveDate::from_ymd_opt(2026, 3, 3)
        .expect("valid date")
    );
    assert!(
      parse_due_date(
        "+200000000000d",
        today()
      )
      .is_err()
    );
    assert!(
      parse_due_date(
        "+20000000000w",
        today()
      )
      .is_err()
    );
  }

  #[test]
  fn parses_calendar_date_and_rejects_noise()
  {
    assert_eq!(
      parse_due_date("2026-12-01", today())
        .expect("parse iso date"),
      NaiveDate::from_ymd_opt(2026, 12, 1)
        .expect("valid date")
    );
    assert!(
      parse_due_date("someday", today())
        .is_err()
    );
  }

  #[test]
  fn truncates_sub_millisecond_precision()
  {
    let dt = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
      + chrono::Duration::nanoseconds(
        1_234_567
      );
    let truncated =
      truncate_to_millis(dt);
    assert_eq!(
      truncated
        .format("%S%.9f")
        .to_string(),
      "00.001000000"
    );
  }
}
