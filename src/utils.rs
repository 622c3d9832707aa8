use crate::network::Timestamp;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid time '{0}', expected HH:MM:SS.")]
pub struct ParseTimeError(pub String);

fn parse_time_impl(h: &str, m: &str, s: &str) -> Result<Timestamp, std::num::ParseIntError> {
    let hours: Timestamp = h.parse()?;
    let minutes: Timestamp = m.parse()?;
    let seconds: Timestamp = s.parse()?;
    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Parses `H:MM` or `H:MM:SS` into seconds since midnight. Hours may exceed 23.
pub fn parse_time(s: &str) -> Result<Timestamp, ParseTimeError> {
    let invalid = || ParseTimeError(s.to_owned());
    let parts: Vec<&str> = s.split(':').collect();
    let (hour, min, sec) = match parts.as_slice() {
        [h, m] => (*h, *m, "00"),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };
    if hour.is_empty() || min.len() != 2 || sec.len() != 2 {
        return Err(invalid());
    }
    parse_time_impl(hour, min, sec).map_err(|_| invalid())
}

pub fn get_time_str(time: Timestamp) -> String {
    let sign = if time < 0 { "-" } else { "" };
    let time = time.abs();
    let hours = time / 3600;
    let minutes = (time % 3600) / 60;
    let seconds = time % 60;
    if seconds == 0 {
        format!("{sign}{hours}:{minutes:02}")
    } else {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    }
}

/// Formats a duration like `1h2m3s`, dropping zero components.
pub fn get_duration_str(duration: Timestamp) -> String {
    if duration == 0 {
        return "0s".to_owned();
    }
    let sign = if duration < 0 { "-" } else { "" };
    let duration = duration.abs();
    let mut out = String::from(sign);
    let (h, m, s) = (duration / 3600, (duration % 3600) / 60, duration % 60);
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    out
}
