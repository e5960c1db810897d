//! Frame timecodes and caption timestamps.
//!
//! Event lists time each cue as `HH:MM:SS:FF`, where `FF` counts frames
//! within the second. Caption files want `HH:MM:SS,mmm`. The frame part is
//! mapped to milliseconds as `frames * (1000 / rate)` with integer division
//! on the ratio, so `12` frames at 25 fps is `480` ms and the same input
//! always produces the same timestamp.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Sub2SrtError;

/// A parsed `HH:MM:SS:FF` timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timecode {
    /// Hours.
    pub hours: u64,
    /// Minutes.
    pub minutes: u64,
    /// Seconds.
    pub seconds: u64,
    /// Frames within the second.
    pub frames: u64,
}

impl Timecode {
    /// The timecode as a duration at `frame_rate` frames per second.
    ///
    /// Frame counts at or above the rate carry into the seconds field
    /// rather than producing a four-digit millisecond part.
    ///
    /// # Errors
    ///
    /// [`Sub2SrtError::InvalidTimecode`] if `frame_rate` is zero or the
    /// timecode does not fit in a [`Duration`].
    pub fn to_duration(&self, frame_rate: u32) -> Result<Duration, Sub2SrtError> {
        if frame_rate == 0 {
            return Err(Sub2SrtError::InvalidTimecode {
                value: self.to_string(),
                reason: "frame rate must be positive".to_string(),
            });
        }
        let frame_millis = 1000 / u64::from(frame_rate);
        self.hours
            .checked_mul(3600)
            .and_then(|secs| secs.checked_add(self.minutes.checked_mul(60)?))
            .and_then(|secs| secs.checked_add(self.seconds))
            .zip(self.frames.checked_mul(frame_millis))
            .and_then(|(secs, millis)| {
                Duration::from_secs(secs).checked_add(Duration::from_millis(millis))
            })
            .ok_or_else(|| Sub2SrtError::InvalidTimecode {
                value: self.to_string(),
                reason: "timecode is out of range".to_string(),
            })
    }
}

impl FromStr for Timecode {
    type Err = Sub2SrtError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Sub2SrtError::InvalidTimecode {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let fields = value
            .trim()
            .split(':')
            .map(|field| field.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid("fields must be unsigned integers"))?;

        match fields.as_slice() {
            &[hours, minutes, seconds, frames] => Ok(Self {
                hours,
                minutes,
                seconds,
                frames,
            }),
            _ => Err(invalid("expected HH:MM:SS:FF")),
        }
    }
}

impl Display for Timecode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Parse an event-list frame rate.
///
/// Fractional rates such as `23.976` are truncated toward zero.
///
/// # Errors
///
/// [`Sub2SrtError::InvalidTimecode`] if the value is not a number or is
/// below one frame per second.
pub fn parse_frame_rate(value: &str) -> Result<u32, Sub2SrtError> {
    let invalid = |reason: &str| Sub2SrtError::InvalidTimecode {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    let rate = match trimmed.parse::<u32>() {
        Ok(rate) => rate,
        Err(_) => {
            let rate = trimmed
                .parse::<f64>()
                .map_err(|_| invalid("frame rate is not a number"))?;
            if !rate.is_finite() || rate < 0.0 || rate > f64::from(u32::MAX) {
                return Err(invalid("frame rate out of range"));
            }
            rate.trunc() as u32
        }
    };

    if rate == 0 {
        return Err(invalid("frame rate must be positive"));
    }
    Ok(rate)
}

/// Format a duration as a caption timestamp (`HH:MM:SS,mmm`).
pub fn format_caption_timestamp(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Convert an `HH:MM:SS:FF` timecode to a caption timestamp.
///
/// # Errors
///
/// [`Sub2SrtError::InvalidTimecode`] for a malformed timecode or a zero
/// frame rate.
///
/// # Example
///
/// ```
/// use sub2srt::convert_timecode;
///
/// assert_eq!(convert_timecode("00:01:02:12", 25)?, "00:01:02,480");
/// assert_eq!(convert_timecode("01:00:00:05", 24)?, "01:00:00,205");
/// # Ok::<(), sub2srt::Sub2SrtError>(())
/// ```
pub fn convert_timecode(timecode: &str, frame_rate: u32) -> Result<String, Sub2SrtError> {
    let duration = timecode.parse::<Timecode>()?.to_duration(frame_rate)?;
    Ok(format_caption_timestamp(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_use_floored_frame_length() {
        // 1000 / 24 floors to 41, so 23 frames is 943 ms rather than 958.
        assert_eq!(convert_timecode("00:00:00:23", 24).unwrap(), "00:00:00,943");
        assert_eq!(convert_timecode("00:00:00:12", 25).unwrap(), "00:00:00,480");
        assert_eq!(convert_timecode("00:00:00:29", 30).unwrap(), "00:00:00,957");
    }

    #[test]
    fn frames_below_rate_follow_the_formula() {
        for rate in [1_u32, 7, 24, 25, 30, 50, 60, 120] {
            for frames in 0..rate {
                let expected = u64::from(frames) * (1000 / u64::from(rate));
                let stamp = convert_timecode(&format!("00:00:00:{frames}"), rate).unwrap();
                assert_eq!(stamp, format!("00:00:00,{expected:03}"));
            }
        }
    }

    #[test]
    fn overflowing_frames_carry_into_seconds() {
        assert_eq!(convert_timecode("00:00:59:30", 25).unwrap(), "00:01:00,200");
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            convert_timecode("00:00:01:00", 0),
            Err(Sub2SrtError::InvalidTimecode { .. })
        ));
    }

    #[test]
    fn out_of_range_timecode_is_rejected() {
        let huge = format!("{}:00:00:00", u64::MAX / 1000);
        assert!(matches!(
            convert_timecode(&huge, 25),
            Err(Sub2SrtError::InvalidTimecode { .. })
        ));
        let frames = format!("00:00:00:{}", u64::MAX);
        assert!(matches!(
            convert_timecode(&frames, 25),
            Err(Sub2SrtError::InvalidTimecode { .. })
        ));
    }

    #[test]
    fn malformed_timecodes_are_rejected() {
        for value in ["", "00:00:01", "00:00:01:02:03", "aa:00:00:00", "00:-1:00:00"] {
            assert!(value.parse::<Timecode>().is_err(), "{value:?} parsed");
        }
    }

    #[test]
    fn frame_rate_parsing() {
        assert_eq!(parse_frame_rate("25").unwrap(), 25);
        assert_eq!(parse_frame_rate(" 23.976 ").unwrap(), 23);
        assert_eq!(parse_frame_rate("29.97").unwrap(), 29);
        assert!(parse_frame_rate("0").is_err());
        assert!(parse_frame_rate("0.5").is_err());
        assert!(parse_frame_rate("fast").is_err());
        assert!(parse_frame_rate("-25").is_err());
    }

    #[test]
    fn timecode_display_round_trips() {
        let timecode: Timecode = "01:02:03:04".parse().unwrap();
        assert_eq!(timecode.to_string(), "01:02:03:04");
    }
}
