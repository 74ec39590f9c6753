//! Line-oriented JSON framing used by beacon links.
//!
//! Each line carries one detection. Firmware generations disagree on field
//! names, so the common spellings are accepted:
//!
//! ```json
//! {"batonMAC": "AA:BB:CC:00:11:22", "stationMAC": "DE:AD:BE:EF:00:01", "time": 1712345678901}
//! {"batonAddress": "aa:bb:cc:00:11:22", "beaconAddress": "de:ad:be:ef:00:01", "time": "2024-04-05T19:34:38.901Z"}
//! ```
//!
//! `time` is either epoch milliseconds or an RFC 3339 string.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::domain::RawDetection;
use crate::error::RelayError;

/// Longest accepted line, in bytes.
pub const MAX_LINE_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
struct WireDetection {
    #[serde(alias = "batonAddress", alias = "batonMAC", alias = "battonMAC")]
    baton_address: String,
    #[serde(
        alias = "stationAddress",
        alias = "beaconAddress",
        alias = "stationMAC",
        alias = "beaconMAC"
    )]
    beacon_address: String,
    time: WireTime,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl WireTime {
    fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(ms),
            Self::Text(dt) => Some(dt),
        }
    }
}

/// Parses one line from a beacon link.
///
/// Returns `Ok(None)` for blank lines (keep-alives).
///
/// # Errors
///
/// Returns [`RelayError::MalformedMessage`] if the line is too long, is not
/// valid JSON, lacks a field, has an empty address or an out-of-range time.
pub fn parse_line(line: &str) -> Result<Option<RawDetection>, RelayError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(RelayError::MalformedMessage(format!(
            "line of {} bytes exceeds {MAX_LINE_BYTES}",
            line.len()
        )));
    }
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let wire: WireDetection =
        serde_json::from_str(line).map_err(|e| RelayError::MalformedMessage(e.to_string()))?;

    if wire.baton_address.trim().is_empty() || wire.beacon_address.trim().is_empty() {
        return Err(RelayError::MalformedMessage("empty hardware address".to_string()));
    }
    let time = wire
        .time
        .into_datetime()
        .ok_or_else(|| RelayError::MalformedMessage("time out of range".to_string()))?;

    Ok(Some(RawDetection {
        baton_address: wire.baton_address,
        beacon_address: wire.beacon_address,
        time,
    }))
}

/// One newline-terminated frame read from a link.
#[derive(Debug)]
pub enum Frame {
    /// A complete line, without its terminator.
    Line(String),
    /// A line that was too long or not UTF-8. Its bytes were discarded.
    Invalid(RelayError),
    /// The peer closed the stream.
    Eof,
}

/// Reads the next frame, buffering at most `MAX_LINE_BYTES + 1` bytes.
///
/// An over-long line is skipped up to its newline without being stored,
/// and the link stays usable. `buf` is scratch space reused across calls.
///
/// # Errors
///
/// Returns the underlying I/O error when the stream itself fails.
pub async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut seen = 0usize;
    let mut oversized = false;

    let terminated = loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break false;
        }
        let newline = available.iter().position(|b| *b == b'\n');
        let chunk = newline.map_or(available.len(), |i| i + 1);

        if !oversized {
            let room = (MAX_LINE_BYTES + 2).saturating_sub(buf.len());
            buf.extend(available.iter().take(chunk.min(room)).copied());
            if chunk > room {
                oversized = true;
                buf.clear();
            }
        }
        seen = seen.saturating_add(chunk);
        reader.consume(chunk);

        if newline.is_some() {
            break true;
        }
    };

    if oversized {
        return Ok(Frame::Invalid(RelayError::MalformedMessage(format!(
            "line of {seen} bytes exceeds {MAX_LINE_BYTES}"
        ))));
    }
    if !terminated && buf.is_empty() {
        return Ok(Frame::Eof);
    }
    while buf.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
        buf.pop();
    }
    match String::from_utf8(std::mem::take(buf)) {
        Ok(line) => Ok(Frame::Line(line)),
        Err(_) => Ok(Frame::Invalid(RelayError::MalformedMessage(
            "line is not valid UTF-8".to_string(),
        ))),
    }
}
