// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common error type and clock helpers shared by the driver modules.

use std::fmt;

/// Common error type for Velodyne driver operations
///
/// Configuration and geometry errors are raised once while the driver is
/// being built and are fatal. [`Error::ShortRead`] is the only error a
/// running accumulation cycle produces; the host may simply call the cycle
/// again.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Invalid packet data
    InvalidPacket(String),
    /// Unexpected end of data at given byte position
    UnexpectedEnd(usize),
    /// Transport returned a different number of bytes than one packet body
    ShortRead {
        expected: usize,
        received: usize,
        source: Option<std::io::Error>,
    },
    /// Model identifier outside the supported set
    UnknownModel(String),
    /// Model geometry cannot be assembled into a scan grid
    Geometry(String),
    /// A cycle was requested before a packet source was attached
    NotStarted,
    /// A cycle was requested after the driver was stopped
    Stopped,
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::UnexpectedEnd(len) => write!(f, "unexpected end of data at {} bytes", len),
            Error::ShortRead {
                expected,
                received,
                source,
            } => {
                write!(
                    f,
                    "empty message or timeout: received {} of {} bytes",
                    received, expected
                )?;
                match source {
                    Some(err) => match err.raw_os_error() {
                        Some(code) => write!(f, " (errno={}, {})", code, err),
                        None => write!(f, " ({})", err),
                    },
                    None => Ok(()),
                }
            }
            Error::UnknownModel(name) => write!(f, "unknown Velodyne model: {}", name),
            Error::Geometry(msg) => write!(f, "invalid scan geometry: {}", msg),
            Error::NotStarted => write!(f, "driver has not been started"),
            Error::Stopped => write!(f, "driver has been stopped"),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_display() {
        let err = Error::ShortRead {
            expected: 1206,
            received: 0,
            source: None,
        };
        assert_eq!(
            err.to_string(),
            "empty message or timeout: received 0 of 1206 bytes"
        );

        let err = Error::ShortRead {
            expected: 1206,
            received: 0,
            source: Some(std::io::Error::from_raw_os_error(libc::EAGAIN)),
        };
        let msg = err.to_string();
        assert!(msg.contains(&format!("errno={}", libc::EAGAIN)), "{}", msg);
    }

    #[test]
    fn test_timestamp_monotonic() {
        let first = timestamp().unwrap();
        let second = timestamp().unwrap();
        assert!(second >= first);
    }
}
