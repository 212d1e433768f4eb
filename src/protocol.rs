//! Line protocol helpers.
//!
//! The wire format is one UTF-8 line per message:
//!
//! ```text
//! Client: DATA:2024-01-02-15 04:05: 0 1000\n
//! Server: DATA:2024-01-02-15 04:05: 0 1000\n   (upper-cased)
//! ```

use bytes::BytesMut;
use chrono::{DateTime, Local};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Line terminator.
pub const TERMINATOR: u8 = b'\n';

/// Longest line accepted from a peer or the operator, terminator included.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Timestamp layout for outbound frames (`2006-01-02-15 04:05`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H %M:%S";

/// Strip a single trailing `\n`. Any `\r` is kept as content.
pub fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

/// Read one line and return it without its terminator.
///
/// Content is not interpreted: bytes that are not valid UTF-8 come back as
/// U+FFFD. Returns `Ok(None)` if the stream ends before a terminator, and an
/// `InvalidData` error once a line reaches `MAX_LINE_LENGTH` without one.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    let n = (&mut *reader)
        .take(MAX_LINE_LENGTH as u64)
        .read_until(TERMINATOR, buf)
        .await?;

    if buf.last() != Some(&TERMINATOR) {
        if n >= MAX_LINE_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {MAX_LINE_LENGTH} bytes"),
            ));
        }
        return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&buf[..n - 1]).into_owned()))
}

/// Build the server's reply to a received line: upper-cased, re-terminated.
pub fn reply(line: &str) -> BytesMut {
    let upper = strip_terminator(line).to_uppercase();
    let mut response = BytesMut::with_capacity(upper.len() + 1);
    response.extend_from_slice(upper.as_bytes());
    response.extend_from_slice(&[TERMINATOR]);
    response
}

/// Frame an outbound payload as `DATA:<timestamp>: <text>\n`.
///
/// Embedded newlines are escaped so the frame stays a single line.
pub fn frame(text: &str, now: DateTime<Local>) -> BytesMut {
    let header = format!("DATA:{}: ", now.format(TIMESTAMP_FORMAT));
    let body = text.replace('\n', "\\n");

    let mut frame = BytesMut::with_capacity(header.len() + body.len() + 1);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(body.as_bytes());
    frame.extend_from_slice(&[TERMINATOR]);
    frame
}

/// Frame a payload stamped with the current local time.
pub fn frame_now(text: &str) -> BytesMut {
    frame(text, Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reply_uppercases() {
        assert_eq!(&reply("hello\n")[..], b"HELLO\n");
        assert_eq!(&reply("hello")[..], b"HELLO\n");
        assert_eq!(&reply("\n")[..], b"\n");
    }

    #[test]
    fn test_reply_unicode() {
        // Same as str::to_uppercase, including length-changing mappings
        assert_eq!(&reply("straße ünï\n")[..], "STRASSE ÜNÏ\n".as_bytes());
    }

    #[test]
    fn test_reply_keeps_carriage_return() {
        assert_eq!(&reply("abc\r\n")[..], b"ABC\r\n");
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator("a\n"), "a");
        assert_eq!(strip_terminator("a\n\n"), "a\n");
        assert_eq!(strip_terminator("a"), "a");
    }

    #[tokio::test]
    async fn test_read_line_lossy() {
        let mut reader = &b"caf\xe9\nok\r\ntail"[..];
        let mut buf = Vec::new();

        let line = read_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(line.as_deref(), Some("caf\u{FFFD}"));
        let line = read_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(line.as_deref(), Some("ok\r"));

        // Unterminated tail is dropped
        assert_eq!(read_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_length_cap() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH - 1];
        input.push(TERMINATOR);
        input.extend_from_slice(&vec![b'b'; MAX_LINE_LENGTH]);
        let mut reader = &input[..];
        let mut buf = Vec::new();

        // Longest accepted line, terminator included
        let line = read_line(&mut reader, &mut buf).await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LENGTH - 1);

        let err = read_line(&mut reader, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(buf.len(), MAX_LINE_LENGTH);
    }

    #[test]
    fn test_frame_layout() {
        let now = Local.with_ymd_and_hms(2019, 3, 4, 15, 6, 7).unwrap();
        assert_eq!(&frame("0 1000", now)[..], b"DATA:2019-03-04-15 06:07: 0 1000\n");
    }

    #[test]
    fn test_frame_single_line() {
        let framed = frame_now("a\nb");
        assert_eq!(framed.iter().filter(|&&b| b == TERMINATOR).count(), 1);
        assert!(framed.ends_with(b"a\\nb\n"));
    }
}
