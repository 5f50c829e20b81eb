//! Wire format encoding and decoding.
//!
//! Every connection carries exactly one exchange:
//!
//! ```text
//! producer:  client -> server   PRODUCER  PRODUCER:<N>  <N bytes>
//! consumer:  client -> server   CONSUMER
//!            server -> client   XML_DATA:<N>  <N bytes>
//! ```
//!
//! The role tag has no length prefix; it is recognised byte-by-byte
//! against the two known tags. The size header is ASCII text: a tag, a
//! colon and the decimal payload length. The digit run ends at the first
//! non-digit byte; a `\n` directly after the digits is an explicit
//! terminator and is consumed, any other byte is already payload. Senders
//! emit the terminator only when the payload itself starts with a digit
//! or `\n`.

use std::fmt;

use crate::error::{BufferdError, Result};

/// Default maximum payload size (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of digits in a size header (fits any `u64`).
pub const MAX_LENGTH_DIGITS: usize = 20;

/// Longest header tag accepted before the colon.
pub const MAX_TAG_LEN: usize = 16;

/// Separator between header tag and length.
pub const HEADER_SEPARATOR: u8 = b':';

/// Optional explicit terminator after the length digits.
pub const HEADER_TERMINATOR: u8 = b'\n';

/// Connection role announced by the first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Submits one payload to the queue.
    Producer,
    /// Takes one payload from the queue.
    Consumer,
}

impl Role {
    /// All recognised roles.
    pub const ALL: [Role; 2] = [Role::Producer, Role::Consumer];

    /// Role tag as sent on the wire.
    #[inline]
    pub fn tag(self) -> &'static str {
        match self {
            Role::Producer => "PRODUCER",
            Role::Consumer => "CONSUMER",
        }
    }

    /// Match buffered bytes against the role tags.
    ///
    /// Leading ASCII whitespace is not allowed; the tag must be the very
    /// first bytes on the connection.
    pub fn match_prefix(buf: &[u8]) -> RoleMatch {
        for role in Self::ALL {
            let tag = role.tag().as_bytes();
            if buf.len() >= tag.len() && &buf[..tag.len()] == tag {
                return RoleMatch::Complete(role);
            }
        }

        let partial = Self::ALL
            .iter()
            .any(|role| role.tag().as_bytes().starts_with(buf));
        if partial {
            RoleMatch::Partial
        } else {
            RoleMatch::Invalid
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of matching buffered bytes against the role tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMatch {
    /// A full tag is buffered; consume `role.tag().len()` bytes.
    Complete(Role),
    /// Bytes so far are a prefix of some tag; need more.
    Partial,
    /// Bytes cannot become a known tag.
    Invalid,
}

/// Tag announced in a size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    /// Producer -> server submission.
    Producer,
    /// Server -> consumer delivery.
    XmlData,
}

impl FrameTag {
    /// All recognised frame tags.
    pub const ALL: [FrameTag; 2] = [FrameTag::Producer, FrameTag::XmlData];

    /// Tag as sent on the wire.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            FrameTag::Producer => "PRODUCER",
            FrameTag::XmlData => "XML_DATA",
        }
    }

    /// Look up a tag by its wire bytes.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str().as_bytes() == raw)
    }
}

impl fmt::Display for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Frame tag.
    pub tag: FrameTag,
    /// Payload length in bytes.
    pub payload_length: usize,
}

/// Outcome of trying to parse a header from buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderParse {
    /// Header complete; `consumed` bytes belong to it.
    Complete { header: Header, consumed: usize },
    /// Need more bytes to decide.
    Incomplete,
}

impl Header {
    /// Create a new header.
    pub fn new(tag: FrameTag, payload_length: usize) -> Self {
        Self {
            tag,
            payload_length,
        }
    }

    /// Encode the header for `payload`.
    ///
    /// # Example
    ///
    /// ```
    /// use bufferd::protocol::{FrameTag, Header};
    ///
    /// let payload = b"<ITstudent/>";
    /// let header = Header::new(FrameTag::XmlData, payload.len());
    /// assert_eq!(header.encode(payload), b"XML_DATA:12".to_vec());
    ///
    /// // A payload starting with a digit gets an explicit terminator.
    /// let header = Header::new(FrameTag::Producer, 3);
    /// assert_eq!(header.encode(b"123"), b"PRODUCER:3\n".to_vec());
    /// ```
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = format!("{}:{}", self.tag.as_str(), self.payload_length).into_bytes();
        if needs_terminator(payload) {
            buf.push(HEADER_TERMINATOR);
        }
        buf
    }

    /// Parse a header from the start of `buf`.
    ///
    /// `at_eof` tells the parser no more bytes will arrive, which completes
    /// a header whose digit run reaches the end of the buffer.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` for an unknown tag, missing or oversized digit
    /// run, and `PayloadTooLarge` when the length exceeds `max_payload_size`.
    pub fn parse(buf: &[u8], max_payload_size: usize, at_eof: bool) -> Result<HeaderParse> {
        let start = buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(buf.len());
        let rest = &buf[start..];

        let colon = match rest.iter().position(|&b| b == HEADER_SEPARATOR) {
            Some(pos) => pos,
            None if rest.len() > MAX_TAG_LEN => {
                return Err(BufferdError::Protocol(format!(
                    "no ':' within first {} header bytes",
                    MAX_TAG_LEN
                )))
            }
            None if at_eof && rest.is_empty() => return Err(BufferdError::ConnectionClosed),
            None if at_eof => {
                return Err(BufferdError::Protocol(format!(
                    "header cut short: {:?}",
                    String::from_utf8_lossy(rest)
                )))
            }
            None => return Ok(HeaderParse::Incomplete),
        };

        let raw_tag = &rest[..colon];
        let tag = FrameTag::from_bytes(raw_tag).ok_or_else(|| {
            BufferdError::Protocol(format!(
                "unknown header tag {:?}",
                String::from_utf8_lossy(raw_tag)
            ))
        })?;

        let digits_start = colon + 1;
        let digits_len = rest[digits_start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits_end = digits_start + digits_len;

        if digits_len > MAX_LENGTH_DIGITS {
            return Err(BufferdError::Protocol(format!(
                "length has more than {} digits",
                MAX_LENGTH_DIGITS
            )));
        }
        if digits_end == rest.len() && !at_eof {
            // The digit run may continue in the next read.
            return Ok(HeaderParse::Incomplete);
        }
        if digits_len == 0 {
            return Err(BufferdError::Protocol(format!(
                "{} header has no length",
                tag
            )));
        }

        // Digits only, so the str conversion and parse can fail only on overflow.
        let declared: u64 = std::str::from_utf8(&rest[digits_start..digits_end])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| BufferdError::Protocol("length overflows u64".to_string()))?;
        if declared > max_payload_size as u64 {
            return Err(BufferdError::PayloadTooLarge {
                declared,
                max: max_payload_size,
            });
        }

        let mut consumed = start + digits_end;
        if rest.get(digits_end) == Some(&HEADER_TERMINATOR) {
            consumed += 1;
        }

        Ok(HeaderParse::Complete {
            header: Header::new(tag, declared as usize),
            consumed,
        })
    }
}

/// Whether a payload's first byte could be mistaken for header text.
#[inline]
pub fn needs_terminator(payload: &[u8]) -> bool {
    matches!(payload.first(), Some(b) if b.is_ascii_digit() || *b == HEADER_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(buf: &[u8]) -> Result<HeaderParse> {
        Header::parse(buf, DEFAULT_MAX_PAYLOAD_SIZE, false)
    }

    fn complete(buf: &[u8]) -> (Header, usize) {
        match parse(buf).unwrap() {
            HeaderParse::Complete { header, consumed } => (header, consumed),
            HeaderParse::Incomplete => panic!("expected complete header for {:?}", buf),
        }
    }

    #[test]
    fn test_role_match_complete() {
        assert_eq!(
            Role::match_prefix(b"PRODUCER"),
            RoleMatch::Complete(Role::Producer)
        );
        assert_eq!(
            Role::match_prefix(b"CONSUMERtrailing"),
            RoleMatch::Complete(Role::Consumer)
        );
    }

    #[test]
    fn test_role_match_partial_and_invalid() {
        assert_eq!(Role::match_prefix(b""), RoleMatch::Partial);
        assert_eq!(Role::match_prefix(b"PROD"), RoleMatch::Partial);
        assert_eq!(Role::match_prefix(b"C"), RoleMatch::Partial);
        assert_eq!(Role::match_prefix(b"BOGUS"), RoleMatch::Invalid);
        assert_eq!(Role::match_prefix(b"PRODUCTS"), RoleMatch::Invalid);
        assert_eq!(Role::match_prefix(b"producer"), RoleMatch::Invalid);
    }

    #[test]
    fn test_header_parse_followed_by_payload() {
        let (header, consumed) = complete(b"PRODUCER:5<abc>");
        assert_eq!(header, Header::new(FrameTag::Producer, 5));
        assert_eq!(consumed, 10);
    }

    #[test]
    fn test_header_parse_consumes_terminator() {
        let (header, consumed) = complete(b"XML_DATA:3\n123");
        assert_eq!(header, Header::new(FrameTag::XmlData, 3));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn test_header_parse_skips_leading_whitespace() {
        let (header, consumed) = complete(b"\r\n PRODUCER:2<a");
        assert_eq!(header.payload_length, 2);
        assert_eq!(consumed, 13);
    }

    #[test]
    fn test_header_parse_needs_more_bytes() {
        assert_eq!(parse(b"").unwrap(), HeaderParse::Incomplete);
        assert_eq!(parse(b"PRODU").unwrap(), HeaderParse::Incomplete);
        assert_eq!(parse(b"PRODUCER:").unwrap(), HeaderParse::Incomplete);
        assert_eq!(parse(b"PRODUCER:12").unwrap(), HeaderParse::Incomplete);
    }

    #[test]
    fn test_header_parse_digits_at_eof() {
        let parsed = Header::parse(b"PRODUCER:0", DEFAULT_MAX_PAYLOAD_SIZE, true).unwrap();
        assert_eq!(
            parsed,
            HeaderParse::Complete {
                header: Header::new(FrameTag::Producer, 0),
                consumed: 10
            }
        );
    }

    #[test]
    fn test_header_parse_eof_without_bytes() {
        let result = Header::parse(b"", DEFAULT_MAX_PAYLOAD_SIZE, true);
        assert!(matches!(result, Err(BufferdError::ConnectionClosed)));
    }

    #[test]
    fn test_header_parse_rejects_unknown_tag() {
        let err = parse(b"CONSUMER:10<").unwrap_err();
        assert!(err.to_string().contains("unknown header tag"));
    }

    #[test]
    fn test_header_parse_rejects_missing_length() {
        let err = parse(b"PRODUCER:<x>").unwrap_err();
        assert!(err.to_string().contains("has no length"));
    }

    #[test]
    fn test_header_parse_rejects_missing_colon() {
        let err = parse(b"PRODUCER PRODUCER PRODUCER").unwrap_err();
        assert!(err.to_string().contains("no ':'"));
    }

    #[test]
    fn test_header_parse_rejects_too_many_digits() {
        let err = parse(b"PRODUCER:123456789012345678901<").unwrap_err();
        assert!(err.to_string().contains("digits"));
    }

    #[test]
    fn test_header_parse_rejects_oversized_payload() {
        let result = Header::parse(b"PRODUCER:1000<", 100, false);
        assert!(matches!(
            result,
            Err(BufferdError::PayloadTooLarge {
                declared: 1000,
                max: 100
            })
        ));
    }

    #[test]
    fn test_encode_is_bit_exact_for_markup_payload() {
        let header = Header::new(FrameTag::Producer, 500);
        assert_eq!(header.encode(b"<ITstudent>"), b"PRODUCER:500".to_vec());
    }

    #[test]
    fn test_encode_terminates_digit_and_newline_payloads() {
        let header = Header::new(FrameTag::XmlData, 2);
        assert_eq!(header.encode(b"42"), b"XML_DATA:2\n".to_vec());
        assert_eq!(header.encode(b"\nx"), b"XML_DATA:2\n".to_vec());
        assert_eq!(header.encode(b""), b"XML_DATA:2".to_vec());
    }

    #[test]
    fn test_encode_then_parse_digit_payload() {
        let payload = b"2024";
        let header = Header::new(FrameTag::Producer, payload.len());
        let mut wire = header.encode(payload);
        let header_len = wire.len();
        wire.extend_from_slice(payload);

        let (parsed, consumed) = complete(&wire);
        assert_eq!(parsed, header);
        assert_eq!(consumed, header_len);
        assert_eq!(&wire[consumed..], payload);
    }
}
