//! Minimal blocking RESP2 codec.
//!
//! Enough of the Redis protocol to issue commands and read their replies:
//! - Simple Strings (+)
//! - Errors (-)
//! - Integers (:)
//! - Bulk Strings ($), with `$-1` as null
//! - Arrays (*), with `*-1` as null

use std::io::{self, BufRead};

/// Largest bulk string accepted (matches the server default of 512 MB).
const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Largest array accepted.
const MAX_ELEMENTS: usize = 1024 * 1024;

/// Deepest array nesting accepted.
const MAX_NESTING_DEPTH: usize = 32;

/// A decoded RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`
    Error(String),
    /// `:1`
    Integer(i64),
    /// `$3\r\nfoo`
    Bulk(Vec<u8>),
    /// `*2` followed by two values
    Array(Vec<Value>),
    /// `$-1` or `*-1`
    Null,
}

impl Value {
    /// Bulk string from text.
    pub fn bulk(s: impl AsRef<[u8]>) -> Self {
        Self::Bulk(s.as_ref().to_vec())
    }

    /// Whether this is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Encode any value.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Simple(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
        Value::Error(s) => out.extend_from_slice(format!("-{s}\r\n").as_bytes()),
        Value::Integer(n) => out.extend_from_slice(format!(":{n}\r\n").as_bytes()),
        Value::Bulk(data) => {
            out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        Value::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Null => out.extend_from_slice(b"$-1\r\n"),
    }
}

/// Read one complete value, blocking until it has arrived.
pub fn read_value<R: BufRead>(reader: &mut R) -> io::Result<Value> {
    read_nested(reader, 0)
}

fn read_nested<R: BufRead>(reader: &mut R, depth: usize) -> io::Result<Value> {
    if depth > MAX_NESTING_DEPTH {
        return Err(invalid("maximum nesting depth exceeded"));
    }

    let line = read_line(reader)?;
    let (prefix, rest) = line
        .split_first()
        .ok_or_else(|| invalid("empty RESP line"))?;
    let text = String::from_utf8_lossy(rest).to_string();

    match *prefix {
        b'+' => Ok(Value::Simple(text)),
        b'-' => Ok(Value::Error(text)),
        b':' => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid("invalid integer")),
        b'$' => {
            let len = parse_length(&text)?;
            let Some(len) = len else {
                return Ok(Value::Null);
            };
            if len > MAX_BULK_SIZE {
                return Err(invalid(&format!(
                    "bulk string too large: {len} > {MAX_BULK_SIZE}"
                )));
            }
            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data)?;
            if &data[len..] != b"\r\n" {
                return Err(invalid("missing CRLF after bulk string"));
            }
            data.truncate(len);
            Ok(Value::Bulk(data))
        }
        b'*' => {
            let len = parse_length(&text)?;
            let Some(len) = len else {
                return Ok(Value::Null);
            };
            if len > MAX_ELEMENTS {
                return Err(invalid(&format!(
                    "array too large: {len} > {MAX_ELEMENTS}"
                )));
            }
            let mut items = Vec::with_capacity(len.min(64));
            for _ in 0..len {
                items.push(read_nested(reader, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        other => Err(invalid(&format!(
            "unexpected RESP type byte {:?}",
            char::from(other)
        ))),
    }
}

/// Read a CRLF-terminated line, without the terminator.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed",
        ));
    }
    if !line.ends_with(b"\r\n") {
        return Err(invalid("line not terminated by CRLF"));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

/// Parse a length header; `-1` means null.
fn parse_length(text: &str) -> io::Result<Option<usize>> {
    match text.parse::<i64>() {
        Ok(-1) => Ok(None),
        Ok(n) if n >= 0 => Ok(Some(n as usize)),
        _ => Err(invalid("invalid length")),
    }
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: &[u8]) -> io::Result<Value> {
        read_value(&mut Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn test_encode_command() {
        let encoded = encode_command(&["SET", "key", "value"]);
        assert_eq!(
            encoded,
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n".to_vec()
        );
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(b"+OK\r\n").unwrap(), Value::Simple("OK".into()));
        assert_eq!(
            decode(b"-ERR wrong type\r\n").unwrap(),
            Value::Error("ERR wrong type".into())
        );
        assert_eq!(decode(b":42\r\n").unwrap(), Value::Integer(42));
        assert_eq!(decode(b"$-1\r\n").unwrap(), Value::Null);
        assert_eq!(decode(b"$0\r\n\r\n").unwrap(), Value::bulk(""));
    }

    #[test]
    fn test_decode_nested_array() {
        let value = decode(b"*2\r\n$3\r\nfoo\r\n*1\r\n:1\r\n").unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::bulk("foo"),
                Value::Array(vec![Value::Integer(1)])
            ])
        );
    }

    #[test]
    fn test_bulk_string_with_crlf_inside() {
        let mut bytes = Vec::new();
        encode_value(&Value::bulk("a\r\nb"), &mut bytes);
        assert_eq!(decode(&bytes).unwrap(), Value::bulk("a\r\nb"));
    }

    #[test]
    fn test_truncated_input() {
        assert!(decode(b"$5\r\nab").is_err());
        assert_eq!(
            decode(b"").unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
        assert!(decode(b"+OK\n").is_err());
        assert!(decode(b"?what\r\n").is_err());
    }
}
