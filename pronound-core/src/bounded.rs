use std::borrow::Cow;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

/// Characters removed from both ends of requests and pronoun lines.
pub const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

/// Bytes read under a size limit.
///
/// `overflowed` is set when the source held more than `limit` bytes; `bytes` is then cut at the
/// limit and the caller decides whether to reject or truncate. `consumed` counts every byte
/// taken from the source, terminator included, so an empty source reads as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounded {
    pub bytes: Vec<u8>,
    pub overflowed: bool,
    pub consumed: usize,
}

impl Bounded {
    /// Decode as UTF-8, lossily. A multi-byte character split by truncation is dropped rather
    /// than turned into a replacement character.
    pub fn to_text(&self) -> Cow<'_, str> {
        if self.overflowed {
            if let Err(e) = std::str::from_utf8(&self.bytes) {
                if e.error_len().is_none() {
                    return String::from_utf8_lossy(&self.bytes[..e.valid_up_to()]);
                }
            }
        }

        String::from_utf8_lossy(&self.bytes)
    }
}

pub fn strip(text: &str) -> &str {
    text.trim_matches(WHITESPACE)
}

/// A single read call of at most `limit` bytes. There is no loop to drain a fragmented writer:
/// whatever the first read returns is the request.
pub async fn read_once<R>(reader: &mut R, limit: usize) -> io::Result<Bounded>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = vec![0u8; limit + 1];
    let n = reader.read(&mut bytes).await?;

    bytes.truncate(n.min(limit));

    Ok(Bounded {
        bytes,
        overflowed: n > limit,
        consumed: n,
    })
}

/// Read the first line of `reader`, without its terminator, keeping at most `limit` bytes.
pub async fn read_line<R>(reader: R, limit: usize) -> io::Result<Bounded>
where
    R: AsyncBufRead + Unpin,
{
    let mut bytes = Vec::new();
    let mut reader = reader.take(limit as u64 + 1);
    let consumed = reader.read_until(b'\n', &mut bytes).await?;

    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        return Ok(Bounded {
            bytes,
            overflowed: false,
            consumed,
        });
    }

    let overflowed = bytes.len() > limit;
    bytes.truncate(limit);

    Ok(Bounded {
        bytes,
        overflowed,
        consumed,
    })
}
