use super::{Body, BodyError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Body(BodyError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Events are separated by a blank line. Both `\n` and `\r\n` line endings
/// are accepted, since the Gemini endpoint frames its events with CRLF.
pub struct Sse {
    buf: Vec<u8>,
    body: Body,
}

impl Sse {
    #[inline]
    pub fn new(body: Body) -> Self {
        Self {
            buf: Vec::new(),
            body,
        }
    }

    /// Returns the next event payload, or `None` once the stream is done.
    ///
    /// Trailing bytes that never form a complete event are dropped.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.body.next_chunk().await.map_err(Error::Body)?
            else {
                return Ok(None);
            };
            // Chunks may split multi-byte characters, so decoding waits
            // until a whole event is buffered.
            self.buf.extend(bytes.iter().filter(|b| **b != b'\r'));
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            let Some(eol_idx) = self.buf.windows(2).position(|w| w == b"\n\n")
            else {
                return Ok(None);
            };
            let block: Vec<u8> = self.buf.drain(..eol_idx + 2).collect();
            let Ok(block) = str::from_utf8(&block[..eol_idx]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.starts_with(':') {
                    continue;
                }
                let Some((field, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                if field != "data" {
                    // `event`, `id` and `retry` carry nothing we use.
                    continue;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_of(chunks: &[&'static [u8]]) -> Sse {
        Sse::new(Body::Canned(
            chunks.iter().map(|c| Bytes::from_static(*c)).collect(),
        ))
    }

    #[tokio::test]
    async fn test_crlf_events() {
        let mut sse = sse_of(&[b"data: {\"a\":1}\r\n\r\ndata: {\"b\":2}\r\n\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_chunks() {
        // "é" is split across two chunks.
        let mut sse = sse_of(&[b"data: caf\xc3", b"\xa9\r\n", b"\r\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "café");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_comments_and_multiline_data() {
        let mut sse =
            sse_of(&[b": keep-alive\n\nevent: chunk\ndata: one\ndata: two\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one\ntwo");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_of(&[b"xxxxxx\n\n"]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse_of(&[b"data: incomplete\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
