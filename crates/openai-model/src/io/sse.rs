use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// Reads the `data` payloads of server-sent events from a chunk stream.
///
/// Comment lines and fields other than `data` are skipped. Multiple `data`
/// lines in one event are joined with `\n`.
pub struct Sse {
    buf: String,
    pending: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events already buffered first.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    // A chunk boundary may split a multi-byte character, so undecodable
    // tails are kept until the next chunk arrives.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match str::from_utf8(&self.pending) {
            Ok(s) => {
                append_normalized(&mut self.buf, s);
                self.pending.clear();
                return Ok(());
            }
            Err(err) if err.error_len().is_some() => {
                return Err(Error::InvalidPayload);
            }
            Err(err) => err.valid_up_to(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let Ok(s) = str::from_utf8(&self.pending) else {
            return Err(Error::InvalidPayload);
        };
        append_normalized(&mut self.buf, s);
        self.pending = rest;
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            let Some(eol_idx) = self.buf.find("\n\n") else {
                return Ok(None);
            };

            let mut data: Option<String> = None;
            for line in self.buf[..eol_idx].lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => {
                        (field, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if field != "data" {
                    if !matches!(field, "event" | "id" | "retry") {
                        return Err(Error::InvalidPayload);
                    }
                    continue;
                }
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(..eol_idx + 2);

            if data.is_some() {
                return Ok(data);
            }
        }
    }
}

// Line endings are normalized on the whole buffer, since a chunk may end
// between the `\r` and the `\n` of a pair.
fn append_normalized(buf: &mut String, s: &str) {
    buf.push_str(s);
    if buf.contains("\r\n") {
        *buf = buf.replace("\r\n", "\n");
    }
}
