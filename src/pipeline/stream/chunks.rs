//! Byte chunks → text chunks.
//!
//! Network chunk boundaries do not respect UTF-8 boundaries, so a decoder
//! carries an incomplete trailing sequence over to the next chunk.

use futures_util::StreamExt;

use crate::pipeline::PipelineError;
use crate::transport::ByteStream;

/// Incremental UTF-8 decoder. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(_) => (self.pending.len(), None),
                Err(e) => (e.valid_up_to(), e.error_len()),
            };
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
            match invalid_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
                None => {
                    self.pending.drain(..valid);
                    break;
                }
            }
        }
        out
    }

    /// Flush a dangling partial sequence at end of stream.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Lazy, finite, non-restartable sequence of decoded text chunks.
///
/// Ends when the source ends; after an error or the end, `next_chunk`
/// keeps returning `None`.
pub struct TextChunks {
    body: ByteStream,
    decoder: Utf8ChunkDecoder,
    finished: bool,
}

impl TextChunks {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            decoder: Utf8ChunkDecoder::new(),
            finished: false,
        }
    }

    /// Suspend until the next non-empty text chunk, an error, or the end.
    pub async fn next_chunk(&mut self) -> Option<Result<String, PipelineError>> {
        if self.finished {
            return None;
        }
        loop {
            match self.body.next().await {
                Some(Ok(bytes)) => {
                    let text = self.decoder.decode(&bytes);
                    if !text.is_empty() {
                        return Some(Ok(text));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    return (!tail.is_empty()).then_some(Ok(tail));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(chunks: Vec<Result<Vec<u8>, PipelineError>>) -> ByteStream {
        stream::iter(chunks).boxed()
    }

    #[test]
    fn decodes_ascii_directly() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"Halo"), "Halo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn carries_split_multibyte_sequence() {
        // "é" = C3 A9
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"caf\xC3"), "caf");
        assert_eq!(decoder.decode(b"\xA9!"), "é!");
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn dangling_tail_flushed_on_finish() {
        let mut decoder = Utf8ChunkDecoder::new();
        assert_eq!(decoder.decode(b"x\xE2\x82"), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[tokio::test]
    async fn yields_chunks_then_ends() {
        let mut chunks = TextChunks::new(body(vec![
            Ok(b"Hel".to_vec()),
            Ok(b"lo".to_vec()),
        ]));
        assert_eq!(chunks.next_chunk().await, Some(Ok("Hel".to_string())));
        assert_eq!(chunks.next_chunk().await, Some(Ok("lo".to_string())));
        assert_eq!(chunks.next_chunk().await, None);
        assert_eq!(chunks.next_chunk().await, None);
    }

    #[tokio::test]
    async fn partial_character_chunk_is_merged_into_next() {
        // "€" = E2 82 AC split across three network chunks
        let mut chunks = TextChunks::new(body(vec![
            Ok(b"5 \xE2".to_vec()),
            Ok(b"\x82".to_vec()),
            Ok(b"\xAC".to_vec()),
        ]));
        assert_eq!(chunks.next_chunk().await, Some(Ok("5 ".to_string())));
        assert_eq!(chunks.next_chunk().await, Some(Ok("€".to_string())));
        assert_eq!(chunks.next_chunk().await, None);
    }

    #[tokio::test]
    async fn error_terminates_sequence() {
        let mut chunks = TextChunks::new(body(vec![
            Ok(b"Hel".to_vec()),
            Err(PipelineError::TransportFailure("reset".into())),
            Ok(b"never".to_vec()),
        ]));
        assert_eq!(chunks.next_chunk().await, Some(Ok("Hel".to_string())));
        assert!(matches!(chunks.next_chunk().await, Some(Err(PipelineError::TransportFailure(_)))));
        assert_eq!(chunks.next_chunk().await, None);
    }
}
