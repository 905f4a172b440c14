use std::fmt::Display;

use futures_util::{Stream, StreamExt};

use crate::models::ErrorBody;

/// Streaming UTF-8 decoder for a chunked response body.
///
/// Characters split across chunk boundaries are carried over to the next
/// `push`. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Assembler {
    pending: Vec<u8>,
}

impl Utf8Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    /// Flushes an incomplete trailing sequence.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Progress of a streamed reply, as seen by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent<'a> {
    Chunk(&'a [u8]),
    End,
    Failed(String),
}

/// Feeds every chunk of `stream` to `apply`, followed by exactly one `End`
/// or `Failed`. Stops reading at the first error.
pub async fn pump<St, B, E, F>(stream: St, mut apply: F)
where
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(ReplyEvent<'_>),
{
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => apply(ReplyEvent::Chunk(chunk.as_ref())),
            Err(e) => {
                apply(ReplyEvent::Failed(e.to_string()));
                return;
            }
        }
    }
    apply(ReplyEvent::End);
}

/// Decides whether a `/chat` response may be streamed into the reply.
///
/// Any non-2xx status is a failure; its `{error}` body (or the raw text when
/// it is not one) only ends up in the returned reason.
pub fn check_status(status: u16, body: &str) -> Result<(), String> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    if detail.is_empty() {
        Err(format!("Server error: {status}"))
    } else {
        Err(format!("Server error: {status} ({detail})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn success_status_streams() {
        assert_eq!(check_status(200, ""), Ok(()));
    }

    #[test]
    fn error_status_reports_the_json_message() {
        let body = r#"{"error":"Model not found or API error. Check server console."}"#;

        assert_eq!(
            check_status(500, body),
            Err("Server error: 500 (Model not found or API error. Check server console.)".to_string())
        );
    }

    #[test]
    fn error_status_without_json_keeps_raw_text() {
        assert_eq!(check_status(502, "Bad Gateway\n"), Err("Server error: 502 (Bad Gateway)".to_string()));
        assert_eq!(check_status(404, ""), Err("Server error: 404".to_string()));
    }

    #[test]
    fn ascii_passes_straight_through() {
        let mut decoder = Utf8Assembler::new();
        assert_eq!(decoder.push(b"Hi"), "Hi");
        assert_eq!(decoder.push(b" there"), " there");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn split_multibyte_character_is_held_back() {
        let bytes = "héllo 🦀".as_bytes();
        let crab_start = bytes.len() - 4;
        let mut decoder = Utf8Assembler::new();

        assert_eq!(decoder.push(&bytes[..2]), "h");
        assert_eq!(decoder.push(&bytes[2..crab_start + 1]), "éllo ");
        assert_eq!(decoder.push(&bytes[crab_start + 1..]), "🦀");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8Assembler::new();
        assert_eq!(decoder.push(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn dangling_sequence_is_flushed_on_finish() {
        let mut decoder = Utf8Assembler::new();
        assert_eq!(decoder.push(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn pump_reports_chunks_then_end() {
        let chunks: Vec<Result<&[u8], String>> = vec![Ok(&b"Hi"[..]), Ok(&b" there"[..])];
        let mut seen = Vec::new();

        pump(stream::iter(chunks), |event| seen.push(format!("{event:?}"))).await;

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], "End");
    }

    #[tokio::test]
    async fn pump_stops_at_first_error() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"Hi".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"never".to_vec()),
        ];
        let mut text = String::new();
        let mut failure = None;
        let mut ended = false;

        pump(stream::iter(chunks), |event| match event {
            ReplyEvent::Chunk(bytes) => text.push_str(std::str::from_utf8(bytes).unwrap()),
            ReplyEvent::Failed(reason) => failure = Some(reason),
            ReplyEvent::End => ended = true,
        })
        .await;

        assert_eq!(text, "Hi");
        assert_eq!(failure.as_deref(), Some("connection reset"));
        assert!(!ended);
    }
}
