//! Server-Sent Events (SSE) stream decoding.
//!
//! Every streaming endpoint of the server answers with newline-delimited
//! events of the form:
//! ```text
//! data: {"content": "Hel"}
//!
//! data: {"content": "lo"}
//!
//! data: [DONE]
//! ```
//!
//! Lines without the `data: ` prefix (comments, keep-alives) are skipped.
//! The sequence ends at the `[DONE]` marker or when the body ends, whichever
//! comes first. The first error ends the sequence.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::client::ClientError;

/// Prefix of every meaningful event line, trailing space included.
pub const DATA_PREFIX: &str = "data: ";

/// Payload marking the normal end of a stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Extension trait for `reqwest::Response` to decode SSE bodies.
///
/// # Example
/// ```ignore
/// use llama_server_client::sse::SSEResponseExt;
///
/// let response = http.post(url).json(&body).send().await?;
/// let mut events = Box::pin(response.sse_events::<CompletionResponse>());
/// while let Some(event) = events.next().await {
///     print!("{}", event?.content);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response body into a stream of decoded `data:` payloads.
    fn sse_events<T>(self) -> impl Stream<Item = Result<T, ClientError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_events<T>(self) -> impl Stream<Item = Result<T, ClientError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        decode_events(self.bytes_stream())
    }
}

/// Decode a raw byte stream into JSON events of type `T`.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// may fall anywhere, including inside a multi-byte character or between
/// the `\r` and `\n` of a CRLF. Lines end at `\n`, `\r` or `\r\n`. Only
/// the payload of a `data: ` line is decoded as UTF-8; other lines are
/// skipped whatever bytes they hold. Once `[DONE]` is seen the byte stream
/// is not polled again.
pub fn decode_events<T, S, E>(byte_stream: S) -> impl Stream<Item = Result<T, ClientError>> + Send + 'static
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    async_stream::try_stream! {
        let mut byte_stream = Box::pin(byte_stream);
        let mut lines = LineBuffer::default();

        'read: loop {
            let stream_ended = match byte_stream.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    lines.extend(&chunk);
                    false
                }
                None => true,
            };

            while let Some(line) = lines.next_line() {
                match decode_line::<T>(&line)? {
                    Line::Event(event) => yield event,
                    Line::Done => break 'read,
                    Line::Skip => {}
                }
            }

            if stream_ended {
                // Final line without a terminator.
                if let Line::Event(event) = decode_line::<T>(&lines.take_rest())? {
                    yield event;
                }
                break;
            }
        }
    }
}

enum Line<T> {
    Event(T),
    Done,
    Skip,
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<Line<T>, ClientError> {
    let Some(payload) = line.trim_ascii().strip_prefix(DATA_PREFIX.as_bytes()) else {
        return Ok(Line::Skip);
    };

    let data = String::from_utf8(payload.to_vec())?;
    if is_done_marker(&data) {
        return Ok(Line::Done);
    }

    tracing::trace!(data, "sse event");
    Ok(Line::Event(serde_json::from_str(&data)?))
}

/// Splits buffered bytes into lines terminated by `\n`, `\r` or `\r\n`.
#[derive(Debug, Default)]
struct LineBuffer {
    buffer: Vec<u8>,
    /// Last line ended at `\r`; a `\n` arriving next belongs to it.
    after_cr: bool,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        if self.after_cr && !self.buffer.is_empty() {
            self.after_cr = false;
            if self.buffer[0] == b'\n' {
                self.buffer.remove(0);
            }
        }

        let pos = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        self.after_cr = self.buffer[pos] == b'\r';
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

/// Parse an SSE line to extract the data portion.
///
/// The line is trimmed first; anything not starting with `data: ` yields
/// `None`.
///
/// # Example
/// ```
/// use llama_server_client::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}\r\n";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// assert_eq!(parse_sse_line(": keep-alive"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.trim().strip_prefix(DATA_PREFIX)
}

/// Check if an SSE data payload indicates the stream is done.
///
/// # Example
/// ```
/// use llama_server_client::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == DONE_MARKER
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Chunk {
        content: String,
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, ClientError>> + Send + 'static {
        let parts: Vec<Result<Bytes, ClientError>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(parts)
    }

    fn lines(lines: &[&str]) -> impl Stream<Item = Result<Bytes, ClientError>> + Send + 'static {
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        chunks(&[body.as_str()])
    }

    async fn collect(
        input: impl Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    ) -> Vec<Result<Chunk, ClientError>> {
        decode_events::<Chunk, _, _>(input).collect().await
    }

    fn contents(results: Vec<Result<Chunk, ClientError>>) -> Vec<String> {
        results
            .into_iter()
            .map(|r| r.expect("unexpected error").content)
            .collect()
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: hello"), Some("hello"));
        assert_eq!(
            parse_sse_line("  data: {\"key\": \"value\"}  "),
            Some("{\"key\": \"value\"}")
        );
        assert_eq!(parse_sse_line("data:no-space"), None);
        assert_eq!(parse_sse_line(": comment"), None);
        assert_eq!(parse_sse_line("event: message"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn test_is_done_marker() {
        assert!(is_done_marker("[DONE]"));
        assert!(!is_done_marker(""));
        assert!(!is_done_marker("[DONE] "));
        assert!(!is_done_marker("{\"key\": \"value\"}"));
    }

    #[tokio::test]
    async fn test_events_until_done_marker() {
        let input = lines(&[
            r#"data: {"content":"Hi"}"#,
            "",
            r#"data: {"content":" there"}"#,
            "data: [DONE]",
        ]);
        assert_eq!(contents(collect(input).await), vec!["Hi", " there"]);
    }

    #[tokio::test]
    async fn test_stream_end_without_marker() {
        let input = lines(&[r#"data: {"content":"x"}"#]);
        assert_eq!(contents(collect(input).await), vec!["x"]);
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let input = chunks(&["data: {\"content\":\"a\"}\n", "data: {\"content\":\"b\"}"]);
        assert_eq!(contents(collect(input).await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_non_data_lines_are_skipped() {
        let input = lines(&[
            ": ping",
            "",
            "event: completion",
            r#"data: {"content":"one"}"#,
            "id: 7",
            "   ",
            r#"data: {"content":"two"}"#,
            ": trailing comment",
        ]);
        assert_eq!(contents(collect(input).await), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let input = chunks(&["data: {\"content\":\"a\"}\r\n\r\ndata: [DONE]\r\n"]);
        assert_eq!(contents(collect(input).await), vec!["a"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let input = chunks(&[
            "da",
            "ta: {\"conte",
            "nt\":\"caf\u{e9}\"}\ndata: {\"content\":",
            "\"!\"}\n\ndata: [DO",
            "NE]\n",
        ]);
        assert_eq!(contents(collect(input).await), vec!["caf\u{e9}", "!"]);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_between_chunks() {
        let bytes = "data: {\"content\":\"\u{1F999}\"}\n".as_bytes().to_vec();
        let split = bytes.len() - 5;
        let parts: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from(bytes[..split].to_vec())),
            Ok(Bytes::from(bytes[split..].to_vec())),
        ];
        let results = collect(stream::iter(parts)).await;
        assert_eq!(contents(results), vec!["\u{1F999}"]);
    }

    #[tokio::test]
    async fn test_nothing_is_read_after_done_marker() {
        let parts: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from("data: {\"content\":\"last\"}\ndata: [DONE]\n")),
            Ok(Bytes::from("data: {\"content\":\"ignored\"}\n")),
            Err(ClientError::Config("must not be polled".to_string())),
        ];
        let results = collect(stream::iter(parts)).await;
        assert_eq!(contents(results), vec!["last"]);
    }

    #[tokio::test]
    async fn test_garbage_after_marker_in_same_chunk() {
        let input = lines(&[r#"data: {"content":"a"}"#, "data: [DONE]", "data: {not json"]);
        assert_eq!(contents(collect(input).await), vec!["a"]);
    }

    #[tokio::test]
    async fn test_malformed_payload_ends_stream() {
        let input = lines(&[
            r#"data: {"content":"a"}"#,
            r#"data: {"content":"b"}"#,
            "data: {oops",
            r#"data: {"content":"c"}"#,
        ]);
        let results = collect(input).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().content, "a");
        assert_eq!(results[1].as_ref().unwrap().content, "b");
        assert!(matches!(results[2], Err(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_a_parse_error() {
        let input = lines(&[r#"data: {"text":"no content field"}"#]);
        let results = collect(input).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ClientError::Parse(_))));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let parts: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from("data: {\"content\":\"a\"}\n")),
            Err(ClientError::Config("connection reset".to_string())),
            Ok(Bytes::from("data: {\"content\":\"b\"}\n")),
        ];
        let results = collect(stream::iter(parts)).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().content, "a");
        assert!(matches!(&results[1], Err(ClientError::Config(m)) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let parts: Vec<Result<Bytes, ClientError>> =
            vec![Ok(Bytes::from_static(b"data: {\"content\":\"\xff\"}\n"))];
        let results = collect(stream::iter(parts)).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ClientError::Utf8(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_outside_data_lines_is_skipped() {
        let parts: Vec<Result<Bytes, ClientError>> = vec![Ok(Bytes::from_static(
            b"data: {\"content\":\"a\"}\n: keep\xffalive\nevent: \xfe\ndata: {\"content\":\"b\"}\ndata: [DONE]\n",
        ))];
        let results = collect(stream::iter(parts)).await;
        assert_eq!(contents(results), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_bare_cr_line_endings() {
        let input = chunks(&["data: {\"content\":\"a\"}\rdata: {\"content\":\"b\"}\rdata: [DONE]\r"]);
        assert_eq!(contents(collect(input).await), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_crlf_split_between_chunks() {
        let input = chunks(&[
            "data: {\"content\":\"a\"}\r",
            "\ndata: {\"content\":\"b\"}\r",
            "\n\r\ndata: [DONE]\r\n",
        ]);
        assert_eq!(contents(collect(input).await), vec!["a", "b"]);
    }

    #[test]
    fn test_line_buffer_mixed_terminators() {
        let mut lines = LineBuffer::default();
        lines.extend(b"one\rtwo\r\nthree\n\rfour");

        let mut found = Vec::new();
        while let Some(line) = lines.next_line() {
            found.push(String::from_utf8(line).unwrap());
        }
        assert_eq!(found, vec!["one", "two", "three", ""]);
        assert_eq!(lines.take_rest(), b"four".to_vec());
    }

    #[tokio::test]
    async fn test_empty_body() {
        assert!(collect(chunks(&[])).await.is_empty());
    }
}
