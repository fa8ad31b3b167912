//! SSE streaming response parser.
//!
//! Reads a `reqwest::Response` as a byte stream, splits on SSE boundaries
//! (`data: …\n\n`), and decodes each event into a [`StreamDelta`]. Works for
//! both completions (`choices[].text`) and chat completions
//! (`choices[].delta.content`).

use futures::stream::{self, Stream, StreamExt};

use super::errors::ConnectError;
use super::types::{
    ChatChoice, ChatCompletionResponse, ChatMessage, CompletionChoice, CompletionResponse,
    StreamDelta, StreamingChunk,
};

// ─── SSE stream ──────────────────────────────────────────────────────────────

/// Parse an SSE response body into decoded deltas.
///
/// Ends after `data: [DONE]` or when the body ends.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamDelta, ConnectError>> {
    let endpoint = response.url().to_string();
    sse_deltas(endpoint, response.bytes_stream())
}

/// Decode deltas from raw body chunks.
///
/// Chunks are buffered as bytes and only complete events are decoded as
/// UTF-8, so a character split across network reads stays intact.
fn sse_deltas<S, B, E>(
    endpoint: String,
    byte_stream: S,
) -> impl Stream<Item = Result<StreamDelta, ConnectError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        move |(mut byte_stream, mut buffer, done)| {
            let endpoint = endpoint.clone();
            async move {
                if done {
                    return None;
                }
                loop {
                    if let Some(event_end) = find_event_end(&buffer) {
                        let event = take_event(&mut buffer, event_end);

                        match decode_event_bytes(&event) {
                            Ok(EventOutcome::Delta(delta)) => {
                                return Some((Ok(delta), (byte_stream, buffer, false)))
                            }
                            Ok(EventOutcome::Done) => return None,
                            Ok(EventOutcome::Skip) => continue,
                            Err(e) => return Some((Err(e), (byte_stream, buffer, true))),
                        }
                    }

                    match byte_stream.next().await {
                        Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                        Some(Err(e)) => {
                            return Some((
                                Err(ConnectError::Transport {
                                    endpoint: endpoint.clone(),
                                    reason: format!("stream read error: {e}"),
                                }),
                                (byte_stream, buffer, true),
                            ));
                        }
                        None => {
                            // Body ended without a trailing blank line.
                            let tail = std::mem::take(&mut buffer);
                            return match decode_event_bytes(&tail) {
                                Ok(EventOutcome::Delta(delta)) => {
                                    Some((Ok(delta), (byte_stream, buffer, true)))
                                }
                                Ok(_) => None,
                                Err(e) => Some((Err(e), (byte_stream, buffer, true))),
                            };
                        }
                    }
                }
            }
        },
    )
}

/// Find the end of the first complete SSE event (`\n\n` or `\r\n\r\n`).
///
/// Returns the event length and the separator length.
fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find_bytes(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find_bytes(buffer, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Remove the first event and its separator from `buffer`, returning the event.
fn take_event(buffer: &mut Vec<u8>, (end, sep_len): (usize, usize)) -> Vec<u8> {
    let mut event: Vec<u8> = buffer.drain(..end + sep_len).collect();
    event.truncate(end);
    event
}

// ─── Event decoding ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum EventOutcome {
    Delta(StreamDelta),
    Done,
    /// Keep-alive, comment, or a chunk without choices.
    Skip,
}

fn decode_event_bytes(event: &[u8]) -> Result<EventOutcome, ConnectError> {
    let text = std::str::from_utf8(event).map_err(|e| ConnectError::MalformedResponse {
        reason: format!("SSE event is not valid UTF-8: {e}"),
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(EventOutcome::Skip);
    }
    decode_event(text)
}

/// Decode a single SSE event (may contain multiple `data:` lines).
fn decode_event(event: &str) -> Result<EventOutcome, ConnectError> {
    let mut data_content = String::new();

    for line in event.lines() {
        if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
            let data = data.trim();
            if data == "[DONE]" {
                return Ok(EventOutcome::Done);
            }
            data_content.push_str(data);
        }
    }

    if data_content.is_empty() {
        return Ok(EventOutcome::Skip);
    }

    let chunk: StreamingChunk =
        serde_json::from_str(&data_content).map_err(|e| ConnectError::MalformedResponse {
            reason: format!("failed to parse SSE chunk: {e} (data: {data_content})"),
        })?;

    let choice = match chunk.choices.into_iter().next() {
        Some(c) => c,
        None => return Ok(EventOutcome::Skip),
    };

    let text = choice
        .delta
        .and_then(|d| d.content)
        .or(choice.text)
        .unwrap_or_default();

    Ok(EventOutcome::Delta(StreamDelta {
        text,
        finish_reason: choice.finish_reason,
    }))
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Concatenated text and last finish reason of a delta stream.
#[derive(Debug, Default)]
struct Assembled {
    text: String,
    finish_reason: Option<String>,
    deltas: usize,
}

async fn assemble<S>(deltas: S) -> Result<Assembled, ConnectError>
where
    S: Stream<Item = Result<StreamDelta, ConnectError>>,
{
    futures::pin_mut!(deltas);
    let mut assembled = Assembled::default();

    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        assembled.text.push_str(&delta.text);
        if delta.finish_reason.is_some() {
            assembled.finish_reason = delta.finish_reason;
        }
        assembled.deltas += 1;
    }

    if assembled.deltas == 0 {
        return Err(ConnectError::MalformedResponse {
            reason: "stream ended without any choices".into(),
        });
    }
    Ok(assembled)
}

/// Collect a streamed text completion into the non-streaming response shape.
pub async fn collect_completion<S>(deltas: S) -> Result<CompletionResponse, ConnectError>
where
    S: Stream<Item = Result<StreamDelta, ConnectError>>,
{
    let assembled = assemble(deltas).await?;
    Ok(CompletionResponse {
        id: None,
        model: None,
        choices: vec![CompletionChoice {
            index: 0,
            text: assembled.text,
            finish_reason: assembled.finish_reason,
        }],
        usage: None,
    })
}

/// Collect a streamed chat completion into the non-streaming response shape.
pub async fn collect_chat<S>(deltas: S) -> Result<ChatCompletionResponse, ConnectError>
where
    S: Stream<Item = Result<StreamDelta, ConnectError>>,
{
    let assembled = assemble(deltas).await?;
    Ok(ChatCompletionResponse {
        id: None,
        model: None,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::assistant(assembled.text),
            finish_reason: assembled.finish_reason,
        }],
        usage: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str, finish: Option<&str>) -> Result<StreamDelta, ConnectError> {
        Ok(StreamDelta {
            text: text.to_string(),
            finish_reason: finish.map(String::from),
        })
    }

    #[test]
    fn test_decode_chat_delta() {
        let event = r#"data: {"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(
            decode_event(event).unwrap(),
            EventOutcome::Delta(StreamDelta {
                text: "Hel".into(),
                finish_reason: None
            })
        );
    }

    #[test]
    fn test_decode_completion_delta() {
        let event = r#"data: {"choices":[{"index":0,"text":"lo","finish_reason":"stop"}]}"#;
        assert_eq!(
            decode_event(event).unwrap(),
            EventOutcome::Delta(StreamDelta {
                text: "lo".into(),
                finish_reason: Some("stop".into())
            })
        );
    }

    #[test]
    fn test_decode_done_and_keepalive() {
        assert_eq!(decode_event("data: [DONE]").unwrap(), EventOutcome::Done);
        assert_eq!(decode_event(": keep-alive").unwrap(), EventOutcome::Skip);
        assert_eq!(
            decode_event(r#"data: {"choices":[]}"#).unwrap(),
            EventOutcome::Skip
        );
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        let err = decode_event("data: {not json").unwrap_err();
        assert!(matches!(err, ConnectError::MalformedResponse { .. }));
    }

    #[test]
    fn test_find_event_end_handles_crlf() {
        assert_eq!(find_event_end(b"data: a\r\n\r\ndata: b"), Some((7, 4)));
        assert_eq!(find_event_end(b"data: a\n\ndata: b"), Some((7, 2)));
        assert_eq!(find_event_end(b"data: partial"), None);
    }

    #[test]
    fn test_take_event_leaves_remainder() {
        let mut buffer = b"data: a\n\ndata: b".to_vec();
        let end = find_event_end(&buffer).unwrap();
        assert_eq!(take_event(&mut buffer, end), b"data: a");
        assert_eq!(buffer, b"data: b");
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, String>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.to_vec()))
                .collect::<Vec<Result<Vec<u8>, String>>>(),
        )
    }

    #[tokio::test]
    async fn test_character_split_across_chunks_survives() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}llo \u{4e16}\u{754c}\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = body.as_bytes();
        let e_acute = body.find('\u{e9}').unwrap();
        let cjk = body.find('\u{4e16}').unwrap();
        let blank = body.find("\n\n").unwrap();

        let deltas = sse_deltas(
            "test".into(),
            chunks(&[
                &bytes[..e_acute + 1],
                &bytes[e_acute + 1..cjk + 2],
                &bytes[cjk + 2..blank + 1],
                &bytes[blank + 1..],
            ]),
        );
        let resp = collect_chat(deltas).await.unwrap();
        assert_eq!(resp.content(), "h\u{e9}llo \u{4e16}\u{754c}");
    }

    #[tokio::test]
    async fn test_one_byte_chunks_decode_every_event() {
        let body = "data: {\"choices\":[{\"text\":\"caf\u{e9}\"}]}\r\n\r\ndata: {\"choices\":[{\"text\":\" \u{2713}\",\"finish_reason\":\"stop\"}]}\r\n\r\ndata: [DONE]\r\n\r\n";
        let parts: Vec<&[u8]> = body.as_bytes().chunks(1).collect();

        let resp = collect_completion(sse_deltas("test".into(), chunks(&parts)))
            .await
            .unwrap();
        assert_eq!(resp.choices[0].text, "caf\u{e9} \u{2713}");
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_event_is_malformed() {
        let deltas = sse_deltas(
            "test".into(),
            chunks(&[b"data: {\"choices\":[{\"text\":\"\xff\"}]}\n\n"]),
        );
        let err = collect_completion(deltas).await.unwrap_err();
        assert!(matches!(err, ConnectError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let deltas = sse_deltas(
            "test".into(),
            chunks(&[b"data: {\"choices\":[{\"text\":\"end\"}]}"]),
        );
        let resp = collect_completion(deltas).await.unwrap();
        assert_eq!(resp.text(), "end");
    }

    #[tokio::test]
    async fn test_read_error_is_transport() {
        let deltas = sse_deltas(
            "http://localhost:1234/v1/completions".into(),
            stream::iter(vec![Err::<Vec<u8>, String>("connection reset".into())]),
        );
        let err = collect_completion(deltas).await.unwrap_err();
        assert!(matches!(err, ConnectError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_collect_chat_concatenates_deltas() {
        let deltas = stream::iter(vec![
            delta("Use ", None),
            delta("git submodule", None),
            delta("", Some("stop")),
        ]);
        let resp = collect_chat(deltas).await.unwrap();
        assert_eq!(resp.content(), "Use git submodule");
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_collect_completion_trims_via_text() {
        let deltas = stream::iter(vec![delta("  answer", None), delta(" \n", Some("stop"))]);
        let resp = collect_completion(deltas).await.unwrap();
        assert_eq!(resp.text(), "answer");
    }

    #[tokio::test]
    async fn test_collect_empty_stream_is_malformed() {
        let deltas = stream::iter(Vec::<Result<StreamDelta, ConnectError>>::new());
        let err = collect_chat(deltas).await.unwrap_err();
        assert!(matches!(err, ConnectError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_collect_propagates_stream_error() {
        let deltas = stream::iter(vec![
            delta("partial", None),
            Err(ConnectError::Transport {
                endpoint: "http://localhost:1234/v1/chat/completions".into(),
                reason: "reset".into(),
            }),
        ]);
        let err = collect_chat(deltas).await.unwrap_err();
        assert!(matches!(err, ConnectError::Transport { .. }));
    }
}
