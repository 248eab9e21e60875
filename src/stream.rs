use serde::Deserialize;

/// One parsed unit of an OpenAI-style SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text from `choices[0].delta.content`.
    Delta(String),
    /// The `data: [DONE]` sentinel.
    Done,
    /// A `data:` line whose payload failed to parse; carried raw for logging.
    Malformed(String),
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental decoder for newline-delimited `data: {json}` events.
///
/// Network chunks do not align with line boundaries, so the trailing
/// incomplete segment is carried over between `feed` calls. The carry is kept
/// as raw bytes: a chunk may even split a UTF-8 code point and the line is
/// only decoded once its terminating newline has arrived. Whatever is left in
/// the carry when the connection closes is an unterminated fragment and is
/// dropped.
#[derive(Default)]
pub struct SseDecoder {
    carry: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one network chunk and returns the events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.carry.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }
}

/// Decodes one complete, trimmed line. Returns `None` for lines that carry
/// nothing to act on: blanks, non-data lines, and payloads without a content
/// delta (role-only or finish-reason-only events).
fn decode_line(line: &str) -> Option<StreamEvent> {
    if line.is_empty() {
        return None;
    }
    if line == "data: [DONE]" {
        return Some(StreamEvent::Done);
    }
    if !line.starts_with("data:") {
        return None;
    }
    // Two-stage parse: isolate the payload from the first brace, then decode.
    let payload = &line[line.find('{')?..];
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .map(StreamEvent::Delta),
        Err(_) => Some(StreamEvent::Malformed(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n")
    }

    fn collect(decoder: &mut SseDecoder, chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk));
        }
        events
    }

    #[test]
    fn decodes_complete_lines() {
        let mut decoder = SseDecoder::new();
        let input = format!("{}{}data: [DONE]\n", delta_line("Hello"), delta_line("!"));
        let events = decoder.feed(input.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hello".into()),
                StreamEvent::Delta("!".into()),
                StreamEvent::Done,
            ]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_change_events() {
        let input = format!("{}{}data: [DONE]\n", delta_line("Hello"), delta_line("!"));
        let bytes = input.as_bytes();

        let mut whole = SseDecoder::new();
        let expected = whole.feed(bytes);

        // Split the same byte sequence at every possible offset.
        for split in 0..bytes.len() {
            let mut decoder = SseDecoder::new();
            let events = collect(&mut decoder, &[&bytes[..split], &bytes[split..]]);
            assert_eq!(events, expected, "split at byte {split}");
        }
    }

    #[test]
    fn survives_splits_inside_multibyte_chars() {
        let input = delta_line("héllo 世界");
        let bytes = input.as_bytes();
        for split in 0..bytes.len() {
            let mut decoder = SseDecoder::new();
            let events = collect(&mut decoder, &[&bytes[..split], &bytes[split..]]);
            assert_eq!(events, vec![StreamEvent::Delta("héllo 世界".into())], "split at byte {split}");
        }
    }

    #[test]
    fn malformed_payload_is_reported_not_fatal() {
        let mut decoder = SseDecoder::new();
        let input = format!("data: {{not json\n{}", delta_line("ok"));
        let events = decoder.feed(input.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::Malformed("data: {not json".into()),
                StreamEvent::Delta("ok".into()),
            ]
        );
    }

    #[test]
    fn skips_blanks_comments_and_deltaless_payloads() {
        let mut decoder = SseDecoder::new();
        let input = concat!(
            "\n",
            ": keepalive\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data:\n",
        );
        assert!(decoder.feed(input.as_bytes()).is_empty());
    }

    #[test]
    fn trailing_carry_is_never_emitted() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"cut");
        assert!(events.is_empty());
        // The stream ends here; the fragment stays unflushed by design.
    }

    #[test]
    fn handles_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: [DONE]\r\n");
        assert_eq!(events, vec![StreamEvent::Done]);
    }
}
