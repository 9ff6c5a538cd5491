//! Server-sent events framing
//!
//! Only the parts of the event-stream format the bridge uses are handled:
//! `data:` fields (several lines are joined with `\n`), `:` comment lines
//! and blank-line dispatch. `event`, `id` and `retry` fields are accepted
//! and ignored. An event left incomplete at end of stream is discarded.
//!
//! A line that is not valid UTF-8 spoils only the event it belongs to; that
//! event is dispatched as [`SseEvent::Malformed`] and reading carries on.

use std::io::BufRead;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Joined payload of the `data:` lines
    Data(String),
    /// The event contained a line that was not valid UTF-8
    Malformed,
}

/// Incremental line-oriented SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    data: String,
    has_data: bool,
    malformed: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator); returns a completed event payload
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        match self.feed(line) {
            Some(SseEvent::Data(data)) => Some(data),
            _ => None,
        }
    }

    /// Feed one line (without its terminator); returns a completed event
    pub fn feed(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data.push_str(value);
            self.data.push('\n');
            self.has_data = true;
        }
        None
    }

    /// Record a line that could not be decoded; the pending event is dropped
    pub fn feed_invalid_line(&mut self) {
        self.malformed = true;
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let malformed = std::mem::take(&mut self.malformed);
        let has_data = std::mem::take(&mut self.has_data);
        let mut data = std::mem::take(&mut self.data);

        if malformed {
            return Some(SseEvent::Malformed);
        }
        if !has_data {
            return None;
        }
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseEvent::Data(data))
    }
}

/// Iterator over events read from a buffered byte stream
///
/// Only I/O failures end the iteration with an error.
pub struct SseEvents<R: BufRead> {
    reader: R,
    parser: SseParser,
    line: Vec<u8>,
}

impl<R: BufRead> SseEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: SseParser::new(),
            line: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for SseEvents<R> {
    type Item = std::io::Result<SseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let bytes = self.line.strip_suffix(b"\n").unwrap_or(&self.line[..]);
                    let event = match std::str::from_utf8(bytes) {
                        Ok(line) => self.parser.feed(line),
                        Err(e) => {
                            tracing::warn!("Invalid UTF-8 in stream line: {}", e);
                            self.parser.feed_invalid_line();
                            None
                        }
                    };
                    if let Some(event) = event {
                        return Some(Ok(event));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<String> {
        SseEvents::new(input.as_bytes())
            .filter_map(|r| match r.unwrap() {
                SseEvent::Data(data) => Some(data),
                SseEvent::Malformed => None,
            })
            .collect()
    }

    #[test]
    fn test_single_events() {
        let events = collect("data: {\"heartbeat\": true}\n\ndata: {\"rms\": 0.1}\n\n");
        assert_eq!(events, vec![r#"{"heartbeat": true}"#, r#"{"rms": 0.1}"#]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let events = collect(": keep-alive\r\ndata:{\"rms\":1}\r\n\r\n");
        assert_eq!(events, vec![r#"{"rms":1}"#]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let events = collect("data: {\"rms\":\ndata: 0.5}\n\n");
        assert_eq!(events, vec!["{\"rms\":\n0.5}"]);
    }

    #[test]
    fn test_other_fields_ignored() {
        let events = collect("event: sample\nid: 4\nretry: 1000\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        assert!(collect("\n\n: only a comment\n\n").is_empty());
    }

    #[test]
    fn test_incomplete_event_discarded_at_eof() {
        let events = collect("data: first\n\ndata: second\n");
        assert_eq!(events, vec!["first"]);
    }

    #[test]
    fn test_invalid_utf8_spoils_only_its_event() {
        let input: &[u8] = b"data: {\"rms\": 0.1}\n\ndata: {\"rms\": \xff}\n\ndata: {\"rms\": 0.3}\n\n";
        let events: Vec<SseEvent> = SseEvents::new(input).map(|r| r.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                SseEvent::Data(r#"{"rms": 0.1}"#.to_string()),
                SseEvent::Malformed,
                SseEvent::Data(r#"{"rms": 0.3}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_comment_line_drops_following_event() {
        let input: &[u8] = b": \xfe\xfe\ndata: lost\n\ndata: kept\n\n";
        let events: Vec<SseEvent> = SseEvents::new(input).map(|r| r.unwrap()).collect();
        assert_eq!(
            events,
            vec![SseEvent::Malformed, SseEvent::Data("kept".to_string())]
        );
    }
}
