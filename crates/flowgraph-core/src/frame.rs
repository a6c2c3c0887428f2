//! Marker frames embedded in a process's standard output.
//!
//! A frame is a block of JSON wrapped in a kind-specific pair of sentinel
//! lines:
//!
//! ```text
//! ---GRAPH_STRUCTURE_BEGIN---
//! { ...pretty-printed JSON... }
//! ---GRAPH_STRUCTURE_END---
//! ```
//!
//! Sentinels must sit on their own line (a trailing `\r` from a PTY is
//! tolerated) and the first end sentinel after a begin sentinel closes the
//! frame. Extraction is a pure function of the buffer, so it can be polled
//! on every append to a growing stream.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// The kinds of frame the host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// The extracted [`crate::PipelineGraph`].
    Graph,
    /// An arbitrary timings report emitted by the target program.
    Timings,
}

impl FrameKind {
    /// The begin sentinel line, without the line break.
    pub fn begin(self) -> &'static str {
        match self {
            FrameKind::Graph => "---GRAPH_STRUCTURE_BEGIN---",
            FrameKind::Timings => "---TIMINGS_JSON_BEGIN---",
        }
    }

    /// The end sentinel line, without the line break.
    pub fn end(self) -> &'static str {
        match self {
            FrameKind::Graph => "---GRAPH_STRUCTURE_END---",
            FrameKind::Timings => "---TIMINGS_JSON_END---",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            FrameKind::Graph => &GRAPH_FRAME,
            FrameKind::Timings => &TIMINGS_FRAME,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Graph => write!(f, "graph"),
            FrameKind::Timings => write!(f, "timings"),
        }
    }
}

impl std::str::FromStr for FrameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graph" => Ok(FrameKind::Graph),
            "timings" => Ok(FrameKind::Timings),
            other => Err(format!("unknown frame kind '{}', expected graph/timings", other)),
        }
    }
}

fn frame_regex(kind: FrameKind) -> Regex {
    let pattern = format!(
        r"(?m)^{begin}[ \t]*\r?$(?s:(.*?))^{end}[ \t]*\r?$",
        begin = regex::escape(kind.begin()),
        end = regex::escape(kind.end()),
    );
    Regex::new(&pattern).expect("invalid frame regex")
}

static GRAPH_FRAME: LazyLock<Regex> = LazyLock::new(|| frame_regex(FrameKind::Graph));
static TIMINGS_FRAME: LazyLock<Regex> = LazyLock::new(|| frame_regex(FrameKind::Timings));

/// Returns the decoded payload of the first complete `kind` frame in
/// `buffer` that decodes as `T`.
///
/// Incomplete frames and payloads that fail to decode are treated as absent;
/// this never fails.
pub fn extract_frame<T: DeserializeOwned>(buffer: &str, kind: FrameKind) -> Option<T> {
    FrameScanner::new(kind).poll(buffer)
}

/// Incremental frame detection over an append-only buffer.
///
/// Each [`poll`](Self::poll) only looks at complete lines it has not seen
/// before (plus the unterminated last line), so polling after every append
/// costs time proportional to the appended text. The result of a poll is
/// the same as [`extract_frame`] on the whole buffer.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    kind: FrameKind,
    /// Start of the first line not yet consumed.
    scanned: usize,
    /// Payload start of the frame opened by the earliest pending begin line.
    open: Option<usize>,
}

impl FrameScanner {
    pub fn new(kind: FrameKind) -> Self {
        FrameScanner {
            kind,
            scanned: 0,
            open: None,
        }
    }

    /// Scans what was appended to `buffer` since the last poll. `buffer` must
    /// extend the one passed previously.
    pub fn poll<T: DeserializeOwned>(&mut self, buffer: &str) -> Option<T> {
        let tail = buffer.get(self.scanned..)?;
        let mut line_start = self.scanned;
        for line in tail.split_inclusive('\n') {
            let line_end = line_start + line.len();
            if !line.ends_with('\n') {
                // Unterminated: may still grow, so it is checked but not consumed.
                return match self.open {
                    Some(start) if is_sentinel(line, self.kind.end()) => {
                        decode(&buffer[start..line_start])
                    }
                    _ => None,
                };
            }
            self.scanned = line_end;
            match self.open {
                None if is_sentinel(line, self.kind.begin()) => self.open = Some(line_end),
                Some(start) if is_sentinel(line, self.kind.end()) => {
                    self.open = None;
                    if let Some(value) = decode(&buffer[start..line_start]) {
                        return Some(value);
                    }
                }
                _ => {}
            }
            line_start = line_end;
        }
        None
    }
}

/// Whether `line` is `sentinel` alone on its line, allowing trailing blanks
/// and a `\r` before the break.
fn is_sentinel(line: &str, sentinel: &str) -> bool {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    line.trim_end_matches([' ', '\t']) == sentinel
}

fn decode<T: DeserializeOwned>(payload: &str) -> Option<T> {
    serde_json::from_str(payload.trim()).ok()
}

/// Removes every complete `kind` frame, sentinels included, from `buffer`.
pub fn strip_frames(buffer: &str, kind: FrameKind) -> String {
    kind.pattern().replace_all(buffer, "").into_owned()
}

/// Wraps an already-encoded payload in `kind`'s sentinel lines.
pub fn wrap_frame(kind: FrameKind, payload: &str) -> String {
    format!("{}\n{}\n{}\n", kind.begin(), payload, kind.end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, PipelineGraph, Position};
    use proptest::prelude::*;

    fn sample_graph() -> PipelineGraph {
        let mut g = PipelineGraph::new();
        g.push_node(GraphNode {
            id: "start".into(),
            label: "start".into(),
            prompt: "Say hi to {name}\nthen stop".into(),
            ..Default::default()
        });
        g.push_edge("start", "output");
        g
    }

    #[test]
    fn extracts_frame_embedded_in_noise() {
        let g = sample_graph();
        let buffer = format!(
            "booting...\n{}more output\n",
            wrap_frame(FrameKind::Graph, &serde_json::to_string_pretty(&g).unwrap())
        );
        let decoded: PipelineGraph = extract_frame(&buffer, FrameKind::Graph).unwrap();
        assert_eq!(decoded, g);
    }

    #[test]
    fn partial_frame_is_absent_until_closed() {
        let payload = serde_json::to_string_pretty(&sample_graph()).unwrap();
        let mut buffer = format!("{}\n{}", FrameKind::Graph.begin(), payload);
        assert!(extract_frame::<PipelineGraph>(&buffer, FrameKind::Graph).is_none());
        assert!(extract_frame::<PipelineGraph>(&buffer, FrameKind::Graph).is_none());

        buffer.push('\n');
        buffer.push_str(FrameKind::Graph.end());
        buffer.push('\n');
        assert!(extract_frame::<PipelineGraph>(&buffer, FrameKind::Graph).is_some());
    }

    #[test]
    fn undecodable_payload_is_absent() {
        let buffer = wrap_frame(FrameKind::Graph, "{ not json");
        assert!(extract_frame::<PipelineGraph>(&buffer, FrameKind::Graph).is_none());
    }

    #[test]
    fn first_decodable_frame_wins() {
        let buffer = format!(
            "{}{}{}",
            wrap_frame(FrameKind::Timings, "garbage"),
            wrap_frame(FrameKind::Timings, r#"{"total": 1.5}"#),
            wrap_frame(FrameKind::Timings, r#"{"total": 9.0}"#),
        );
        let value: serde_json::Value = extract_frame(&buffer, FrameKind::Timings).unwrap();
        assert_eq!(value["total"], 1.5);
    }

    #[test]
    fn closes_on_first_end_sentinel() {
        let buffer = format!(
            "{}\n{{\"a\": 1}}\n{}\n{{\"b\": 2}}\n{}\n",
            FrameKind::Timings.begin(),
            FrameKind::Timings.end(),
            FrameKind::Timings.end(),
        );
        let value: serde_json::Value = extract_frame(&buffer, FrameKind::Timings).unwrap();
        assert_eq!(value, serde_json::json!({ "a": 1 }));
    }

    #[test]
    fn sentinels_must_be_line_anchored() {
        let buffer = format!(
            "echo {}\n{{}}\n{}\n",
            FrameKind::Timings.begin(),
            FrameKind::Timings.end()
        );
        assert!(extract_frame::<serde_json::Value>(&buffer, FrameKind::Timings).is_none());
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let buffer = format!(
            "{}\r\n{{\"ok\": true}}\r\n{}\r\n",
            FrameKind::Timings.begin(),
            FrameKind::Timings.end()
        );
        let value: serde_json::Value = extract_frame(&buffer, FrameKind::Timings).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn kinds_do_not_cross() {
        let buffer = wrap_frame(FrameKind::Timings, "{}");
        assert!(extract_frame::<serde_json::Value>(&buffer, FrameKind::Graph).is_none());
    }

    #[test]
    fn strip_removes_only_complete_frames_of_kind() {
        let buffer = format!(
            "hello\n{}{}bye\n{}\n",
            wrap_frame(FrameKind::Graph, "{}"),
            wrap_frame(FrameKind::Timings, "{}"),
            FrameKind::Graph.begin(),
        );
        let stripped = strip_frames(&buffer, FrameKind::Graph);
        assert!(!stripped.contains(FrameKind::Graph.end()));
        assert!(stripped.contains(FrameKind::Timings.begin()));
        // the dangling begin sentinel has no end and stays
        assert!(stripped.contains(FrameKind::Graph.begin()));

        let stripped = strip_frames(&stripped, FrameKind::Timings);
        assert_eq!(stripped.trim(), format!("hello\n\n\nbye\n{}", FrameKind::Graph.begin()));
    }

    #[test]
    fn scanner_polls_growing_buffer() {
        let frame = wrap_frame(FrameKind::Timings, r#"{"total": 2.0}"#);
        let mut scanner = FrameScanner::new(FrameKind::Timings);
        let mut buffer = String::from("noise\n");
        assert!(scanner.poll::<serde_json::Value>(&buffer).is_none());

        let (head, tail) = frame.split_at(frame.len() - 5);
        buffer.push_str(head);
        assert!(scanner.poll::<serde_json::Value>(&buffer).is_none());
        buffer.push_str(tail);
        let value: serde_json::Value = scanner.poll(&buffer).unwrap();
        assert_eq!(value["total"], 2.0);
    }

    #[test]
    fn scanner_skips_consumed_lines() {
        let mut scanner = FrameScanner::new(FrameKind::Graph);
        let mut buffer = format!("{}\n", FrameKind::Graph.end());
        for _ in 0..3 {
            buffer.push_str("plain output line\n");
            assert!(scanner.poll::<serde_json::Value>(&buffer).is_none());
            assert_eq!(scanner.scanned, buffer.len());
        }
        assert!(scanner.open.is_none());
    }

    #[test]
    fn scanner_recovers_after_undecodable_frame() {
        let mut scanner = FrameScanner::new(FrameKind::Timings);
        let mut buffer = wrap_frame(FrameKind::Timings, "{ broken");
        assert!(scanner.poll::<serde_json::Value>(&buffer).is_none());
        buffer.push_str(&wrap_frame(FrameKind::Timings, "[1]"));
        let value: serde_json::Value = scanner.poll(&buffer).unwrap();
        assert_eq!(value, serde_json::json!([1]));
    }

    #[test]
    fn end_sentinel_without_final_newline_closes() {
        let buffer = format!("{}\n{{}}\n{}", FrameKind::Graph.begin(), FrameKind::Graph.end());
        assert!(extract_frame::<serde_json::Value>(&buffer, FrameKind::Graph).is_some());
        let mut partial = format!("{}\n{{}}\n---GRAPH_STRUCTURE_E", FrameKind::Graph.begin());
        let mut scanner = FrameScanner::new(FrameKind::Graph);
        assert!(scanner.poll::<serde_json::Value>(&partial).is_none());
        partial.push_str("ND---\n");
        assert!(scanner.poll::<serde_json::Value>(&partial).is_some());
    }

    #[test]
    fn frame_kind_parses_from_str() {
        assert_eq!("graph".parse::<FrameKind>().unwrap(), FrameKind::Graph);
        assert!("nope".parse::<FrameKind>().is_err());
    }

    fn arb_node() -> impl Strategy<Value = GraphNode> {
        (
            "[a-z_]{1,8}",
            ".{0,40}",
            proptest::collection::vec("[a-z]{1,6}", 0..3),
            ".{0,60}",
            "[a-z0-9-]{0,12}",
            0u16..50,
        )
            .prop_map(|(id, docstring, args, prompt, model, k)| GraphNode {
                label: id.clone(),
                id,
                docstring,
                function_arguments: args,
                prompt,
                model,
                position: Position {
                    x: f64::from(k) * 250.0,
                    y: f64::from(k) * 100.0,
                },
            })
    }

    proptest! {
        #[test]
        fn graph_round_trips_through_frame(
            nodes in proptest::collection::vec(arb_node(), 0..5),
            edges in proptest::collection::vec(("[a-z]{1,5}", "[a-z]{1,5}"), 0..5),
            prefix in "[a-zA-Z0-9 ]{0,20}",
        ) {
            let mut g = PipelineGraph::new();
            for n in nodes {
                g.push_node(n);
            }
            for (s, t) in edges {
                g.push_edge(s, t);
            }
            let text = format!(
                "{}\n{}",
                prefix,
                wrap_frame(FrameKind::Graph, &serde_json::to_string_pretty(&g).unwrap())
            );
            let decoded: Option<PipelineGraph> = extract_frame(&text, FrameKind::Graph);
            prop_assert_eq!(decoded, Some(g));
        }

        #[test]
        fn chunked_polls_agree_with_pattern(
            lines in proptest::collection::vec(
                prop_oneof![
                    Just(FrameKind::Timings.begin().to_string()),
                    Just(FrameKind::Timings.end().to_string()),
                    Just(format!("{} \r", FrameKind::Timings.end())),
                    Just("[1]".to_string()),
                    Just("{\"a\": 2}".to_string()),
                    Just("not json {".to_string()),
                    Just("noise".to_string()),
                ],
                0..12,
            ),
            trailing_newline in any::<bool>(),
            cuts in proptest::collection::vec(0usize..200, 0..6),
        ) {
            let mut text = lines.join("\n");
            if trailing_newline {
                text.push('\n');
            }
            let expected: Option<serde_json::Value> = FrameKind::Timings
                .pattern()
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1))
                .find_map(|p| serde_json::from_str(p.as_str().trim()).ok());

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(text.len())).collect();
            cuts.sort_unstable();
            cuts.push(text.len());
            let mut scanner = FrameScanner::new(FrameKind::Timings);
            let mut found = None;
            for cut in cuts {
                if let Some(v) = scanner.poll::<serde_json::Value>(&text[..cut]) {
                    found = Some(v);
                    break;
                }
            }
            prop_assert_eq!(found, expected);
        }
    }
}
