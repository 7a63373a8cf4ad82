//! Tolerant JSON extraction from free-form model output.
//!
//! Strategies run strictly in order and the first one yielding a JSON
//! *object* wins:
//! 1. direct parse of the whole text
//! 2. the interior of a ```` ```json ```` fence, with structural repair when
//!    the interior is truncated
//! 3. the greedy span from the first `{` to the last `}`
//!
//! Running out of strategies is not an error: the caller gets `None` and
//! substitutes a fallback template.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// One extraction strategy: raw model text in, object out (or nothing).
pub type Strategy = fn(&str) -> Option<JsonObject>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    DirectParse,
    FencedBlock,
    BraceSpan,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::DirectParse => "direct_parse",
            ExtractionMethod::FencedBlock => "fenced_block",
            ExtractionMethod::BraceSpan => "brace_span",
        }
    }
}

/// Ordered strategy table.
pub const STRATEGIES: [(ExtractionMethod, Strategy); 3] = [
    (ExtractionMethod::DirectParse, direct_parse),
    (ExtractionMethod::FencedBlock, fenced_block),
    (ExtractionMethod::BraceSpan, brace_span),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub object: JsonObject,
    pub method: ExtractionMethod,
}

/// Run the strategies in order, stopping at the first object found.
pub fn extract_object(raw: &str) -> Option<Extraction> {
    for (method, strategy) in STRATEGIES {
        if let Some(object) = strategy(raw) {
            tracing::debug!("extract: {} succeeded ({} keys)", method.as_str(), object.len());
            return Some(Extraction { object, method });
        }
        tracing::debug!("extract: {} found nothing", method.as_str());
    }
    tracing::warn!("extract: no JSON object in {} bytes of model output", raw.len());
    None
}

fn parse_object(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

// ── Strategy 1 ──────────────────────────────────────────────────────────────

pub fn direct_parse(raw: &str) -> Option<JsonObject> {
    parse_object(raw.trim())
}

// ── Strategy 2 ──────────────────────────────────────────────────────────────

// An unterminated fence runs to the end of the text (output cut at the token limit).
static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?i:json)\s*(.*?)\s*(?:```|\z)").expect("fence pattern is valid")
});

pub fn fenced_block(raw: &str) -> Option<JsonObject> {
    let interior = JSON_FENCE.captures(raw)?.get(1)?.as_str().trim();
    if interior.is_empty() {
        return None;
    }
    if let Some(object) = parse_object(interior) {
        return Some(object);
    }

    let repaired = repair_truncated(interior);
    tracing::debug!(
        "extract: fenced interior did not parse, repaired {} -> {} bytes",
        interior.len(),
        repaired.len()
    );
    parse_object(&repaired)
}

// ── Strategy 3 ──────────────────────────────────────────────────────────────

pub fn brace_span(raw: &str) -> Option<JsonObject> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    parse_object(&raw[start..=end])
}

// ── Brace-balancing repair ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Position inside the innermost open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Object: expecting a key (after `{` or `,`).
    Key,
    /// Object: key read, expecting `:`.
    Colon,
    /// Expecting a value (object after `:`, array after `[` or `,`).
    Value,
    /// A value is complete; expecting `,` or the closer.
    Next,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    container: Container,
    slot: Slot,
}

fn value_done(stack: &mut [Frame]) {
    if let Some(top) = stack.last_mut() {
        top.slot = Slot::Next;
    }
}

/// Close a JSON document that was cut off mid-stream.
///
/// Closes an open string, completes a cut scalar, drops a dangling comma,
/// supplies `null` for a key that lost its value, then closes every open
/// container innermost first. Text that is already balanced comes back
/// unchanged apart from trailing whitespace.
pub fn repair_truncated(text: &str) -> String {
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escaped = false;
    let mut scalar_start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if string_is_key {
                    if let Some(top) = stack.last_mut() {
                        top.slot = Slot::Colon;
                    }
                } else {
                    value_done(&mut stack);
                }
            }
            continue;
        }

        if scalar_start.is_some() && (c.is_whitespace() || matches!(c, ',' | '}' | ']' | ':')) {
            scalar_start = None;
            value_done(&mut stack);
        }

        match c {
            '{' => stack.push(Frame { container: Container::Object, slot: Slot::Key }),
            '[' => stack.push(Frame { container: Container::Array, slot: Slot::Value }),
            '}' | ']' => {
                stack.pop();
                value_done(&mut stack);
            }
            '"' => {
                in_string = true;
                string_is_key = matches!(
                    stack.last(),
                    Some(Frame { container: Container::Object, slot: Slot::Key })
                );
            }
            ':' => {
                if let Some(top) = stack.last_mut() {
                    if top.slot == Slot::Colon {
                        top.slot = Slot::Value;
                    }
                }
            }
            ',' => {
                if let Some(top) = stack.last_mut() {
                    top.slot = match top.container {
                        Container::Object => Slot::Key,
                        Container::Array => Slot::Value,
                    };
                }
            }
            c if c.is_whitespace() => {}
            _ => {
                if scalar_start.is_none() {
                    scalar_start = Some(i);
                }
            }
        }
    }

    let mut out = text.to_string();

    if in_string {
        if escaped {
            out.pop();
        } else {
            drop_partial_unicode_escape(&mut out);
        }
        out.push('"');
        if string_is_key {
            out.push_str(": null");
        }
        value_done(&mut stack);
    } else if let Some(start) = scalar_start {
        let completed = complete_scalar(&out[start..]);
        out.truncate(start);
        out.push_str(&completed);
        value_done(&mut stack);
    } else {
        out.truncate(out.trim_end().len());
        match stack.last().map(|f| (f.container, f.slot)) {
            Some((Container::Object, Slot::Colon)) => out.push_str(": null"),
            Some((Container::Object, Slot::Value)) => out.push_str("null"),
            Some((_, Slot::Key)) | Some((_, Slot::Value)) => {
                if out.ends_with(',') {
                    out.pop();
                }
            }
            _ => {}
        }
    }

    for frame in stack.iter().rev() {
        out.push(match frame.container {
            Container::Object => '}',
            Container::Array => ']',
        });
    }
    out
}

/// Finish a bare token cut mid-way: literal prefixes become the literal,
/// numbers missing their final digit get one.
fn complete_scalar(token: &str) -> String {
    for literal in ["true", "false", "null"] {
        if literal.starts_with(token) {
            return literal.to_string();
        }
    }
    if token.ends_with(['-', '+', '.', 'e', 'E']) {
        return format!("{token}0");
    }
    token.to_string()
}

/// Remove a `\uXX` escape that lost some of its four hex digits.
fn drop_partial_unicode_escape(out: &mut String) {
    let Some(pos) = out.rfind("\\u") else {
        return;
    };
    let hex = &out[pos + 2..];
    if hex.len() >= 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return;
    }
    // An even run of backslashes means the `\` before `u` is itself escaped.
    let run = out[..=pos].chars().rev().take_while(|&c| c == '\\').count();
    if run % 2 == 1 {
        out.truncate(pos);
    }
}
