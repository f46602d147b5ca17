//! Locating the review JSON inside free-form LLM output.
//!
//! The first `{` starts the candidate; a streaming decoder reads exactly one
//! complete value from there, tracking string literals so braces inside diff
//! text do not confuse it. Only when that fails does the repair pass run:
//! code fences are stripped and common malformations (trailing commas,
//! unquoted bareword values, truncated output) are fixed before decoding once
//! more.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::types::LlmResponse;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("LLM output contains no JSON object")]
    NoObject,
    #[error("could not parse LLM response: {0}")]
    Parse(String),
}

/// Extracts the [`LlmResponse`] from raw LLM stdout.
///
/// # Errors
///
/// Returns [`ExtractError`] when neither the direct decode nor the repaired
/// decode yields a response object. The raw output is logged at `error`
/// level alongside the parser message.
pub fn extract_response(output: &str) -> Result<LlmResponse, ExtractError> {
    let direct = match decode_first_object(output) {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };
    debug!(error = %direct, "direct decode failed, attempting repair");

    let repaired = repair_json(strip_fences(output));
    decode_first_object(&repaired).map_err(|after| {
        error!(error = %direct, repaired_error = %after, raw = %output, "could not extract review JSON");
        match (direct, after) {
            (ExtractError::NoObject, ExtractError::NoObject) => ExtractError::NoObject,
            (first, second) => ExtractError::Parse(format!("{first}; after repair: {second}")),
        }
    })
}

/// Decodes one JSON value starting at the first `{` of `text`.
fn decode_first_object(text: &str) -> Result<LlmResponse, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NoObject)?;
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => {
            serde_json::from_value(value).map_err(|e| ExtractError::Parse(e.to_string()))
        }
        Some(Err(e)) => Err(ExtractError::Parse(e.to_string())),
        None => Err(ExtractError::NoObject),
    }
}

/// Returns the body of the first fenced code block, or the whole text when
/// there is none. An unclosed fence runs to the end of the text.
fn strip_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else { return text.trim() };
    let after_marker = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, …) up to the end of the line.
    let body = match after_marker.find('\n') {
        Some(nl) => &after_marker[nl + 1..],
        None => after_marker,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Best-effort repair of almost-JSON, starting at the first `{`.
///
/// Outside string literals: drops commas directly before `}`/`]`, quotes
/// bareword tokens other than `true`/`false`/`null`, and fixes mismatched
/// closers. At end of input an open string is terminated, a dangling `:` gets
/// `null`, and every open array/object is closed. Scanning stops once the
/// top-level object is complete.
fn repair_json(text: &str) -> String {
    let Some(start) = text.find('{') else { return text.to_owned() };
    let chars: Vec<char> = text[start..].chars().collect();

    let mut out = String::with_capacity(chars.len() + 16);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                pending_comma = None;
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                pending_comma = None;
                stack.push(if c == '{' { '}' } else { ']' });
                out.push(c);
            }
            '}' | ']' => {
                if let Some(idx) = pending_comma.take() {
                    out.remove(idx);
                }
                if stack.contains(&c) {
                    while let Some(closer) = stack.pop() {
                        out.push(closer);
                        if closer == c {
                            break;
                        }
                    }
                }
                if stack.is_empty() {
                    return out;
                }
            }
            ',' => {
                pending_comma = Some(out.len());
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            // Exponent markers (`1e5`) follow a digit and are not barewords.
            c if (c.is_alphabetic() || c == '_')
                && !out.ends_with(|p: char| p.is_ascii_digit() || p == '.') =>
            {
                pending_comma = None;
                let begin = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[begin..i].iter().collect();
                if matches!(word.as_str(), "true" | "false" | "null") {
                    out.push_str(&word);
                } else {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                }
                continue;
            }
            _ => {
                pending_comma = None;
                out.push(c);
            }
        }
        i += 1;
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    if let Some(idx) = pending_comma {
        out.remove(idx);
    }
    if out.trim_end().ends_with(':') {
        out.push_str("null");
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
