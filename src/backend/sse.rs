//! Server-sent-event line handling shared by the OpenAI-shaped adapters.

use tokio::sync::mpsc;

use crate::api::ChatResponse;
use crate::backend::StreamEvent;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamEvent>) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamEvent::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.first() {
                if let Some(content) = &choice.delta.content {
                    let _ = tx.send(StreamEvent::Chunk(content.clone()));
                }
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }
            let _ = tx.send(StreamEvent::Error(format_api_error(payload)));
            let _ = tx.send(StreamEvent::End);
            true
        }
    }
}

/// Feed one SSE line into the event channel. Returns true when the stream
/// is finished (either `[DONE]` or an error payload).
pub(crate) fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamEvent>) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Make an API error body readable: JSON is prettified with its message
/// lifted into the first line, everything else passes through fenced.
pub(crate) fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API error: <empty body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API error: {summary}");
            }
        }
        if let Ok(pretty) = serde_json::to_string_pretty(&json_value) {
            return format!("API error:\n{pretty}");
        }
    }

    format!("API error: {trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_line_spacing_variants_parse() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!process_sse_line(
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            &tx
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StreamEvent::Chunk(text) if text == "Hello"
        ));

        assert!(!process_sse_line(
            r#"data:{"choices":[{"delta":{"content":"World"}}]}"#,
            &tx
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StreamEvent::Chunk(text) if text == "World"
        ));

        assert!(process_sse_line("data: [DONE]", &tx));
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::End));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!process_sse_line("event: ping", &tx));
        assert!(!process_sse_line("", &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_payload_terminates_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(process_sse_line(
            r#"data: {"error":{"message":"internal server error"}}"#,
            &tx
        ));
        match rx.try_recv().unwrap() {
            StreamEvent::Error(text) => {
                assert_eq!(text, "API error: internal server error")
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::End));
    }

    #[test]
    fn format_api_error_lifts_summary() {
        let raw = r#"{"error":{"message":"model   overloaded","type":"x"}}"#;
        assert_eq!(format_api_error(raw), "API error: model overloaded");
        assert_eq!(format_api_error("plain failure"), "API error: plain failure");
        assert_eq!(format_api_error("  "), "API error: <empty body>");
    }
}
