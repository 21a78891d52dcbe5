//! Renders a ranked candidate list into plain-text digest chunks. The
//! platform abstraction doesn't promise rich text, so entries use a plain
//! `[title](link)` convention rather than a specific chat client's markup;
//! chunks are split on newline boundaries so a single long entry is never
//! cut mid-line.

use sentinel_core::config::Schedule;
use sentinel_store::StoredMessage;

const MAX_CHUNK_CHARS: usize = 4096;
const PREVIEW_CHARS: usize = 240;

fn link(chat_id: i64, msg_id: i64) -> String {
    format!("msg://{chat_id}/{msg_id}")
}

fn preview(text: &str) -> String {
    let collapsed = text.replace('\n', " ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}\u{2026}")
    }
}

fn entry_block(msg: &StoredMessage) -> String {
    let title = if msg.chat_title.is_empty() {
        format!("chat {}", msg.chat_id)
    } else {
        msg.chat_title.clone()
    };
    let triggers = if msg.triggers.is_empty() { String::new() } else { format!(" · {}", msg.triggers) };
    format!(
        "• [{title}]({}) — {}\n  {}\n  score {:.2}{triggers}\n",
        link(msg.chat_id, msg.msg_id),
        msg.sender_name,
        preview(&msg.message_text),
        msg.effective_score(),
    )
}

/// Render `entries` into one or more chunks, each at most
/// [`MAX_CHUNK_CHARS`] long, split only at line boundaries. A single
/// oversized line (longer than the limit on its own) is emitted whole
/// rather than corrupted by a mid-line cut.
pub fn format_digest(schedule: Schedule, entries: &[StoredMessage]) -> Vec<String> {
    let header = format!("{} digest — {} message(s)\n\n", schedule.as_str(), entries.len());
    let mut lines: Vec<String> = header.lines().map(str::to_string).collect();
    for entry in entries {
        lines.push(String::new());
        lines.extend(entry_block(entry).lines().map(str::to_string));
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in lines {
        let addition_len = line.len() + 1;
        if !current.is_empty() && current.len() + addition_len > MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&line);
        current.push('\n');
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(header);
    }

    if chunks.len() > 1 {
        let total = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| format!("[Part {}/{total}]\n{chunk}", i + 1))
            .collect()
    } else {
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_store::SemanticType;

    fn message(msg_id: i64, text: &str) -> StoredMessage {
        StoredMessage {
            chat_id: -100,
            msg_id,
            content_hash: "h".to_string(),
            score: 5.0,
            keyword_score: 5.0,
            semantic_scores: Default::default(),
            semantic_type: SemanticType::None,
            alerted: false,
            feed_alert_flag: true,
            feed_interest_flag: false,
            chat_title: "ops".to_string(),
            sender_name: "alice".to_string(),
            sender_id: 1,
            message_text: text.to_string(),
            triggers: "security".to_string(),
            trigger_annotations: Default::default(),
            matched_profiles: vec!["p1".to_string()],
            digest_schedule: "hourly".to_string(),
            digest_processed: false,
            created_at: "2026-01-01T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn single_chunk_has_no_part_label() {
        let chunks = format_digest(Schedule::Hourly, &[message(1, "deploy failed")]);
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].starts_with("[Part"));
        assert!(chunks[0].contains("msg://-100/1"));
    }

    #[test]
    fn chunks_never_exceed_the_limit() {
        let entries: Vec<_> = (0..200).map(|i| message(i, &"x".repeat(100))).collect();
        let chunks = format_digest(Schedule::Hourly, &entries);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_CHUNK_CHARS + 64, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn multi_chunk_output_is_labeled() {
        let entries: Vec<_> = (0..200).map(|i| message(i, &"x".repeat(100))).collect();
        let chunks = format_digest(Schedule::Hourly, &entries);
        assert!(chunks[0].starts_with("[Part 1/"));
    }
}
