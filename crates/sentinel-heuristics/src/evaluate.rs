use regex::Regex;
use sentinel_core::types::ChatEvent;
use sentinel_profiles::ResolvedProfile;
use sha2::{Digest, Sha256};

use crate::detectors::{detect_code_patterns, detect_links};
use crate::types::HeuristicResult;

/// Keyword-category field name as returned by [`ResolvedProfile::keyword_categories`]
/// mapped to the key its weight is stored under in `scoring_weights` — the
/// generic `keywords` field folds legacy/general terms into the `general`
/// bucket (spec §4.2).
fn weight_key(field_name: &str) -> &str {
    if field_name == "keywords" {
        "general"
    } else {
        field_name
    }
}

/// Pure scoring function: `(event, ResolvedProfile) -> HeuristicResult`
/// (spec §4.5). No I/O, no shared state — safe to call concurrently from
/// every worker task.
pub fn evaluate(event: &ChatEvent, profile: &ResolvedProfile) -> HeuristicResult {
    let mut reasons = Vec::new();
    let mut trigger_annotations = std::collections::HashMap::new();
    let mut score = 0.0f32;

    if profile.require_forwarded && !event.has_forward {
        return HeuristicResult {
            filtered_out: true,
            content_hash: content_hash(&event.text),
            ..Default::default()
        };
    }

    if event.mentioned {
        reasons.push("mention".to_string());
        score += 1.0;
    }
    if profile.is_vip(event.sender_id) {
        reasons.push("vip".to_string());
        score += 0.8;
    }

    if profile.reaction_threshold > 0 && event.reactions_count >= profile.reaction_threshold {
        reasons.push("reactions".to_string());
        score += 0.4;
    }
    if profile.reply_threshold > 0 && event.replies_count >= profile.reply_threshold {
        reasons.push("replies".to_string());
        score += 0.4;
    }

    for (field_name, keywords) in profile.keyword_categories() {
        if keywords.is_empty() {
            continue;
        }
        let matched = matching_keywords(&event.text, keywords);
        if !matched.is_empty() {
            let category = weight_key(field_name);
            reasons.push(category.to_string());
            let weight = profile.scoring_weights.get(category).copied().unwrap_or(0.6);
            score += weight;
            trigger_annotations.insert(category.to_string(), matched);
        }
    }

    if profile.detect_codes && detect_code_patterns(&event.text) {
        reasons.push("code".to_string());
        score += 1.3;
    }
    if profile.detect_documents && event.media_type.is_document_like() {
        reasons.push("document".to_string());
        score += 0.7;
    }
    if profile.detect_links && detect_links(&event.text) {
        reasons.push("link".to_string());
        score += 0.5;
    }
    if profile.detect_polls && event.media_type.is_poll() {
        reasons.push("poll".to_string());
        score += 1.0;
    }
    if profile.prioritize_pinned && event.is_pinned {
        reasons.push("pinned".to_string());
        score += 1.2;
    }
    if profile.prioritize_admin && event.sender_is_admin {
        reasons.push("admin".to_string());
        score += 0.9;
    }

    HeuristicResult {
        pre_score: score,
        reasons,
        trigger_annotations,
        content_hash: content_hash(&event.text),
        filtered_out: false,
    }
}

/// SHA-256 hex digest of the message text, for dedup tooling (spec §4.5).
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Case-insensitive, escaped-alternation match over `keywords`, returning the
/// subset that matched (for `trigger_annotations`). The combined alternation
/// regex drives the category hit/miss decision; per-keyword regexes identify
/// which terms to annotate.
fn matching_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let pattern = keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
    let Ok(rx) = Regex::new(&format!("(?i){pattern}")) else {
        return Vec::new();
    };
    if !rx.is_match(text) {
        return Vec::new();
    }
    keywords
        .iter()
        .filter(|kw| {
            Regex::new(&format!("(?i){}", regex::escape(kw)))
                .map(|r| r.is_match(text))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::types::MediaKind;

    fn base_event() -> ChatEvent {
        ChatEvent {
            chat_id: -100,
            chat_title: "ops".into(),
            msg_id: 1,
            sender_id: 42,
            sender_name: "alice".into(),
            text: "please review the release notes".into(),
            mentioned: false,
            reactions_count: 0,
            replies_count: 0,
            timestamp: chrono::Utc::now(),
            is_reply: false,
            reply_to_msg_id: None,
            has_media: false,
            media_type: MediaKind::None,
            is_pinned: false,
            has_forward: false,
            forward_from: None,
            sender_is_admin: false,
        }
    }

    fn base_profile() -> ResolvedProfile {
        ResolvedProfile {
            release_keywords: vec!["release".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn mention_adds_fixed_bonus() {
        let mut event = base_event();
        event.mentioned = true;
        let result = evaluate(&event, &ResolvedProfile::default());
        assert_eq!(result.pre_score, 1.0);
        assert!(result.reasons.contains(&"mention".to_string()));
    }

    #[test]
    fn keyword_category_match_adds_weight_and_annotation() {
        let event = base_event();
        let mut profile = base_profile();
        profile.scoring_weights.insert("release".to_string(), 0.6);
        let result = evaluate(&event, &profile);
        assert_eq!(result.pre_score, 0.6);
        assert_eq!(
            result.trigger_annotations.get("release"),
            Some(&vec!["release".to_string()])
        );
    }

    #[test]
    fn require_forwarded_filters_non_forwarded() {
        let event = base_event();
        let mut profile = base_profile();
        profile.require_forwarded = true;
        let result = evaluate(&event, &profile);
        assert!(result.filtered_out);
        assert_eq!(result.pre_score, 0.0);
    }

    #[test]
    fn code_fence_is_detected() {
        let mut event = base_event();
        event.text = "```python\nprint('hi')\n```".to_string();
        let mut profile = ResolvedProfile::default();
        profile.detect_codes = true;
        let result = evaluate(&event, &profile);
        assert!(result.reasons.contains(&"code".to_string()));
    }
}
