//! Tolerant parser for the target LLM's JSON decision (`§4.2` step 5, `§9`).
//!
//! The cleaning pipeline is deliberately linear and each step is unit-tested in isolation,
//! per the spec's design note: strip `<think>` blocks, unwrap a Markdown code fence, regex
//! out the first `{...}` block, then `serde_json::from_str`.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::game::GameAction;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDecision {
    pub reasoning: String,
    pub actions: Vec<GameAction>,
    pub chat: Option<String>,
    pub speak: Option<String>,
    /// Action objects that carried an unrecognised `type` or uncoercible fields — kept so the
    /// caller can log them (`§4.2`: "unknown action types are logged and skipped").
    pub dropped_action_types: Vec<String>,
}

impl ParsedDecision {
    /// `§4.2` step 6: "no actions and no chat" counts as empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.chat.as_deref().unwrap_or("").is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    actions: Vec<Value>,
    #[serde(default)]
    chat: Option<String>,
    #[serde(default)]
    speak: Option<String>,
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap())
}

fn first_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

/// Step 1: remove `<think>...</think>` reasoning blocks some models prepend.
pub fn strip_think_blocks(raw: &str) -> String {
    think_block_re().replace_all(raw, "").into_owned()
}

/// Step 2: if the text contains a fenced code block, keep only its contents; otherwise
/// pass the text through unchanged (the reply may already be bare JSON).
pub fn unwrap_code_fence(text: &str) -> String {
    match fenced_block_re().captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_else(|| text.to_string()),
        None => text.to_string(),
    }
}

/// Step 3: extract the first balanced-looking `{...}` span out of surrounding prose.
/// Uses a greedy regex (first `{` to last `}`), which is correct as long as the model
/// doesn't emit two independent JSON objects in one reply.
pub fn extract_first_object(text: &str) -> Option<&str> {
    first_object_re().find(text).map(|m| m.as_str())
}

/// Full pipeline: clean, parse, coerce. Returns `None` only when no JSON object could be
/// located or parsed at all; a structurally valid object with bogus fields still produces
/// a `ParsedDecision` (possibly empty).
pub fn parse_decision(raw: &str) -> Option<ParsedDecision> {
    let stripped = strip_think_blocks(raw);
    let unwrapped = unwrap_code_fence(&stripped);
    let object_text = extract_first_object(&unwrapped)?;
    let raw_decision: RawDecision = serde_json::from_str(object_text).ok()?;

    let mut actions = Vec::new();
    let mut dropped_action_types = Vec::new();
    for action_value in &raw_decision.actions {
        match GameAction::from_value(action_value) {
            Some(action) => actions.push(action),
            None => {
                let tag = action_value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("<missing-type>")
                    .to_string();
                dropped_action_types.push(tag);
            }
        }
    }

    Some(ParsedDecision {
        reasoning: raw_decision.reasoning,
        actions,
        chat: raw_decision.chat.filter(|s| !s.is_empty()),
        speak: raw_decision.speak.filter(|s| !s.is_empty()),
        dropped_action_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Plan: let's explore.\n```json\n{\"reasoning\":\"go\",\"actions\":[{\"type\":\"move-to\",\"x\":\"10\",\"y\":64,\"z\":20}],\"chat\":null,\"speak\":null}\n```";

    #[test]
    fn s6_malformed_llm_reply_extracts_move_to_after_coercion() {
        let decision = parse_decision(SAMPLE).expect("should parse");
        assert_eq!(decision.reasoning, "go");
        assert_eq!(decision.actions, vec![GameAction::MoveTo { x: 10.0, y: 64.0, z: 20.0 }]);
        assert_eq!(decision.chat, None);
        assert_eq!(decision.speak, None);
        let tags: Vec<&str> = decision.actions.iter().map(|a| a.type_tag()).collect();
        assert_eq!(tags, vec!["move-to"]);
    }

    #[test]
    fn strips_think_blocks() {
        let raw = "<think>hmm let me consider</think>{\"reasoning\":\"x\",\"actions\":[]}";
        let cleaned = strip_think_blocks(raw);
        assert!(!cleaned.contains("<think>"));
        assert!(cleaned.contains("reasoning"));
    }

    #[test]
    fn unwraps_fence_when_present() {
        let text = "```json\n{\"a\":1}\n```";
        assert_eq!(unwrap_code_fence(text), "{\"a\":1}");
    }

    #[test]
    fn passes_through_bare_json_without_fence() {
        let text = "{\"a\":1}";
        assert_eq!(unwrap_code_fence(text), "{\"a\":1}");
    }

    #[test]
    fn empty_decision_has_no_actions_or_chat() {
        let decision = parse_decision("{\"reasoning\":\"nothing to do\",\"actions\":[]}").unwrap();
        assert!(decision.is_empty());
    }

    #[test]
    fn decision_with_only_chat_is_not_empty() {
        let decision = parse_decision("{\"reasoning\":\"r\",\"actions\":[],\"chat\":\"hi\"}").unwrap();
        assert!(!decision.is_empty());
    }

    #[test]
    fn unknown_action_type_is_dropped_and_recorded() {
        let decision = parse_decision(
            "{\"reasoning\":\"r\",\"actions\":[{\"type\":\"fly-to-moon\"}]}",
        )
        .unwrap();
        assert!(decision.actions.is_empty());
        assert_eq!(decision.dropped_action_types, vec!["fly-to-moon"]);
    }

    #[test]
    fn no_json_object_returns_none() {
        assert!(parse_decision("I don't know what to do.").is_none());
    }

    #[test]
    fn idempotent_on_already_valid_json() {
        let first = parse_decision(SAMPLE).unwrap();
        let reserialized = serde_json::json!({
            "reasoning": first.reasoning,
            "actions": [{"type": "move-to", "x": 10.0, "y": 64.0, "z": 20.0}],
            "chat": null,
            "speak": null,
        })
        .to_string();
        let second = parse_decision(&reserialized).unwrap();
        assert_eq!(first.reasoning, second.reasoning);
        assert_eq!(first.actions, second.actions);
    }
}
