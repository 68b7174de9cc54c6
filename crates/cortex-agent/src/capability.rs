//! Keyword-based capability inference for untagged tasks

use cortex_core::Capability;
use regex::Regex;
use std::collections::BTreeSet;

const PATTERNS: &[(Capability, &str)] = &[
    (
        Capability::Research,
        r"(?i)\b(search|find|look up|research|discover|investigate|explain|what is|who is)\b",
    ),
    (
        Capability::Code,
        r"(?i)\b(code|program|function|script|implement|debug|refactor|compile|bug|fix code|write a script)\b",
    ),
    (
        Capability::Content,
        r"(?i)\b(write|blog|article|tweet|post|summary|summari[sz]e|draft|compose|essay|email)\b",
    ),
    (
        Capability::Vision,
        r"(?i)\b(image|photo|picture|screenshot|diagram|chart)s?\b",
    ),
    (
        Capability::Memory,
        r"(?i)\b(remember|recall|store|save for later|keep track|note that|what did i|we discussed)\b",
    ),
];

/// Words that make one step depend on another ("research X, then write Y").
const ORDER_CUES: &str = r"(?i)\b(then|after|afterwards|first|finally|next|once you|based on)\b";

/// Compiled keyword patterns, one per capability.
pub struct CapabilityMatcher {
    patterns: Vec<(Capability, Regex)>,
    order_cues: Option<Regex>,
}

impl Default for CapabilityMatcher {
    fn default() -> Self {
        Self {
            patterns: PATTERNS
                .iter()
                .filter_map(|(cap, pattern)| Regex::new(pattern).ok().map(|re| (*cap, re)))
                .collect(),
            order_cues: Regex::new(ORDER_CUES).ok(),
        }
    }
}

impl CapabilityMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities whose keywords appear as whole words in `prompt`.
    /// Empty when nothing matches; callers fall back to `General`.
    pub fn infer(&self, prompt: &str) -> BTreeSet<Capability> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(prompt))
            .map(|(cap, _)| *cap)
            .collect()
    }

    /// The prompt asks for steps in an order, so agents should run one
    /// after another rather than side by side.
    pub fn implies_order(&self, prompt: &str) -> bool {
        self.order_cues.as_ref().is_some_and(|re| re.is_match(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(CapabilityMatcher::new().patterns.len(), PATTERNS.len());
    }

    #[test]
    fn word_boundaries_only() {
        let m = CapabilityMatcher::new();
        assert_eq!(m.infer("Please debug this"), BTreeSet::from([Capability::Code]));
        // "encode" contains "code" but is not the word
        assert!(m.infer("encoder settings").is_empty());
    }

    #[test]
    fn multiple_capabilities() {
        let m = CapabilityMatcher::new();
        let caps = m.infer("Research rust async runtimes and write a blog post");
        assert_eq!(caps, BTreeSet::from([Capability::Research, Capability::Content]));
    }

    #[test]
    fn order_cues() {
        let m = CapabilityMatcher::new();
        assert!(m.implies_order("Research the topic, then write a post"));
        assert!(m.implies_order("Based on the docs, fix the code"));
        assert!(!m.implies_order("Research rust async runtimes and write a blog post"));
        // "nextjs" is not "next"
        assert!(!m.implies_order("debug my nextjs app"));
    }

    #[test]
    fn vision_plural() {
        assert!(CapabilityMatcher::new().infer("describe these photos").contains(&Capability::Vision));
    }
}
