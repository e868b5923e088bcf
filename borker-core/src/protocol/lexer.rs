//! Mention and tag extraction from bork content

use lazy_static::lazy_static;
use regex::Regex;

use crate::address::decode_address_payload;

/// Longest tag body
pub const MAX_TAG_LEN: usize = 64;

const MENTION_LEN: std::ops::RangeInclusive<usize> = 25..=35;

lazy_static! {
    static ref MENTION_RE: Regex =
        Regex::new(r"(?:^|\s)@([1-9A-HJ-NP-Za-km-z]+)").expect("mention regex is valid");
    static ref TAG_RE: Regex =
        Regex::new(r"(?:^|\s)#([A-Za-z0-9_]+)").expect("tag regex is valid");
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// Addresses mentioned as `@address`, in order of first appearance.
/// Tokens that are not valid base58check addresses are ignored.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut mentions = Vec::new();
    for caps in MENTION_RE.captures_iter(content) {
        let candidate = &caps[1];
        if !MENTION_LEN.contains(&candidate.len()) {
            continue;
        }
        if decode_address_payload(candidate).is_ok() {
            push_unique(&mut mentions, candidate.to_string());
        }
    }
    mentions
}

/// Lower-cased `#tag` bodies, in order of first appearance
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for caps in TAG_RE.captures_iter(content) {
        let tag = &caps[1];
        if tag.len() > MAX_TAG_LEN {
            continue;
        }
        push_unique(&mut tags, tag.to_lowercase());
    }
    tags
}
