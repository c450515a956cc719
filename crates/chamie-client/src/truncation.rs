//! Truncation heuristic.
//!
//! Pure, deterministic best-effort detection of answers the model cut off
//! before finishing, typically at the output-token ceiling. False positives
//! and negatives are acceptable everywhere except the unterminated code
//! fence case, which is always caught.
//!
//! The near-duplicate upstream implementations disagreed on strictness, so
//! it is a policy value rather than two forks.

/// Code fence delimiter counted for the unterminated-block rule.
const FENCE: &str = "```";

/// Characters accepted as a plausible end of a complete answer: sentence
/// punctuation plus the closers a code-heavy answer legitimately ends on.
const TERMINAL_CHARS: [char; 5] = ['.', '!', '?', '}', '`'];

/// How aggressively unfinished-looking text is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Flag unterminated code fences, and code-bearing answers that stop on
    /// a non-terminal character.
    #[default]
    Lenient,
    /// Additionally flag any answer without terminal punctuation, and
    /// answers ending inside an unclosed `**`/`*` emphasis run.
    Strict,
}

/// Whether `text` looks like it was cut off mid-answer.
///
/// Rules apply in order; any match flags the text.
pub fn is_likely_truncated(text: &str, policy: TruncationPolicy) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Rule 1: an odd number of fence delimiters means an open code block.
    if count_occurrences(text, FENCE) % 2 == 1 {
        return true;
    }

    // Rule 2: code-bearing text should stop on a terminal character.
    let last = trimmed.chars().next_back().unwrap_or_default();
    if text.contains(FENCE) && !TERMINAL_CHARS.contains(&last) {
        return true;
    }

    if policy == TruncationPolicy::Strict {
        if !TERMINAL_CHARS.contains(&last) {
            return true;
        }
        if has_unclosed_emphasis(text) {
            return true;
        }
    }

    false
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Detects a dangling `**` (bold) or `*` (italic) marker.
///
/// Fenced code is excluded first; asterisks inside code blocks are not
/// emphasis.
fn has_unclosed_emphasis(text: &str) -> bool {
    let outside_code: String = text
        .split(FENCE)
        .step_by(2) // even segments are outside fences
        .collect();
    let bold_markers = count_occurrences(&outside_code, "**");
    let italic_markers = outside_code.matches('*').count() - bold_markers * 2;
    bold_markers % 2 == 1 || italic_markers % 2 == 1
}
