//! Preparing answer text for speech synthesis.

/// Instruction prepended to every synthesis request unless configured otherwise.
pub const DEFAULT_SPEECH_STYLE: &str = "Say in a warm, empathetic, and professional therapist voice:";

/// Prefix the text with the delivery instruction.
pub fn styled_prompt(style: &str, text: &str) -> String {
    let style = style.trim();
    if style.is_empty() {
        text.to_string()
    } else {
        format!("{style} {text}")
    }
}

/// Strip markdown so the voice does not read out formatting.
///
/// Fenced code blocks are dropped, links keep their label, headings, list
/// markers and emphasis markers go, and whitespace collapses to single
/// spaces. Falls back to the trimmed input when nothing speakable is left.
pub fn speakable_text(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let body = strip_list_marker(trimmed.trim_start_matches('#').trim_start());
        kept.push(strip_inline(body));
    }

    let spoken = kept
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    if spoken.is_empty() {
        text.trim().to_string()
    } else {
        spoken
    }
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ["- ", "* ", "+ ", "> "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }
    // "12. item"
    if let Some(dot) = line.find(". ") {
        if dot > 0 && line[..dot].chars().all(|c| c.is_ascii_digit()) {
            return &line[dot + 2..];
        }
    }
    line
}

fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' | '`' => i += 1,
            '~' if chars.get(i + 1) == Some(&'~') => i += 2,
            '_' if chars.get(i + 1) == Some(&'_') => i += 2,
            '[' => match link_end(&chars, i) {
                Some((label_end, end)) => {
                    out.extend(&chars[i + 1..label_end]);
                    i = end + 1;
                }
                None => {
                    out.push('[');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// For `[label](target)` starting at `open`, the indices of `]` and `)`.
fn link_end(chars: &[char], open: usize) -> Option<(usize, usize)> {
    let close = open + chars[open..].iter().position(|c| *c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = close + 1 + chars[close + 1..].iter().position(|c| *c == ')')?;
    Some((close, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emphasis_and_headings() {
        assert_eq!(
            speakable_text("## Breathing\n**Slow** down, *gently*."),
            "Breathing Slow down, gently."
        );
    }

    #[test]
    fn test_lists_and_links() {
        let text = "Try:\n- a [body scan](https://example.com/scan)\n2. journaling\n> quote";
        assert_eq!(speakable_text(text), "Try: a body scan journaling quote");
    }

    #[test]
    fn test_code_fences_dropped() {
        let text = "Before\n```\nlet x = 1;\n```\nAfter `inline`";
        assert_eq!(speakable_text(text), "Before After inline");
    }

    #[test]
    fn test_plain_brackets_survive() {
        assert_eq!(speakable_text("a [note] here"), "a [note] here");
        assert_eq!(speakable_text("snake_case stays"), "snake_case stays");
    }

    #[test]
    fn test_falls_back_when_nothing_left() {
        assert_eq!(speakable_text("```\ncode\n```"), "```\ncode\n```");
    }

    #[test]
    fn test_styled_prompt() {
        assert_eq!(styled_prompt(" Speak softly: ", "hi"), "Speak softly: hi");
        assert_eq!(styled_prompt("", "hi"), "hi");
    }
}
