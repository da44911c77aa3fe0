//! Markdown to Slack mrkdwn

use regex::{Captures, Regex};
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| regex(r"(?s)```[\w+-]*\n?(.*?)```"));
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| regex(r"`[^`\n]+`"));
static HEADER: LazyLock<Regex> = LazyLock::new(|| regex(r"(?m)^#{1,6}[ \t]+(.+?)[ \t#]*$"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| regex(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| regex(r"\*([^*\s][^*\n]*?)\*"));
static STRIKE: LazyLock<Regex> = LazyLock::new(|| regex(r"~~([^~\n]+)~~"));
static LINK: LazyLock<Regex> = LazyLock::new(|| regex(r"\[([^\]\n]+)\]\(([^)\s]+)\)"));
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| regex("\x02(\\d+)\x02"));

/// Stands in for `*` of converted bold until italics are done
const BOLD_MARK: char = '\x03';

/// Convert model markdown into Slack mrkdwn
///
/// Code is left untouched apart from dropping the fence language. Lists and
/// quotes already read the same in both.
pub fn to_mrkdwn(text: &str) -> String {
    let mut preserved: Vec<String> = Vec::new();
    let mut stash = |code: String| {
        preserved.push(code);
        format!("\x02{}\x02", preserved.len() - 1)
    };

    let text = CODE_BLOCK.replace_all(text, |caps: &Captures| {
        stash(format!("```\n{}```", &caps[1]))
    });
    let text = INLINE_CODE.replace_all(&text, |caps: &Captures| stash(caps[0].to_string()));

    let text = HEADER.replace_all(&text, format!("{BOLD_MARK}$1{BOLD_MARK}").as_str());
    let text = BOLD.replace_all(&text, |caps: &Captures| {
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        format!("{BOLD_MARK}{inner}{BOLD_MARK}")
    });
    let text = ITALIC.replace_all(&text, "_${1}_");
    let text = STRIKE.replace_all(&text, "~${1}~");
    let text = LINK.replace_all(&text, "<$2|$1>");
    let text = text.replace(BOLD_MARK, "*");

    PLACEHOLDER
        .replace_all(&text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| preserved.get(index))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emphasis() {
        assert_eq!(to_mrkdwn("**bold** and *italic*"), "*bold* and _italic_");
        assert_eq!(to_mrkdwn("__bold__ and _italic_"), "*bold* and _italic_");
        assert_eq!(to_mrkdwn("~~gone~~"), "~gone~");
    }

    #[test]
    fn test_headers_become_bold() {
        assert_eq!(to_mrkdwn("# Summary\ntext"), "*Summary*\ntext");
        assert_eq!(to_mrkdwn("### Next steps ###"), "*Next steps*");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            to_mrkdwn("see [the docs](https://example.com/a_b)"),
            "see <https://example.com/a_b|the docs>"
        );
    }

    #[test]
    fn test_code_is_preserved() {
        let input = "Run `**not bold**` then:\n```rust\nlet x = a * b * c;\n```\n**done**";
        assert_eq!(
            to_mrkdwn(input),
            "Run `**not bold**` then:\n```\nlet x = a * b * c;\n```\n*done*"
        );
    }

    #[test]
    fn test_lists_unchanged() {
        let input = "- first\n- second\n1. third";
        assert_eq!(to_mrkdwn(input), input);
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(to_mrkdwn("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(to_mrkdwn(""), "");
    }
}
