// Cleanup of raw model output before any decoding happens.

use regex_lite::Regex;

/// Remove reasoning-trace spans like `<think>...</think>` from model output.
///
/// Both the `<think>` and `<thinking>` variants are handled, across newlines,
/// shortest span first. An opening tag with no matching close is left exactly
/// as it arrived so that genuinely broken output stays inspectable downstream.
pub fn strip_reasoning_traces(text: &str) -> String {
    let mut result = text.to_string();

    for (open_tag, close_tag) in [("<thinking>", "</thinking>"), ("<think>", "</think>")] {
        let pattern = format!("(?s){}.*?{}", open_tag, close_tag);
        if let Ok(re) = Regex::new(&pattern) {
            result = re.replace_all(&result, "").into_owned();
        }
    }

    result
}

/// Normalize one raw model reply: strip reasoning traces, then trim
/// surrounding whitespace. Idempotent.
pub fn normalize_response(text: &str) -> String {
    strip_reasoning_traces(text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_think_span() {
        let input = "<think>Let me reason about this.</think>Here is your plan.";
        assert_eq!(normalize_response(input), "Here is your plan.");
    }

    #[test]
    fn test_strips_multiline_span() {
        let input = "<think>\nline one\nline two\n</think>\nDone.";
        assert_eq!(normalize_response(input), "Done.");
    }

    #[test]
    fn test_strips_multiple_spans() {
        let input = "<think>first</think>Hello<think>second</think> there";
        assert_eq!(normalize_response(input), "Hello there");
    }

    #[test]
    fn test_strips_thinking_variant() {
        let input = "<thinking>private scratch</thinking>Morning!";
        assert_eq!(normalize_response(input), "Morning!");
    }

    #[test]
    fn test_unterminated_tag_left_alone() {
        let input = "<think>I should check the calendar... The answer is 42";
        assert_eq!(normalize_response(input), input);
    }

    #[test]
    fn test_unterminated_tag_after_complete_span() {
        let input = "<think>a</think>Hello<think>trailing fragment";
        assert_eq!(normalize_response(input), "Hello<think>trailing fragment");
    }

    #[test]
    fn test_plain_text_only_trimmed() {
        assert_eq!(normalize_response("  Sure, happy to help!  \n"), "Sure, happy to help!");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_response(""), "");
        assert_eq!(normalize_response("<think>only thoughts</think>"), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<think>x</think> text ",
            "plain text",
            "<think>unterminated",
            "<thinking>a</thinking><think>b</think>final",
        ];
        for input in inputs {
            let once = normalize_response(input);
            assert_eq!(normalize_response(&once), once);
        }
    }
}
