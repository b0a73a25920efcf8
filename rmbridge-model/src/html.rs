//! Rich-text normalisation.
//!
//! Requirement texts are XHTML fragments. Tools re-serialize them with
//! cosmetic differences, so texts are compared and stored in a canonical
//! form: LF line endings, no outer whitespace, `<br />` line breaks and no
//! whitespace-only runs between two tags.

/// Canonical form of an XHTML fragment.
pub fn repair_html(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text.trim();

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('>') else {
            out.push_str(tail);
            return out;
        };
        let tag = &tail[..=end];
        if is_line_break(tag) {
            out.push_str("<br />");
        } else {
            out.push_str(tag);
        }
        rest = &tail[end + 1..];

        let trimmed = rest.trim_start();
        if trimmed.starts_with('<') {
            rest = trimmed;
        }
    }
    out.push_str(rest);
    out
}

fn is_line_break(tag: &str) -> bool {
    let inner = tag.trim_start_matches('<').trim_end_matches('>').trim();
    let inner = inner.trim_end_matches('/').trim_end();
    inner.eq_ignore_ascii_case("br")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<p>a</p>", "<p>a</p>")]
    #[case("  <p>a</p>\r\n", "<p>a</p>")]
    #[case("a<br>b", "a<br />b")]
    #[case("a<BR/>b", "a<br />b")]
    #[case("a<br  />b", "a<br />b")]
    #[case("<ul>\n  <li>x</li>\n  <li>y</li>\n</ul>", "<ul><li>x</li><li>y</li></ul>")]
    #[case("<p>a b</p> text <b>c</b>", "<p>a b</p> text <b>c</b>")]
    #[case("plain text", "plain text")]
    #[case("a < b", "a < b")]
    fn repairs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(repair_html(input), expected);
    }

    #[test]
    fn repair_is_idempotent() {
        let once = repair_html("<p>x</p>\r\n <br>\n<p>y</p>  ");
        assert_eq!(repair_html(&once), once);
    }

    #[test]
    fn tags_starting_with_br_are_not_line_breaks() {
        assert_eq!(repair_html("<bridge>x</bridge>"), "<bridge>x</bridge>");
    }
}
