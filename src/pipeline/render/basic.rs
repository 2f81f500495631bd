//! Fallback renderer: escape, then a handful of inline substitutions.

use std::sync::LazyLock;

use regex::Regex;

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("valid regex"));

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `**bold**`, `*italic*` and hard line breaks over escaped text.
pub fn render_basic(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = BOLD_RE.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC_RE.replace_all(&bold, "<em>$1</em>");
    italic.replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_equals_escape() {
        let text = "Minum air 2 liter & istirahat, dosis < 5 mg";
        assert_eq!(render_basic(text), escape_html(text));
        assert_eq!(render_basic("Hello world"), "Hello world");
    }

    #[test]
    fn escapes_before_substituting() {
        assert_eq!(
            render_basic("<script>alert(1)</script> **tebal**"),
            "&lt;script&gt;alert(1)&lt;/script&gt; <strong>tebal</strong>"
        );
    }

    #[test]
    fn bold_italic_and_breaks() {
        assert_eq!(
            render_basic("**Analisis:**\n*ringan*"),
            "<strong>Analisis:</strong><br><em>ringan</em>"
        );
    }

    #[test]
    fn unterminated_markers_left_as_is() {
        assert_eq!(render_basic("**belum selesai"), "**belum selesai");
    }
}
