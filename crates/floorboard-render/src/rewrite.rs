//! Forum pseudo-tag normalization.
//!
//! Archived post source interleaves Markdown with forum pseudo-tags that the
//! Markdown engine would otherwise mangle or swallow. A fixed chain of text
//! passes runs before parsing, each pure and total: malformed input flows
//! through untouched rather than failing the pass.
//!
//! Pass order matters. Fence recovery and comment splitting assume quote
//! tags have already been turned into markers the Markdown engine treats as
//! opaque HTML, so the chain must not be reordered or fused.

use std::sync::LazyLock;

use regex::Regex;

use crate::resolve::ATTACHMENT_ORIGIN;

/// Marker emitted for `[quote]`; recognized again by the engine as a
/// bracket-quote container, distinct from native `>` quoting.
pub(crate) const QUOTE_OPEN: &str = "<blockquote _type=\"tag\">";
pub(crate) const QUOTE_CLOSE: &str = "</blockquote>";

/// Marker pair emitted around a split-out discussion-comment region.
pub(crate) const COMMENT_OPEN: &str = "<div class=\"comment\">";
pub(crate) const COMMENT_CLOSE: &str = "</div>";

/// Delimiter line the dump format uses around trailing discussion comments.
const COMMENT_DELIMITER: &str = "*---下挂评论---*";

static ATTACH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[attach\](.*?)\[/attach\]").unwrap());

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*---下挂评论---\*\s*(.*?)\s*\*---下挂评论---\*\s*").unwrap()
});

static ESCAPED_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="quote">(.*?)</div>"#).unwrap());

static DOUBLE_CHAR_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&amp;#(\d+);").unwrap());

/// Run the full pass chain in its fixed order.
///
/// The chain is idempotent on its own output: once no raw pseudo-tags
/// remain, running it again is a no-op.
pub fn rewrite(source: &str) -> String {
    let passes: [fn(&str) -> String; 5] = [
        quote_tags,
        expand_attachments,
        split_comments,
        recover_code_blocks,
        unescape_char_refs,
    ];
    passes
        .iter()
        .fold(source.to_owned(), |text, pass| pass(&text))
}

/// `[quote]`/`[/quote]` become bracket-quote markers. Native `>` quoting is
/// untouched and the two coexist.
fn quote_tags(source: &str) -> String {
    source
        .replace("[quote]", QUOTE_OPEN)
        .replace("[/quote]", QUOTE_CLOSE)
}

/// `[attach]path[/attach]` becomes a Markdown media reference. Relative
/// paths point into the forum's attachment origin, not the local archive, so
/// they are rewritten here before the media renderer ever sees them.
fn expand_attachments(source: &str) -> String {
    ATTACH_RE
        .replace_all(source, |caps: &regex::Captures| {
            let path = caps[1].trim();
            let src = match path.strip_prefix("./") {
                Some(rest) => format!("{ATTACHMENT_ORIGIN}{rest}"),
                None => path.to_owned(),
            };
            format!("![]({src})")
        })
        .into_owned()
}

/// A delimiter pair wrapping inline content becomes a distinct comment
/// block. The region re-enters the Markdown pipeline as its own nested
/// document, with a floor-heading prefix restored for its first line; the
/// text following the region is the remainder of the interrupted floor
/// heading, so a fresh heading prefix is emitted for it too.
fn split_comments(source: &str) -> String {
    COMMENT_RE
        .replace_all(
            source,
            format!("{COMMENT_OPEN}\n\n##### $1\n\n{COMMENT_CLOSE}\n\n----\n\n##### "),
        )
        .into_owned()
}

/// An entity-escaped quote div is really a code block that went through the
/// upstream HTML layer. Decode and re-emit as a fence, preserving literal
/// whitespace and punctuation.
fn recover_code_blocks(source: &str) -> String {
    ESCAPED_QUOTE_RE
        .replace_all(source, |caps: &regex::Captures| {
            let code = decode_entities(caps[1].trim());
            format!("\n```\n{code}\n```\n")
        })
        .into_owned()
}

/// Numeric character references double-escaped by the upstream HTML layer
/// are unescaped exactly once; the Markdown engine decodes the rest.
fn unescape_char_refs(source: &str) -> String {
    DOUBLE_CHAR_REF_RE
        .replace_all(source, "&#$1;")
        .into_owned()
}

/// Decode the entity set the upstream layer produces. `&amp;` must be last
/// so already-decoded sequences are not decoded twice.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_quotes_become_tagged_markers() {
        let out = rewrite("[quote]hi[/quote]");
        assert_eq!(out, "<blockquote _type=\"tag\">hi</blockquote>");
    }

    #[test]
    fn native_quoting_is_untouched() {
        assert_eq!(rewrite("> hi"), "> hi");
    }

    #[test]
    fn relative_attachments_get_the_attachment_origin() {
        let out = rewrite("[attach]./mon_202401/01/a.jpg[/attach]");
        assert_eq!(
            out,
            "![](https://img.nga.178.com/attachments/mon_202401/01/a.jpg)"
        );
    }

    #[test]
    fn absolute_attachments_pass_through() {
        let out = rewrite("[attach]https://elsewhere.example/v.mp4[/attach]");
        assert_eq!(out, "![](https://elsewhere.example/v.mp4)");
    }

    #[test]
    fn unclosed_attach_flows_through() {
        let src = "[attach]./mon_1/a.jpg";
        assert_eq!(rewrite(src), src);
    }

    #[test]
    fn comment_regions_become_marker_blocks() {
        let src = "body\n\n*---下挂评论---*\n1.[0] <pid:7> reply\n*---下挂评论---*\n5.[2] <pid:9> next floor";
        let out = rewrite(src);
        assert!(out.contains(COMMENT_OPEN));
        assert!(out.contains("##### 1.[0] <pid:7> reply"));
        assert!(out.contains("----"));
        assert!(out.ends_with("##### 5.[2] <pid:9> next floor"));
    }

    #[test]
    fn comment_matching_is_non_greedy() {
        let src = "*---下挂评论---*a*---下挂评论---*x*---下挂评论---*b*---下挂评论---*";
        let out = rewrite(src);
        // Two separate regions, not one spanning region.
        assert_eq!(out.matches(COMMENT_OPEN).count(), 2);
        assert!(out.contains("##### a"));
        assert!(out.contains("##### b"));
    }

    #[test]
    fn escaped_quote_divs_become_fences() {
        let src = "<div class=\"quote\">if (a &lt; b &amp;&amp; c &gt; d) { s = &quot;x&quot;; t = &#39;y&#39;; }</div>";
        let out = rewrite(src);
        assert!(out.contains("```\nif (a < b && c > d) { s = \"x\"; t = 'y'; }\n```"));
    }

    #[test]
    fn double_escaped_char_refs_unescape_once() {
        assert_eq!(rewrite("&amp;#128077;"), "&#128077;");
        // Already single-escaped references stay as they are.
        assert_eq!(rewrite("&#128077;"), "&#128077;");
    }

    #[test]
    fn chain_is_idempotent_on_rewritten_output() {
        let src = "intro [quote]q[/quote]\n\n[attach]./m/a.jpg[/attach]\n\n\
                   *---下挂评论---*\nc\n*---下挂评论---*\n\
                   <div class=\"quote\">x &lt; y</div>\n&amp;#88;";
        let once = rewrite(src);
        assert_eq!(rewrite(&once), once);
    }
}
