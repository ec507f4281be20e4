//! Extended markup parsing.
//!
//! The engine drives a `pulldown-cmark` event stream into a [`Document`]
//! tree. The host grammar treats embedded pseudo-HTML as opaque, so
//! everything forum-specific rides on top of the raw HTML events: the
//! bracket-quote and comment markers emitted by the rewrite passes, the
//! inline `<video>` tag (matched by regular expression, never by the HTML
//! embedding rule), and Markdown-shaped links the HTML rule swallowed.
//!
//! Leaf rendering is pluggable: the engine calls a [`LeafHooks`]
//! implementation for headings, images, links and text runs, and
//! [`PostRenderer`] is the concrete policy for archived posts. Malformed
//! shapes degrade to plain output; nothing here returns an error.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use pulldown_cmark::{Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use floorboard_common::ViewContext;

use crate::RenderOptions;
use crate::document::{
    Document, FloorAnchor, HeadingData, MediaKind, MediaRef, Node, NodeId, QuoteOrigin, TextRun,
    VideoRef,
};
use crate::resolve::{self, MediaResolver};
use crate::rewrite::{COMMENT_CLOSE, COMMENT_OPEN, QUOTE_CLOSE, QUOTE_OPEN};

/// Unifies the pid-span heading variant with the plain reply shape.
static PID_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<span id="pid\d+">(.*?)</span>"#).unwrap());

/// Floor-marker shape: `<ordinal>.[<n>] <pid:id> <timestamp> by <author>(<uid>)?:`.
/// The uid group is always optional; some dumps carry it, some do not.
static FLOOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\.\[\d+\]\s*<pid:(\d+)>\s*(\d{4}-\d{2}-\d{2}\s*\d{2}:\d{2}:\d{2})\s*by\s*(.+?)(?:\((\d+)\))?:",
    )
    .unwrap()
});

/// Embedded video tag; the host grammar would swallow it as opaque HTML.
/// Only the opening tag is matched — inline HTML arrives one tag per event,
/// so the close tag is recognized separately and dropped.
static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<video[^>]*src="([^"]+)"[^>]*poster="([^"]+)"[^>]*>"#).unwrap()
});

const VIDEO_CLOSE: &str = "</video>";

/// Markdown image/link syntax stranded inside raw HTML regions.
static IMG_MD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.+?)\]\((.+?)\)").unwrap());
static LINK_MD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.+?)\]\((.+?)\)").unwrap());

/// Legacy bracket color/font spans.
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[color(?:=(.+?))?\](.*?)\[/color\]").unwrap());
static FONT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[font(?:=(.+?))?\](.*?)\[/font\]").unwrap());

/// Leaf render strategies injected into the engine.
///
/// One concrete implementation decides heading restructuring, media URL
/// policy and inline text styling; the engine owns structure only.
pub trait LeafHooks {
    /// Render a heading from its flattened inline text.
    fn heading(&self, level: u8, raw: &str) -> HeadingData;

    /// Render a media reference. `poster` is only present for embedded video
    /// tags; `floor` is the enclosing floor if one has been seen.
    fn image(
        &self,
        dest: &str,
        title: &str,
        alt: &str,
        poster: Option<&str>,
        floor: Option<u32>,
    ) -> Node;

    /// Render a hyperlink.
    fn link(&self, dest: &str, title: &str, text: &str) -> Node;

    /// Split a text run into styled segments.
    fn text(&self, text: &str) -> Vec<TextRun>;
}

/// Markdown parser extended with the forum-specific matchers.
pub struct MarkupEngine<H: LeafHooks> {
    hooks: H,
}

impl<H: LeafHooks> MarkupEngine<H> {
    pub fn new(hooks: H) -> Self {
        Self { hooks }
    }

    /// Parse rewritten source text into a document tree. Total: anomalies
    /// degrade to literal nodes.
    pub fn parse(&self, text: &str) -> Document {
        let mut builder = TreeBuilder::new(&self.hooks);
        for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
            builder.event(event);
        }
        builder.finish()
    }
}

/// Inline content currently being flattened to plain text.
enum Capture {
    Heading {
        level: u8,
        raw: String,
        /// An autolink is being reconstructed into its `<...>` source shape.
        autolink: bool,
    },
    Image {
        dest: String,
        title: String,
        alt: String,
    },
    Link {
        dest: String,
        title: String,
        text: String,
    },
}

impl Capture {
    fn push_text(&mut self, text: &str) {
        match self {
            Capture::Heading { raw, .. } => raw.push_str(text),
            Capture::Image { alt, .. } => alt.push_str(text),
            Capture::Link { text: t, .. } => t.push_str(text),
        }
    }
}

enum HtmlMarker {
    QuoteOpen,
    QuoteClose,
    CommentOpen,
    CommentClose,
    Video { src: String, poster: String },
    VideoClose,
}

struct TreeBuilder<'h, H: LeafHooks> {
    hooks: &'h H,
    doc: Document,
    stack: Vec<NodeId>,
    capture: Option<Capture>,
    code: Option<String>,
    /// Consecutive text events accumulate here so bracket spans split across
    /// events (failed link opens come through as separate `[` texts) are
    /// seen whole. Newlines in the buffer become hard breaks.
    text_buf: String,
    current_floor: Option<u32>,
}

impl<'h, H: LeafHooks> TreeBuilder<'h, H> {
    fn new(hooks: &'h H) -> Self {
        Self {
            hooks,
            doc: Document::new(),
            stack: Vec::new(),
            capture: None,
            code: None,
            text_buf: String::new(),
            current_floor: None,
        }
    }

    fn finish(mut self) -> Document {
        self.flush_text();
        self.stack.clear();
        self.doc
    }

    fn flush_text(&mut self) {
        if self.text_buf.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text_buf);
        self.push_text_runs(&text);
    }

    fn open(&mut self, node: Node) {
        let parent = self.stack.last().copied();
        let id = self.doc.push(node, parent);
        self.stack.push(id);
    }

    fn close(&mut self) {
        self.stack.pop();
    }

    /// Close the innermost container matching `pred`, along with anything
    /// opened inside it. False when no such container is open.
    fn close_marker(&mut self, pred: fn(&Node) -> bool) -> bool {
        match self.stack.iter().rposition(|&id| pred(self.doc.node(id))) {
            Some(pos) => {
                self.stack.truncate(pos);
                true
            }
            None => false,
        }
    }

    fn leaf(&mut self, node: Node) -> NodeId {
        self.doc.push(node, self.stack.last().copied())
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if let Some(code) = &mut self.code {
                    code.push_str(&text);
                } else if let Some(capture) = &mut self.capture {
                    capture.push_text(&text);
                } else {
                    self.text_buf.push_str(&text);
                }
            }
            Event::Code(text) => {
                if let Some(capture) = &mut self.capture {
                    capture.push_text(&text);
                } else {
                    self.flush_text();
                    self.leaf(Node::InlineCode(text.into_string()));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                if let Some(Capture::Heading { raw, .. }) = &mut self.capture {
                    raw.push_str(&html);
                } else if self.capture.is_none() {
                    self.flush_text();
                    self.handle_html(&html);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(capture) = &mut self.capture {
                    capture.push_text(" ");
                } else {
                    // Forum sources treat every newline as a visible break.
                    self.text_buf.push('\n');
                }
            }
            Event::Rule => {
                self.flush_text();
                self.leaf(Node::Rule);
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        if self.capture.is_none() {
            self.flush_text();
        }
        match tag {
            Tag::Paragraph => {
                if self.capture.is_none() {
                    self.open(Node::Paragraph);
                }
            }
            Tag::Heading { level, .. } => {
                self.capture = Some(Capture::Heading {
                    level: heading_depth(level),
                    raw: String::new(),
                    autolink: false,
                });
            }
            Tag::BlockQuote(_) => {
                if self.capture.is_none() {
                    self.open(Node::Quote(QuoteOrigin::Native));
                }
            }
            Tag::CodeBlock(_) => {
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                if self.capture.is_none() {
                    self.open(Node::List { start });
                }
            }
            Tag::Item => {
                if self.capture.is_none() {
                    self.open(Node::Item);
                }
            }
            Tag::Emphasis => {
                if self.capture.is_none() {
                    self.open(Node::Emphasis);
                }
            }
            Tag::Strong => {
                if self.capture.is_none() {
                    self.open(Node::Strong);
                }
            }
            Tag::Strikethrough => {
                if self.capture.is_none() {
                    self.open(Node::Strikethrough);
                }
            }
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => match &mut self.capture {
                Some(Capture::Heading { raw, autolink, .. }) if link_type == LinkType::Autolink => {
                    // Reconstruct `<pid:...>` source shape for the floor
                    // matcher; the grammar parsed it as an autolink.
                    raw.push('<');
                    *autolink = true;
                }
                Some(_) => {}
                None => {
                    self.capture = Some(Capture::Link {
                        dest: dest_url.into_string(),
                        title: title.into_string(),
                        text: String::new(),
                    });
                }
            },
            Tag::Image {
                dest_url, title, ..
            } => {
                if self.capture.is_none() {
                    self.capture = Some(Capture::Image {
                        dest: dest_url.into_string(),
                        title: title.into_string(),
                        alt: String::new(),
                    });
                }
            }
            Tag::HtmlBlock => {}
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        if self.capture.is_none() {
            self.flush_text();
        }
        match tag {
            TagEnd::Paragraph
            | TagEnd::BlockQuote(_)
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough => {
                if self.capture.is_none() {
                    self.close();
                }
            }
            TagEnd::Heading(_) => self.finish_heading(),
            TagEnd::CodeBlock => {
                let mut text = self.code.take().unwrap_or_default();
                if text.ends_with('\n') {
                    text.pop();
                }
                self.leaf(Node::CodeBlock { text });
            }
            TagEnd::Link => self.finish_link(),
            TagEnd::Image => self.finish_image(),
            TagEnd::HtmlBlock => {}
            _ => {}
        }
    }

    fn finish_heading(&mut self) {
        if let Some(Capture::Heading { level, raw, .. }) = self.capture.take() {
            let data = self.hooks.heading(level, &raw);
            if let Some(anchor) = &data.floor {
                self.current_floor = Some(anchor.floor);
            }
            self.leaf(Node::Heading(data));
        }
    }

    fn finish_link(&mut self) {
        if matches!(self.capture, Some(Capture::Link { .. })) {
            if let Some(Capture::Link { dest, title, text }) = self.capture.take() {
                let node = self.hooks.link(&dest, &title, &text);
                self.leaf(node);
            }
            return;
        }
        if let Some(Capture::Heading { raw, autolink, .. }) = &mut self.capture {
            if *autolink {
                raw.push('>');
                *autolink = false;
            }
        }
    }

    fn finish_image(&mut self) {
        if matches!(self.capture, Some(Capture::Image { .. })) {
            if let Some(Capture::Image { dest, title, alt }) = self.capture.take() {
                let node = self
                    .hooks
                    .image(&dest, &title, &alt, None, self.current_floor);
                self.leaf(node);
            }
        }
    }

    /// Split a raw HTML chunk into container markers, embedded videos,
    /// stranded Markdown media/links, and literal remainder.
    fn handle_html(&mut self, chunk: &str) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let Some((start, end, marker)) = next_marker(rest) else {
                self.html_leaf(rest);
                break;
            };
            if start > 0 {
                self.html_leaf(&rest[..start]);
            }
            match marker {
                HtmlMarker::QuoteOpen => self.open(Node::Quote(QuoteOrigin::BracketTag)),
                HtmlMarker::QuoteClose => {
                    if !self.close_marker(|n| {
                        matches!(n, Node::Quote(QuoteOrigin::BracketTag))
                    }) {
                        tracing::trace!("dropping unmatched bracket-quote close");
                    }
                }
                HtmlMarker::CommentOpen => self.open(Node::Comment),
                HtmlMarker::CommentClose => {
                    if !self.close_marker(|n| matches!(n, Node::Comment)) {
                        // A stray </div> belongs to markup we passed through.
                        self.leaf(Node::Html(COMMENT_CLOSE.to_owned()));
                    }
                }
                HtmlMarker::Video { src, poster } => {
                    let node =
                        self.hooks
                            .image(&src, "", "", Some(poster.as_str()), self.current_floor);
                    self.leaf(node);
                }
                HtmlMarker::VideoClose => {}
            }
            rest = &rest[end..];
        }
    }

    /// Non-marker HTML content: recover stranded Markdown images first.
    fn html_leaf(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let mut last = 0;
        for caps in IMG_MD_RE.captures_iter(text) {
            let m = caps.get(0).unwrap();
            self.html_link_text(&text[last..m.start()]);
            let node = self
                .hooks
                .image(&caps[2], &caps[1], &caps[1], None, self.current_floor);
            self.leaf(node);
            last = m.end();
        }
        self.html_link_text(&text[last..]);
    }

    /// Then stranded Markdown links; whatever remains is literal.
    fn html_link_text(&mut self, text: &str) {
        let mut last = 0;
        for caps in LINK_MD_RE.captures_iter(text) {
            let m = caps.get(0).unwrap();
            self.literal(&text[last..m.start()]);
            let node = self.hooks.link(&caps[2], "", &caps[1]);
            self.leaf(node);
            last = m.end();
        }
        self.literal(&text[last..]);
    }

    fn literal(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if text.contains('<') {
            self.leaf(Node::Html(text.to_owned()));
        } else {
            self.push_text_runs(text);
        }
    }

    fn push_text_runs(&mut self, text: &str) {
        for run in self.hooks.text(text) {
            let mut first = true;
            for line in run.text.split('\n') {
                if !first {
                    self.leaf(Node::HardBreak);
                }
                first = false;
                if !line.is_empty() {
                    self.leaf(Node::Text(TextRun {
                        text: line.to_owned(),
                        style: run.style.clone(),
                    }));
                }
            }
        }
    }
}

/// Earliest forum marker in a raw HTML chunk.
fn next_marker(rest: &str) -> Option<(usize, usize, HtmlMarker)> {
    let mut best: Option<(usize, usize, HtmlMarker)> = None;

    let mut consider = |candidate: Option<(usize, usize, HtmlMarker)>| {
        if let Some((start, ..)) = candidate {
            if best.as_ref().is_none_or(|(s, ..)| start < *s) {
                best = candidate;
            }
        }
    };

    consider(
        rest.find(QUOTE_OPEN)
            .map(|i| (i, i + QUOTE_OPEN.len(), HtmlMarker::QuoteOpen)),
    );
    consider(
        rest.find(QUOTE_CLOSE)
            .map(|i| (i, i + QUOTE_CLOSE.len(), HtmlMarker::QuoteClose)),
    );
    consider(
        rest.find(COMMENT_OPEN)
            .map(|i| (i, i + COMMENT_OPEN.len(), HtmlMarker::CommentOpen)),
    );
    consider(
        rest.find(COMMENT_CLOSE)
            .map(|i| (i, i + COMMENT_CLOSE.len(), HtmlMarker::CommentClose)),
    );
    consider(
        rest.find(VIDEO_CLOSE)
            .map(|i| (i, i + VIDEO_CLOSE.len(), HtmlMarker::VideoClose)),
    );
    consider(VIDEO_RE.captures(rest).map(|caps| {
        let m = caps.get(0).unwrap();
        (
            m.start(),
            m.end(),
            HtmlMarker::Video {
                src: caps[1].to_owned(),
                poster: caps[2].to_owned(),
            },
        )
    }));

    best
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Concrete leaf policy for archived posts.
pub struct PostRenderer {
    ctx: ViewContext,
    options: RenderOptions,
    resolver: MediaResolver,
}

impl PostRenderer {
    pub fn new(ctx: ViewContext, options: RenderOptions) -> Self {
        let resolver = MediaResolver::new(ctx.clone(), options);
        Self {
            ctx,
            options,
            resolver,
        }
    }

    fn plain_heading(&self, level: u8, raw: &str) -> HeadingData {
        HeadingData {
            level,
            text: raw.trim().to_owned(),
            topic_link: None,
            floor: None,
        }
    }

    /// Depth-5 headings carry the floor-marker shape; everything that does
    /// not match stays a plain heading.
    fn floor_heading(&self, raw: &str) -> HeadingData {
        let unified = PID_SPAN_RE.replace_all(raw, "$1:");
        let trimmed = unified.trim();
        let Some(caps) = FLOOR_RE.captures(trimmed) else {
            return self.plain_heading(5, trimmed);
        };
        let Ok(floor) = caps[1].parse::<u32>() else {
            return self.plain_heading(5, trimmed);
        };
        let raw_timestamp = caps[3].split_whitespace().collect::<Vec<_>>().join(" ");
        let timestamp = NaiveDateTime::parse_from_str(&raw_timestamp, "%Y-%m-%d %H:%M:%S").ok();
        HeadingData {
            level: 5,
            text: trimmed.to_owned(),
            topic_link: None,
            floor: Some(FloorAnchor {
                floor,
                post_id: caps[2].to_owned(),
                author: caps[4].trim().to_owned(),
                uid: caps.get(5).and_then(|m| m.as_str().parse().ok()),
                timestamp,
                raw_timestamp,
            }),
        }
    }
}

impl LeafHooks for PostRenderer {
    fn heading(&self, level: u8, raw: &str) -> HeadingData {
        match level {
            3 => HeadingData {
                level,
                text: raw.trim().to_owned(),
                topic_link: Some(self.ctx.topic_url()),
                floor: None,
            },
            5 => self.floor_heading(raw),
            _ => self.plain_heading(level, raw),
        }
    }

    fn image(
        &self,
        dest: &str,
        title: &str,
        alt: &str,
        poster: Option<&str>,
        floor: Option<u32>,
    ) -> Node {
        let title = if title.is_empty() { alt } else { title };
        let resolved = self.resolver.resolve(dest, title, floor);
        match resolved.kind {
            MediaKind::Video => {
                let deferred_poster = poster
                    .filter(|p| !p.is_empty())
                    .map(|p| self.resolver.resolve(p, "", floor).url);
                Node::Video(VideoRef {
                    source: MediaRef::new(dest, resolved.url, title, MediaKind::Video),
                    deferred_poster,
                    poster: None,
                })
            }
            MediaKind::Image => Node::Image(MediaRef::new(dest, resolved.url, title, MediaKind::Image)),
        }
    }

    fn link(&self, dest: &str, title: &str, text: &str) -> Node {
        let href = self.resolver.resolve_href(dest, title);
        let netdisk =
            self.options.contains(RenderOptions::DECORATE_NETDISK) && resolve::is_netdisk(&href);
        let display = if text == "url" { dest } else { text };
        let title = if title.is_empty() { text } else { title };
        Node::Link(crate::document::LinkRef {
            href,
            title: title.to_owned(),
            text: display.to_owned(),
            external: !dest.starts_with('#'),
            netdisk,
            status: None,
        })
    }

    fn text(&self, text: &str) -> Vec<TextRun> {
        color_spans(text)
    }
}

/// `[color=...]...[/color]` spans become styled runs; the remainder is
/// scanned for font spans. Malformed spans stay literal.
fn color_spans(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut last = 0;
    for caps in COLOR_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        font_spans(&text[last..m.start()], &mut runs);
        let color = caps.get(1).map_or("inherit", |v| v.as_str());
        runs.push(TextRun::styled(&caps[2], format!("color:{color}")));
        last = m.end();
    }
    font_spans(&text[last..], &mut runs);
    runs
}

fn font_spans(text: &str, runs: &mut Vec<TextRun>) {
    let mut last = 0;
    for caps in FONT_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        if m.start() > last {
            runs.push(TextRun::plain(&text[last..m.start()]));
        }
        let font = caps.get(1).map_or("inherit", |v| v.as_str());
        runs.push(TextRun::styled(&caps[2], format!("font-family:{font}")));
        last = m.end();
    }
    if last < text.len() {
        runs.push(TextRun::plain(&text[last..]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn engine() -> MarkupEngine<PostRenderer> {
        let ctx = ViewContext::new("https://x", "t", "99", "https://ngabbs.com");
        MarkupEngine::new(PostRenderer::new(ctx, RenderOptions::default()))
    }

    fn parse(text: &str) -> Document {
        engine().parse(text)
    }

    fn find_floor(doc: &Document) -> FloorAnchor {
        doc.iter()
            .find_map(|id| match doc.node(id) {
                Node::Heading(h) => h.floor.clone(),
                _ => None,
            })
            .expect("expected a floor heading")
    }

    #[test]
    fn floor_heading_parses_into_an_anchor() {
        let doc = parse("##### 3.[45] <pid:99> 2024-01-02 03:04:05 by Alice(123):");
        let anchor = find_floor(&doc);
        assert_eq!(anchor.floor, 3);
        assert_eq!(anchor.post_id, "99");
        assert_eq!(anchor.author, "Alice");
        assert_eq!(anchor.uid, Some(123));
        assert_eq!(
            anchor.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5)
        );
    }

    #[test]
    fn floor_heading_uid_is_optional() {
        let doc = parse("##### 7.[0] <pid:120> 2023-11-05 10:00:00 by 楼主:");
        let anchor = find_floor(&doc);
        assert_eq!(anchor.floor, 7);
        assert_eq!(anchor.author, "楼主");
        assert_eq!(anchor.uid, None);
    }

    #[test]
    fn pid_span_variant_is_unified_before_matching() {
        let doc =
            parse("##### <span id=\"pid99\">3.[45] <pid:99> 2024-01-02 03:04:05 by Alice(123)</span>");
        let anchor = find_floor(&doc);
        assert_eq!(anchor.floor, 3);
        assert_eq!(anchor.author, "Alice");
    }

    #[test]
    fn non_matching_h5_is_a_plain_heading() {
        let doc = parse("##### just a heading");
        let heading = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Heading(h) => Some(h.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(heading.level, 5);
        assert!(heading.floor.is_none());
        assert_eq!(heading.text, "just a heading");
    }

    #[test]
    fn h3_headings_link_back_to_the_topic() {
        let doc = parse("### topic title");
        let heading = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Heading(h) => Some(h.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            heading.topic_link.as_deref(),
            Some("https://ngabbs.com/read.php?tid=99")
        );
    }

    #[test]
    fn embedded_video_is_matched_by_regex() {
        let doc =
            parse("watch <video src=\"https://x/v.mp4\" poster=\"https://x/p.jpg\"></video> now");
        let video = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Video(v) => Some(v.clone()),
                _ => None,
            })
            .expect("expected a video node");
        assert!(video.source.deferred);
        assert_eq!(video.source.deferred_src.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(video.deferred_poster.as_deref(), Some("https://x/p.jpg"));
        assert!(video.source.src.is_none());
    }

    #[test]
    fn media_is_deferred_after_parse() {
        let doc = parse("![img](./a/b.png)");
        let image = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Image(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert!(image.deferred);
        assert_eq!(
            image.deferred_src.as_deref(),
            Some("https://x/view/t/99/a/b.png")
        );
        assert!(image.src.is_none());
    }

    #[test]
    fn bracket_quotes_and_native_quotes_stay_distinguishable() {
        let doc = parse(&crate::rewrite::rewrite("[quote]hi[/quote]\n\n> hi"));
        let origins: Vec<QuoteOrigin> = doc
            .iter()
            .filter_map(|id| match doc.node(id) {
                Node::Quote(origin) => Some(*origin),
                _ => None,
            })
            .collect();
        assert_eq!(origins, vec![QuoteOrigin::BracketTag, QuoteOrigin::Native]);

        // Both contain the same text content.
        let texts: Vec<&str> = doc
            .iter()
            .filter_map(|id| match doc.node(id) {
                Node::Text(run) => Some(run.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["hi", "hi"]);
    }

    #[test]
    fn markdown_links_inside_html_blocks_are_recovered() {
        let source = "<blockquote _type=\"tag\">\nsee [here](https://elsewhere.example/a) ok\n</blockquote>";
        let doc = parse(source);
        let link = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Link(l) => Some(l.clone()),
                _ => None,
            })
            .expect("expected a recovered link");
        assert_eq!(link.href, "https://elsewhere.example/a");
        assert_eq!(link.text, "here");
        // And the link lives inside the bracket quote.
        let link_id = doc.iter().find(|&id| matches!(doc.node(id), Node::Link(_))).unwrap();
        assert!(doc.in_quoted_container(link_id));
    }

    #[test]
    fn color_and_font_spans_become_styled_runs() {
        let runs = color_spans("a [color=red]warm[/color] b [font=mono]fixed[/font] c");
        assert_eq!(runs.len(), 5);
        assert_eq!(runs[1], TextRun::styled("warm", "color:red"));
        assert_eq!(runs[3], TextRun::styled("fixed", "font-family:mono"));
    }

    #[test]
    fn valueless_spans_inherit() {
        let runs = color_spans("[color]x[/color]");
        assert_eq!(runs, vec![TextRun::styled("x", "color:inherit")]);
    }

    #[test]
    fn malformed_spans_stay_literal() {
        let runs = color_spans("[color=red]never closed");
        assert_eq!(runs, vec![TextRun::plain("[color=red]never closed")]);
    }

    #[test]
    fn link_text_url_shows_the_destination() {
        let doc = parse("[url](https://elsewhere.example/file)");
        let link = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Link(l) => Some(l.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(link.text, "https://elsewhere.example/file");
    }

    #[test]
    fn netdisk_links_are_tagged() {
        let doc = parse("[share](https://pan.baidu.com/s/1abc)");
        let link = doc
            .iter()
            .find_map(|id| match doc.node(id) {
                Node::Link(l) => Some(l.clone()),
                _ => None,
            })
            .unwrap();
        assert!(link.netdisk);
        assert!(link.status.is_none());
    }

    #[test]
    fn comment_markers_build_comment_containers() {
        let source = crate::rewrite::rewrite(
            "*---下挂评论---*\n1.[0] <pid:7> 2024-01-02 03:04:05 by Bob:\n*---下挂评论---*\n",
        );
        let doc = parse(&source);
        let comment = doc
            .iter()
            .find(|&id| matches!(doc.node(id), Node::Comment))
            .expect("expected a comment container");
        // The floor heading inside the comment is a descendant of it.
        let inner_heading = doc
            .iter()
            .find(|&id| matches!(doc.node(id), Node::Heading(h) if h.floor.is_some()))
            .expect("expected the comment's floor heading");
        let mut cursor = doc.parent(inner_heading);
        let mut inside = false;
        while let Some(ancestor) = cursor {
            if ancestor == comment {
                inside = true;
                break;
            }
            cursor = doc.parent(ancestor);
        }
        assert!(inside);
    }
}
