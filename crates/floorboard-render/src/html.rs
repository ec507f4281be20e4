//! Document → DOM-ready HTML.
//!
//! Media sources are emitted under deferred attribute names (`_src`,
//! `_poster`) until the scheduler promotes them, so attaching the markup
//! implies no fetch. Floor anchors keep the attribute shape the jump
//! navigation and the shell's styling expect.

use pulldown_cmark_escape::{StrWrite, escape_href, escape_html, escape_html_body_text};

use crate::document::{Document, HeadingData, LinkRef, MediaRef, Node, NodeId, QuoteOrigin,
    TextRun, VideoRef};

/// Deferred attribute names promoted to `src`/`poster` on activation.
pub const ATTR_DEFERRED_SRC: &str = "_src";
pub const ATTR_DEFERRED_POSTER: &str = "_poster";

/// Render a document to an HTML string.
pub fn push_html(doc: &Document) -> String {
    let mut output = String::new();
    HtmlWriter::new(doc, &mut output)
        .run()
        .expect("writing to a String is infallible");
    output
}

struct HtmlWriter<'a, W: StrWrite> {
    doc: &'a Document,
    writer: W,
    /// Whether or not the last write wrote a newline.
    end_newline: bool,
}

impl<'a, W: StrWrite> HtmlWriter<'a, W> {
    fn new(doc: &'a Document, writer: W) -> Self {
        Self {
            doc,
            writer,
            end_newline: true,
        }
    }

    fn run(mut self) -> Result<(), W::Error> {
        let doc = self.doc;
        for &id in doc.roots() {
            self.node(id)?;
        }
        Ok(())
    }

    /// Writes a new line.
    #[inline]
    fn write_newline(&mut self) -> Result<(), W::Error> {
        self.end_newline = true;
        self.writer.write_str("\n")
    }

    /// Writes a buffer, and tracks whether or not a newline was written.
    #[inline]
    fn write(&mut self, s: &str) -> Result<(), W::Error> {
        self.writer.write_str(s)?;
        if !s.is_empty() {
            self.end_newline = s.ends_with('\n');
        }
        Ok(())
    }

    fn children(&mut self, id: NodeId) -> Result<(), W::Error> {
        let doc = self.doc;
        for &child in doc.children(id) {
            self.node(child)?;
        }
        Ok(())
    }

    fn node(&mut self, id: NodeId) -> Result<(), W::Error> {
        let doc = self.doc;
        match doc.node(id) {
            Node::Heading(heading) => self.heading(heading),
            Node::Paragraph => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                self.write("<p>")?;
                self.children(id)?;
                self.write("</p>\n")
            }
            Node::Text(run) => self.text_run(run),
            Node::InlineCode(code) => {
                self.write("<code>")?;
                escape_html_body_text(&mut self.writer, code)?;
                self.write("</code>")
            }
            Node::Emphasis => {
                self.write("<em>")?;
                self.children(id)?;
                self.write("</em>")
            }
            Node::Strong => {
                self.write("<strong>")?;
                self.children(id)?;
                self.write("</strong>")
            }
            Node::Strikethrough => {
                self.write("<del>")?;
                self.children(id)?;
                self.write("</del>")
            }
            Node::Image(media) => self.image(media),
            Node::Video(video) => self.video(video),
            Node::Link(link) => self.link(link),
            Node::Quote(origin) => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                match origin {
                    QuoteOrigin::Native => self.write("<blockquote>\n")?,
                    QuoteOrigin::BracketTag => {
                        self.write("<blockquote _type=\"tag\">\n")?;
                    }
                }
                self.children(id)?;
                self.write("</blockquote>\n")
            }
            Node::Comment => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                self.write("<div class=\"comment\"><div class=\"subtitle\">评论</div>\n")?;
                self.children(id)?;
                self.write("</div>\n")
            }
            Node::CodeBlock { text } => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                self.write("<pre><code>")?;
                escape_html_body_text(&mut self.writer, text)?;
                self.write("</code></pre>\n")
            }
            Node::List { start } => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                match start {
                    Some(1) => self.write("<ol>\n")?,
                    Some(start) => {
                        self.write("<ol start=\"")?;
                        write!(&mut self.writer, "{}", start)?;
                        self.write("\">\n")?;
                    }
                    None => self.write("<ul>\n")?,
                }
                self.children(id)?;
                match start {
                    Some(_) => self.write("</ol>\n"),
                    None => self.write("</ul>\n"),
                }
            }
            Node::Item => {
                if !self.end_newline {
                    self.write_newline()?;
                }
                self.write("<li>")?;
                self.children(id)?;
                self.write("</li>\n")
            }
            Node::Rule => {
                if self.end_newline {
                    self.write("<hr />\n")
                } else {
                    self.write("\n<hr />\n")
                }
            }
            Node::HardBreak => self.write("<br>"),
            Node::Placeholder { .. } => self.write("<button class=\"show\">显示图片</button>"),
            Node::Html(raw) => self.write(raw),
        }
    }

    fn heading(&mut self, heading: &HeadingData) -> Result<(), W::Error> {
        if !self.end_newline {
            self.write_newline()?;
        }
        if let Some(anchor) = &heading.floor {
            self.write("<h5 floor=\"")?;
            write!(&mut self.writer, "{}", anchor.floor)?;
            self.write("\"><div id=\"pid")?;
            escape_html(&mut self.writer, &anchor.post_id)?;
            self.write("\" class=\"floor\"><span class=\"num\">")?;
            write!(&mut self.writer, "{}", anchor.floor)?;
            self.write("</span><span class=\"author\"")?;
            if let Some(uid) = anchor.uid {
                self.write(" uid=\"")?;
                write!(&mut self.writer, "{}", uid)?;
                self.write("\"")?;
            }
            self.write(">")?;
            escape_html_body_text(&mut self.writer, &anchor.author)?;
            self.write("</span><span class=\"time\">")?;
            escape_html_body_text(&mut self.writer, &anchor.raw_timestamp)?;
            self.write("</span></div></h5>\n")
        } else if let Some(link) = &heading.topic_link {
            self.write("<h3><a href=\"")?;
            escape_href(&mut self.writer, link)?;
            self.write("\" target=\"_blank\">")?;
            escape_html_body_text(&mut self.writer, &heading.text)?;
            self.write("</a></h3>\n")
        } else {
            self.write("<h")?;
            write!(&mut self.writer, "{}", heading.level)?;
            self.write(">")?;
            escape_html_body_text(&mut self.writer, &heading.text)?;
            self.write("</h")?;
            write!(&mut self.writer, "{}", heading.level)?;
            self.write(">\n")
        }
    }

    fn text_run(&mut self, run: &TextRun) -> Result<(), W::Error> {
        match &run.style {
            Some(style) => {
                self.write("<span style=\"")?;
                escape_html(&mut self.writer, style)?;
                self.write("\">")?;
                escape_html_body_text(&mut self.writer, &run.text)?;
                self.write("</span>")
            }
            None => {
                escape_html_body_text(&mut self.writer, &run.text)?;
                self.end_newline = run.text.ends_with('\n');
                Ok(())
            }
        }
    }

    fn image(&mut self, media: &MediaRef) -> Result<(), W::Error> {
        self.write("<img ")?;
        if media.deferred {
            self.write(ATTR_DEFERRED_SRC)?;
            self.write("=\"")?;
            escape_href(&mut self.writer, media.deferred_src.as_deref().unwrap_or(""))?;
        } else {
            self.write("src=\"")?;
            escape_href(&mut self.writer, media.src.as_deref().unwrap_or(""))?;
        }
        self.write("\" alt=\"")?;
        escape_html(&mut self.writer, &media.title)?;
        self.write("\" title=\"")?;
        escape_html(&mut self.writer, &media.title)?;
        self.write("\">")
    }

    fn video(&mut self, video: &VideoRef) -> Result<(), W::Error> {
        self.write("<video ")?;
        if video.source.deferred {
            self.write(ATTR_DEFERRED_SRC)?;
            self.write("=\"")?;
            escape_href(
                &mut self.writer,
                video.source.deferred_src.as_deref().unwrap_or(""),
            )?;
            self.write("\" ")?;
            self.write(ATTR_DEFERRED_POSTER)?;
            self.write("=\"")?;
            escape_href(&mut self.writer, video.deferred_poster.as_deref().unwrap_or(""))?;
            self.write("\"")?;
        } else {
            self.write("src=\"")?;
            escape_href(&mut self.writer, video.source.src.as_deref().unwrap_or(""))?;
            self.write("\"")?;
            if let Some(poster) = &video.poster {
                self.write(" poster=\"")?;
                escape_href(&mut self.writer, poster)?;
                self.write("\"")?;
            }
        }
        if !video.source.title.is_empty() {
            self.write(" title=\"")?;
            escape_html(&mut self.writer, &video.source.title)?;
            self.write("\"")?;
        }
        self.write(" controls></video>")
    }

    fn link(&mut self, link: &LinkRef) -> Result<(), W::Error> {
        self.write("<a href=\"")?;
        escape_href(&mut self.writer, &link.href)?;
        self.write("\"")?;
        if !link.title.is_empty() {
            self.write(" title=\"")?;
            escape_html(&mut self.writer, &link.title)?;
            self.write("\"")?;
        }
        if link.external {
            self.write(" target=\"_blank\"")?;
        }
        if let Some(status) = link.status {
            self.write(" pan-status=\"")?;
            self.write(status.as_str())?;
            self.write("\"")?;
        }
        self.write(">")?;
        escape_html_body_text(&mut self.writer, &link.text)?;
        self.write("</a>")
    }
}
