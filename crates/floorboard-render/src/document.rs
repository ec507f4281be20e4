//! Document tree produced by the markup engine.
//!
//! A [`Document`] owns all of its nodes in an arena; [`NodeId`] handles are
//! only meaningful for the document that produced them. Node order matches
//! source order, and floor headings always precede the content they
//! introduce.

use chrono::NaiveDateTime;

use crate::netdisk::TransferStatus;

/// Handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Distinguishes forum bracket quoting from native Markdown quoting.
///
/// Both render as block quotes; the structural attribute survives so the
/// writer (and tests) can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrigin {
    /// `> ...` Markdown quoting.
    Native,
    /// `[quote]...[/quote]` forum tags.
    BracketTag,
}

/// Media kind derived from the source extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A media locator in its deferred-loading lifecycle.
///
/// Created during parse with `deferred = true` and the resolved URL parked in
/// the deferred slot; no fetch is implied until the scheduler promotes it.
/// Promotion happens at most once. A failed load never resets `deferred` —
/// recovery rewrites the live source instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Source text exactly as written in the post.
    pub raw_src: String,
    /// Canonical URL awaiting promotion.
    pub deferred_src: Option<String>,
    /// Live source; set by the scheduler on promotion.
    pub src: Option<String>,
    pub title: String,
    pub kind: MediaKind,
    pub deferred: bool,
}

impl MediaRef {
    pub fn new(
        raw_src: impl Into<String>,
        resolved: impl Into<String>,
        title: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            raw_src: raw_src.into(),
            deferred_src: Some(resolved.into()),
            src: None,
            title: title.into(),
            kind,
            deferred: true,
        }
    }

    /// Move the deferred URL into the live slot. Returns false if the ref was
    /// already promoted.
    pub fn promote(&mut self) -> bool {
        if !self.deferred {
            return false;
        }
        self.src = self.deferred_src.take();
        self.deferred = false;
        true
    }
}

/// An embedded video: a deferred source plus a deferred poster frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub source: MediaRef,
    /// Poster URL awaiting promotion alongside the source.
    pub deferred_poster: Option<String>,
    /// Live poster attribute.
    pub poster: Option<String>,
}

impl VideoRef {
    pub fn promote(&mut self) -> bool {
        if !self.source.promote() {
            return false;
        }
        self.poster = self.deferred_poster.take();
        true
    }
}

/// A run of inline text, optionally carrying an inline style attribute
/// converted from legacy bracket color/font spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: Option<String>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn styled(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Some(style.into()),
        }
    }
}

/// A hyperlink with its origin-policy-resolved target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub href: String,
    pub title: String,
    pub text: String,
    /// Opens in a new context; false only for intra-document anchors.
    pub external: bool,
    /// Target host matches the net-disk pattern; eligible for status
    /// decoration.
    pub netdisk: bool,
    /// Last status reported by the net-disk collaborator, if any.
    pub status: Option<TransferStatus>,
}

/// Structured data recovered from a floor-marker heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorAnchor {
    pub floor: u32,
    pub post_id: String,
    pub author: String,
    pub uid: Option<u64>,
    pub timestamp: Option<NaiveDateTime>,
    /// Timestamp exactly as it appeared in the source.
    pub raw_timestamp: String,
}

/// A heading, possibly restructured into a floor anchor or wrapped in a link
/// back to the originating topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingData {
    pub level: u8,
    pub text: String,
    /// Depth-3 headings link back to the topic thread.
    pub topic_link: Option<String>,
    /// Present when the heading matched the floor-marker shape.
    pub floor: Option<FloorAnchor>,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Heading(HeadingData),
    Paragraph,
    Text(TextRun),
    InlineCode(String),
    Emphasis,
    Strong,
    Strikethrough,
    Image(MediaRef),
    Video(VideoRef),
    Link(LinkRef),
    Quote(QuoteOrigin),
    Comment,
    CodeBlock { text: String },
    List { start: Option<u64> },
    Item,
    Rule,
    HardBreak,
    /// "Show image" gate standing in for unrevealed media inside a quote or
    /// comment container. `hidden` is the detached original node.
    Placeholder { hidden: NodeId },
    /// Raw markup the engine passed through untouched.
    Html(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    node: Node,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Ordered tree of block and inline nodes for one post.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    roots: Vec<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node under `parent` (or at the top level) and return its id.
    pub fn push(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            node,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0].node
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node without attaching it anywhere. Meant to be swapped into
    /// the tree with [`Document::replace_child`].
    pub fn push_detached(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            node,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// The sibling immediately before `id` under its parent (or at the top
    /// level).
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = match self.nodes[id.0].parent {
            Some(parent) => &self.nodes[parent.0].children,
            None => &self.roots,
        };
        let pos = siblings.iter().position(|&s| s == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    /// Swap `old` out of its parent's child list for `new`, detaching `old`.
    ///
    /// `old` keeps its data (and its own children) so it can be swapped back
    /// in later.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes[old.0].parent;
        let siblings = match parent {
            Some(parent) => &mut self.nodes[parent.0].children,
            None => &mut self.roots,
        };
        match siblings.iter().position(|&s| s == old) {
            Some(pos) => {
                siblings[pos] = new;
                self.nodes[new.0].parent = parent;
                self.nodes[old.0].parent = None;
            }
            None => tracing::warn!(?old, ?new, "replace_child target not attached"),
        }
    }

    /// Depth-first, source-order traversal of the attached tree.
    pub fn iter(&self) -> DocumentIter<'_> {
        let stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        DocumentIter { doc: self, stack }
    }

    /// Ids of every image and video node, in document order.
    pub fn media_nodes(&self) -> Vec<NodeId> {
        self.iter().filter(|&id| self.is_media(id)).collect()
    }

    pub fn is_media(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Image(_) | Node::Video(_))
    }

    /// Accessible title of a media node.
    pub fn media_title(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::Image(m) => Some(m.title.as_str()),
            Node::Video(v) => Some(v.source.title.as_str()),
            _ => None,
        }
    }

    /// Promote a media node's deferred attributes to live attributes.
    /// Returns false for non-media nodes and already-promoted nodes.
    pub fn promote(&mut self, id: NodeId) -> bool {
        match self.node_mut(id) {
            Node::Image(m) => m.promote(),
            Node::Video(v) => v.promote(),
            _ => false,
        }
    }

    /// Whether the node is reachable from the roots. False for detached
    /// nodes awaiting a swap-back.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            match self.parent(cursor) {
                Some(parent) => cursor = parent,
                None => return self.roots.contains(&cursor),
            }
        }
    }

    /// Whether any ancestor of `id` is a quote or comment container.
    pub fn in_quoted_container(&self, id: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(ancestor) = cursor {
            if matches!(self.node(ancestor), Node::Quote(_) | Node::Comment) {
                return true;
            }
            cursor = self.parent(ancestor);
        }
        false
    }
}

pub struct DocumentIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for DocumentIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
