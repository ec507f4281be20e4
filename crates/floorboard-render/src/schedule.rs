//! Visibility-driven lazy loading.
//!
//! The scheduler consumes an explicit queue of visibility events instead of
//! binding to any UI toolkit's observer primitive: the shell reports
//! `(node, visible)` transitions and periodically calls [`LazyLoadScheduler::tick`]
//! with the current clock. Per-node state machine:
//!
//! ```text
//! Deferred → Pending(debounced) → Active
//!                 ↓ zero-area recheck
//!              Deferred (restartable on the next visibility event)
//! ```
//!
//! Promotion order follows visibility-event order, not document order. All
//! clocks are caller-provided milliseconds; debounce timers are implicit and
//! per-node.

use std::collections::{HashMap, HashSet};

use crate::document::{Document, Node, NodeId};

/// Debounce window between a node becoming visible and its promotion.
pub const DEBOUNCE_MS: u64 = 100;

/// Generic-title sentinel marking quoted media as redundant to preload.
pub const HIDDEN_TITLE_SENTINEL: &str = "img";

/// One visibility transition reported by the embedding shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEvent {
    pub node: NodeId,
    pub visible: bool,
}

/// Rendered-geometry capability the shell provides; consulted when a
/// debounce fires to confirm the node still occupies area.
pub trait Geometry {
    /// Rendered (width, height) of the node, zero when it left the layout.
    fn area_of(&self, node: NodeId) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Deferred,
    Pending { due: u64 },
    Active,
}

/// Visibility-driven activation of deferred media attributes.
#[derive(Debug, Clone, Default)]
pub struct LazyLoadScheduler {
    states: HashMap<NodeId, LoadState>,
    /// Debounce queue in visibility-event order.
    pending: Vec<NodeId>,
    /// Quoted media the user explicitly revealed; never gated again.
    revealed: HashSet<NodeId>,
    media_hidden: bool,
}

impl LazyLoadScheduler {
    /// Register every media node of a fully parsed document. Parse always
    /// completes before observation starts; there is no partial-tree mode.
    pub fn observe(doc: &Document) -> Self {
        let states = doc
            .media_nodes()
            .into_iter()
            .map(|id| (id, LoadState::Deferred))
            .collect();
        Self {
            states,
            pending: Vec::new(),
            revealed: HashSet::new(),
            media_hidden: false,
        }
    }

    /// Globally hide or show media. While hidden, events are ignored and
    /// pending promotions stay parked.
    pub fn set_media_hidden(&mut self, hidden: bool) {
        self.media_hidden = hidden;
    }

    pub fn media_hidden(&self) -> bool {
        self.media_hidden
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        matches!(self.states.get(&node), Some(LoadState::Active))
    }

    /// Feed one visibility event.
    ///
    /// Media nested in a quote or comment container, carrying the generic
    /// title sentinel, is swapped for a show-image gate on first visibility
    /// instead of entering the debounce queue.
    pub fn on_visibility(&mut self, doc: &mut Document, event: VisibilityEvent, now_ms: u64) {
        if self.media_hidden || !event.visible {
            return;
        }
        let Some(&state) = self.states.get(&event.node) else {
            return;
        };
        if state == LoadState::Active || !doc.is_attached(event.node) {
            return;
        }

        if doc.in_quoted_container(event.node)
            && doc.media_title(event.node) == Some(HIDDEN_TITLE_SENTINEL)
            && !self.revealed.contains(&event.node)
        {
            let gate = doc.push_detached(Node::Placeholder { hidden: event.node });
            doc.replace_child(event.node, gate);
            tracing::debug!(node = ?event.node, "quoted media gated behind show-image button");
            return;
        }

        // Re-entry while pending restarts the debounce window.
        if state == LoadState::Deferred {
            self.pending.push(event.node);
        }
        self.states
            .insert(event.node, LoadState::Pending { due: now_ms + DEBOUNCE_MS });
    }

    /// Fire due debounce timers. Nodes still occupying area are promoted
    /// (deferred attributes become live) and leave observation; zero-area
    /// nodes fall back to Deferred and re-enter on their next visibility
    /// event. Returns the promoted nodes in event order.
    pub fn tick(
        &mut self,
        doc: &mut Document,
        geometry: &impl Geometry,
        now_ms: u64,
    ) -> Vec<NodeId> {
        let mut promoted = Vec::new();
        let mut parked = Vec::new();
        for id in std::mem::take(&mut self.pending) {
            let Some(LoadState::Pending { due }) = self.states.get(&id).copied() else {
                continue;
            };
            if self.media_hidden || due > now_ms {
                parked.push(id);
                continue;
            }
            let (width, height) = geometry.area_of(id);
            if width > 0 && height > 0 {
                if doc.promote(id) {
                    promoted.push(id);
                }
                self.states.insert(id, LoadState::Active);
            } else {
                self.states.insert(id, LoadState::Deferred);
            }
        }
        self.pending = parked;
        promoted
    }

    /// User clicked a show-image gate: swap the original node back in and
    /// remember the reveal. The node loads on its next visibility event.
    pub fn reveal(&mut self, doc: &mut Document, gate: NodeId) {
        let Node::Placeholder { hidden } = *doc.node(gate) else {
            return;
        };
        doc.replace_child(gate, hidden);
        self.revealed.insert(hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MediaKind, MediaRef, QuoteOrigin};

    struct FullView;
    impl Geometry for FullView {
        fn area_of(&self, _: NodeId) -> (u32, u32) {
            (640, 480)
        }
    }

    struct ZeroView;
    impl Geometry for ZeroView {
        fn area_of(&self, _: NodeId) -> (u32, u32) {
            (0, 0)
        }
    }

    fn image(title: &str) -> Node {
        Node::Image(MediaRef::new("./a.png", "https://x/a.png", title, MediaKind::Image))
    }

    fn plain_doc() -> (Document, NodeId) {
        let mut doc = Document::new();
        let p = doc.push(Node::Paragraph, None);
        let img = doc.push(image("photo"), Some(p));
        (doc, img)
    }

    fn quoted_doc(title: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let q = doc.push(Node::Quote(QuoteOrigin::BracketTag), None);
        let img = doc.push(image(title), Some(q));
        (doc, img)
    }

    #[test]
    fn visible_media_promotes_after_the_debounce() {
        let (mut doc, img) = plain_doc();
        let mut sched = LazyLoadScheduler::observe(&doc);

        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 1_000);
        // Debounce has not elapsed yet.
        assert!(sched.tick(&mut doc, &FullView, 1_050).is_empty());
        assert_eq!(sched.tick(&mut doc, &FullView, 1_100), vec![img]);

        let Node::Image(media) = doc.node(img) else { unreachable!() };
        assert!(!media.deferred);
        assert_eq!(media.src.as_deref(), Some("https://x/a.png"));
        assert!(sched.is_active(img));

        // Promotion happens at most once.
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 2_000);
        assert!(sched.tick(&mut doc, &FullView, 3_000).is_empty());
    }

    #[test]
    fn zero_area_recheck_discards_and_restarts() {
        let (mut doc, img) = plain_doc();
        let mut sched = LazyLoadScheduler::observe(&doc);

        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 0);
        assert!(sched.tick(&mut doc, &ZeroView, 200).is_empty());
        let Node::Image(media) = doc.node(img) else { unreachable!() };
        assert!(media.deferred);

        // The next visibility event re-enters the pipeline.
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 300);
        assert_eq!(sched.tick(&mut doc, &FullView, 400), vec![img]);
    }

    #[test]
    fn invisible_events_are_ignored() {
        let (mut doc, img) = plain_doc();
        let mut sched = LazyLoadScheduler::observe(&doc);
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: false }, 0);
        assert!(sched.tick(&mut doc, &FullView, 1_000).is_empty());
    }

    #[test]
    fn quoted_sentinel_media_is_gated_until_revealed() {
        let (mut doc, img) = quoted_doc(HIDDEN_TITLE_SENTINEL);
        let quote = doc.parent(img).unwrap();
        let mut sched = LazyLoadScheduler::observe(&doc);

        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 0);
        // The image was swapped for a gate instead of loading.
        let gate = doc.children(quote)[0];
        assert!(matches!(doc.node(gate), Node::Placeholder { hidden } if *hidden == img));
        assert!(sched.tick(&mut doc, &FullView, 1_000).is_empty());

        sched.reveal(&mut doc, gate);
        assert_eq!(doc.children(quote), &[img]);

        // Revealed media loads normally from here on.
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 2_000);
        assert_eq!(sched.tick(&mut doc, &FullView, 2_100), vec![img]);
    }

    #[test]
    fn quoted_media_with_a_real_title_loads_normally() {
        let (mut doc, img) = quoted_doc("screenshot.png");
        let mut sched = LazyLoadScheduler::observe(&doc);
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 0);
        assert_eq!(sched.tick(&mut doc, &FullView, 100), vec![img]);
    }

    #[test]
    fn hidden_media_toggle_parks_everything() {
        let (mut doc, img) = plain_doc();
        let mut sched = LazyLoadScheduler::observe(&doc);
        sched.set_media_hidden(true);

        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 0);
        assert!(sched.tick(&mut doc, &FullView, 1_000).is_empty());

        sched.set_media_hidden(false);
        sched.on_visibility(&mut doc, VisibilityEvent { node: img, visible: true }, 2_000);
        assert_eq!(sched.tick(&mut doc, &FullView, 2_100), vec![img]);
    }

    #[test]
    fn promotion_follows_event_order_not_document_order() {
        let mut doc = Document::new();
        let p = doc.push(Node::Paragraph, None);
        let first = doc.push(image("a"), Some(p));
        let second = doc.push(image("b"), Some(p));
        let mut sched = LazyLoadScheduler::observe(&doc);

        // The later document node becomes visible first.
        sched.on_visibility(&mut doc, VisibilityEvent { node: second, visible: true }, 0);
        sched.on_visibility(&mut doc, VisibilityEvent { node: first, visible: true }, 10);
        assert_eq!(sched.tick(&mut doc, &FullView, 500), vec![second, first]);
    }
}
