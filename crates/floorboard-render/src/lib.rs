//! floorboard renderer
//!
//! Turns one archived forum post's source text (Markdown interleaved with
//! forum pseudo-tags and pseudo-HTML media tags) into a navigable,
//! progressively-loaded document: rewrite passes normalize the pseudo-tags,
//! the markup engine builds a typed node tree with deferred media, the floor
//! index supports jump navigation, and the scheduler/recovery pair drives
//! visibility-based loading with per-node failure handling.
//!
//! Nothing here performs network I/O. Media nodes carry deferred URLs until
//! the embedding shell reports visibility, and the shell is told what to
//! reload when a fetch fails.

use bitflags::bitflags;

use floorboard_common::{ViewContext, ViewError};

pub mod document;
pub mod engine;
pub mod floors;
pub mod html;
pub mod netdisk;
pub mod recover;
pub mod resolve;
pub mod rewrite;
pub mod schedule;

pub use crate::document::{Document, MediaKind, MediaRef, Node, NodeId, QuoteOrigin};
pub use crate::engine::{LeafHooks, MarkupEngine, PostRenderer};
pub use crate::floors::{FloorEntry, FloorIndex};
pub use crate::netdisk::{
    NetdiskOp, NetdiskRequest, NetdiskStatus, PollBudget, TransferRecord, TransferStatus,
};
pub use crate::recover::{RecoveryAction, ReloadRecovery};
pub use crate::resolve::MediaResolver;
pub use crate::schedule::{Geometry, LazyLoadScheduler, VisibilityEvent};

bitflags! {
    /// Policy flags for one render.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RenderOptions: u32 {
        /// Rewrite attachment-origin media to floor-qualified proxy paths at
        /// parse time instead of waiting for a load failure.
        const REPLACE_ATTACHMENTS = 1 << 1;
        /// Start with all media hidden; the scheduler promotes nothing until
        /// the shell toggles media back on.
        const HIDE_MEDIA = 1 << 2;
        /// Tag net-storage links for status decoration.
        const DECORATE_NETDISK = 1 << 3;
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::DECORATE_NETDISK
    }
}

/// A fully parsed and rendered post, ready for the shell to attach.
#[derive(Debug, Clone)]
pub struct RenderedPost {
    pub document: Document,
    pub floors: FloorIndex,
    /// DOM-ready markup with deferred media attributes.
    pub html: String,
    pub options: RenderOptions,
}

impl RenderedPost {
    /// Anchor node for a floor jump.
    pub fn jump_to(&self, floor: u32) -> Result<NodeId, ViewError> {
        self.floors.anchor_of(floor)
    }

    /// Start observing this document's media for visibility-driven loading.
    pub fn observe(&self) -> LazyLoadScheduler {
        let mut scheduler = LazyLoadScheduler::observe(&self.document);
        scheduler.set_media_hidden(self.options.contains(RenderOptions::HIDE_MEDIA));
        scheduler
    }
}

/// Render one post: rewrite passes, parse, floor indexing, HTML emission.
///
/// Parse anomalies degrade to literal rendering; nothing in the source text
/// can make this fail.
pub fn render_post(ctx: &ViewContext, options: RenderOptions, source: &str) -> RenderedPost {
    let rewritten = rewrite::rewrite(source);
    let hooks = PostRenderer::new(ctx.clone(), options);
    let document = MarkupEngine::new(hooks).parse(&rewritten);
    let floors = FloorIndex::build(&document);
    tracing::debug!(
        nodes = document.len(),
        floors = floors.entries().len(),
        "post rendered"
    );
    let html = html::push_html(&document);
    RenderedPost {
        document,
        floors,
        html,
        options,
    }
}
