//! Per-media-kind reload recovery.
//!
//! Invoked by the shell when a promoted media element fails to load. Failure
//! never escalates past the node: the rest of the render stays intact, and
//! the only user-visible artifact is a click-to-retry affordance once
//! automated recovery is exhausted.
//!
//! Images get one automatic retry — cache-bust suffix stripped and
//! re-stamped for origin-local sources, or a rewrite to the smile proxy for
//! cross-origin smile assets. Videos get no automatic retry loop: source and
//! poster are rewritten once to the floor-qualified proxy path.

use std::collections::HashMap;

use floorboard_common::{ViewContext, proxy::FLOOR_UNKNOWN};

use crate::document::{Document, Node, NodeId};
use crate::floors::FloorIndex;
use crate::resolve;

/// Automatic retries are suppressed for this long to avoid a failure storm.
pub const RETRY_SUPPRESS_MS: u64 = 1_000;

/// Transient per-node recovery state; discarded once the resource loads.
#[derive(Debug, Clone, Copy, Default)]
struct RecoveryState {
    attempts: u32,
    last_attempt_at: u64,
}

/// What the shell should do after a failure was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// The node's source was rewritten; reload it now.
    Retry,
    /// Automated recovery is exhausted; expose the click-to-retry
    /// affordance.
    OfferManualRetry,
    /// Failure absorbed; nothing further to reload.
    None,
}

/// Retry/proxy protocol for failed media loads.
#[derive(Debug, Clone)]
pub struct ReloadRecovery {
    ctx: ViewContext,
    states: HashMap<NodeId, RecoveryState>,
}

impl ReloadRecovery {
    pub fn new(ctx: ViewContext) -> Self {
        Self {
            ctx,
            states: HashMap::new(),
        }
    }

    /// A media element reported a load failure.
    pub fn on_error(
        &mut self,
        doc: &mut Document,
        floors: &FloorIndex,
        node: NodeId,
        now_ms: u64,
    ) -> RecoveryAction {
        match doc.node(node) {
            Node::Image(_) => {
                let attempts = self.states.entry(node).or_default().attempts;
                if attempts > 0 {
                    // One automatic attempt only; after that the user clicks.
                    return RecoveryAction::OfferManualRetry;
                }
                self.reload_image(doc, node, now_ms)
            }
            Node::Video(_) => self.reload_video(doc, floors, node, now_ms),
            _ => RecoveryAction::None,
        }
    }

    /// User clicked the retry affordance on a failed image.
    pub fn manual_retry(&mut self, doc: &mut Document, node: NodeId, now_ms: u64) -> RecoveryAction {
        match doc.node(node) {
            Node::Image(_) => self.reload_image(doc, node, now_ms),
            _ => RecoveryAction::None,
        }
    }

    /// The resource loaded; recovery state is discarded.
    pub fn on_load(&mut self, node: NodeId) {
        self.states.remove(&node);
    }

    fn reload_image(&mut self, doc: &mut Document, node: NodeId, now_ms: u64) -> RecoveryAction {
        let state = self.states.entry(node).or_default();
        if state.attempts > 0 && now_ms < state.last_attempt_at + RETRY_SUPPRESS_MS {
            return RecoveryAction::None;
        }

        let Node::Image(media) = doc.node_mut(node) else {
            return RecoveryAction::None;
        };
        // Only promoted media can have failed a load.
        let Some(src) = media.src.clone() else {
            return RecoveryAction::None;
        };

        let mut base = src;
        if let Some(i) = base.find("?t=") {
            base.truncate(i);
        }
        let rewritten = if base.starts_with(&self.ctx.origin) {
            // Transient failure: force a re-request with a fresh timestamp.
            Some(format!("{base}?t={now_ms}"))
        } else {
            // The forum denies cross-origin smile requests; route through
            // the local proxy instead.
            resolve::smile_name(&base, &media.title).map(|name| self.ctx.smile_url(&name))
        };

        state.attempts += 1;
        state.last_attempt_at = now_ms;

        match rewritten {
            Some(url) => {
                tracing::debug!(node = ?node, url = %url, "image retry");
                media.src = Some(url);
                RecoveryAction::Retry
            }
            None => RecoveryAction::OfferManualRetry,
        }
    }

    fn reload_video(
        &mut self,
        doc: &mut Document,
        floors: &FloorIndex,
        node: NodeId,
        now_ms: u64,
    ) -> RecoveryAction {
        let state = self.states.entry(node).or_default();
        if state.attempts > 0 {
            return RecoveryAction::None;
        }
        let floor = floors.floor_of(doc, node).unwrap_or(FLOOR_UNKNOWN);

        let Node::Video(video) = doc.node_mut(node) else {
            return RecoveryAction::None;
        };
        let Some(src) = video.source.src.clone() else {
            return RecoveryAction::None;
        };

        video.source.src = Some(self.ctx.attachment_proxy_url(floor, &src));
        if let Some(poster) = video.poster.clone() {
            video.poster = Some(self.ctx.attachment_proxy_url(floor, &poster));
        }

        state.attempts += 1;
        state.last_attempt_at = now_ms;
        tracing::debug!(node = ?node, floor, "video rerouted through attachment proxy");
        RecoveryAction::Retry
    }
}
