//! Net-storage link decoration.
//!
//! Net-disk shares found in a post are saved server-side by a separate
//! transfer service. This module only defines the exchange: the status DTOs,
//! the collaborator seam the shell implements over HTTP, a bounded polling
//! allowance, and the decoration pass that attaches reported statuses to the
//! links the resolver tagged. It is entirely independent of the media
//! pipeline.

use serde::{Deserialize, Serialize};

use floorboard_common::ViewError;

use crate::document::{Document, Node, NodeId};

/// Lifecycle of one transfer as reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Success,
    Failed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Success => "success",
            TransferStatus::Failed => "failed",
        }
    }
}

/// One net-disk share's transfer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Service name, e.g. "baidu" or "quark".
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Share extraction code, when the service requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Unpack password, when the shared upload is an archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// User-triggered operation verbs. The transfer service maps `retry` back to
/// a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetdiskOp {
    Save,
    Retry,
    Delete,
}

/// Body of a user-triggered operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetdiskRequest {
    pub opt: NetdiskOp,
    pub url: String,
}

/// Status collaborator reachable at the archive service. The core issues
/// these calls; transport lives with the shell.
pub trait NetdiskStatus {
    /// `GET` the transfer records for a post.
    fn records(&self, post_id: &str) -> Result<Vec<TransferRecord>, ViewError>;

    /// `POST` a save/retry/delete for one share.
    fn operate(&self, post_id: &str, request: &NetdiskRequest) -> Result<(), ViewError>;
}

/// Polls granted after a user-triggered operation.
pub const DEFAULT_POLL_BUDGET: u32 = 5;

/// Bounded polling allowance: status refreshes stop once the budget drains,
/// whatever the transfer outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    remaining: u32,
}

impl PollBudget {
    pub fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }

    /// Spend one poll. False once the budget is exhausted.
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl Default for PollBudget {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_BUDGET)
    }
}

/// Attach reported statuses to the net-disk-tagged links of a document.
/// Untagged links are never touched. Returns how many links were decorated.
pub fn decorate(doc: &mut Document, records: &[TransferRecord]) -> usize {
    let ids: Vec<NodeId> = doc.iter().collect();
    let mut decorated = 0;
    for id in ids {
        let Node::Link(link) = doc.node_mut(id) else {
            continue;
        };
        if !link.netdisk {
            continue;
        }
        if let Some(record) = records.iter().find(|r| r.url == link.href) {
            link.status = Some(record.status);
            decorated += 1;
        }
    }
    tracing::debug!(decorated, total = records.len(), "net-disk links decorated");
    decorated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderOptions;
    use crate::engine::{MarkupEngine, PostRenderer};
    use floorboard_common::ViewContext;

    #[test]
    fn records_deserialize_from_the_wire_shape() {
        let json = r#"[
            {"url": "https://pan.baidu.com/s/1abc", "status": "pending"},
            {"name": "quark", "url": "https://pan.quark.cn/s/2def", "status": "failed",
             "message": "quota exceeded", "code": "x9k2"}
        ]"#;
        let records: Vec<TransferRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].status, TransferStatus::Pending);
        assert_eq!(records[0].name, "");
        assert_eq!(records[1].message.as_deref(), Some("quota exceeded"));
        assert_eq!(records[1].code.as_deref(), Some("x9k2"));
    }

    #[test]
    fn operation_requests_serialize_with_lowercase_verbs() {
        let request = NetdiskRequest {
            opt: NetdiskOp::Retry,
            url: "https://pan.baidu.com/s/1abc".to_owned(),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"opt":"retry","url":"https://pan.baidu.com/s/1abc"}"#
        );
    }

    #[test]
    fn decoration_touches_only_tagged_links() {
        let ctx = ViewContext::new("https://x", "t", "9", "https://ngabbs.com");
        let engine = MarkupEngine::new(PostRenderer::new(ctx, RenderOptions::default()));
        let mut doc = engine.parse(
            "[share](https://pan.baidu.com/s/1abc) and [docs](https://example.com/readme)",
        );

        let records = vec![
            TransferRecord {
                name: "baidu".to_owned(),
                url: "https://pan.baidu.com/s/1abc".to_owned(),
                status: TransferStatus::Success,
                message: None,
                code: None,
                password: None,
            },
            TransferRecord {
                name: String::new(),
                url: "https://example.com/readme".to_owned(),
                status: TransferStatus::Failed,
                message: None,
                code: None,
                password: None,
            },
        ];
        assert_eq!(decorate(&mut doc, &records), 1);

        let statuses: Vec<Option<TransferStatus>> = doc
            .iter()
            .filter_map(|id| match doc.node(id) {
                Node::Link(link) => Some(link.status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![Some(TransferStatus::Success), None]);
    }

    #[test]
    fn poll_budget_is_bounded() {
        let mut budget = PollBudget::new(2);
        assert!(budget.take());
        assert!(budget.take());
        assert!(!budget.take());
        assert!(budget.exhausted());
    }
}
