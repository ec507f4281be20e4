//! Floor index for jump navigation.
//!
//! Built once after parse by scanning floor-anchor headings in document
//! order; read-only afterward. Floor numbers are monotonically
//! non-decreasing in well-formed dumps, but malformed sources can repeat or
//! regress — lookups never assume strict increase.

use floorboard_common::ViewError;

use crate::document::{Document, Node, NodeId};

/// One floor anchor in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorEntry {
    pub floor: u32,
    pub post_id: String,
    pub anchor: NodeId,
}

/// Derived index of floor number → document anchor.
#[derive(Debug, Clone, Default)]
pub struct FloorIndex {
    entries: Vec<FloorEntry>,
}

impl FloorIndex {
    pub fn build(doc: &Document) -> Self {
        let mut entries: Vec<FloorEntry> = Vec::new();
        for id in doc.iter() {
            let Node::Heading(heading) = doc.node(id) else {
                continue;
            };
            let Some(anchor) = &heading.floor else {
                continue;
            };
            if let Some(last) = entries.last() {
                if anchor.floor < last.floor {
                    tracing::warn!(
                        floor = anchor.floor,
                        after = last.floor,
                        "floor numbers regress; malformed source"
                    );
                }
            }
            entries.push(FloorEntry {
                floor: anchor.floor,
                post_id: anchor.post_id.clone(),
                anchor: id,
            });
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[FloorEntry] {
        &self.entries
    }

    /// Highest floor number present; bounds jump input.
    pub fn max_floor(&self) -> Option<u32> {
        self.entries.iter().map(|e| e.floor).max()
    }

    /// Anchor node for a floor jump. The first anchor wins when a malformed
    /// dump repeats a floor number.
    pub fn anchor_of(&self, floor: u32) -> Result<NodeId, ViewError> {
        self.entries
            .iter()
            .find(|e| e.floor == floor)
            .map(|e| e.anchor)
            .ok_or(ViewError::FloorNotFound(floor))
    }

    /// Enclosing floor of any node: walk preceding siblings, then the
    /// ancestors' preceding siblings, until a floor anchor is found.
    pub fn floor_of(&self, doc: &Document, id: NodeId) -> Option<u32> {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            let mut prev = doc.prev_sibling(node);
            while let Some(sibling) = prev {
                if let Node::Heading(heading) = doc.node(sibling) {
                    if let Some(anchor) = &heading.floor {
                        return Some(anchor.floor);
                    }
                }
                prev = doc.prev_sibling(sibling);
            }
            cursor = doc.parent(node);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderOptions;
    use crate::engine::{MarkupEngine, PostRenderer};
    use floorboard_common::ViewContext;

    fn parse(text: &str) -> Document {
        let ctx = ViewContext::new("https://x", "t", "9", "https://ngabbs.com");
        MarkupEngine::new(PostRenderer::new(ctx, RenderOptions::default())).parse(text)
    }

    const TWO_FLOORS: &str = "\
##### 3.[45] <pid:99> 2024-01-02 03:04:05 by Alice(123):\n\n\
first floor body\n\n\
##### 4.[46] <pid:100> 2024-01-02 03:05:00 by Bob:\n\n\
second floor body\n";

    #[test]
    fn entries_follow_document_order() {
        let doc = parse(TWO_FLOORS);
        let index = FloorIndex::build(&doc);
        let floors: Vec<u32> = index.entries().iter().map(|e| e.floor).collect();
        assert_eq!(floors, vec![3, 4]);
        assert_eq!(index.max_floor(), Some(4));
    }

    #[test]
    fn descendants_resolve_to_the_preceding_floor() {
        let doc = parse(TWO_FLOORS);
        let index = FloorIndex::build(&doc);

        // Every text node between the two headings belongs to floor 3, and
        // everything after the second heading to floor 4.
        let mut seen = Vec::new();
        for id in doc.iter() {
            if let Node::Text(run) = doc.node(id) {
                seen.push((run.text.clone(), index.floor_of(&doc, id)));
            }
        }
        assert_eq!(
            seen,
            vec![
                ("first floor body".to_owned(), Some(3)),
                ("second floor body".to_owned(), Some(4)),
            ]
        );
    }

    #[test]
    fn nodes_before_any_floor_have_none() {
        let doc = parse("preamble\n\n##### 1.[0] <pid:5> 2024-01-01 00:00:00 by A:\n");
        let index = FloorIndex::build(&doc);
        let first_text = doc
            .iter()
            .find(|&id| matches!(doc.node(id), Node::Text(_)))
            .unwrap();
        assert_eq!(index.floor_of(&doc, first_text), None);
    }

    #[test]
    fn missing_floor_is_a_typed_miss() {
        let doc = parse(TWO_FLOORS);
        let index = FloorIndex::build(&doc);
        assert!(index.anchor_of(3).is_ok());
        assert!(matches!(
            index.anchor_of(17),
            Err(ViewError::FloorNotFound(17))
        ));
    }

    #[test]
    fn repeated_floor_numbers_resolve_to_the_first_anchor() {
        let doc = parse(
            "##### 2.[1] <pid:7> 2024-01-01 00:00:00 by A:\n\n\
             ##### 2.[2] <pid:8> 2024-01-01 00:01:00 by B:\n",
        );
        let index = FloorIndex::build(&doc);
        assert_eq!(index.entries().len(), 2);
        let anchor = index.anchor_of(2).unwrap();
        assert_eq!(anchor, index.entries()[0].anchor);
    }
}
