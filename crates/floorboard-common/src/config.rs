//! Per-document view context.
//!
//! Everything the pipeline needs to know about *where* a post lives: the
//! local archive service origin, the per-session view token, the post id and
//! the upstream forum base. Provided once per document render by the shell
//! and owned by the render session — never process-wide state.

use serde::{Deserialize, Serialize};

use crate::proxy;

/// Context for rendering one archived post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewContext {
    /// Origin of the local archive service, e.g. `http://127.0.0.1:5842`.
    pub origin: String,
    /// Per-session view token embedded in proxied resource paths.
    pub token: String,
    /// Id of the topic being rendered.
    pub post_id: String,
    /// Base URL of the upstream forum, e.g. `https://ngabbs.com`.
    pub forum_base: String,
}

impl ViewContext {
    pub fn new(
        origin: impl Into<String>,
        token: impl Into<String>,
        post_id: impl Into<String>,
        forum_base: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            token: token.into(),
            post_id: post_id.into(),
            forum_base: forum_base.into(),
        }
    }

    /// Base URL all `./`-relative resources in the post resolve against.
    pub fn base_url(&self) -> String {
        format!("{}/view/{}/{}/", self.origin, self.token, self.post_id)
    }

    /// Local proxy URL for a forum smile asset.
    pub fn smile_url(&self, name: &str) -> String {
        format!("{}/view/{}/smile/{}", self.origin, self.token, name)
    }

    /// Link back to the topic on the upstream forum.
    pub fn topic_url(&self) -> String {
        format!("{}/read.php?tid={}", self.forum_base, self.post_id)
    }

    /// Floor-qualified local proxy URL for an attachment or video source.
    pub fn attachment_proxy_url(&self, floor: u32, src: &str) -> String {
        format!("{}at_{}_{}", self.base_url(), floor, proxy::escape_src(src))
    }
}

impl Default for ViewContext {
    /// Default context pointing at a locally running archive service.
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:5842".to_owned(),
            token: String::new(),
            post_id: String::new(),
            forum_base: "https://ngabbs.com".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ViewContext {
        ViewContext::new("http://127.0.0.1:5842", "tok", "41520", "https://ngabbs.com")
    }

    #[test]
    fn derived_urls() {
        let ctx = ctx();
        assert_eq!(ctx.base_url(), "http://127.0.0.1:5842/view/tok/41520/");
        assert_eq!(
            ctx.smile_url("a2.gif"),
            "http://127.0.0.1:5842/view/tok/41520/smile/a2.gif"
        );
        assert_eq!(ctx.topic_url(), "https://ngabbs.com/read.php?tid=41520");
    }

    #[test]
    fn attachment_proxy_urls_carry_floor_and_escaped_source() {
        let url = ctx().attachment_proxy_url(7, "https://x/a/b.png");
        assert_eq!(
            url,
            "http://127.0.0.1:5842/view/tok/41520/at_7_https%3A_2F_2Fx_2Fa_2Fb.png"
        );
    }
}
