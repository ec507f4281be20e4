//! Origin-aware media URL resolution.
//!
//! Maps a raw media reference from the post source to the canonical URL the
//! document should carry, applying the content-origin policy: relative paths
//! belong to the archive, forum smile assets are proxied locally (the forum
//! denies cross-origin requests), and attachment-origin assets can be routed
//! through the floor-qualified proxy when the policy flag asks for it.
//!
//! Resolution is pure and deterministic: the same input always produces the
//! same canonical URL.

use url::Url;

use floorboard_common::{ViewContext, proxy};

use crate::RenderOptions;
use crate::document::MediaKind;

/// Origin `./`-relative attachment paths are rewritten against.
pub const ATTACHMENT_ORIGIN: &str = "https://img.nga.178.com/attachments/";

/// Recognizes attachment-origin assets regardless of the image-host shard.
const ATTACHMENT_HOST_MARKER: &str = ".nga.178.com/attachments/";

/// Extensions rendered as inline video rather than images.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "ogg"];

/// Outcome of resolving one media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub url: String,
    pub kind: MediaKind,
    /// Host matches the net-disk pattern; eligible for status decoration.
    pub netdisk: bool,
}

/// Per-document resolver. Owns nothing but the view context and policy
/// flags; all methods are read-only.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    ctx: ViewContext,
    options: RenderOptions,
}

impl MediaResolver {
    pub fn new(ctx: ViewContext, options: RenderOptions) -> Self {
        Self { ctx, options }
    }

    /// Resolve a raw source to its canonical URL and media kind. `floor` is
    /// the enclosing floor if known at this point in the parse.
    pub fn resolve(&self, raw: &str, title: &str, floor: Option<u32>) -> Resolved {
        let url = self.resolve_url(raw, title, floor);
        Resolved {
            kind: media_kind(raw),
            netdisk: is_netdisk(raw),
            url,
        }
    }

    fn resolve_url(&self, raw: &str, title: &str, floor: Option<u32>) -> String {
        if raw.starts_with("./") || smile_name(raw, title).is_some() {
            return self.resolve_href(raw, title);
        }
        if self.options.contains(RenderOptions::REPLACE_ATTACHMENTS)
            && raw.contains(ATTACHMENT_HOST_MARKER)
        {
            let floor = floor.unwrap_or(proxy::FLOOR_UNKNOWN);
            return self.ctx.attachment_proxy_url(floor, raw);
        }
        raw.to_owned()
    }

    /// Link-target policy: relative and smile rules only. Links imply no
    /// prefetch, so attachment proxying waits for load recovery.
    pub fn resolve_href(&self, raw: &str, title: &str) -> String {
        if let Some(rest) = raw.strip_prefix("./") {
            return format!("{}{}", self.ctx.base_url(), rest);
        }
        if let Some(name) = smile_name(raw, title) {
            return self.ctx.smile_url(&name);
        }
        raw.to_owned()
    }
}

/// Smile-asset name for a forum smile URL, or None for anything else.
///
/// Some smile variants carry an empty filename; those get a synthetic
/// `ng_`-prefixed name derived from the accessible title.
pub fn smile_name(src: &str, title: &str) -> Option<String> {
    if !(src.contains(".nga.") && src.contains("/smile/")) {
        return None;
    }
    let name = match src.rfind('/') {
        Some(i) => &src[i + 1..],
        None => src,
    };
    if name.is_empty() {
        if title.is_empty() {
            return None;
        }
        return Some(format!("ng_{}", proxy::encode_component(title)));
    }
    Some(name.to_owned())
}

/// Kind detection by file extension, query and fragment ignored.
pub fn media_kind(src: &str) -> MediaKind {
    let path = src
        .split(['?', '#'])
        .next()
        .unwrap_or(src);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// Whether a link points at a known network-disk service.
pub fn is_netdisk(link: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.starts_with("pan.")))
        .unwrap_or(false)
}
