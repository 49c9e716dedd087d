//! Literal byte rewriting of relayed pages
//!
//! Both substitutions are ASCII, so the page is never decoded and bytes in
//! any charset pass through untouched.

use crate::config::Config;

const HEAD_CLOSE: &str = "</head>";

/// Injects the stylesheet and script markers and points upstream links back
/// at the relay. Works on raw bytes; the document is never parsed.
#[derive(Debug, Clone)]
pub struct ContentRewriter {
    markers: String,
    upstream_origin: String,
    mount_prefix: String,
}

impl ContentRewriter {
    pub fn new(
        stylesheet_href: &str,
        script: &str,
        upstream_origin: impl Into<String>,
        mount_prefix: impl Into<String>,
    ) -> Self {
        Self {
            markers: format!(
                r#"<link rel="stylesheet" href="{}">{}"#,
                stylesheet_href, script
            ),
            upstream_origin: upstream_origin.into(),
            mount_prefix: mount_prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.inject.stylesheet,
            &config.inject.script,
            config.upstream.base_url.clone(),
            config.upstream.mount_prefix.clone(),
        )
    }

    pub fn rewrite(&self, html: &[u8]) -> Vec<u8> {
        let injected = self.inject_markers(html);
        self.replace_origin(&injected)
    }

    /// Insert the markers before the first `</head>`; no-op without one
    pub fn inject_markers(&self, html: &[u8]) -> Vec<u8> {
        match find(html, HEAD_CLOSE.as_bytes()) {
            Some(at) => {
                let mut out = Vec::with_capacity(html.len() + self.markers.len());
                out.extend_from_slice(&html[..at]);
                out.extend_from_slice(self.markers.as_bytes());
                out.extend_from_slice(&html[at..]);
                out
            }
            None => html.to_vec(),
        }
    }

    /// Replace every occurrence of the upstream origin, wherever it appears
    pub fn replace_origin(&self, html: &[u8]) -> Vec<u8> {
        let origin = self.upstream_origin.as_bytes();
        if origin.is_empty() {
            return html.to_vec();
        }

        let mut out = Vec::with_capacity(html.len());
        let mut rest = html;
        while let Some(at) = find(rest, origin) {
            out.extend_from_slice(&rest[..at]);
            out.extend_from_slice(self.mount_prefix.as_bytes());
            rest = &rest[at + origin.len()..];
        }
        out.extend_from_slice(rest);
        out
    }
}

/// Offset of the first occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_UPSTREAM_BASE;

    fn rewriter() -> ContentRewriter {
        ContentRewriter::from_config(&Config::default())
    }

    fn rewrite_str(r: &ContentRewriter, html: &str) -> String {
        String::from_utf8(r.rewrite(html.as_bytes())).unwrap()
    }

    #[test]
    fn test_markers_before_head_close() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = rewrite_str(&rewriter(), html);

        let link = r#"<link rel="stylesheet" href="/static/customTest.css">"#;
        let at = out.find(link).unwrap();
        let head_close = out.find("</head>").unwrap();
        assert!(at < head_close);
        assert!(out[at..head_close].ends_with("</script>\n    "));
        assert!(out.contains("Custom CSS file has been injected."));
    }

    #[test]
    fn test_only_first_head_close_gets_markers() {
        let html = "<head></head><template></head></template>";
        let out = rewrite_str(&rewriter(), html);
        assert_eq!(out.matches("customTest.css").count(), 1);
        assert!(out.ends_with("<template></head></template>"));
    }

    #[test]
    fn test_no_head_close_only_replaces_origin() {
        let html = format!(r#"<div><img src="{}icons/a.svg"></div>"#, DEFAULT_UPSTREAM_BASE);
        let out = rewrite_str(&rewriter(), &html);
        assert_eq!(out, r#"<div><img src="/proxy/icons/a.svg"></div>"#);
    }

    #[test]
    fn test_every_origin_occurrence_replaced() {
        let html = format!(
            "<head></head><a href=\"{0}?id=1\">{0}</a><script src=\"{0}bundle.js\"></script>",
            DEFAULT_UPSTREAM_BASE
        );
        let out = rewrite_str(&rewriter(), &html);

        assert!(!out.contains(DEFAULT_UPSTREAM_BASE));
        assert!(out.contains(r#"<a href="/proxy/?id=1">/proxy/</a>"#));
        assert!(out.contains(r#"src="/proxy/bundle.js""#));
    }

    #[test]
    fn test_non_utf8_bytes_pass_through() {
        let r = rewriter();

        // Latin-1 "café" with no head
        assert_eq!(r.rewrite(b"<p>caf\xe9</p>"), b"<p>caf\xe9</p>".to_vec());

        let mut html = b"<head></head><p>caf\xe9</p>".to_vec();
        html.extend_from_slice(DEFAULT_UPSTREAM_BASE.as_bytes());
        let out = r.rewrite(&html);

        assert!(out.ends_with(b"</head><p>caf\xe9</p>/proxy/"));
        assert!(find(&out, b"customTest.css").is_some());
    }

    #[test]
    fn test_adjacent_and_trailing_origins() {
        let r = ContentRewriter::new("/s.css", "", "ab", "X");
        assert_eq!(r.replace_origin(b"abab-a-ab"), b"XX-a-X".to_vec());
        assert_eq!(r.replace_origin(b"a"), b"a".to_vec());
        assert_eq!(r.replace_origin(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_rewrite_is_deterministic() {
        let html = format!("<head></head>{}x", DEFAULT_UPSTREAM_BASE);
        let r = rewriter();
        assert_eq!(r.rewrite(html.as_bytes()), r.rewrite(html.as_bytes()));
    }

    #[test]
    fn test_custom_markers() {
        let r = ContentRewriter::new("/static/a.css", "<script></script>", "https://up/", "/m/");
        assert_eq!(
            rewrite_str(&r, "<head></head>https://up/x"),
            r#"<head><link rel="stylesheet" href="/static/a.css"><script></script></head>/m/x"#
        );
    }
}
