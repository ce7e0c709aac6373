//! Template loading and asset path rewriting.
//!
//! Templates are pages saved from a live browser session. Their asset
//! references point at whatever `<page name>_files/` directory the browser
//! invented, sometimes behind an absolute `file:///` path; both are rewritten
//! so every template resolves assets from one fixed directory next to the
//! output files.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use scraper::Html;

/// The fixed resource directory every rewritten reference points at.
pub const ASSET_DIR: &str = "html_asset_files";

static SAVED_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._-]*_files/").unwrap());
static FILE_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bfile:///").unwrap());

/// Read a template file (lossily; saved pages are not always clean UTF-8)
/// and rewrite its asset references.
pub fn load(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading template {}", path.display()))?;
    Ok(rewrite_asset_paths(&String::from_utf8_lossy(&bytes)))
}

/// Purely textual substitution: `<anything>_files/` segments become
/// [`ASSET_DIR`]`/` and `file:///` prefixes are dropped. Idempotent.
pub fn rewrite_asset_paths(raw: &str) -> String {
    let replacement = format!("{ASSET_DIR}/");
    let rewritten = SAVED_DIR_RE.replace_all(raw, replacement.as_str());
    FILE_SCHEME_RE.replace_all(&rewritten, "").into_owned()
}

/// Best-effort parse; html5ever always produces a tree.
pub fn parse(raw: &str) -> Html {
    Html::parse_document(raw)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_page_dir_is_renamed_filename_untouched() {
        let out = rewrite_asset_paths("<img src=\"./foo_files/bar.png\">");
        assert_eq!(out, "<img src=\"./html_asset_files/bar.png\">");
    }

    #[test]
    fn bare_and_serp_dirs_are_renamed() {
        assert_eq!(rewrite_asset_paths("_files/a.css"), "html_asset_files/a.css");
        assert_eq!(rewrite_asset_paths("serp_files/a.css"), "html_asset_files/a.css");
    }

    #[test]
    fn file_scheme_is_stripped_case_insensitively() {
        assert_eq!(rewrite_asset_paths("src=\"file:///C:/x/y.js\""), "src=\"C:/x/y.js\"");
        assert_eq!(rewrite_asset_paths("src=\"FILE:///x\""), "src=\"x\"");
    }

    #[test]
    fn unrelated_content_is_left_alone() {
        let raw = "profiles/page and file://host/share stay";
        assert_eq!(rewrite_asset_paths(raw), raw);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_asset_paths("a/foo_files/b.png file:///c");
        assert_eq!(rewrite_asset_paths(&once), once);
    }

    #[test]
    fn parse_never_fails_on_malformed_markup() {
        let doc = parse("<div><p>unclosed <span>soup");
        assert!(doc.tree.root().descendants().count() > 1);
    }
}
