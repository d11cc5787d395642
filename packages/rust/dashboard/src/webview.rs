//! Rewrite an nbconvert HTML export for display inside a mobile WebView.
//!
//! The document is parsed with `scraper` (html5ever), so `<head>` and `<body>`
//! always exist exactly once regardless of how the input spells them. The
//! parsed tree is then edited in place and serialized back out:
//!
//! 1. the fixed viewport `<meta>` becomes the first child of `<head>`, and any
//!    other viewport meta is dropped
//! 2. a `<style>` block becomes the last child of `<head>`
//! 3. a `div.container` opened by a `div.header` takes over all body content
//!
//! Each step is skipped when its block is already present, so running the
//! rewrite twice yields the same document.

use std::path::Path;
use std::sync::LazyLock;

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::node::Text;
use scraper::{Html, Node, Selector};
use tracing::{debug, info, instrument, warn};

use nirvana_assets_shared::{AssetsError, DashboardConfig, Result};

/// Viewport settings that stop the WebView from zooming the report.
pub const VIEWPORT_CONTENT: &str =
    "width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no";

const WEBVIEW_CSS: &str = r#"
        body {
            font-family: 'Roboto', Arial, sans-serif;
            margin: 0;
            padding: 16px;
            background-color: #f8f9fa;
            color: #212529;
        }
        .container {
            max-width: 100%;
            margin: 0 auto;
        }
        .header {
            text-align: center;
            margin-bottom: 24px;
        }
        h1, h2, h3, h4, h5, h6 {
            color: #4a6572;
        }
        .output_png img {
            max-width: 100%;
            height: auto;
        }
    "#;

/// Container shell; the heading texts are filled in as text nodes.
const WRAPPER_SHELL: &str = "<div class=\"container\">\n<div class=\"header\">\n<h1></h1>\n<p></p>\n</div>\n</div>";

static HEAD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head").expect("valid selector"));

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

static VIEWPORT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="viewport"]"#).expect("valid selector"));

static STYLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("style").expect("valid selector"));

static WRAPPER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("body > div.container > div.header").expect("valid selector")
});

/// The fixed blocks injected into the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebViewTemplate {
    /// `content` attribute of the viewport meta tag.
    pub viewport: String,
    /// Body of the injected `<style>` element.
    pub css: String,
    /// Header `<h1>` text.
    pub title: String,
    /// Header `<p>` text.
    pub subtitle: String,
}

impl Default for WebViewTemplate {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

impl From<&DashboardConfig> for WebViewTemplate {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            viewport: VIEWPORT_CONTENT.to_string(),
            css: WEBVIEW_CSS.to_string(),
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
        }
    }
}

/// Rewrite `path` in place.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn post_process_file(path: &Path, template: &WebViewTemplate) -> Result<()> {
    let html = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AssetsError::io(path, e))?;

    let processed = post_process(&html, template);

    tokio::fs::write(path, processed)
        .await
        .map_err(|e| AssetsError::io(path, e))?;

    info!("post-processed HTML file");
    Ok(())
}

/// Return `html` with the WebView blocks inserted.
pub fn post_process(html: &str, template: &WebViewTemplate) -> String {
    let mut doc = Html::parse_document(html);

    let head = doc.select(&HEAD_SEL).next().map(|head| head.id());
    match head {
        Some(head) => {
            insert_viewport(&mut doc, head, &template.viewport);
            insert_style(&mut doc, head, &template.css);
        }
        None => warn!("document has no <head>, viewport and style not inserted"),
    }

    let body = doc.select(&BODY_SEL).next().map(|body| body.id());
    match body {
        Some(body) => wrap_body(&mut doc, body, template),
        None => warn!("document has no <body> (frameset?), header not inserted"),
    }

    doc.html()
}

/// Leave exactly one viewport meta, carrying `content`, first in `<head>`.
fn insert_viewport(doc: &mut Html, head: NodeId, content: &str) {
    let mut matching = None;
    let mut stale = Vec::new();
    for meta in doc.select(&VIEWPORT_SEL) {
        if matching.is_none() && meta.value().attr("content") == Some(content) {
            matching = Some(meta.id());
        } else {
            stale.push(meta.id());
        }
    }

    for id in stale {
        if let Some(mut meta) = doc.tree.get_mut(id) {
            meta.detach();
        }
    }

    if matching.is_some() {
        debug!("viewport meta already present");
        return;
    }

    // The attribute value goes through the parser, so only the quote and
    // ampersand need escaping.
    let snippet = format!(
        r#"<meta name="viewport" content="{}">"#,
        content.replace('&', "&amp;").replace('"', "&quot;")
    );
    let fragment = Html::parse_fragment(&snippet);
    if let Some(meta) = snippet_root(&fragment) {
        graft(&mut doc.tree, head, meta, true);
    }
}

fn insert_style(doc: &mut Html, head: NodeId, css: &str) {
    let wanted = css.trim();
    let present = doc
        .select(&STYLE_SEL)
        .any(|style| style.text().collect::<String>().trim() == wanted);
    if present {
        debug!("WebView style block already present");
        return;
    }

    let fragment = Html::parse_fragment(&format!("<style>{css}</style>"));
    if let Some(style) = snippet_root(&fragment) {
        graft(&mut doc.tree, head, style, false);
    }
}

/// Move every child of `<body>` into a new `div.container` that opens with the
/// header block.
fn wrap_body(doc: &mut Html, body: NodeId, template: &WebViewTemplate) {
    if doc.select(&WRAPPER_SEL).next().is_some() {
        debug!("container wrapper already present");
        return;
    }

    let content: Vec<NodeId> = doc
        .tree
        .get(body)
        .map(|body| body.children().map(|child| child.id()).collect())
        .unwrap_or_default();

    let fragment = Html::parse_fragment(WRAPPER_SHELL);
    let Some(container) =
        snippet_root(&fragment).and_then(|shell| graft(&mut doc.tree, body, shell, true))
    else {
        return;
    };

    set_text(&mut doc.tree, container, "h1", &template.title);
    set_text(&mut doc.tree, container, "p", &template.subtitle);

    if let Some(mut container) = doc.tree.get_mut(container) {
        for child in content {
            container.append_id(child);
        }
    }
}

/// Append `text` to the first `tag` element below `root`.
fn set_text(tree: &mut Tree<Node>, root: NodeId, tag: &str, text: &str) {
    let target = tree.get(root).and_then(|root| {
        root.descendants()
            .find(|node| matches!(node.value(), Node::Element(el) if el.name() == tag))
            .map(|node| node.id())
    });
    if let Some(mut element) = target.and_then(|id| tree.get_mut(id)) {
        element.append(Node::Text(Text { text: text.into() }));
    }
}

/// First element of a parsed fragment.
fn snippet_root(fragment: &Html) -> Option<NodeRef<'_, Node>> {
    fragment
        .root_element()
        .children()
        .find(|node| node.value().is_element())
}

/// Copy `source` and its subtree under `parent`, as first or last child.
fn graft(
    tree: &mut Tree<Node>,
    parent: NodeId,
    source: NodeRef<'_, Node>,
    first: bool,
) -> Option<NodeId> {
    let id = {
        let mut parent = tree.get_mut(parent)?;
        let value = source.value().clone();
        if first {
            parent.prepend(value).id()
        } else {
            parent.append(value).id()
        }
    };
    for child in source.children() {
        graft(tree, id, child, false);
    }
    Some(id)
}
