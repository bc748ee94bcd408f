//! Link extraction from wiki content.

use crate::document::{Document, DocumentReference};

/// Resource prefixes that name attachments rather than pages.
const RESOURCE_PREFIXES: [&str; 2] = ["image:", "attach:"];

/// Pages referenced by `doc`'s content, in first-occurrence order.
///
/// Recognised forms are `[[label>>Target]]` and `[[Target]]` (xwiki/2.x)
/// and `[label>Target]` and `[Target]` (xwiki/1.0). A `?query`, `#anchor`
/// or `||params` suffix is ignored. External URLs, attachment resources,
/// self links and targets that do not parse are skipped.
#[must_use]
pub fn extract_links(doc: &Document) -> Vec<DocumentReference> {
    let source = &doc.reference;
    let mut targets: Vec<DocumentReference> = Vec::new();

    for raw in raw_targets(&doc.content) {
        let Some(text) = clean_target(raw) else {
            continue;
        };
        let Ok(target) = DocumentReference::parse(text, source.wiki(), source.space()) else {
            continue;
        };
        if target.same_page(source) || targets.contains(&target) {
            continue;
        }
        targets.push(target);
    }
    targets
}

/// Scans `content` for bracketed link bodies and yields the target part.
fn raw_targets(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find('[') {
        let after = &rest[start..];
        if let Some(body) = after.strip_prefix("[[") {
            let Some(end) = body.find("]]") else {
                break;
            };
            let inner = &body[..end];
            out.push(inner.rsplit_once(">>").map_or(inner, |(_, target)| target));
            rest = &body[end + 2..];
        } else {
            let body = &after[1..];
            let Some(end) = body.find(']') else {
                break;
            };
            let inner = &body[..end];
            out.push(inner.rsplit_once('>').map_or(inner, |(_, target)| target));
            rest = &body[end + 1..];
        }
    }
    out
}

fn clean_target(raw: &str) -> Option<&str> {
    let mut text = raw;
    if let Some((head, _)) = text.split_once("||") {
        text = head;
    }
    if let Some(cut) = text.find(|c: char| c == '?' || c == '#') {
        text = &text[..cut];
    }
    let text = text.trim();

    if text.is_empty()
        || text.contains("://")
        || text.starts_with("mailto:")
        || RESOURCE_PREFIXES.iter().any(|p| text.starts_with(p))
    {
        return None;
    }
    Some(text)
}
