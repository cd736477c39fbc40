use roxmltree::Node;

use super::xs_child;

/// Extracts the text of the first `<annotation><documentation>` child of `node`, trimmed.
///
/// Only the documentation text is kept; `appinfo` and foreign attributes carry tool-specific
/// metadata that has no place in the model.
pub(super) fn documentation(node: Node) -> Option<String> {
    let annotation = xs_child(node, "annotation")?;
    let documentation = xs_child(annotation, "documentation")?;
    let text: String = documentation
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
