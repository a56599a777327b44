use super::*;

pub(super) fn runs(text: &str) -> Vec<FragmentNode> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![FragmentNode::text(text)]
    }
}

pub(super) fn paragraph(text: &str) -> FragmentNode {
    FragmentNode::paragraph(runs(text))
}

pub(super) fn bulleted(items: &[&str]) -> FragmentNode {
    list(false, items)
}

pub(super) fn numbered(items: &[&str]) -> FragmentNode {
    list(true, items)
}

fn list(ordered: bool, items: &[&str]) -> FragmentNode {
    FragmentNode::list(
        ordered,
        items
            .iter()
            .map(|text| FragmentNode::list_item(runs(text)))
            .collect(),
    )
}

pub(super) fn document(blocks: Vec<FragmentNode>) -> Document {
    Document::from_blocks(blocks).unwrap()
}

/// Builds the tree without normalizing it.
pub(super) fn raw_document(blocks: &[FragmentNode]) -> Document {
    let mut document = Document::new();
    let root = document.root();
    let initial = document.children(root).unwrap()[0];
    document.remove_node(initial).unwrap();
    for block in blocks {
        let id = document.instantiate(block).unwrap();
        document.append_child(root, id).unwrap();
    }
    document
}

/// Compact view of the top-level nodes: `P(text)`, `UL[a|b]`, `OL[a|b]`.
/// Hashtag runs print as `{#tag}`, decorators as `<text>`.
pub(super) fn outline(document: &Document) -> Vec<String> {
    fragment_outline(&document.to_fragment().unwrap())
}

pub(super) fn fragment_outline(fragment: &Fragment) -> Vec<String> {
    fragment.nodes.iter().map(describe).collect()
}

fn describe(node: &FragmentNode) -> String {
    match &node.data {
        NodeData::Root => "Root".to_string(),
        NodeData::Paragraph { .. } => format!("P({})", inline(&node.children)),
        NodeData::ListItem { .. } => format!("LI({})", inline(&node.children)),
        NodeData::List { ordered } => {
            let items = node
                .children
                .iter()
                .map(|item| inline(&item.children))
                .collect::<Vec<_>>()
                .join("|");
            let tag = if *ordered { "OL" } else { "UL" };
            format!("{tag}[{items}]")
        }
        NodeData::Text {
            text,
            format: TextFormat::Plain,
        } => text.clone(),
        NodeData::Text {
            text,
            format: TextFormat::Hashtag,
        } => format!("{{{text}}}"),
        NodeData::Decorator { text, .. } => format!("<{text}>"),
    }
}

fn inline(children: &[FragmentNode]) -> String {
    children.iter().map(describe).collect()
}

pub(super) fn block(document: &Document, index: usize) -> NodeId {
    document.blocks().unwrap()[index]
}

/// Point at caret `offset` of the `index`th block in document order.
pub(super) fn at(document: &Document, index: usize, offset: usize) -> Point {
    document
        .point_at_block_offset(BlockOffset::new(block(document, index), offset))
        .unwrap()
}

pub(super) fn editor_with(blocks: Vec<FragmentNode>) -> DocumentEditor {
    DocumentEditor::new(document(blocks))
}

pub(super) fn caret_to(editor: &mut DocumentEditor, index: usize, offset: usize) {
    let point = at(editor.document(), index, offset);
    editor.collapse_to(point).unwrap();
}

pub(super) fn select(editor: &mut DocumentEditor, from: (usize, usize), to: (usize, usize)) {
    let anchor = at(editor.document(), from.0, from.1);
    let focus = at(editor.document(), to.0, to.1);
    editor.set_selection(Selection::new(anchor, focus)).unwrap();
}
