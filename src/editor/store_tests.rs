use pretty_assertions::assert_eq;

use super::test_support::*;
use super::*;

#[test]
fn new_document_holds_one_empty_paragraph() {
    let document = Document::new();
    assert_eq!(outline(&document), vec!["P()"]);
    assert!(document.is_blank().unwrap());
    assert_eq!(document.len(), 2);
    document.check_invariants().unwrap();
}

#[test]
fn from_blocks_normalizes_runs() {
    let document = document(vec![
        FragmentNode::paragraph(vec![
            FragmentNode::text("ab"),
            FragmentNode::text(""),
            FragmentNode::text("cd"),
            FragmentNode::hashtag("#x"),
            FragmentNode::hashtag("#y"),
        ]),
        FragmentNode::list(false, Vec::new()),
    ]);

    assert_eq!(outline(&document), vec!["P(abcd{#x#y})"]);
    document.check_invariants().unwrap();
}

#[test]
fn empty_root_receives_a_paragraph() {
    let document = document(Vec::new());
    assert_eq!(outline(&document), vec!["P()"]);
}

#[test]
fn normalize_keeps_empty_blocks() {
    let mut document = raw_document(&[
        paragraph(""),
        bulleted(&["", "x"]),
        FragmentNode::paragraph(vec![FragmentNode::text("")]),
    ]);
    let root = document.root();

    document.normalize(root).unwrap();

    assert_eq!(outline(&document), vec!["P()", "UL[|x]", "P()"]);
    document.check_invariants().unwrap();
}

#[test]
fn normalize_of_a_subtree_tidies_its_ancestors() {
    let mut document = raw_document(&[bulleted(&["a"]), bulleted(&["b"])]);
    let root = document.root();
    let second_list = document.children(root).unwrap()[1];
    let item = document.children(second_list).unwrap()[0];
    let leaf = document.children(item).unwrap()[0];
    document.remove_node(leaf).unwrap();
    document.remove_node(item).unwrap();

    let first_item = block(&document, 0);
    document.normalize(first_item).unwrap();

    assert_eq!(outline(&document), vec!["UL[a]"]);
}

#[test]
fn insert_child_enforces_the_grammar() {
    let mut document = Document::new();
    let root = document.root();
    let text = document.create_node(NodeData::text("x"));
    let item = document.create_node(NodeData::list_item());

    assert_eq!(
        document.insert_child(root, 0, text),
        Err(EditorError::InvalidStructure {
            parent: NodeKind::Root,
            child: NodeKind::Text,
        })
    );
    assert_eq!(
        document.insert_child(root, 0, item),
        Err(EditorError::InvalidStructure {
            parent: NodeKind::Root,
            child: NodeKind::ListItem,
        })
    );
}

#[test]
fn insert_child_rejects_attached_nodes() {
    let mut document = document(vec![paragraph("a"), paragraph("b")]);
    let root = document.root();
    let first = block(&document, 0);

    assert!(matches!(
        document.insert_child(root, 2, first),
        Err(EditorError::InvalidStructure { .. })
    ));
    assert_eq!(document.child_count(root).unwrap(), 2);
}

#[test]
fn insert_child_clamps_the_index() {
    let mut document = document(vec![paragraph("a")]);
    let root = document.root();
    let extra = document.instantiate(&paragraph("z")).unwrap();

    document.insert_child(root, 99, extra).unwrap();

    assert_eq!(outline(&document), vec!["P(a)", "P(z)"]);
    assert_eq!(document.position(extra).unwrap(), Some((root, 1)));
}

#[test]
fn stale_ids_stay_dead_after_their_slot_is_reused() {
    let mut document = document(vec![paragraph("a"), paragraph("b")]);
    let second = block(&document, 1);
    let slots = document.slot_count();

    document.remove_node(second).unwrap();
    assert_eq!(document.node(second).unwrap_err(), EditorError::NotFound(second));

    let fresh = [
        document.create_node(NodeData::paragraph()),
        document.create_node(NodeData::text("z")),
    ];
    assert_eq!(document.slot_count(), slots);
    assert!(fresh.iter().any(|id| id.index() == second.index()));
    assert!(fresh.iter().all(|id| *id != second));
    assert_eq!(document.node(second).unwrap_err(), EditorError::NotFound(second));
    assert!(!document.is_attached(fresh[0]));
}

#[test]
fn remove_child_reports_out_of_range_index() {
    let mut document = document(vec![paragraph("a")]);
    let root = document.root();

    assert_eq!(
        document.remove_child(root, 3),
        Err(EditorError::InvalidOffset {
            node: root,
            offset: 3,
            len: 1,
        })
    );
}

#[test]
fn split_text_keeps_format_on_both_halves() {
    let mut document = document(vec![FragmentNode::paragraph(vec![FragmentNode::hashtag(
        "#hello",
    )])]);
    let leaf = at(&document, 0, 0).node;

    let (left, right) = document.split_text(leaf, 3).unwrap();

    assert_eq!(document.leaf_text(left).unwrap(), "#he");
    assert_eq!(document.leaf_text(right).unwrap(), "llo");
    assert_eq!(document.data(right).unwrap().format(), Some(TextFormat::Hashtag));
    assert_eq!(document.position(right).unwrap(), Some((block(&document, 0), 1)));
}

#[test]
fn split_text_rejects_bad_targets() {
    let mut document = document(vec![FragmentNode::paragraph(vec![
        FragmentNode::text("abc"),
        FragmentNode::decorator("@x"),
    ])]);
    let paragraph = block(&document, 0);
    let text = document.children(paragraph).unwrap()[0];
    let decorator = document.children(paragraph).unwrap()[1];

    assert_eq!(
        document.split_text(text, 9),
        Err(EditorError::InvalidOffset {
            node: text,
            offset: 9,
            len: 3,
        })
    );
    assert_eq!(
        document.split_text(decorator, 0),
        Err(EditorError::NotText(decorator))
    );
}

#[test]
fn check_invariants_flags_unmerged_runs() {
    let mut document = Document::new();
    let paragraph = block(&document, 0);
    let a = document.create_node(NodeData::text("a"));
    let b = document.create_node(NodeData::text("b"));
    document.append_child(paragraph, a).unwrap();
    document.append_child(paragraph, b).unwrap();

    assert!(matches!(
        document.check_invariants(),
        Err(EditorError::Corrupted(_))
    ));

    let root = document.root();
    document.normalize(root).unwrap();
    document.check_invariants().unwrap();
    assert_eq!(outline(&document), vec!["P(ab)"]);
}

#[test]
fn check_invariants_flags_empty_lists_and_empty_text() {
    let mut with_list = Document::new();
    let root = with_list.root();
    let list = with_list.create_node(NodeData::list(false));
    with_list.append_child(root, list).unwrap();
    assert!(matches!(
        with_list.check_invariants(),
        Err(EditorError::Corrupted(_))
    ));

    let mut with_text = Document::new();
    let paragraph = block(&with_text, 0);
    let empty = with_text.create_node(NodeData::text(""));
    with_text.append_child(paragraph, empty).unwrap();
    assert!(matches!(
        with_text.check_invariants(),
        Err(EditorError::Corrupted(_))
    ));
}

#[test]
fn paths_and_traversal() {
    let document = document(vec![
        paragraph("ab"),
        FragmentNode::list(
            true,
            vec![
                FragmentNode::list_item(runs("one")),
                FragmentNode::list_item(vec![
                    FragmentNode::text("t"),
                    FragmentNode::decorator("@x"),
                ]),
            ],
        ),
    ]);
    let second_item = block(&document, 2);
    let decorator = document.children(second_item).unwrap()[1];

    assert_eq!(document.path_of(decorator).unwrap(), vec![1, 1, 1]);
    assert_eq!(document.node_at_path(&[1, 1, 1]).unwrap(), decorator);
    assert_eq!(document.depth(decorator).unwrap(), 3);
    assert_eq!(document.block_of(decorator).unwrap(), Some(second_item));
    assert_eq!(document.block_of(document.root()).unwrap(), None);
    assert_eq!(document.caret_len(second_item).unwrap(), 2);
    assert_eq!(document.max_offset(second_item).unwrap(), 2);
    assert_eq!(document.text_content(document.root()).unwrap(), "ab\none\nt@x");
    assert_eq!(
        document.last_leaf(document.root()).unwrap(),
        Some(decorator)
    );
    assert!(matches!(
        document.node_at_path(&[4]),
        Err(EditorError::InvalidSelection(_))
    ));
}

#[test]
fn fragments_rebuild_an_equal_document() {
    let original = document(vec![
        paragraph("ab"),
        bulleted(&["one", ""]),
        FragmentNode::paragraph(vec![
            FragmentNode::hashtag("#t"),
            FragmentNode::decorator("@x"),
        ]),
    ]);

    let rebuilt = Document::from_blocks(original.to_fragment().unwrap().nodes).unwrap();

    assert_eq!(rebuilt.to_fragment().unwrap(), original.to_fragment().unwrap());
    assert_eq!(rebuilt.len(), original.len());
}
