use std::cell::Cell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::test_support::*;
use super::*;
use crate::markup::to_markup;

fn type_text(editor: &mut DocumentEditor, text: &str) {
    for ch in text.chars() {
        editor
            .insert_char(ch)
            .unwrap_or_else(|err| panic!("failed to insert char {ch:?}: {err}"));
    }
}

fn caret_of(editor: &DocumentEditor) -> (usize, usize) {
    let caret = editor.caret().unwrap();
    let blocks = editor.document().blocks().unwrap();
    let index = blocks
        .iter()
        .position(|block| *block == caret.block)
        .expect("caret block is attached");
    (index, caret.offset)
}

// ============================================================================
// Copy and paste scenarios
// ============================================================================

#[test]
fn copy_all_and_paste_at_end_duplicates_the_document() {
    let mut editor = DocumentEditor::new(Document::new());
    editor.insert_text("Copy + pasting?").unwrap();
    editor.insert_paragraph_break().unwrap();
    editor.insert_paragraph_break().unwrap();
    editor.insert_text("Sounds good!").unwrap();

    editor.select_all().unwrap();
    let payload = editor.copy().unwrap();
    assert_eq!(payload.plain_text, "Copy + pasting?\n\nSounds good!");

    editor.move_caret(Motion::Right).unwrap();
    editor.paste(&payload).unwrap();

    assert_eq!(
        outline(editor.document()),
        vec![
            "P(Copy + pasting?)",
            "P()",
            "P(Sounds good!Copy + pasting?)",
            "P()",
            "P(Sounds good!)",
        ]
    );
    assert_eq!(
        to_markup(editor.document()).unwrap(),
        concat!(
            "<p dir=\"ltr\"><span>Copy + pasting?</span></p>",
            "<p dir=\"ltr\"><br></p>",
            "<p dir=\"ltr\"><span>Sounds good!Copy + pasting?</span></p>",
            "<p dir=\"ltr\"><br></p>",
            "<p dir=\"ltr\"><span>Sounds good!</span></p>",
        )
    );
    assert!(editor.selection().is_collapsed());
    assert_eq!(caret_of(&editor), (4, 12));
}

#[test]
fn list_items_survive_copy_delete_paste() {
    let mut editor = editor_with(vec![bulleted(&["one", "two", "three", "four", "five"])]);
    select(&mut editor, (2, 0), (3, 4));

    let payload = editor.copy().unwrap();
    assert_eq!(payload.plain_text, "three\nfour");

    editor.delete_backward().unwrap();
    assert_eq!(outline(editor.document()), vec!["UL[one|two||five]"]);
    assert_eq!(caret_of(&editor), (2, 0));

    editor.paste(&payload).unwrap();
    assert_eq!(
        outline(editor.document()),
        vec!["UL[one|two|three|four|five]"]
    );
    assert_eq!(caret_of(&editor), (3, 4));
}

#[test]
fn partial_item_and_paragraph_paste_into_empty_document() {
    let mut source = editor_with(vec![
        bulleted(&["one", "two", "three"]),
        paragraph("Some text."),
    ]);
    select(&mut source, (2, 3), (3, 10));
    assert_eq!(
        fragment_outline(&source.selected_fragment().unwrap()),
        vec!["UL[ee]", "P(Some text.)"]
    );
    let payload = source.copy().unwrap();

    let mut target = DocumentEditor::new(Document::new());
    target.paste(&payload).unwrap();

    assert_eq!(outline(target.document()), vec!["UL[ee]", "P(Some text.)"]);
    assert_eq!(caret_of(&target), (1, 10));
}

#[test]
fn paragraph_pasted_into_empty_item_splits_the_list_in_order() {
    let mut editor = editor_with(vec![
        bulleted(&["one", "", "two", "three"]),
        paragraph("Some text."),
    ]);
    caret_to(&mut editor, 1, 0);

    let fragment = Fragment::new(vec![bulleted(&["ee"]), paragraph("Some text.")]);
    editor.paste_fragment(&fragment).unwrap();

    assert_eq!(
        outline(editor.document()),
        vec!["UL[one|ee]", "P(Some text.)", "UL[two|three]", "P(Some text.)"]
    );
    assert_eq!(caret_of(&editor), (2, 10));
}

#[test]
fn plain_lines_pasted_inside_an_item_break_out_of_the_list() {
    let mut editor = editor_with(vec![bulleted(&["one", "two", "three", "four", "five"])]);
    caret_to(&mut editor, 3, 2);

    editor.paste_plain_text("Hello\nWorld").unwrap();

    assert_eq!(
        outline(editor.document()),
        vec!["UL[one|two|three|foHello]", "P(Worldur)", "UL[five]"]
    );
    assert_eq!(caret_of(&editor), (4, 5));
}

#[test]
fn plain_lines_pasted_into_trailing_empty_item() {
    let mut editor = editor_with(vec![bulleted(&["one", "two", "three", "four", "five", ""])]);
    caret_to(&mut editor, 5, 0);

    editor.paste_plain_text("Hello\nWorld").unwrap();

    assert_eq!(
        outline(editor.document()),
        vec!["UL[one|two|three|four|five|Hello]", "P(World)"]
    );
    assert_eq!(caret_of(&editor), (6, 5));

    editor.paste_plain_text("Hello\nWorld").unwrap();

    assert_eq!(
        outline(editor.document()),
        vec![
            "UL[one|two|three|four|five|Hello]",
            "P(WorldHello)",
            "P(World)",
        ]
    );
    assert_eq!(caret_of(&editor), (7, 5));
}

#[test]
fn typed_hashtags_survive_whole_and_partial_round_trips() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "Hello world #foobar test #foobar2 when #not");
    editor.insert_paragraph_break().unwrap();
    type_text(&mut editor, "Next #line of #text test #foo");

    assert_eq!(
        outline(editor.document()),
        vec![
            "P(Hello world {#foobar} test {#foobar2} when {#not})",
            "P(Next {#line} of {#text} test {#foo})",
        ]
    );
    assert_eq!(caret_of(&editor), (1, 29));
    let original = outline(editor.document());

    editor.select_all().unwrap();
    let payload = editor.copy().unwrap();
    editor.delete_selection().unwrap();
    editor.paste(&payload).unwrap();

    assert_eq!(outline(editor.document()), original);
    assert_eq!(caret_of(&editor), (1, 29));

    select(&mut editor, (1, 26), (0, 20));
    let payload = editor.copy().unwrap();
    editor.delete_selection().unwrap();
    assert_eq!(
        outline(editor.document()),
        vec!["P(Hello world {#foobar} {foo})"]
    );

    editor.paste(&payload).unwrap();

    assert_eq!(outline(editor.document()), original);
    assert_eq!(caret_of(&editor), (1, 26));

    editor.select_all().unwrap();
    editor.delete_selection().unwrap();
    assert_eq!(outline(editor.document()), vec!["P()"]);
}

#[test]
fn items_pasted_at_end_of_item_join_the_host_list() {
    let mut editor = editor_with(vec![bulleted(&["one", "two", "three", "four", "five"])]);
    caret_to(&mut editor, 3, 4);

    editor
        .paste_fragment(&Fragment::new(vec![bulleted(&["three", "four"])]))
        .unwrap();

    assert_eq!(
        outline(editor.document()),
        vec!["UL[one|two|three|fourthree|four|five]"]
    );
    assert_eq!(caret_of(&editor), (4, 4));
}

#[test]
fn partial_item_pasted_into_paragraph_gets_its_own_list() {
    let mut editor = editor_with(vec![paragraph("Hello")]);
    caret_to(&mut editor, 0, 2);

    editor
        .paste_fragment(&Fragment::new(vec![bulleted(&["ee"])]))
        .unwrap();

    assert_eq!(outline(editor.document()), vec!["P(He)", "UL[ee]", "P(llo)"]);
    assert_eq!(caret_of(&editor), (1, 2));
}

#[test]
fn item_pasted_into_empty_item_does_not_nest_lists() {
    let mut editor = editor_with(vec![bulleted(&["one", "", "three"])]);
    caret_to(&mut editor, 1, 0);

    editor
        .paste_fragment(&Fragment::new(vec![bulleted(&["ee"])]))
        .unwrap();

    assert_eq!(outline(editor.document()), vec!["UL[one|ee|three]"]);
}

#[test]
fn select_all_then_delete_leaves_an_empty_paragraph() {
    let mut editor = editor_with(vec![
        paragraph("alpha"),
        bulleted(&["one", "two"]),
        paragraph("omega"),
    ]);
    editor.select_all().unwrap();
    editor.delete_backward().unwrap();

    assert_eq!(to_markup(editor.document()).unwrap(), "<p><br></p>");
    let paragraph = block(editor.document(), 0);
    assert_eq!(editor.selection(), Selection::caret(Point::new(paragraph, 0)));
}

#[test]
fn cut_returns_the_payload_and_removes_the_range() {
    let mut editor = editor_with(vec![paragraph("hello world")]);
    select(&mut editor, (0, 6), (0, 11));

    let payload = editor.cut().unwrap();

    assert_eq!(payload.plain_text, "world");
    assert_eq!(outline(editor.document()), vec!["P(hello )"]);
    assert_eq!(caret_of(&editor), (0, 6));
}

#[test]
fn collapsed_copy_is_empty_and_pastes_nothing() {
    let mut editor = editor_with(vec![paragraph("hello")]);
    caret_to(&mut editor, 0, 2);

    let payload = editor.copy().unwrap();
    assert_eq!(payload.plain_text, "");

    editor.paste(&payload).unwrap();
    assert_eq!(outline(editor.document()), vec!["P(hello)"]);
    assert_eq!(caret_of(&editor), (0, 2));
}

#[test]
fn malformed_structured_payload_pastes_plain_text() {
    let mut editor = DocumentEditor::new(Document::new());
    let payload = ClipboardPayload {
        structured: Some("{not json".to_string()),
        plain_text: "plain".to_string(),
    };

    editor.paste(&payload).unwrap();

    assert_eq!(outline(editor.document()), vec!["P(plain)"]);
}

#[test]
fn paste_replaces_the_selection() {
    let mut editor = editor_with(vec![paragraph("hello world")]);
    select(&mut editor, (0, 0), (0, 5));

    editor.paste_plain_text("bye").unwrap();

    assert_eq!(outline(editor.document()), vec!["P(bye world)"]);
    assert_eq!(caret_of(&editor), (0, 3));
}

#[test]
fn run_merge_policy_comes_from_settings() {
    let hashtag = Fragment::new(vec![FragmentNode::hashtag("#x")]);

    let mut separate = editor_with(vec![paragraph("ab")]);
    caret_to(&mut separate, 0, 2);
    separate.paste_fragment(&hashtag).unwrap();
    assert_eq!(outline(separate.document()), vec!["P(ab{#x})"]);

    let mut host_wins = editor_with(vec![paragraph("ab")]);
    host_wins.set_settings(EditorSettings {
        run_merge_policy: RunMergePolicy::HostWins,
        ..EditorSettings::default()
    });
    caret_to(&mut host_wins, 0, 2);
    host_wins.paste_fragment(&hashtag).unwrap();
    assert_eq!(outline(host_wins.document()), vec!["P(ab#x)"]);
}

// ============================================================================
// Typing
// ============================================================================

#[test]
fn typed_line_breaks_split_paragraphs() {
    let mut editor = DocumentEditor::new(Document::new());
    editor.insert_text("hello\r\nworld").unwrap();

    assert_eq!(
        to_markup(editor.document()).unwrap(),
        "<p dir=\"ltr\"><span>hello</span></p><p dir=\"ltr\"><span>world</span></p>"
    );
    assert_eq!(caret_of(&editor), (1, 5));
}

#[test]
fn typing_detects_right_to_left_text() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "שלום");

    assert_eq!(
        to_markup(editor.document()).unwrap(),
        "<p dir=\"rtl\"><span>שלום</span></p>"
    );
}

#[test]
fn typing_replaces_the_selection() {
    let mut editor = editor_with(vec![paragraph("hello world")]);
    select(&mut editor, (0, 5), (0, 0));

    editor.insert_text("bye").unwrap();

    assert_eq!(outline(editor.document()), vec!["P(bye world)"]);
    assert_eq!(caret_of(&editor), (0, 3));
}

#[test]
fn typed_hashtags_become_hashtag_runs() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "see #rust, (#x_1) and a#b ##two");

    assert_eq!(
        outline(editor.document()),
        vec!["P(see {#rust}, ({#x_1}) and a#b #{#two})"]
    );
    assert_eq!(
        to_markup(editor.document()).unwrap(),
        concat!(
            "<p dir=\"ltr\"><span>see </span><span class=\"hashtag\">#rust</span>",
            "<span>, (</span><span class=\"hashtag\">#x_1</span>",
            "<span>) and a#b #</span><span class=\"hashtag\">#two</span></p>",
        )
    );
}

#[test]
fn pasted_text_keeps_its_formats() {
    let mut editor = DocumentEditor::new(Document::new());
    editor.paste_plain_text("see #rust").unwrap();
    assert_eq!(outline(editor.document()), vec!["P(see #rust)"]);

    let settings = EditorSettings {
        recognize_hashtags: false,
        ..EditorSettings::default()
    };
    let mut plain = DocumentEditor::with_settings(Document::new(), settings);
    type_text(&mut plain, "see #rust");
    assert_eq!(outline(plain.document()), vec!["P(see #rust)"]);
}

#[test]
fn insert_text_applies_shortcuts_like_keystrokes() {
    let mut editor = DocumentEditor::new(Document::new());

    editor.insert_text("- one\ntwo").unwrap();

    assert_eq!(outline(editor.document()), vec!["UL[one|two]"]);
    assert_eq!(caret_of(&editor), (1, 3));
}

#[test]
fn dash_shortcut_starts_a_bulleted_list() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "- milk");
    editor.insert_paragraph_break().unwrap();
    type_text(&mut editor, "eggs");
    editor.insert_paragraph_break().unwrap();
    editor.insert_paragraph_break().unwrap();
    type_text(&mut editor, "done");

    assert_eq!(
        to_markup(editor.document()).unwrap(),
        concat!(
            "<ul><li dir=\"ltr\"><span>milk</span></li><li dir=\"ltr\"><span>eggs</span></li></ul>",
            "<p dir=\"ltr\"><span>done</span></p>",
        )
    );
}

#[test]
fn number_shortcut_starts_a_numbered_list() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "1. first");

    assert_eq!(outline(editor.document()), vec!["OL[first]"]);
}

#[test]
fn shortcuts_only_fire_at_paragraph_start() {
    let mut editor = DocumentEditor::new(Document::new());
    type_text(&mut editor, "note - x");

    assert_eq!(outline(editor.document()), vec!["P(note - x)"]);
}

#[test]
fn shortcuts_can_be_disabled() {
    let settings = EditorSettings {
        markdown_shortcuts: false,
        ..EditorSettings::default()
    };
    let mut editor = DocumentEditor::with_settings(Document::new(), settings);
    type_text(&mut editor, "- milk");

    assert_eq!(outline(editor.document()), vec!["P(- milk)"]);
}

#[test]
fn enter_inside_an_item_splits_it() {
    let mut editor = editor_with(vec![bulleted(&["onetwo"])]);
    caret_to(&mut editor, 0, 3);

    editor.insert_paragraph_break().unwrap();

    assert_eq!(outline(editor.document()), vec!["UL[one|two]"]);
    assert_eq!(caret_of(&editor), (1, 0));
}

#[test]
fn enter_on_empty_middle_item_lifts_it_out() {
    let mut editor = editor_with(vec![numbered(&["one", "", "three"])]);
    caret_to(&mut editor, 1, 0);

    editor.insert_paragraph_break().unwrap();

    assert_eq!(outline(editor.document()), vec!["OL[one]", "P()", "OL[three]"]);
    assert_eq!(caret_of(&editor), (1, 0));
}

// ============================================================================
// Deleting
// ============================================================================

#[test]
fn backspace_at_item_start_turns_it_into_a_paragraph() {
    let mut editor = editor_with(vec![bulleted(&["one", "two", "three"])]);
    caret_to(&mut editor, 1, 0);

    editor.delete_backward().unwrap();

    assert_eq!(outline(editor.document()), vec!["UL[one]", "P(two)", "UL[three]"]);
    assert_eq!(caret_of(&editor), (1, 0));
}

#[test]
fn backspace_at_paragraph_start_joins_blocks() {
    let mut editor = editor_with(vec![paragraph("ab"), paragraph("cd")]);
    caret_to(&mut editor, 1, 0);

    editor.delete_backward().unwrap();

    assert_eq!(outline(editor.document()), vec!["P(abcd)"]);
    assert_eq!(caret_of(&editor), (0, 2));
}

#[test]
fn delete_forward_at_block_end_joins_the_next_block() {
    let mut editor = editor_with(vec![paragraph("ab"), paragraph("cd")]);
    caret_to(&mut editor, 0, 2);

    editor.delete_forward().unwrap();

    assert_eq!(outline(editor.document()), vec!["P(abcd)"]);
    assert_eq!(caret_of(&editor), (0, 2));
}

#[test]
fn backspace_removes_a_decorator_as_one_unit() {
    let mut editor = editor_with(vec![FragmentNode::paragraph(vec![
        FragmentNode::text("a"),
        FragmentNode::decorator("@x"),
        FragmentNode::text("b"),
    ])]);
    caret_to(&mut editor, 0, 2);

    editor.delete_backward().unwrap();

    assert_eq!(outline(editor.document()), vec!["P(ab)"]);
    assert_eq!(caret_of(&editor), (0, 1));
}

#[test]
fn backspace_at_document_start_changes_nothing() {
    let mut editor = editor_with(vec![paragraph("ab")]);

    editor.delete_backward().unwrap();

    assert_eq!(outline(editor.document()), vec!["P(ab)"]);
    assert_eq!(caret_of(&editor), (0, 0));
}

#[test]
fn emptying_the_only_list_item_resets_to_a_paragraph() {
    let mut editor = editor_with(vec![bulleted(&["a"])]);
    caret_to(&mut editor, 0, 1);

    editor.delete_backward().unwrap();

    assert_eq!(outline(editor.document()), vec!["P()"]);
    assert_eq!(caret_of(&editor), (0, 0));

    let mut longer = editor_with(vec![bulleted(&["a", "b"])]);
    caret_to(&mut longer, 1, 1);
    longer.delete_backward().unwrap();
    assert_eq!(outline(longer.document()), vec!["UL[a|]"]);
}

// ============================================================================
// Caret movement
// ============================================================================

#[test]
fn vertical_moves_keep_the_preferred_column() {
    let mut editor = editor_with(vec![
        paragraph("hello world"),
        paragraph("hi"),
        paragraph("another line"),
    ]);
    caret_to(&mut editor, 0, 8);

    editor.move_caret(Motion::Down).unwrap();
    assert_eq!(caret_of(&editor), (1, 2));
    editor.move_caret(Motion::Down).unwrap();
    assert_eq!(caret_of(&editor), (2, 8));
    editor.move_caret(Motion::Up).unwrap();
    editor.move_caret(Motion::Up).unwrap();
    assert_eq!(caret_of(&editor), (0, 8));
}

#[test]
fn horizontal_moves_collapse_a_range_to_its_edges() {
    let mut editor = editor_with(vec![paragraph("hello world")]);

    select(&mut editor, (0, 5), (0, 2));
    editor.move_caret(Motion::Left).unwrap();
    assert!(editor.selection().is_collapsed());
    assert_eq!(caret_of(&editor), (0, 2));

    select(&mut editor, (0, 5), (0, 2));
    editor.move_caret(Motion::Right).unwrap();
    assert_eq!(caret_of(&editor), (0, 5));
}

#[test]
fn extending_moves_only_the_focus() {
    let mut editor = editor_with(vec![paragraph("hello world"), paragraph("next")]);

    editor.extend_selection(Motion::WordRight).unwrap();
    assert_eq!(editor.copy().unwrap().plain_text, "hello ");

    editor.extend_selection(Motion::Down).unwrap();
    assert_eq!(editor.copy().unwrap().plain_text, "hello world\nnext");
}

#[test]
fn set_selection_clamps_offsets() {
    let mut editor = editor_with(vec![paragraph("ab")]);
    let leaf = at(editor.document(), 0, 0).node;

    editor
        .set_selection(Selection::caret(Point::new(leaf, 99)))
        .unwrap();

    assert_eq!(editor.selection(), Selection::caret(Point::new(leaf, 2)));
}

#[test]
fn path_selection_round_trips_through_the_editor() {
    let mut editor = editor_with(vec![paragraph("ab"), bulleted(&["one"])]);
    caret_to(&mut editor, 1, 1);
    assert_eq!(
        editor.path_selection().unwrap(),
        PathSelection::caret(PathPoint::new(vec![1, 0, 0], 1))
    );

    editor
        .set_path_selection(&PathSelection::new(
            PathPoint::new(vec![0, 0], 0),
            PathPoint::new(vec![1, 0, 0], 3),
        ))
        .unwrap();
    assert_eq!(editor.copy().unwrap().plain_text, "ab\none");
}

#[test]
fn root_addressed_selection_matches_leaf_addressed_selection() {
    let mut editor = editor_with(vec![paragraph("ab"), bulleted(&["one", "two"])]);
    editor.select_all().unwrap();
    let by_leaves = editor.copy().unwrap();

    editor
        .set_path_selection(&PathSelection::new(
            PathPoint::new(Vec::new(), 0),
            PathPoint::new(Vec::new(), 2),
        ))
        .unwrap();
    let by_root = editor.copy().unwrap();

    assert_eq!(by_root, by_leaves);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn failed_command_changes_nothing() {
    let mut editor = editor_with(vec![paragraph("ab")]);
    let revision = editor.revision();
    let missing = NodeId::from_index(999);

    let err = editor.collapse_to(Point::new(missing, 0)).unwrap_err();

    assert_eq!(err, EditorError::NotFound(missing));
    assert_eq!(editor.revision(), revision);
    assert_eq!(outline(editor.document()), vec!["P(ab)"]);
}

#[test]
fn failed_paste_rolls_back_partial_edits() {
    let mut editor = editor_with(vec![paragraph("hello")]);
    caret_to(&mut editor, 0, 2);
    let revision = editor.revision();
    let selection = editor.selection();

    let nested = Fragment::new(vec![FragmentNode::paragraph(vec![paragraph("x")])]);
    let err = editor.paste_fragment(&nested).unwrap_err();

    assert_eq!(
        err,
        EditorError::InvalidStructure {
            parent: NodeKind::Paragraph,
            child: NodeKind::Paragraph,
        }
    );
    assert_eq!(outline(editor.document()), vec!["P(hello)"]);
    assert_eq!(editor.selection(), selection);
    assert_eq!(editor.revision(), revision);
    editor.document().check_invariants().unwrap();
}

#[test]
fn observers_see_every_commit() {
    let mut editor = DocumentEditor::new(Document::new());
    let commits = Rc::new(Cell::new(0));
    let last_len = Rc::new(Cell::new(0));
    {
        let commits = Rc::clone(&commits);
        let last_len = Rc::clone(&last_len);
        editor.on_commit(move |document, _| {
            commits.set(commits.get() + 1);
            last_len.set(document.caret_len(document.root()).unwrap());
        });
    }

    editor.insert_text("abc").unwrap();
    editor.delete_backward().unwrap();
    let _ = editor.collapse_to(Point::new(NodeId::from_index(999), 0));

    assert_eq!(commits.get(), 2);
    assert_eq!(last_len.get(), 2);
    assert_eq!(editor.revision(), 2);
}

#[test]
fn repeated_round_trips_do_not_grow_the_arena() {
    let mut editor = editor_with(vec![
        paragraph("alpha"),
        bulleted(&["one", "two"]),
        paragraph("omega"),
    ]);
    let original = outline(editor.document());
    let mut round_trip = |editor: &mut DocumentEditor| {
        editor.select_all().unwrap();
        let payload = editor.copy().unwrap();
        editor.delete_selection().unwrap();
        editor.paste(&payload).unwrap();
    };

    round_trip(&mut editor);
    let live = editor.document().len();
    let slots = editor.document().slot_count();
    for _ in 0..200 {
        round_trip(&mut editor);
    }

    assert_eq!(outline(editor.document()), original);
    assert_eq!(editor.document().len(), live);
    assert_eq!(editor.document().slot_count(), slots);
}
