use chatterslate_core::{
    CommandError, Document, Editor, EditorState, Mark, Node, PluginRegistry, Selection,
};

fn editor_with(nodes: Vec<Node>) -> Editor {
    let doc = Document::new(nodes);
    let blocks: Vec<_> = doc.leaf_blocks().iter().map(|el| el.key).collect();
    let cursor = doc.end_of(blocks[0]).unwrap();
    let selection = Selection::blocks(blocks).with_cursor(cursor);
    Editor::new(EditorState::new(doc, selection), PluginRegistry::chatter())
}

fn leaf_marks(editor: &Editor) -> Vec<Vec<Mark>> {
    fn walk(node: &Node, out: &mut Vec<Vec<Mark>>) {
        match node {
            Node::Text(t) => out.extend(t.leaves.iter().map(|l| l.marks.clone())),
            _ => node.children().iter().for_each(|c| walk(c, out)),
        }
    }
    let mut out = Vec::new();
    editor.doc().nodes.iter().for_each(|n| walk(n, &mut out));
    out
}

#[test]
fn bold_toggles_across_all_selected_blocks() {
    let mut editor = editor_with(vec![Node::paragraph("a"), Node::paragraph("b")]);

    editor.run_command("bold.toggle", None).unwrap();
    assert!(leaf_marks(&editor).iter().all(|m| m == &vec![Mark::new("bold")]));
    assert!(editor.run_query::<bool>("bold.is_active", None).unwrap());
    assert!(!editor.run_query::<bool>("italic.is_active", None).unwrap());

    editor.run_command("bold.toggle", None).unwrap();
    assert!(leaf_marks(&editor).iter().all(Vec::is_empty));
    assert!(!editor.run_query::<bool>("bold.is_active", None).unwrap());
}

#[test]
fn marks_stack_independently() {
    let mut editor = editor_with(vec![Node::paragraph("a")]);

    editor.run_command("italic.toggle", None).unwrap();
    editor.run_command("underline.toggle", None).unwrap();
    assert_eq!(leaf_marks(&editor), vec![vec![
        Mark::new("italic"),
        Mark::new("underline")
    ]]);

    editor.run_command("italic.toggle", None).unwrap();
    assert_eq!(leaf_marks(&editor), vec![vec![Mark::new("underline")]]);
}

#[test]
fn color_set_replaces_the_previous_color() {
    let mut editor = editor_with(vec![Node::paragraph("a")]);

    editor
        .run_command("color.set", Some(serde_json::json!({ "color": "red" })))
        .unwrap();
    editor
        .run_command("color.set", Some(serde_json::json!({ "color": "blue" })))
        .unwrap();

    assert_eq!(leaf_marks(&editor), vec![vec![
        Mark::new("color").with_data("color", "blue")
    ]]);
    let active: Option<String> = editor.run_query("color.active", None).unwrap();
    assert_eq!(active.as_deref(), Some("blue"));

    editor.run_command("color.unset", None).unwrap();
    let active: Option<String> = editor.run_query("color.active", None).unwrap();
    assert_eq!(active, None);
}

#[test]
fn color_set_requires_a_color() {
    let mut editor = editor_with(vec![Node::paragraph("a")]);
    let err = editor.run_command("color.set", None).unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgs { .. }));
}

#[test]
fn plain_insert_types_at_the_cursor() {
    let mut editor = editor_with(vec![Node::paragraph("ab")]);

    editor
        .run_command("plain.insert", Some(serde_json::json!({ "text": "→" })))
        .unwrap();
    editor
        .run_command("plain.insert", Some(serde_json::json!({ "text": "c" })))
        .unwrap();

    assert_eq!(editor.doc().nodes[0].text_content(), "ab→c");
    let cursor = editor.selection().cursor.unwrap();
    assert_eq!(cursor.offset, "ab→c".len());
}
