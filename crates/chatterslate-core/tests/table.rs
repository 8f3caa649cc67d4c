use std::sync::Arc;

use chatterslate_core::{
    CommandError, Document, Editor, EditorPlugin, EditorState, Element, Node, NodeType, Op,
    PluginRegistry, Point, RegistryError, Selection, StrategyError, TemplateBuilder,
    TemplateRegistry, table_strategy,
};

fn editor_with_text(text: &str, offset: usize) -> Editor {
    let doc = Document::new(vec![Node::paragraph(text)]);
    let block = doc.nodes[0].key();
    let text_key = doc.nodes[0].children()[0].key();
    let selection = Selection::blocks([block]).with_cursor(Point::new(text_key, offset));
    Editor::new(EditorState::new(doc, selection), PluginRegistry::chatter())
}

fn insert(editor: &mut Editor, template: &str) -> Result<(), CommandError> {
    editor.run_command(
        "table.insert",
        Some(serde_json::json!({ "template": template })),
    )
}

fn kinds(doc: &Document) -> Vec<String> {
    doc.nodes
        .iter()
        .map(|n| n.kind().map(ToString::to_string).unwrap_or_default())
        .collect()
}

fn cell_texts(table: &Node) -> Vec<Vec<String>> {
    table
        .children()
        .iter()
        .map(|row| row.children().iter().map(Node::text_content).collect())
        .collect()
}

#[test]
fn arrow_template_replaces_an_empty_paragraph() {
    let mut editor = Editor::with_chatter_plugins();

    insert(&mut editor, "arrow").unwrap();

    let doc = editor.doc();
    assert_eq!(kinds(doc), vec!["table"]);
    let table = &doc.nodes[0];
    assert_eq!(
        table.as_element().unwrap().data.get("className"),
        Some(&serde_json::json!("arrow"))
    );
    assert_eq!(cell_texts(table), vec![vec!["", "→", ""]]);

    let cells = table.children()[0].children();
    let editable: Vec<_> = cells
        .iter()
        .map(|c| c.as_element().unwrap().data.get("contentEditable").cloned())
        .collect();
    assert_eq!(
        editable,
        vec![
            Some(serde_json::json!(true)),
            Some(serde_json::json!(false)),
            Some(serde_json::json!(true)),
        ]
    );

    assert_eq!(editor.selection().blocks, vec![cells[0].key()]);
    assert_eq!(
        editor.selection().cursor,
        Some(Point::new(cells[0].children()[0].key(), 0))
    );
    assert!(editor.run_query::<bool>("table.is_inside", None).unwrap());
}

#[test]
fn conversation_template_has_two_speaker_rows() {
    let mut editor = Editor::with_chatter_plugins();
    insert(&mut editor, "conversation").unwrap();

    assert_eq!(
        cell_texts(&editor.doc().nodes[0]),
        vec![vec!["A:", ""], vec!["B:", ""]]
    );
}

#[test]
fn unknown_template_fails_without_touching_the_tree() {
    let mut editor = editor_with_text("hello", 5);
    let before = editor.doc().clone();

    let err = insert(&mut editor, "missing").unwrap_err();
    assert_eq!(
        err,
        CommandError::Strategy(StrategyError::InvalidTemplate {
            name: "missing".to_string()
        })
    );
    assert_eq!(editor.doc(), &before);
    assert!(!editor.can_undo());
}

#[test]
fn missing_template_argument_is_invalid_args() {
    let mut editor = Editor::with_chatter_plugins();
    let err = editor.run_command("table.insert", None).unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgs { .. }));
}

#[test]
fn strategy_emits_one_insert_block() {
    let tx = table_strategy(&TemplateRegistry::builtin(), "middle").unwrap();
    assert_eq!(tx.len(), 1);
    let Op::InsertBlock { node } = &tx.ops()[0] else {
        panic!("expected insert_block");
    };
    assert_eq!(node.kind(), Some(&NodeType::Table));
}

#[test]
fn cursor_position_decides_where_the_table_lands() {
    let mut at_end = editor_with_text("hello", 5);
    insert(&mut at_end, "arrow").unwrap();
    assert_eq!(kinds(at_end.doc()), vec!["paragraph", "table"]);

    let mut at_start = editor_with_text("hello", 0);
    insert(&mut at_start, "arrow").unwrap();
    assert_eq!(kinds(at_start.doc()), vec!["table", "paragraph"]);

    let mut in_middle = editor_with_text("hello", 2);
    insert(&mut in_middle, "arrow").unwrap();
    let doc = in_middle.doc();
    assert_eq!(kinds(doc), vec!["paragraph", "table", "paragraph"]);
    assert_eq!(doc.nodes[0].text_content(), "he");
    assert_eq!(doc.nodes[2].text_content(), "llo");
}

#[test]
fn inserted_template_gets_fresh_keys_each_time() {
    let mut editor = editor_with_text("hello", 5);
    insert(&mut editor, "arrow").unwrap();

    let para = editor.doc().nodes[0].key();
    let text = editor.doc().nodes[0].children()[0].key();
    editor
        .set_selection(Selection::blocks([para]).with_cursor(Point::new(text, 5)))
        .unwrap();
    insert(&mut editor, "arrow").unwrap();

    let doc = editor.doc();
    assert_eq!(kinds(doc), vec!["paragraph", "table", "table"]);
    assert_ne!(doc.nodes[1].key(), doc.nodes[2].key());
    let first_cell = doc.nodes[1].children()[0].children()[0].key();
    let second_cell = doc.nodes[2].children()[0].children()[0].key();
    assert_ne!(first_cell, second_cell);
}

struct GridPlugin {
    template: &'static str,
}

impl EditorPlugin for GridPlugin {
    fn id(&self) -> &str {
        "grid"
    }

    fn templates(&self) -> Vec<(String, TemplateBuilder)> {
        let builder: TemplateBuilder = Arc::new(|| {
            let cell = || Node::block(NodeType::TableCell, vec![Node::text("")]);
            Node::Block(
                Element::new(NodeType::Table).with_children(vec![
                    Node::block(NodeType::TableRow, vec![cell(), cell()]),
                    Node::block(NodeType::TableRow, vec![cell(), cell()]),
                ]),
            )
        });
        vec![(self.template.to_string(), builder)]
    }
}

#[test]
fn plugins_can_contribute_templates() {
    let mut registry = PluginRegistry::chatter();
    registry
        .register_plugin(Box::new(GridPlugin { template: "grid" }))
        .unwrap();
    let mut editor = Editor::new(
        Editor::with_chatter_plugins().state().clone(),
        registry,
    );

    let names: Vec<String> = editor.run_query("table.templates", None).unwrap();
    assert_eq!(names, vec!["arrow", "conversation", "grid", "middle"]);

    insert(&mut editor, "grid").unwrap();
    assert_eq!(editor.doc().nodes[0].children().len(), 2);
}

#[test]
fn duplicate_template_names_are_rejected() {
    let mut registry = PluginRegistry::chatter();
    let err = registry
        .register_plugin(Box::new(GridPlugin { template: "arrow" }))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateTemplate("arrow".to_string()));
}
