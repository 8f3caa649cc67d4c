use chatterslate_core::{
    CommandError, Document, Editor, EditorConfig, EditorState, Node, NodeType, Op,
    PluginRegistry, Selection, StrategyError, block_strategy,
};

fn editor_with(nodes: Vec<Node>, selected: usize) -> Editor {
    let doc = Document::new(nodes);
    let key = doc.leaf_blocks()[selected].key;
    let selection = Selection::end_of(&doc, key).unwrap();
    Editor::new(EditorState::new(doc, selection), PluginRegistry::chatter())
}

fn bulleted(items: &[&str]) -> Node {
    Node::block(
        NodeType::BulletedList,
        items
            .iter()
            .map(|t| Node::block(NodeType::ListItem, vec![Node::text(*t)]))
            .collect(),
    )
}

fn kinds(doc: &Document) -> Vec<String> {
    doc.nodes
        .iter()
        .map(|n| n.kind().map(ToString::to_string).unwrap_or_default())
        .collect()
}

#[test]
fn block_quote_toggles_on_and_back_off() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], 0);
    let original = editor.doc().clone();

    editor.run_command("block-quote.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["block-quote"]);
    assert_eq!(editor.doc().nodes[0].text_content(), "hello");
    assert!(editor.run_query::<bool>("block-quote.is_active", None).unwrap());

    editor.run_command("block-quote.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["paragraph"]);
    assert!(!editor.run_query::<bool>("block-quote.is_active", None).unwrap());
    assert!(editor.doc().same_shape(&original));
}

#[test]
fn double_toggle_restores_the_tree_for_every_block_type() {
    for kind in ["block-quote", "heading-one", "heading-two"] {
        let mut editor = editor_with(vec![Node::paragraph("a"), Node::paragraph("b")], 1);
        let original = editor.doc().clone();
        let command = format!("{kind}.toggle");

        editor.run_command(&command, None).unwrap();
        assert_eq!(kinds(editor.doc()), vec!["paragraph", kind]);
        editor.run_command(&command, None).unwrap();
        assert!(editor.doc().same_shape(&original), "{kind}");
    }
}

#[test]
fn toggling_an_active_type_falls_back_to_the_default_block() {
    let mut editor = editor_with(vec![Node::block(NodeType::HeadingOne, vec![Node::text("t")])], 0);
    editor.run_command("heading-one.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["paragraph"]);
}

#[test]
fn configured_default_block_is_used_when_toggling_off() {
    let doc = Document::new(vec![Node::block(NodeType::BlockQuote, vec![Node::text("q")])]);
    let selection = Selection::end_of(&doc, doc.nodes[0].key()).unwrap();
    let config = EditorConfig::from_json_str(r#"{ "default_block": "heading-two" }"#).unwrap();
    let mut editor = Editor::with_config(
        EditorState::new(doc, selection),
        PluginRegistry::chatter(),
        config,
    );

    editor.run_command("block-quote.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["heading-two"]);
}

#[test]
fn outside_a_list_the_strategy_emits_one_set_block() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let selection = Selection::blocks([doc.nodes[0].key()]);

    let tx = block_strategy(&doc, &selection, &NodeType::HeadingOne, &NodeType::Paragraph).unwrap();
    assert_eq!(
        tx.ops(),
        &[Op::SetBlock {
            kind: NodeType::HeadingOne
        }]
    );
    assert_eq!(tx.meta().source.as_deref(), Some("command:heading-one.toggle"));
}

#[test]
fn inside_a_list_the_strategy_also_unwraps_both_list_flavors() {
    let doc = Document::new(vec![bulleted(&["a"])]);
    let item = doc.leaf_blocks()[0].key;
    let selection = Selection::blocks([item]);

    let tx = block_strategy(&doc, &selection, &NodeType::BlockQuote, &NodeType::Paragraph).unwrap();
    assert_eq!(
        tx.ops(),
        &[
            Op::SetBlock {
                kind: NodeType::BlockQuote
            },
            Op::UnwrapBlock {
                kind: NodeType::BulletedList
            },
            Op::UnwrapBlock {
                kind: NodeType::NumberedList
            },
        ]
    );
}

#[test]
fn block_strategy_refuses_list_types() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let selection = Selection::blocks([doc.nodes[0].key()]);

    let err = block_strategy(&doc, &selection, &NodeType::NumberedList, &NodeType::Paragraph)
        .unwrap_err();
    assert_eq!(err, StrategyError::ListType("numbered-list".to_string()));
}

#[test]
fn toggling_inside_a_list_escapes_the_list() {
    let mut editor = editor_with(vec![bulleted(&["one"])], 0);

    editor.run_command("heading-one.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["heading-one"]);
    assert_eq!(editor.doc().nodes[0].text_content(), "one");
}

#[test]
fn toggling_one_item_splits_the_surrounding_list() {
    let mut editor = editor_with(vec![bulleted(&["a", "b", "c"])], 1);
    let list_key = editor.doc().nodes[0].key();

    editor.run_command("heading-two.toggle", None).unwrap();

    let doc = editor.doc();
    assert_eq!(kinds(doc), vec!["bulleted-list", "heading-two", "bulleted-list"]);
    assert_eq!(doc.nodes[0].key(), list_key);
    assert_eq!(doc.nodes[0].text_content(), "a");
    assert_eq!(doc.nodes[1].text_content(), "b");
    assert_eq!(doc.nodes[2].text_content(), "c");
    assert_ne!(doc.nodes[2].key(), list_key);
}

fn item_with_block(kind: NodeType, text: &str) -> Node {
    Node::block(NodeType::BulletedList, vec![Node::block(
        NodeType::ListItem,
        vec![Node::block(kind, vec![Node::text(text)])],
    )])
}

#[test]
fn block_inside_a_list_item_leaves_item_and_list() {
    let mut editor = editor_with(vec![item_with_block(NodeType::Paragraph, "b")], 0);
    let selected = editor.selection().blocks[0];

    editor.run_command("block-quote.toggle", None).unwrap();

    let doc = editor.doc();
    assert_eq!(kinds(doc), vec!["block-quote"]);
    assert_eq!(doc.nodes[0].key(), selected);
    assert_eq!(doc.nodes[0].text_content(), "b");
}

#[test]
fn active_type_inside_a_list_item_resets_to_default_and_exits() {
    let mut editor = editor_with(vec![item_with_block(NodeType::BlockQuote, "b")], 0);

    editor.run_command("block-quote.toggle", None).unwrap();
    assert_eq!(kinds(editor.doc()), vec!["paragraph"]);
    assert_eq!(editor.doc().nodes[0].text_content(), "b");
}

#[test]
fn siblings_in_the_same_item_stay_listed() {
    let doc_nodes = vec![Node::block(NodeType::BulletedList, vec![Node::block(
        NodeType::ListItem,
        vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ],
    )])];
    let mut editor = editor_with(doc_nodes, 1);

    editor.run_command("heading-one.toggle", None).unwrap();

    let doc = editor.doc();
    assert_eq!(kinds(doc), vec!["bulleted-list", "heading-one", "bulleted-list"]);
    assert_eq!(doc.nodes[0].children()[0].kind(), Some(&NodeType::ListItem));
    assert_eq!(doc.nodes[0].text_content(), "a");
    assert_eq!(doc.nodes[1].text_content(), "b");
    assert_eq!(doc.nodes[2].children()[0].kind(), Some(&NodeType::ListItem));
    assert_eq!(doc.nodes[2].text_content(), "c");
}

#[test]
fn block_toggles_are_disabled_inside_a_table() {
    let mut editor = Editor::with_chatter_plugins();
    editor
        .run_command("table.insert", Some(serde_json::json!({ "template": "arrow" })))
        .unwrap();
    let before = editor.doc().clone();

    assert!(editor.run_query::<bool>("block-quote.is_disabled", None).unwrap());
    let err = editor.run_command("block-quote.toggle", None).unwrap_err();
    assert_eq!(err, CommandError::Disabled("block-quote.toggle".to_string()));
    assert!(matches!(
        editor.run_command("bulleted-list.toggle", None),
        Err(CommandError::Disabled(_))
    ));
    assert_eq!(editor.doc(), &before);
}
