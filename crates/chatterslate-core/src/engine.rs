use crate::core::{
    Data, Document, EditorState, Element, Key, Leaf, Node, Path, Point, Selection, Text,
    first_text,
};
use crate::error::ApplyError;
use crate::node_type::NodeType;
use crate::ops::{Op, Transaction};

/// Applies `tx` to a copy of `state`. Either every op applies and the
/// resulting tree passes the structure checks, or the error is returned and
/// `state` is untouched.
pub fn apply(state: &EditorState, tx: &Transaction) -> Result<EditorState, ApplyError> {
    check_selection(&state.document, &state.selection)?;

    let mut next = state.clone();
    for op in tx.ops() {
        apply_op(&mut next, op)?;
        tracing::trace!(?op, "op applied");
    }

    check_structure(&next.document)?;
    Ok(next)
}

pub fn check_selection(doc: &Document, selection: &Selection) -> Result<(), ApplyError> {
    for &key in &selection.blocks {
        match doc.find(key) {
            Some(Node::Block(_)) => {}
            Some(_) => return Err(ApplyError::NotABlock(key)),
            None => return Err(ApplyError::UnknownKey(key)),
        }
    }
    if let Some(point) = selection.cursor {
        match doc.find(point.key) {
            Some(Node::Text(_)) => {}
            Some(_) => return Err(ApplyError::NotAText(point.key)),
            None => return Err(ApplyError::UnknownKey(point.key)),
        }
    }
    Ok(())
}

/// Tree-wide invariants every applied batch must leave intact.
pub fn check_structure(doc: &Document) -> Result<(), ApplyError> {
    let mut ancestors = Vec::new();
    check_children(&doc.nodes, &mut ancestors).map_err(ApplyError::InvalidStructure)
}

/// Checks a detached subtree as if it were inserted at the root.
pub fn check_subtree(node: &Node) -> Result<(), String> {
    check_node(node, &mut Vec::new())
}

fn check_children(children: &[Node], ancestors: &mut Vec<NodeType>) -> Result<(), String> {
    children
        .iter()
        .try_for_each(|node| check_node(node, ancestors))
}

fn check_node(node: &Node, ancestors: &mut Vec<NodeType>) -> Result<(), String> {
    let Some(el) = node.as_element() else {
        return Ok(());
    };
    let parent = ancestors.last();

    if el.is_void && !el.children.is_empty() {
        return Err(format!("void {} {} has children", el.kind, el.key));
    }

    match &el.kind {
        NodeType::ListItem if !ancestors.iter().any(NodeType::is_list_container) => {
            return Err(format!("list-item {} has no list container ancestor", el.key));
        }
        kind if kind.is_list_container() && parent.is_some_and(NodeType::is_list_container) => {
            return Err(format!(
                "{kind} {} is nested directly inside another list",
                el.key
            ));
        }
        NodeType::Table => check_table(el)?,
        NodeType::TableRow if parent != Some(&NodeType::Table) => {
            return Err(format!("table_row {} is outside a table", el.key));
        }
        NodeType::TableCell if parent != Some(&NodeType::TableRow) => {
            return Err(format!("table_cell {} is outside a table row", el.key));
        }
        _ => {}
    }

    ancestors.push(el.kind.clone());
    let result = check_children(&el.children, ancestors);
    ancestors.pop();
    result
}

fn check_table(table: &Element) -> Result<(), String> {
    if table.children.is_empty() {
        return Err(format!("table {} has no rows", table.key));
    }

    let mut width = None;
    for row in &table.children {
        let Some(row) = row.as_block().filter(|el| el.kind == NodeType::TableRow) else {
            return Err(format!("table {} has a child that is not a row", table.key));
        };
        let all_cells = row
            .children
            .iter()
            .all(|n| n.as_block().is_some_and(|el| el.kind == NodeType::TableCell));
        if row.children.is_empty() || !all_cells {
            return Err(format!("table_row {} must hold one or more cells", row.key));
        }
        match width {
            None => width = Some(row.children.len()),
            Some(w) if w != row.children.len() => {
                return Err(format!("table {} is not rectangular", table.key));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn apply_op(state: &mut EditorState, op: &Op) -> Result<(), ApplyError> {
    match op {
        Op::SetBlock { kind } => set_block(state, kind),
        Op::WrapBlock { kind } => wrap_block(state, kind),
        Op::UnwrapBlock { kind } => unwrap_block(state, kind),
        Op::InsertInline {
            kind,
            data,
            is_void,
        } => insert_inline(state, kind, data, *is_void),
        Op::InsertBlock { node } => insert_block(state, node),
        Op::InsertText { text } => insert_text(state, text),
        Op::AddMark { mark } => for_each_selected_leaf(state, |leaf| {
            if !leaf.marks.contains(mark) {
                leaf.marks.push(mark.clone());
            }
        }),
        Op::RemoveMark { kind } => for_each_selected_leaf(state, |leaf| {
            leaf.marks.retain(|m| m.kind != *kind);
        }),
    }
}

fn selected_paths(doc: &Document, selection: &Selection) -> Result<Vec<Path>, ApplyError> {
    selection
        .blocks
        .iter()
        .map(|&key| {
            let path = doc.path_of(key).ok_or(ApplyError::UnknownKey(key))?;
            match doc.node_at(&path) {
                Some(Node::Block(_)) => Ok(path),
                _ => Err(ApplyError::NotABlock(key)),
            }
        })
        .collect()
}

fn set_block(state: &mut EditorState, kind: &NodeType) -> Result<(), ApplyError> {
    for path in selected_paths(&state.document, &state.selection)? {
        if let Some(Node::Block(el)) = state.document.node_at_mut(&path) {
            el.kind = kind.clone();
        }
    }
    Ok(())
}

fn common_prefix_len(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Wraps the run of siblings spanning the selection, under the selection's
/// lowest common ancestor, in a new block.
fn wrap_block(state: &mut EditorState, kind: &NodeType) -> Result<(), ApplyError> {
    let paths = selected_paths(&state.document, &state.selection)?;
    let Some(first) = paths.first() else {
        return Ok(());
    };

    let depth = paths
        .iter()
        .map(|p| common_prefix_len(first, p).min(p.len() - 1))
        .min()
        .unwrap_or(0);
    let parent = first[..depth].to_vec();
    let start = paths.iter().map(|p| p[depth]).min().unwrap_or(0);
    let end = paths.iter().map(|p| p[depth]).max().unwrap_or(start);

    let key = state.document.alloc_key();
    // A list only holds items: bare blocks in the span get an item each.
    let bare = |node: &Node| matches!(node, Node::Block(el) if el.kind != NodeType::ListItem);
    let item_count = if kind.is_list_container() {
        state
            .document
            .children_at(&parent)
            .and_then(|children| children.get(start..=end))
            .map_or(0, |span| span.iter().filter(|n| bare(*n)).count())
    } else {
        0
    };
    let mut item_keys: Vec<Key> = (0..item_count).map(|_| state.document.alloc_key()).collect();

    let children = state
        .document
        .children_at_mut(&parent)
        .ok_or_else(|| ApplyError::InvalidStructure("wrap parent is not a container".into()))?;
    let wrapped: Vec<Node> = children
        .drain(start..=end)
        .map(|node| {
            if !bare(&node) {
                return node;
            }
            match item_keys.pop() {
                Some(key) => {
                    let mut item = Element::new(NodeType::ListItem).with_children(vec![node]);
                    item.key = key;
                    Node::Block(item)
                }
                None => node,
            }
        })
        .collect();
    let mut wrapper = Element::new(kind.clone()).with_children(wrapped);
    wrapper.key = key;
    children.insert(start, Node::Block(wrapper));
    Ok(())
}

/// Lifts the selection out of its closest `kind` ancestors. Wrapper
/// children before and after the selection stay wrapped; a missing
/// wrapper is a no-op. Leaving a list also means leaving the list item a
/// block sits in.
fn unwrap_block(state: &mut EditorState, kind: &NodeType) -> Result<(), ApplyError> {
    let mut wrappers: Vec<Key> = Vec::new();
    for &key in &state.selection.blocks {
        let ancestors = state
            .document
            .ancestors(key)
            .ok_or(ApplyError::UnknownKey(key))?;
        if let Some(wrapper) = ancestors.iter().rev().find(|el| el.kind == *kind) {
            if !wrappers.contains(&wrapper.key) {
                wrappers.push(wrapper.key);
            }
        }
    }

    for wrapper in wrappers {
        unwrap_one(state, wrapper)?;
    }
    Ok(())
}

fn unwrap_one(state: &mut EditorState, wrapper: Key) -> Result<(), ApplyError> {
    let wrapper_path = state
        .document
        .path_of(wrapper)
        .ok_or(ApplyError::UnknownKey(wrapper))?;
    let is_list = matches!(
        state.document.node_at(&wrapper_path),
        Some(Node::Block(el)) if el.kind.is_list_container()
    );
    if is_list {
        hoist_out_of_items(state, &wrapper_path)?;
    }

    let doc = &mut state.document;
    let selection = &state.selection;
    let depth = wrapper_path.len();

    let mut span: Option<(usize, usize)> = None;
    for &key in &selection.blocks {
        let Some(path) = doc.path_of(key) else {
            continue;
        };
        if path.len() > depth && path.starts_with(&wrapper_path) {
            let ix = path[depth];
            span = Some(match span {
                None => (ix, ix),
                Some((start, end)) => (start.min(ix), end.max(ix)),
            });
        }
    }
    let Some((start, end)) = span else {
        return Ok(());
    };

    let fresh = doc.alloc_key();
    let Some((&wrapper_ix, parent)) = wrapper_path.split_last() else {
        return Err(ApplyError::UnknownKey(wrapper));
    };
    let siblings = doc
        .children_at_mut(parent)
        .ok_or_else(|| ApplyError::InvalidStructure("unwrap parent is not a container".into()))?;
    let Node::Block(shell) = siblings.remove(wrapper_ix) else {
        return Err(ApplyError::NotABlock(wrapper));
    };

    siblings.splice(wrapper_ix..wrapper_ix, split_around(shell, start, end, fresh));
    Ok(())
}

/// Moves each selected block that sits directly inside an item of the list
/// at `list_path` up beside that item, splitting the item around it.
fn hoist_out_of_items(state: &mut EditorState, list_path: &[usize]) -> Result<(), ApplyError> {
    let depth = list_path.len();
    for &key in &state.selection.blocks {
        let doc = &mut state.document;
        let Some(path) = doc.path_of(key) else {
            continue;
        };
        if path.len() != depth + 2 || !path.starts_with(list_path) {
            continue;
        }
        let in_item = matches!(
            doc.node_at(&path[..depth + 1]),
            Some(Node::Block(el)) if el.kind == NodeType::ListItem
        );
        if !in_item {
            continue;
        }

        let fresh = doc.alloc_key();
        let (item_ix, child_ix) = (path[depth], path[depth + 1]);
        let siblings = doc
            .children_at_mut(list_path)
            .ok_or_else(|| ApplyError::InvalidStructure("list is not a container".into()))?;
        let Node::Block(item) = siblings.remove(item_ix) else {
            return Err(ApplyError::NotABlock(key));
        };
        siblings.splice(item_ix..item_ix, split_around(item, child_ix, child_ix, fresh));
    }
    Ok(())
}

/// Replaces `shell` by its children `start..=end`. Children before and after
/// the span stay in copies of the shell; the head copy keeps the shell's key
/// and the tail copy takes `fresh` when both exist.
fn split_around(mut shell: Element, start: usize, end: usize, fresh: Key) -> Vec<Node> {
    let mut before = std::mem::take(&mut shell.children);
    let after = before.split_off(end + 1);
    let lifted = before.split_off(start);

    let mut replacement = Vec::with_capacity(lifted.len() + 2);
    let keeps_head = !before.is_empty();
    if keeps_head {
        replacement.push(Node::Block(Element {
            children: before,
            ..shell.clone()
        }));
    }
    replacement.extend(lifted);
    if !after.is_empty() {
        if keeps_head {
            shell.key = fresh;
        }
        shell.children = after;
        replacement.push(Node::Block(shell));
    }
    replacement
}

fn cursor(selection: &Selection) -> Result<Point, ApplyError> {
    selection.cursor.ok_or(ApplyError::MissingCursor)
}

fn insert_inline(
    state: &mut EditorState,
    kind: &NodeType,
    data: &Data,
    is_void: bool,
) -> Result<(), ApplyError> {
    let point = cursor(&state.selection)?;
    let doc = &mut state.document;

    let path = doc
        .path_of(point.key)
        .ok_or(ApplyError::UnknownKey(point.key))?;
    let inline_key = doc.alloc_key();
    let right_key = doc.alloc_key();
    let inner_key = (!is_void).then(|| doc.alloc_key());

    let Some(Node::Text(text)) = doc.node_at_mut(&path) else {
        return Err(ApplyError::NotAText(point.key));
    };
    let right = Text {
        key: right_key,
        leaves: text.split_off(point.offset),
    };

    let inline = Node::Inline(Element {
        key: inline_key,
        kind: kind.clone(),
        data: data.clone(),
        is_void,
        children: inner_key
            .map(|key| {
                vec![Node::Text(Text {
                    key,
                    leaves: vec![Leaf::default()],
                })]
            })
            .unwrap_or_default(),
    });

    let Some((&ix, parent)) = path.split_last() else {
        return Err(ApplyError::NotAText(point.key));
    };
    let siblings = doc
        .children_at_mut(parent)
        .ok_or_else(|| ApplyError::InvalidStructure("text parent is not a container".into()))?;
    siblings.insert(ix + 1, inline);
    siblings.insert(ix + 2, Node::Text(right));

    state.selection.cursor = Some(Point::new(right_key, 0));
    Ok(())
}

fn insert_text(state: &mut EditorState, text: &str) -> Result<(), ApplyError> {
    let point = cursor(&state.selection)?;
    let path = state
        .document
        .path_of(point.key)
        .ok_or(ApplyError::UnknownKey(point.key))?;
    let Some(Node::Text(node)) = state.document.node_at_mut(&path) else {
        return Err(ApplyError::NotAText(point.key));
    };
    let at = node.insert_str(point.offset, text);
    state.selection.cursor = Some(Point::new(point.key, at + text.len()));
    Ok(())
}

fn closest_block_path(doc: &Document, path: &[usize]) -> Option<Path> {
    let mut path = path.to_vec();
    while path.pop().is_some() {
        if path.is_empty() {
            return None;
        }
        if matches!(doc.node_at(&path), Some(Node::Block(_))) {
            return Some(path);
        }
    }
    None
}

/// Cursor position within `block` counted across its descendants, voids
/// counting as one.
fn offset_in_block(block: &Element, rel_path: &[usize], offset: usize) -> usize {
    let mut total = 0;
    let mut children = block.children.as_slice();
    for (depth, &ix) in rel_path.iter().enumerate() {
        let ix = ix.min(children.len());
        total += children[..ix].iter().map(Node::offset_len).sum::<usize>();
        match children.get(ix) {
            Some(Node::Text(t)) if depth + 1 == rel_path.len() => return total + offset.min(t.len()),
            Some(node) => children = node.children(),
            None => break,
        }
    }
    total
}

/// Inserts a detached subtree next to the cursor block: replacing it when
/// empty, before it at its start, after it at its end, and between its two
/// halves otherwise. The subtree gets fresh keys and the selection moves to
/// its first text.
fn insert_block(state: &mut EditorState, node: &Node) -> Result<(), ApplyError> {
    let point = cursor(&state.selection)?;
    let doc = &mut state.document;

    let text_path = doc
        .path_of(point.key)
        .ok_or(ApplyError::UnknownKey(point.key))?;
    let block_path = closest_block_path(doc, &text_path)
        .ok_or_else(|| ApplyError::InvalidStructure("cursor is outside any block".into()))?;
    let Some(Node::Block(block)) = doc.node_at(&block_path) else {
        return Err(ApplyError::InvalidStructure("cursor is outside any block".into()));
    };

    let position = offset_in_block(block, &text_path[block_path.len()..], point.offset);
    let total = block.children.iter().map(Node::offset_len).sum::<usize>();
    let is_void = block.is_void;
    let is_empty = block.is_text_empty();

    let mut node = node.clone();
    doc.rekey(&mut node);
    let inserted_key = node.key();
    let first = first_text(std::slice::from_ref(&node));

    let Some((&block_ix, parent)) = block_path.split_last() else {
        return Err(ApplyError::InvalidStructure("cursor is outside any block".into()));
    };
    let parent = parent.to_vec();

    let split = if !is_void && !is_empty && position > 0 && position < total {
        Some(split_block(doc, &block_path, text_path[block_path.len()], point.offset)?)
    } else {
        None
    };

    let siblings = doc
        .children_at_mut(&parent)
        .ok_or_else(|| ApplyError::InvalidStructure("block parent is not a container".into()))?;
    if is_void {
        siblings.insert(block_ix + 1, node);
    } else if is_empty {
        siblings[block_ix] = node;
    } else if position == 0 {
        siblings.insert(block_ix, node);
    } else if let Some(right) = split {
        siblings.insert(block_ix + 1, node);
        siblings.insert(block_ix + 2, right);
    } else {
        siblings.insert(block_ix + 1, node);
    }

    let doc = &state.document;
    let selection = match first {
        Some(text_key) => {
            let block = doc
                .path_of(text_key)
                .and_then(|path| closest_block_path(doc, &path))
                .and_then(|path| doc.node_at(&path).map(Node::key))
                .unwrap_or(inserted_key);
            Selection::blocks([block]).with_cursor(Point::new(text_key, 0))
        }
        None => Selection::blocks([inserted_key]),
    };
    state.selection = selection;
    Ok(())
}

/// Cuts the block at `block_path` at the cursor inside its direct child
/// `child_ix`, returning the detached right half.
fn split_block(
    doc: &mut Document,
    block_path: &[usize],
    child_ix: usize,
    offset: usize,
) -> Result<Node, ApplyError> {
    let block_key = doc.alloc_key();
    let text_key = doc.alloc_key();
    let Some(Node::Block(block)) = doc.node_at_mut(block_path) else {
        return Err(ApplyError::InvalidStructure("split target is not a block".into()));
    };

    let mut right = Vec::new();
    let tail_start = match block.children.get_mut(child_ix) {
        Some(Node::Text(text)) => {
            right.push(Node::Text(Text {
                key: text_key,
                leaves: text.split_off(offset),
            }));
            child_ix + 1
        }
        Some(_) => child_ix,
        None => block.children.len(),
    };
    right.extend(block.children.drain(tail_start..));

    Ok(Node::Block(Element {
        key: block_key,
        kind: block.kind.clone(),
        data: block.data.clone(),
        is_void: false,
        children: right,
    }))
}

fn for_each_selected_leaf(
    state: &mut EditorState,
    mut f: impl FnMut(&mut Leaf),
) -> Result<(), ApplyError> {
    fn visit<F: FnMut(&mut Leaf)>(node: &mut Node, f: &mut F) {
        match node {
            Node::Text(t) => t.leaves.iter_mut().for_each(|leaf| f(leaf)),
            Node::Block(el) | Node::Inline(el) => {
                for child in &mut el.children {
                    visit(child, f);
                }
            }
        }
    }

    for path in selected_paths(&state.document, &state.selection)? {
        if let Some(node) = state.document.node_at_mut(&path) {
            visit(node, &mut f);
        }
    }
    Ok(())
}
