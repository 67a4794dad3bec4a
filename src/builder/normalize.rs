use crate::element::{Element, Node};

/// Flatten lists and drop every child that is not an element, recursively.
pub fn normalize(node: Node) -> Vec<Element> {
    match node {
        Node::Element(mut element) => {
            let children: Vec<Node> = element
                .props
                .take_children()
                .into_iter()
                .flat_map(normalize)
                .map(Node::Element)
                .collect();
            element.props.set_children(children);
            vec![element]
        }
        Node::List(items) => items.into_iter().flat_map(normalize).collect(),
        Node::Text(_) | Node::Number(_) | Node::Empty => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{fragment, panel, text};

    #[test]
    fn nested_lists_flatten_and_primitives_drop() {
        let tree = panel().children(vec![
            Node::from(text("a")),
            Node::List(vec![Node::from(text("b")), Node::Empty, Node::from("stray")]),
            Node::Number(4.0),
            Node::from(Some(fragment(vec![text("c")]))),
        ]);
        let out = normalize(Node::from(tree));
        assert_eq!(out.len(), 1);
        let children = out[0].props().children();
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|c| matches!(c, Node::Element(_))));
    }
}
