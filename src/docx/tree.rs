use super::xml::{find_attr, XmlEvent, XmlPart};

#[derive(Clone, Debug)]
pub struct ElementNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Concatenated text directly inside this element (not inside its children).
    pub text: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl ElementNode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        find_attr(&self.attrs, key)
    }
}

/// Elements of a part stored in document (start-tag) order.
#[derive(Clone, Debug, Default)]
pub struct ElementTree {
    pub nodes: Vec<ElementNode>,
}

impl ElementTree {
    pub fn from_part(part: &XmlPart) -> Self {
        let mut nodes: Vec<ElementNode> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for ev in &part.events {
            match ev {
                XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                    let parent = stack.last().copied();
                    let idx = nodes.len();
                    nodes.push(ElementNode {
                        name: name.clone(),
                        attrs: attrs.clone(),
                        text: String::new(),
                        parent,
                        children: Vec::new(),
                    });
                    if let Some(p) = parent {
                        nodes[p].children.push(idx);
                    }
                    if matches!(ev, XmlEvent::Start { .. }) {
                        stack.push(idx);
                    }
                }
                XmlEvent::End { .. } => {
                    let _ = stack.pop();
                }
                XmlEvent::Text { text } => {
                    if let Some(&top) = stack.last() {
                        nodes[top].text.push_str(text);
                    }
                }
            }
        }

        Self { nodes }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn child_named(&self, idx: usize, name: &str) -> Option<&ElementNode> {
        self.nodes[idx]
            .children
            .iter()
            .map(|&c| &self.nodes[c])
            .find(|n| n.name == name)
    }

    pub fn child_index_named(&self, idx: usize, name: &str) -> Option<usize> {
        self.nodes[idx]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name)
    }
}
