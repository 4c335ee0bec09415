//! Turns (sub)trees back into template text.
//!
//! For any tree produced by the scanner from balanced input, serializing the
//! root yields the original source byte for byte.
//!
//! Two forms exist. The template form ([`Tree::serialize`]) can be scanned
//! again: text flattened from a raw block is wrapped back in raw tags. The
//! output form ([`Tree::to_output`]) writes that text as-is and is what a
//! finished render produces.

use crate::tree::{NodeId, NodeKind, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Template,
    Output,
}

impl Tree {
    /// Serialize a node and its subtree.
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, Form::Template, &mut out);
        out
    }

    /// Serialize only the children of a node, without its own tags.
    pub fn serialize_children(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_children(id, Form::Template, &mut out);
        out
    }

    /// Serialize the whole tree.
    pub fn to_source(&self) -> String {
        self.serialize(self.root())
    }

    /// Serialize the whole tree as final output.
    pub fn to_output(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root(), Form::Output, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, form: Form, out: &mut String) {
        let node = self.node(id);
        let delimiters = self.delimiters();
        match node.kind {
            NodeKind::Text if node.verbatim && form == Form::Template => {
                out.push_str(&delimiters.wrap("raw"));
                out.push_str(&node.content);
                out.push_str(&delimiters.wrap("endraw"));
            }
            NodeKind::Text => out.push_str(&node.content),
            NodeKind::Root | NodeKind::Group => self.write_children(id, form, out),
            NodeKind::If | NodeKind::For | NodeKind::Raw => {
                out.push_str(&delimiters.wrap(&node.content));
                self.write_children(id, form, out);
                match (&node.end_tag, node.kind.tag_name()) {
                    (Some(end_tag), _) => out.push_str(&delimiters.wrap(end_tag)),
                    (None, Some(name)) => out.push_str(&delimiters.wrap(&format!("end{name}"))),
                    (None, None) => {}
                }
            }
        }
    }

    fn write_children(&self, id: NodeId, form: Form, out: &mut String) {
        for &child in self.children(id) {
            self.write_node(child, form, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::{NodeKind, Tree};
    use crate::Delimiters;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_hand_built_tree() {
        let mut tree = Tree::default();
        let root = tree.root();
        tree.append(root, NodeKind::Text, "NodeStart!");
        let group = tree.append(root, NodeKind::Group, "");
        let fruit = tree.append(group, NodeKind::If, "if page.fruit");
        tree.append(fruit, NodeKind::Text, "Apple.");
        let raw = tree.append(fruit, NodeKind::Raw, "raw");
        let sweet = tree.append(raw, NodeKind::If, "if page.sweet");
        tree.append(sweet, NodeKind::Text, "Sweet ones.");

        assert_eq!(
            tree.to_source(),
            "NodeStart!{%if page.fruit%}Apple.{%raw%}{%if page.sweet%}Sweet ones.{%endif%}{%endraw%}{%endif%}"
        );
        assert_eq!(
            tree.serialize_children(raw),
            "{%if page.sweet%}Sweet ones.{%endif%}"
        );
    }

    #[test]
    fn test_serialize_keeps_end_tag_spelling() {
        let mut tree = Tree::default();
        let root = tree.root();
        let block = tree.append(root, NodeKind::For, " for post in site.posts ");
        tree.append(block, NodeKind::Text, "x");
        tree.set_end_tag(block, " endfor ");
        assert_eq!(tree.to_source(), "{% for post in site.posts %}x{% endfor %}");
    }

    #[test]
    fn test_serialize_custom_delimiters() {
        let mut tree = Tree::new(Delimiters::new('<', '>', '#'));
        let root = tree.root();
        let block = tree.append(root, NodeKind::Raw, "raw");
        tree.append(block, NodeKind::Text, "x");
        assert_eq!(tree.to_source(), "<#raw#>x<#endraw#>");
    }

    #[test]
    fn test_verbatim_text_forms() {
        let mut tree = Tree::default();
        let root = tree.root();
        tree.append(root, NodeKind::Text, "a");
        let raw = tree.append(root, NodeKind::Raw, " raw ");
        tree.make_verbatim(raw, "{{ post.title }}");

        assert_eq!(tree.to_source(), "a{%raw%}{{ post.title }}{%endraw%}");
        assert_eq!(tree.to_output(), "a{{ post.title }}");
    }
}
