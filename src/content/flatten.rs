use super::ContentNode;

const BREADCRUMB_SEPARATOR: &str = " - ";

/// A Part, Division or Section node together with its breadcrumb title.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedSection<'a> {
    pub node: &'a ContentNode,
    pub full_title: String,
}

impl FlattenedSection<'_> {
    pub fn text(&self) -> &str {
        &self.node.text
    }
}

/// Pre-order walk of `root`'s descendants in document order.
///
/// The root itself is never emitted. Document and Unknown nodes are transparent:
/// their children are visited but they add nothing to the breadcrumb.
pub fn flatten(root: &ContentNode) -> Vec<FlattenedSection<'_>> {
    let mut sections = Vec::new();
    let mut crumbs: Vec<String> = Vec::new();
    visit(&root.children, &mut crumbs, &mut sections);
    sections
}

fn visit<'a>(
    nodes: &'a [ContentNode],
    crumbs: &mut Vec<String>,
    out: &mut Vec<FlattenedSection<'a>>,
) {
    for node in nodes {
        if node.kind.is_section() {
            crumbs.push(node.label());
            out.push(FlattenedSection {
                node,
                full_title: crumbs.join(BREADCRUMB_SEPARATOR),
            });
            visit(&node.children, crumbs, out);
            crumbs.pop();
        } else {
            visit(&node.children, crumbs, out);
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::NodeKind;

    fn act() -> ContentNode {
        ContentNode::new(NodeKind::Document, "Example Act").with_children(vec![
            ContentNode::new(NodeKind::Part, "General")
                .with_number("1")
                .with_children(vec![
                    ContentNode::new(NodeKind::Section, "Scope")
                        .with_number("1.1")
                        .with_text("This Act applies to everyone."),
                    ContentNode::new(NodeKind::Unknown, "Notes").with_children(vec![
                        ContentNode::new(NodeKind::Section, "Commencement")
                            .with_number("1.2")
                            .with_text("Commences on assent."),
                    ]),
                ]),
            ContentNode::new(NodeKind::Part, "Offences")
                .with_number("2")
                .with_children(vec![ContentNode::new(NodeKind::Division, "Penalties")
                    .with_number("1")
                    .with_children(vec![ContentNode::new(NodeKind::Section, "Fines")
                        .with_number("10")
                        .with_text("A fine applies.")])]),
        ])
    }

    fn titles(root: &ContentNode) -> Vec<String> {
        flatten(root).into_iter().map(|s| s.full_title).collect()
    }

    #[test]
    fn breadcrumb_for_nested_section() {
        let root = ContentNode::new(NodeKind::Document, "Doc").with_children(vec![
            ContentNode::new(NodeKind::Part, "General")
                .with_number("1")
                .with_children(vec![ContentNode::new(NodeKind::Section, "Scope")
                    .with_number("1.1")
                    .with_text("Scope text.")]),
        ]);
        let sections = flatten(&root);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].full_title, "Part 1 General");
        assert_eq!(sections[1].full_title, "Part 1 General - Section 1.1 Scope");
        assert_eq!(sections[1].text(), "Scope text.");
    }

    #[test]
    fn document_order_and_transparent_containers() {
        assert_eq!(
            titles(&act()),
            vec![
                "Part 1 General",
                "Part 1 General - Section 1.1 Scope",
                "Part 1 General - Section 1.2 Commencement",
                "Part 2 Offences",
                "Part 2 Offences - Division 1 Penalties",
                "Part 2 Offences - Division 1 Penalties - Section 10 Fines",
            ]
        );
    }

    #[test]
    fn flatten_is_deterministic() {
        let root = act();
        assert_eq!(flatten(&root), flatten(&root));
    }

    #[test]
    fn root_is_never_emitted() {
        let root = ContentNode::new(NodeKind::Section, "Root").with_text("ignored");
        assert!(flatten(&root).is_empty());
    }

    #[test]
    fn unnumbered_section_keeps_empty_number_slot() {
        let root = ContentNode::new(NodeKind::Document, "Doc").with_children(vec![
            ContentNode::new(NodeKind::Part, "General")
                .with_number("1")
                .with_children(vec![ContentNode::new(NodeKind::Section, "Scope").with_text("Text.")]),
        ]);
        assert_eq!(titles(&root), vec!["Part 1 General", "Part 1 General - Section  Scope"]);
    }

    #[test]
    fn siblings_do_not_inherit_each_other() {
        let root = ContentNode::new(NodeKind::Unknown, "Doc").with_children(vec![
            ContentNode::new(NodeKind::Section, "A").with_number("1"),
            ContentNode::new(NodeKind::Section, "B").with_number("2"),
        ]);
        assert_eq!(titles(&root), vec!["Section 1 A", "Section 2 B"]);
    }
}
