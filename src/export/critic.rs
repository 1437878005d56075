//! CriticMarkup resolution.
//!
//! These formats run on the source text split into plain runs and CriticMarkup
//! spans, and write the source back out with the edits applied (accept or
//! reject) or marked up as HTML. Plain text passes through unescaped.

use crate::error::Result;
use crate::tree::{NodeId, NodeKind};

use super::context::RenderContext;

/// What to do with each edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CriticMode {
    Accept,
    Reject,
    Highlight,
}

/// Separator between the old and new sides of `{~~old~>new~~}`.
const SUBSTITUTION_ARROW: &str = "~>";

/// Old and new text of a substitution written as `old~>new`.
pub(crate) fn split_substitution(text: &str) -> (&str, &str) {
    text.split_once(SUBSTITUTION_ARROW).unwrap_or((text, ""))
}

pub(crate) struct CriticRenderer<'a> {
    cx: RenderContext<'a>,
    mode: CriticMode,
}

impl<'a> CriticRenderer<'a> {
    pub fn new(cx: RenderContext<'a>, mode: CriticMode) -> Self {
        Self { cx, mode }
    }

    pub fn render(mut self) -> Result<String> {
        self.render_children(NodeId::ROOT);
        Ok(self.cx.into_output())
    }

    fn render_children(&mut self, parent: NodeId) {
        let children: Vec<NodeId> = self.cx.tree.children(parent).collect();
        for id in children {
            self.render_node(id);
        }
    }

    fn render_node(&mut self, id: NodeId) {
        match self.cx.kind(id) {
            NodeKind::CriticAddition => {
                let text = self.cx.text(id);
                self.addition(&text);
            }
            NodeKind::CriticDeletion => {
                let text = self.cx.text(id);
                self.deletion(&text);
            }
            NodeKind::CriticSubstitution => {
                if self.cx.first_child(id).is_some() {
                    self.render_children(id);
                } else {
                    let text = self.cx.text(id);
                    let (old, new) = split_substitution(&text);
                    self.deletion(old);
                    self.addition(new);
                }
            }
            NodeKind::CriticComment => {
                if self.mode == CriticMode::Highlight {
                    let text = self.cx.text(id);
                    self.cx.push("<span class=\"critic comment\">");
                    self.cx.push(&text);
                    self.cx.push("</span>");
                }
            }
            NodeKind::CriticHighlight => {
                let text = self.cx.text(id);
                self.tagged(&text, "mark", self.mode == CriticMode::Highlight);
            }
            _ => match self.cx.tree[id].text.clone() {
                Some(text) => self.cx.push(&text),
                None => self.render_children(id),
            },
        }
    }

    fn addition(&mut self, text: &str) {
        match self.mode {
            CriticMode::Accept => self.cx.push(text),
            CriticMode::Reject => {}
            CriticMode::Highlight => self.tagged(text, "ins", true),
        }
    }

    fn deletion(&mut self, text: &str) {
        match self.mode {
            CriticMode::Accept => {}
            CriticMode::Reject => self.cx.push(text),
            CriticMode::Highlight => self.tagged(text, "del", true),
        }
    }

    fn tagged(&mut self, text: &str, tag: &str, markup: bool) {
        if markup {
            self.cx.push(&format!("<{tag}>{text}</{tag}>"));
        } else {
            self.cx.push(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteEngine;
    use crate::options::{Extensions, Format};
    use crate::refs::ReferencePools;
    use crate::tree::{Node, Tree};

    fn sample() -> Tree {
        let mut tree = Tree::new();
        let root = NodeId::ROOT;
        tree.add_child(root, Node::with_text(NodeKind::Str, "This is "));
        tree.add_child(root, Node::with_text(NodeKind::CriticAddition, "new "));
        tree.add_child(root, Node::with_text(NodeKind::CriticDeletion, "old "));
        tree.add_child(root, Node::with_text(NodeKind::CriticSubstitution, "red~>blue"));
        tree.add_child(root, Node::with_text(NodeKind::CriticComment, "why?"));
        tree.add_child(root, Node::with_text(NodeKind::Str, " text."));
        tree
    }

    fn render(mode: CriticMode) -> String {
        let mut tree = sample();
        let pools = ReferencePools::new();
        let cx = RenderContext::new(
            &mut tree,
            &pools,
            NoteEngine::default(),
            Format::CriticAccept,
            Extensions::DEFAULT,
        );
        CriticRenderer::new(cx, mode).render().unwrap()
    }

    #[test]
    fn test_accept() {
        assert_eq!(render(CriticMode::Accept), "This is new blue text.");
    }

    #[test]
    fn test_reject() {
        assert_eq!(render(CriticMode::Reject), "This is old red text.");
    }

    #[test]
    fn test_highlight() {
        assert_eq!(
            render(CriticMode::Highlight),
            "This is <ins>new </ins><del>old </del><del>red</del><ins>blue</ins>\
             <span class=\"critic comment\">why?</span> text."
        );
    }

    #[test]
    fn test_split_substitution() {
        assert_eq!(split_substitution("a~>b"), ("a", "b"));
        assert_eq!(split_substitution("a"), ("a", ""));
    }
}
