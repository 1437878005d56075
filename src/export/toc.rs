//! Table of contents as a MultiMarkdown list.
//!
//! Each heading becomes `* [text][label]`, indented with one tab per level
//! of nesting below the outermost heading that encloses it.

use tracing::warn;

use crate::error::Result;
use crate::label::label_from_string;
use crate::tree::{NodeId, NodeKind};

use super::context::RenderContext;

pub(crate) struct TocRenderer<'a> {
    cx: RenderContext<'a>,
    /// Levels of the headings enclosing the current one.
    open: Vec<u8>,
}

impl<'a> TocRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self {
            cx,
            open: Vec::new(),
        }
    }

    pub fn render(mut self) -> Result<String> {
        self.walk(NodeId::ROOT);
        Ok(self.cx.into_output())
    }

    fn walk(&mut self, parent: NodeId) {
        let children: Vec<NodeId> = self.cx.tree.children(parent).collect();
        for id in children {
            let kind = self.cx.kind(id);
            if let Some(level) = kind.heading_level() {
                self.heading(id, level);
            } else if matches!(kind, NodeKind::HeadingSection | NodeKind::List) {
                self.walk(id);
            }
        }
    }

    fn heading(&mut self, id: NodeId, level: u8) {
        while self.open.last().is_some_and(|&top| top >= level) {
            self.open.pop();
        }
        self.cx.toc_level = self.open.len();
        self.open.push(level);

        for _ in 0..self.cx.toc_level {
            self.cx.push_char('\t');
        }
        self.cx.push("* [");

        let first = self.cx.first_child(id);
        let explicit = first.filter(|&c| self.cx.kind(c) == NodeKind::AutoLabel);
        let label = match explicit {
            Some(label) => label_from_string(self.cx.tree[label].text()),
            None => self.cx.tree.label_of_children(id),
        };
        let mut cur = first;
        while let Some(child) = cur {
            self.inline(child);
            cur = self.cx.tree.next_sibling(child);
        }
        self.cx.push(&format!("][{label}]\n"));
    }

    fn inline(&mut self, id: NodeId) {
        match self.cx.kind(id) {
            NodeKind::Str | NodeKind::Abbr | NodeKind::AbbrStart | NodeKind::AbbrStop => {
                let text = self.cx.text(id);
                self.push_escaped(&text);
            }
            NodeKind::Space => {
                let text = self.cx.text(id);
                self.cx.push(&text);
            }
            NodeKind::Emph => self.wrap(id, "*"),
            NodeKind::Strong => self.wrap(id, "**"),
            NodeKind::Link | NodeKind::List => self.children(id),
            NodeKind::Variable => {
                let key = self.cx.text(id);
                self.cx.push(&format!("[%{key}]"));
            }
            NodeKind::Html | NodeKind::LinkReference | NodeKind::AutoLabel => {}
            kind => {
                warn!(?kind, "node not shown in table of contents");
            }
        }
    }

    fn children(&mut self, id: NodeId) {
        let mut cur = self.cx.first_child(id);
        while let Some(child) = cur {
            self.inline(child);
            cur = self.cx.tree.next_sibling(child);
        }
    }

    fn wrap(&mut self, id: NodeId, marker: &str) {
        self.cx.push(marker);
        self.children(id);
        self.cx.push(marker);
    }

    /// Brackets would end the link text early.
    fn push_escaped(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '[' => self.cx.push("\\["),
                ']' => self.cx.push("\\]"),
                c => self.cx.push_char(c),
            }
        }
    }
}
