//! OPML outline output.
//!
//! Every heading section becomes an `<outline>` whose `text` is the heading
//! and whose `_note` holds the section body. Sections nest by heading
//! level, whether the tree nests heading sections or lists them flat.
//! Metadata is appended as a final "Metadata" outline.

use quick_xml::escape::escape;

use crate::error::{Error, Result};
use crate::options::Format;
use crate::tree::{NodeId, NodeKind};

use super::context::RenderContext;

pub(crate) struct OpmlRenderer<'a> {
    cx: RenderContext<'a>,
    /// Heading levels of the outlines currently open.
    open: Vec<u8>,
}

impl<'a> OpmlRenderer<'a> {
    pub fn new(cx: RenderContext<'a>) -> Self {
        Self {
            cx,
            open: Vec::new(),
        }
    }

    pub fn render(mut self) -> Result<String> {
        self.cx
            .push("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<opml version=\"1.0\">\n");
        if let Some(title) = self.cx.metavalue("title") {
            self.cx.push("<head><title>");
            self.push_escaped(&title);
            self.cx.push("</title></head>\n");
        }
        self.cx.push("<body>\n");

        self.render_blocks(NodeId::ROOT)?;
        self.close_to(0);

        if let Some(meta) = self.cx.tree.metadata() {
            self.cx.push("<outline text=\"Metadata\">\n");
            let keys: Vec<NodeId> = self.cx.tree.children(meta).collect();
            for key in keys {
                let name = self.cx.text(key);
                let value = self
                    .cx
                    .first_child(key)
                    .map(|v| self.cx.tree.raw_text(v))
                    .unwrap_or_default();
                self.cx.push("<outline text=\"");
                self.push_escaped(&name);
                self.cx.push("\" _note=\"");
                self.push_escaped(value.trim_end_matches(['\n', '\r']));
                self.cx.push("\"/>");
            }
            self.cx.push("</outline>");
        }
        self.cx.push("</body>\n</opml>");
        Ok(self.cx.into_output())
    }

    /// Walk the block children of `parent`, opening an outline per section.
    ///
    /// A heading outside a heading section takes the blocks that follow it,
    /// up to the next heading, as its body.
    fn render_blocks(&mut self, parent: NodeId) -> Result<()> {
        let children: Vec<NodeId> = self.cx.tree.children(parent).collect();
        let mut heading = None;
        let mut body = Vec::new();
        for id in children {
            let kind = self.cx.kind(id);
            match kind {
                NodeKind::HeadingSection => {
                    self.finish(heading.take(), &mut body);
                    self.render_section(id)?;
                }
                kind if kind.is_heading() => {
                    self.finish(heading.take(), &mut body);
                    heading = Some(id);
                }
                NodeKind::List => self.render_blocks(id)?,
                NodeKind::Metadata
                | NodeKind::Footer
                | NodeKind::KeyCounter
                | NodeKind::LinkReference
                | NodeKind::NoteSource
                | NodeKind::GlossarySource
                | NodeKind::CitationSource
                | NodeKind::Abbreviation => {}
                kind if is_block(kind) => body.push(id),
                kind => {
                    return Err(Error::UnexpectedNode {
                        kind,
                        format: Format::Opml,
                    });
                }
            }
        }
        self.finish(heading, &mut body);
        Ok(())
    }

    /// Write the outline for `heading` with `body` as its note; blocks with
    /// no heading become an untitled, closed outline.
    fn finish(&mut self, heading: Option<NodeId>, body: &mut Vec<NodeId>) {
        match heading {
            Some(heading) => self.open_outline(heading, body),
            None if !body.is_empty() => {
                let note = self.note_text(body);
                self.cx.push("<outline text=\"\" _note=\"");
                self.push_escaped(&note);
                self.cx.push("\"/>\n");
            }
            None => {}
        }
        body.clear();
    }

    fn render_section(&mut self, id: NodeId) -> Result<()> {
        let children: Vec<NodeId> = self.cx.tree.children(id).collect();
        let Some((&heading, rest)) = children.split_first() else {
            return Ok(());
        };
        if !self.cx.kind(heading).is_heading() {
            return Err(Error::UnexpectedNode {
                kind: self.cx.kind(heading),
                format: Format::Opml,
            });
        }

        let (subsections, body): (Vec<NodeId>, Vec<NodeId>) = rest
            .iter()
            .copied()
            .partition(|&c| self.cx.kind(c) == NodeKind::HeadingSection);
        self.open_outline(heading, &body);

        for sub in subsections {
            self.render_section(sub)?;
        }
        Ok(())
    }

    fn open_outline(&mut self, heading: NodeId, body: &[NodeId]) {
        let level = self.cx.kind(heading).heading_level().unwrap_or(1);
        self.close_to(level);
        self.open.push(level);

        let title = self.heading_text(heading);
        let note = self.note_text(body);
        self.cx.push("<outline text=\"");
        self.push_escaped(&title);
        self.cx.push("\" _note=\"");
        self.push_escaped(&note);
        self.cx.push("\">\n");
    }

    /// Close open outlines until the innermost is above `level`.
    fn close_to(&mut self, level: u8) {
        while self.open.last().is_some_and(|&top| top >= level) {
            self.open.pop();
            self.cx.push("</outline>\n");
        }
    }

    fn heading_text(&self, heading: NodeId) -> String {
        let tree = &*self.cx.tree;
        let first = tree.first_child(heading);
        let first = match first {
            Some(c) if tree.kind(c) == NodeKind::AutoLabel => tree.next_sibling(c),
            other => other,
        };
        let mut text = tree.raw_text_from(first);
        crate::label::trim_trailing_whitespace(&mut text);
        text
    }

    /// Body text of blocks, separated by blank lines.
    fn note_text(&self, blocks: &[NodeId]) -> String {
        blocks
            .iter()
            .filter(|&&id| is_block(self.cx.kind(id)))
            .map(|&id| self.block_text(id))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn block_text(&self, id: NodeId) -> String {
        let tree = &*self.cx.tree;
        let separator = match tree.kind(id) {
            NodeKind::BulletList
            | NodeKind::OrderedList
            | NodeKind::Blockquote
            | NodeKind::DefList
            | NodeKind::Table
            | NodeKind::TableHead
            | NodeKind::TableBody => "\n",
            NodeKind::TableRow => "\t",
            _ => return tree.raw_text(id),
        };
        tree.children(id)
            .filter(|&c| tree.kind(c) != NodeKind::TableSeparator)
            .map(|c| self.block_text(c))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// XML-escape with newlines kept as character references.
    fn push_escaped(&mut self, text: &str) {
        let escaped = escape(text);
        for c in escaped.chars() {
            match c {
                '\n' | '\r' => self.cx.push("&#10;"),
                c => self.cx.push_char(c),
            }
        }
    }
}

/// Kinds that may stand as a section's body block.
fn is_block(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Para
            | NodeKind::Plain
            | NodeKind::Verbatim
            | NodeKind::VerbatimFence
            | NodeKind::HtmlBlock
            | NodeKind::HRule
            | NodeKind::BulletList
            | NodeKind::OrderedList
            | NodeKind::Blockquote
            | NodeKind::DefList
            | NodeKind::Table
            | NodeKind::ImageBlock
            | NodeKind::Raw
            | NodeKind::Toc
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteEngine;
    use crate::options::Extensions;
    use crate::refs::ReferencePools;
    use crate::tree::{Node, Tree};

    fn section(tree: &mut Tree, parent: NodeId, kind: NodeKind, title: &str, body: &str) -> NodeId {
        let section = tree.add_child(parent, Node::new(NodeKind::HeadingSection));
        let h = tree.add_child(section, Node::new(kind));
        tree.add_child(h, Node::with_text(NodeKind::Str, title));
        if !body.is_empty() {
            let p = tree.add_child(section, Node::new(NodeKind::Para));
            tree.add_child(p, Node::with_text(NodeKind::Str, body));
        }
        section
    }

    fn render(tree: &mut Tree) -> Result<String> {
        let pools = ReferencePools::new();
        let cx = RenderContext::new(
            tree,
            &pools,
            NoteEngine::default(),
            Format::Opml,
            Extensions::DEFAULT,
        );
        OpmlRenderer::new(cx).render()
    }

    #[test]
    fn test_flat_sections_nest_by_level() {
        let mut tree = Tree::new();
        section(&mut tree, NodeId::ROOT, NodeKind::H1, "One", "a & b");
        section(&mut tree, NodeId::ROOT, NodeKind::H2, "Sub", "");
        section(&mut tree, NodeId::ROOT, NodeKind::H1, "Two", "c");

        let out = render(&mut tree).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<opml version=\"1.0\">\n<body>\n\
             <outline text=\"One\" _note=\"a &amp; b\">\n\
             <outline text=\"Sub\" _note=\"\">\n\
             </outline>\n</outline>\n\
             <outline text=\"Two\" _note=\"c\">\n\
             </outline>\n</body>\n</opml>"
        );
    }

    #[test]
    fn test_metadata_outline() {
        let mut tree = Tree::new();
        let meta = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Metadata));
        let key = tree.add_child(meta, Node::with_text(NodeKind::MetaKey, "Title"));
        tree.add_child(key, Node::with_text(NodeKind::MetaValue, "My \"Doc\"\n"));

        let out = render(&mut tree).unwrap();
        assert!(out.contains("<head><title>My &quot;Doc&quot;</title></head>"));
        assert!(out.contains(
            "<outline text=\"Metadata\">\n<outline text=\"Title\" _note=\"My &quot;Doc&quot;\"/></outline>"
        ));
    }

    #[test]
    fn test_bare_headings_take_following_blocks() {
        let mut tree = Tree::new();
        let h = tree.add_child(NodeId::ROOT, Node::new(NodeKind::H1));
        tree.add_child(h, Node::with_text(NodeKind::Str, "Top"));
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        tree.add_child(p, Node::with_text(NodeKind::Str, "one"));
        let p = tree.add_child(NodeId::ROOT, Node::new(NodeKind::Para));
        tree.add_child(p, Node::with_text(NodeKind::Str, "two"));

        let out = render(&mut tree).unwrap();
        assert!(out.contains("<outline text=\"Top\" _note=\"one&#10;&#10;two\">\n</outline>\n"));
    }

    #[test]
    fn test_stray_cell_is_rejected() {
        let mut tree = Tree::new();
        tree.add_child(NodeId::ROOT, Node::new(NodeKind::TableCell));
        assert!(matches!(
            render(&mut tree),
            Err(Error::UnexpectedNode {
                kind: NodeKind::TableCell,
                format: Format::Opml
            })
        ));
    }
}
