//! The inbound document tree.
//!
//! This is the contract with the Markdown parser: an ordered sequence of
//! block nodes whose inline content is already resolved into typed nodes.
//! The engine never sees Markdown source.

use ecow::EcoString;

/// A parsed document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Document {
    /// The top-level blocks in document order.
    pub blocks: Vec<BlockNode>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block to the end of the document.
    pub fn push(&mut self, block: BlockNode) {
        self.blocks.push(block);
    }
}

/// A block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockNode {
    /// A section heading.
    Heading {
        /// The heading level, 1 to 6.
        level: u8,
        /// The heading text.
        children: Vec<InlineNode>,
    },
    /// A paragraph of inline content.
    Paragraph {
        /// The paragraph's content.
        children: Vec<InlineNode>,
    },
    /// An ordered or unordered list.
    List {
        /// Whether the items are numbered.
        ordered: bool,
        /// The first item's number for ordered lists.
        start: u64,
        /// The list items.
        items: Vec<ListItem>,
    },
    /// A table.
    Table {
        /// The rows, outer = row, inner = cell content.
        rows: Vec<Vec<Vec<InlineNode>>>,
        /// Per-column content alignment.
        alignments: Vec<ColAlign>,
    },
    /// A fenced or indented code block.
    CodeBlock {
        /// The info-string language, if any.
        language: Option<EcoString>,
        /// The verbatim text, lines separated by `\n`.
        text: EcoString,
    },
    /// A display math block.
    MathBlock {
        /// The TeX source handed to the math engine.
        tex: EcoString,
    },
    /// A thematic break.
    Rule,
    /// A block-level image with an optional caption.
    Figure {
        /// The image reference resolved by the image provider.
        image: EcoString,
        /// The caption content, if any.
        caption: Vec<InlineNode>,
    },
}

/// One item of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    /// The blocks making up the item's body.
    pub blocks: Vec<BlockNode>,
}

/// Horizontal alignment of a table column.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum ColAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Flush right.
    Right,
}

/// An inline-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineNode {
    /// Plain text.
    Text(EcoString),
    /// Emphasized content.
    Emphasis(Vec<InlineNode>),
    /// Strongly emphasized content.
    Strong(Vec<InlineNode>),
    /// Struck-through content.
    Strikethrough(Vec<InlineNode>),
    /// Inline code.
    Code(Vec<InlineNode>),
    /// A hyperlink.
    Link {
        /// The link target.
        url: EcoString,
        /// The link text.
        children: Vec<InlineNode>,
    },
    /// An inline image.
    Image {
        /// The image reference resolved by the image provider.
        src: EcoString,
        /// Alternative text.
        alt: EcoString,
    },
    /// Inline math.
    MathInline {
        /// The TeX source handed to the math engine.
        tex: EcoString,
    },
    /// A forced line break.
    HardBreak,
    /// A break opportunity from a source line ending.
    SoftBreak,
}

impl InlineNode {
    /// Create a plain text node.
    pub fn text(text: impl Into<EcoString>) -> Self {
        Self::Text(text.into())
    }
}
