//! Finished block layouts.
//!
//! The layout graph is a tree: pages own blocks, blocks own lines, lines own
//! runs. Blocks refer back to their source node through ids, never through
//! owning references.

use std::fmt::{self, Debug, Formatter};

use ecow::EcoString;
use serde::{Deserialize, Serialize};

use crate::font::FontId;
use crate::geom::{Abs, Color, Point, Size};
use crate::math::MathBox;

/// Identifies a source block node in document order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Identifies a placed block.
///
/// A paragraph that continues onto the next page is represented as several
/// blocks sharing a node id with consecutive part indices.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BlockId {
    /// The source node.
    pub node: NodeId,
    /// The split part, starting at 0.
    pub part: u32,
}

impl BlockId {
    /// The first part of a node's layout.
    pub const fn first(node: NodeId) -> Self {
        Self { node, part: 0 }
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "b{}.{}", self.node.0, self.part)
    }
}

/// Decorations of a text run.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Decor {
    /// Whether the run is underlined.
    pub underline: bool,
    /// Whether the run is struck through.
    pub strikethrough: bool,
    /// The link target, if the run is part of a link.
    pub link: Option<EcoString>,
}

impl Decor {
    /// Pack the measurement-relevant decoration state into cache-key flags.
    pub fn flags(&self) -> u8 {
        u8::from(self.underline) | u8::from(self.strikethrough) << 1
    }
}

/// A maximal stretch of text sharing font, size, color and decoration,
/// positioned relative to its line's left edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    /// The text.
    pub text: EcoString,
    /// The font the text is set in.
    pub font: FontId,
    /// The font size.
    pub size: Abs,
    /// The glyph color.
    pub color: Color,
    /// Underline/strikethrough/link state.
    pub decor: Decor,
    /// The horizontal offset from the line's left edge.
    pub x: Abs,
    /// The set width of the run, including stretched or shrunk spaces.
    pub width: Abs,
}

/// An inline non-text fragment positioned within a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InlineObject {
    /// An inline image.
    Image {
        /// The provider's handle.
        handle: u64,
        /// The offset from the line's left edge.
        x: Abs,
        /// The displayed size.
        size: Size,
    },
    /// An inline math box.
    Math {
        /// The offset from the line's left edge.
        x: Abs,
        /// The measured box.
        math: MathBoxData,
    },
}

/// The serializable mirror of a [`MathBox`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct MathBoxData {
    /// The box width.
    pub width: Abs,
    /// The box height.
    pub height: Abs,
    /// The distance from the baseline to the top of the box.
    pub ascent: Abs,
    /// The distance from the baseline to the bottom of the box.
    pub descent: Abs,
    /// The math engine's handle.
    pub handle: u64,
}

impl From<MathBox> for MathBoxData {
    fn from(math: MathBox) -> Self {
        Self {
            width: math.width,
            height: math.height,
            ascent: math.ascent,
            descent: math.descent,
            handle: math.handle,
        }
    }
}

/// A positioned line of runs.
///
/// The invariant `height == ascent + descent` holds for every line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    /// The offset of the line's left edge from the block's left edge.
    pub x: Abs,
    /// The baseline position relative to the block's top edge.
    pub baseline: Abs,
    /// The set width of the line.
    pub width: Abs,
    /// The height of the text box, `ascent + descent`.
    pub height: Abs,
    /// The distance from the baseline to the top of the text box.
    pub ascent: Abs,
    /// The distance from the baseline to the bottom of the text box.
    pub descent: Abs,
    /// The adjustment ratio the line's glue was set with.
    pub ratio: f64,
    /// The runs, ordered left to right.
    pub runs: Vec<Run>,
    /// Inline images and math, ordered left to right.
    pub objects: Vec<InlineObject>,
}

/// An ordered sequence of lines with uniform leading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParLayout {
    /// The lines, top to bottom.
    pub lines: Vec<Line>,
    /// The block width the lines were laid out into.
    pub width: Abs,
    /// The total height: number of lines times the leading.
    pub height: Abs,
    /// The baseline-to-baseline distance.
    pub leading: Abs,
}

impl ParLayout {
    /// The paragraph's line count.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the paragraph has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A finished table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableLayout {
    /// The resolved column widths.
    pub columns: Vec<Abs>,
    /// The rows, top to bottom.
    pub rows: Vec<RowLayout>,
    /// Cell border segments relative to the table's top-left corner.
    pub borders: Vec<BorderSeg>,
    /// The padding between cell borders and cell content.
    pub padding: Abs,
}

/// One row of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowLayout {
    /// The offset from the table's top edge.
    pub y: Abs,
    /// The row height: the tallest cell plus padding.
    pub height: Abs,
    /// The cells, left to right.
    pub cells: Vec<CellLayout>,
}

/// One cell of a table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellLayout {
    /// The offset from the table's left edge.
    pub x: Abs,
    /// The column width.
    pub width: Abs,
    /// The cell content laid out at the column width minus padding.
    pub par: ParLayout,
}

/// A straight border segment, drawn as a thin rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderSeg {
    /// The segment's top-left corner relative to the table.
    pub pos: Point,
    /// The segment's extent; one component is the border thickness.
    pub size: Size,
}

/// A monospaced code block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeLayout {
    /// One layout line per source line, never re-broken.
    pub par: ParLayout,
    /// Padding between the background edge and the text.
    pub inset: Abs,
    /// The background fill.
    pub background: Color,
}

/// A horizontal rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleLayout {
    /// The line thickness.
    pub thickness: Abs,
    /// The line color.
    pub color: Color,
}

/// A placed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageLayout {
    /// The provider's handle.
    pub handle: u64,
    /// The displayed size, possibly scaled down to fit the content width.
    pub size: Size,
}

/// The content of a placed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BlockBody {
    /// A paragraph.
    Par(ParLayout),
    /// A heading.
    Heading {
        /// The heading level, 1 to 6.
        level: u8,
        /// The heading's lines.
        par: ParLayout,
    },
    /// One item of a list, indented; the marker shares the first baseline.
    ListItem {
        /// The marker run, present on the item's first block only.
        marker: Option<Run>,
        /// The item content.
        par: ParLayout,
    },
    /// A table.
    Table(TableLayout),
    /// A code block.
    Code(CodeLayout),
    /// A display math block, centered in the content area.
    Math {
        /// The measured box.
        math: MathBoxData,
        /// The centering offset from the block's left edge.
        x: Abs,
    },
    /// A thematic break.
    Rule(RuleLayout),
    /// A figure: an image with an optional caption below it.
    Figure {
        /// The image.
        image: ImageLayout,
        /// The caption, if any.
        caption: Option<ParLayout>,
    },
}

impl BlockBody {
    /// The paragraph content, if this block kind carries lines.
    pub fn par(&self) -> Option<&ParLayout> {
        match self {
            Self::Par(par)
            | Self::Heading { par, .. }
            | Self::ListItem { par, .. }
            | Self::Code(CodeLayout { par, .. }) => Some(par),
            _ => None,
        }
    }

    /// A short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Par(_) => "paragraph",
            Self::Heading { .. } => "heading",
            Self::ListItem { .. } => "list item",
            Self::Table(_) => "table",
            Self::Code(_) => "code block",
            Self::Math { .. } => "math block",
            Self::Rule(_) => "rule",
            Self::Figure { .. } => "figure",
        }
    }
}

/// The kinds of adjustment the solver can apply to a block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AdjustKind {
    /// Move the block to the top of the following page.
    MoveToNextPage,
    /// Move one more line of a split paragraph onto the following page.
    PullLineFromPrevious,
    /// Increase the spacing before the block.
    AddSpacingBefore,
    /// Start a new page before the block.
    ForceBreakBefore,
    /// Re-run the line breaker for the block's paragraph.
    RebreakParagraph,
}

/// The record of an adjustment applied to a block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Applied {
    /// Which adjustment ran.
    pub kind: AdjustKind,
    /// The solver iteration that applied it.
    pub iteration: usize,
}

/// A positioned block on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// The block's identity.
    pub id: BlockId,
    /// The top-left corner in page coordinates (top-origin).
    pub pos: Point,
    /// The block's extent.
    pub size: Size,
    /// The content.
    pub body: BlockBody,
    /// Avoid a page break directly after this block.
    pub keep_with_next: bool,
    /// Never split this block across pages.
    pub keep_together: bool,
    /// Whether the block may be split across pages at all.
    pub breakable: bool,
    /// The configured spacing above the block (collapses with the
    /// predecessor's `spacing_after`).
    pub spacing_before: Abs,
    /// The configured spacing below the block.
    pub spacing_after: Abs,
    /// Which adjustments have been applied to this block, in order.
    pub applied: Vec<Applied>,
}

impl Block {
    /// The block's bottom edge.
    pub fn bottom(&self) -> Abs {
        self.pos.y + self.size.height
    }

    /// Whether an adjustment of this kind was already applied.
    pub fn was_applied(&self, kind: AdjustKind) -> Option<Applied> {
        self.applied.iter().copied().find(|a| a.kind == kind)
    }
}
