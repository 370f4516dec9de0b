//! Layout state snapshots.

use serde::Serialize;

use super::block::{Block, BlockId};
use crate::geom::{Abs, Sides, Size};

/// One finished page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// The zero-based page number.
    pub number: usize,
    /// The page dimensions.
    pub size: Size,
    /// The margins on each side.
    pub margins: Sides<Abs>,
    /// The placed blocks, in document order.
    pub blocks: Vec<Block>,
}

impl Page {
    /// Create an empty page.
    pub fn new(number: usize, size: Size, margins: Sides<Abs>) -> Self {
        Self { number, size, margins, blocks: vec![] }
    }

    /// The left edge of the content rectangle.
    pub fn content_left(&self) -> Abs {
        self.margins.left
    }

    /// The top edge of the content rectangle.
    pub fn content_top(&self) -> Abs {
        self.margins.top
    }

    /// The bottom edge of the content rectangle.
    pub fn content_bottom(&self) -> Abs {
        self.size.height - self.margins.bottom
    }

    /// The width of the content rectangle.
    pub fn content_width(&self) -> Abs {
        self.size.width - self.margins.sum_x()
    }

    /// The height of the content rectangle.
    pub fn content_height(&self) -> Abs {
        self.size.height - self.margins.sum_y()
    }

    /// How much of the content height is covered by blocks, from the content
    /// top down to the lowest block edge.
    pub fn used_height(&self) -> Abs {
        self.blocks
            .iter()
            .map(Block::bottom)
            .max()
            .map_or(Abs::zero(), |bottom| bottom - self.content_top())
    }

    /// The used fraction of the content height.
    pub fn fullness(&self) -> f64 {
        let height = self.content_height();
        if height > Abs::zero() {
            self.used_height() / height
        } else {
            0.0
        }
    }

    /// Whether a block's rectangle lies entirely within the content
    /// rectangle.
    pub fn contains(&self, block: &Block) -> bool {
        block.pos.x + Abs::pt(1e-6) >= self.content_left()
            && block.pos.y + Abs::pt(1e-6) >= self.content_top()
            && (self.content_left() + self.content_width()).fits(block.pos.x + block.size.width)
            && self.content_bottom().fits(block.bottom())
    }
}

/// The generator's position while placing blocks.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct Cursor {
    /// The page being filled.
    pub page: usize,
    /// The vertical position on that page; grows downward.
    pub y: Abs,
}

/// An immutable snapshot of the paginated document.
///
/// The solver never mutates a state in place: each iteration clones the
/// snapshot, applies adjustments, and replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutState {
    /// The pages, in order.
    pub pages: Vec<Page>,
    /// Where generation ended.
    pub cursor: Cursor,
    /// How many solver iterations produced this state.
    pub iteration: usize,
}

impl LayoutState {
    /// Find a block by id.
    pub fn find(&self, id: BlockId) -> Option<(usize, usize)> {
        for (p, page) in self.pages.iter().enumerate() {
            if let Some(b) = page.blocks.iter().position(|block| block.id == id) {
                return Some((p, b));
            }
        }
        None
    }

    /// The block with the given id, if it exists.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        let (p, b) = self.find(id)?;
        Some(&self.pages[p].blocks[b])
    }

    /// Iterate over all blocks with their page indices, in document order.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(p, page)| page.blocks.iter().map(move |block| (p, block)))
    }

    /// The total number of placed blocks.
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|page| page.blocks.len()).sum()
    }
}
