//! Layout adjustments.
//!
//! An adjustment is a pure transformation of the layout: it never edits
//! pages in place. Instead it translates into placement pins and the
//! document suffix is poured again through the regular placement routine.

use crate::geom::Abs;
use crate::layout::{AdjustKind, BlockId, LayoutState, Pins};

/// A hint attached to a paragraph re-break request: where the paragraph's
/// lines split when it crosses onto the next page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RebreakHint {
    /// Keep at most this many lines before the break.
    pub split_after: usize,
}

/// A transformation addressing a violation.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    /// Move the block to the top of the following page.
    MoveToNextPage(BlockId),
    /// Move one more line of a split paragraph onto its continuation page.
    PullLineFromPrevious(BlockId),
    /// Add spacing (possibly negative) before the block.
    AddSpacingBefore(BlockId, Abs),
    /// Start a new page before the block.
    ForceBreakBefore(BlockId),
    /// Re-break the block's paragraph.
    RebreakParagraph(BlockId, RebreakHint),
}

impl Adjustment {
    /// The adjustment's kind, for anti-thrash records.
    pub fn kind(&self) -> AdjustKind {
        match self {
            Self::MoveToNextPage(_) => AdjustKind::MoveToNextPage,
            Self::PullLineFromPrevious(_) => AdjustKind::PullLineFromPrevious,
            Self::AddSpacingBefore(..) => AdjustKind::AddSpacingBefore,
            Self::ForceBreakBefore(_) => AdjustKind::ForceBreakBefore,
            Self::RebreakParagraph(..) => AdjustKind::RebreakParagraph,
        }
    }

    /// The block the adjustment targets.
    pub fn target(&self) -> BlockId {
        match *self {
            Self::MoveToNextPage(id)
            | Self::PullLineFromPrevious(id)
            | Self::AddSpacingBefore(id, _)
            | Self::ForceBreakBefore(id)
            | Self::RebreakParagraph(id, _) => id,
        }
    }

    /// Translate the adjustment into placement pins.
    ///
    /// Returns `false` when the adjustment cannot apply to the current state
    /// (e.g. pulling a line into a part that does not exist).
    pub fn apply(&self, pins: &mut Pins, state: &LayoutState) -> bool {
        match *self {
            Self::MoveToNextPage(id) | Self::ForceBreakBefore(id) => {
                pins.break_before.insert(id.node)
            }

            Self::PullLineFromPrevious(id) => {
                if id.part == 0 {
                    return false;
                }
                let previous = BlockId { node: id.node, part: id.part - 1 };
                let Some(block) = state.block(previous) else { return false };
                let Some(par) = block.body.par() else { return false };

                if par.len() <= 1 {
                    // Nothing left to pull from; move the whole paragraph
                    // instead.
                    pins.line_caps.remove(&id.node);
                    pins.break_before.insert(id.node)
                } else {
                    pins.line_caps.insert(id.node, par.len() - 1);
                    true
                }
            }

            Self::AddSpacingBefore(id, delta) => {
                let entry = pins.spacing_delta.entry(id.node).or_insert(Abs::zero());
                *entry += delta;
                true
            }

            Self::RebreakParagraph(id, hint) => {
                pins.line_caps.insert(id.node, hint.split_after.max(1));
                true
            }
        }
    }
}
