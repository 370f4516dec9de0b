//! The inbound math-engine interface.
//!
//! Math is typeset by an external engine; the layout engine only ever sees
//! the resulting box: opaque dimensions, a baseline, and a handle it passes
//! back unchanged when the box is drawn.

use crate::diag::StrResult;
use crate::geom::Abs;

/// Whether a formula is set within a line or on its own.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MathMode {
    /// Set within a line of text.
    Inline,
    /// Set as its own block, centered.
    Display,
}

/// A pre-measured math box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MathBox {
    /// The box width.
    pub width: Abs,
    /// The box height.
    pub height: Abs,
    /// The distance from the baseline to the top of the box.
    pub ascent: Abs,
    /// The distance from the baseline to the bottom of the box.
    pub descent: Abs,
    /// The engine's handle for this formula, passed back on draw.
    pub handle: u64,
}

/// Measures TeX formulas into boxes.
pub trait MathEngine {
    /// Measure a formula in the given mode.
    fn measure(&self, tex: &str, mode: MathMode) -> StrResult<MathBox>;
}

/// A math engine that rejects every formula.
///
/// Useful for documents that contain no math.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoMath;

impl MathEngine for NoMath {
    fn measure(&self, _: &str, _: MathMode) -> StrResult<MathBox> {
        Err("no math engine configured".into())
    }
}
