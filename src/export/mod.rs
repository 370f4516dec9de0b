//! The coordinate/output adapter.
//!
//! [`render`] walks a finished layout state in order and translates it into
//! typed drawing calls. The adapter never measures, never wraps and never
//! decides a break; its only arithmetic is the flip into a bottom-origin
//! coordinate system when the target wants one.

use ecow::EcoString;
use serde::Serialize;

use crate::font::FontId;
use crate::geom::{Abs, Color, Point, Size};
use crate::layout::{Block, BlockBody, Decor, LayoutState, Line, MathBoxData, ParLayout, Run};

/// Where a target's y axis starts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VerticalOrigin {
    /// y grows downward from the top edge (HTML, raster).
    Top,
    /// y grows upward from the bottom edge (PDF).
    Bottom,
}

/// The typed drawing surface a backend implements.
///
/// Coordinates arrive already converted to the device's origin. Text
/// positions are baselines; rectangle positions are the corner nearest the
/// device origin's top (for [`VerticalOrigin::Top`]) or the top-left corner
/// expressed in flipped coordinates (for [`VerticalOrigin::Bottom`]).
pub trait Device {
    /// The device's vertical origin.
    fn origin(&self) -> VerticalOrigin;

    /// Start a new page of the given size.
    fn begin_page(&mut self, size: Size);

    /// Draw a run of text at a baseline.
    #[allow(clippy::too_many_arguments)]
    fn draw_text_run(
        &mut self,
        x: Abs,
        baseline: Abs,
        font: FontId,
        size: Abs,
        color: Color,
        text: &str,
        decor: &Decor,
    );

    /// Draw a filled rectangle.
    fn draw_rule(&mut self, x: Abs, y: Abs, width: Abs, height: Abs, color: Color);

    /// Draw an image.
    fn draw_image(&mut self, x: Abs, y: Abs, width: Abs, height: Abs, handle: u64);

    /// Draw a pre-measured math box at a baseline.
    fn draw_math(&mut self, x: Abs, baseline: Abs, math: &MathBoxData);

    /// Finish the current page.
    fn end_page(&mut self);
}

/// Render a layout state onto a device.
pub fn render(state: &LayoutState, device: &mut dyn Device) {
    for page in &state.pages {
        let flip = Flip::new(device.origin(), page.size.height);
        device.begin_page(page.size);
        for block in &page.blocks {
            render_block(block, flip, device);
        }
        device.end_page();
    }
}

/// Converts engine coordinates (top-origin) to device coordinates.
#[derive(Copy, Clone)]
struct Flip {
    origin: VerticalOrigin,
    page_height: Abs,
}

impl Flip {
    fn new(origin: VerticalOrigin, page_height: Abs) -> Self {
        Self { origin, page_height }
    }

    /// Convert a baseline position.
    fn baseline(self, y: Abs) -> Abs {
        match self.origin {
            VerticalOrigin::Top => y,
            VerticalOrigin::Bottom => self.page_height - y,
        }
    }

    /// Convert a rectangle's vertical position from its top edge.
    fn rect(self, y: Abs, height: Abs) -> Abs {
        match self.origin {
            VerticalOrigin::Top => y,
            VerticalOrigin::Bottom => self.page_height - y - height,
        }
    }
}

fn render_block(block: &Block, flip: Flip, device: &mut dyn Device) {
    let pos = block.pos;
    match &block.body {
        BlockBody::Par(par) | BlockBody::Heading { par, .. } => {
            render_par(par, pos, flip, device);
        }

        BlockBody::ListItem { marker, par } => {
            // The marker sits in the gutter, positioned relative to the
            // block itself, and shares the first line's baseline.
            if let (Some(marker), Some(first)) = (marker, par.lines.first()) {
                device.draw_text_run(
                    pos.x + marker.x,
                    flip.baseline(pos.y + first.baseline),
                    marker.font,
                    marker.size,
                    marker.color,
                    &marker.text,
                    &marker.decor,
                );
            }
            render_par(par, pos, flip, device);
        }

        BlockBody::Code(code) => {
            device.draw_rule(
                pos.x,
                flip.rect(pos.y, block.size.height),
                block.size.width,
                block.size.height,
                code.background,
            );
            let inset = Point::with_y(code.inset);
            render_par(&code.par, pos + inset, flip, device);
        }

        BlockBody::Table(table) => {
            for row in &table.rows {
                let cell_top = pos.y + row.y + table.padding;
                for cell in &row.cells {
                    render_par(
                        &cell.par,
                        Point::new(pos.x + cell.x, cell_top),
                        flip,
                        device,
                    );
                }
            }
            for border in &table.borders {
                device.draw_rule(
                    pos.x + border.pos.x,
                    flip.rect(pos.y + border.pos.y, border.size.height),
                    border.size.width,
                    border.size.height,
                    Color::BLACK,
                );
            }
        }

        BlockBody::Math { math, x } => {
            device.draw_math(pos.x + *x, flip.baseline(pos.y + math.ascent), math);
        }

        BlockBody::Rule(rule) => {
            device.draw_rule(
                pos.x,
                flip.rect(pos.y, rule.thickness),
                block.size.width,
                rule.thickness,
                rule.color,
            );
        }

        BlockBody::Figure { image, caption } => {
            let x = pos.x + ((block.size.width - image.size.width) / 2.0).max(Abs::zero());
            device.draw_image(
                x,
                flip.rect(pos.y, image.size.height),
                image.size.width,
                image.size.height,
                image.handle,
            );
            if let Some(caption) = caption {
                let below = Point::new(pos.x, block.bottom() - caption.height);
                render_par(caption, below, flip, device);
            }
        }
    }
}

fn render_par(par: &ParLayout, pos: Point, flip: Flip, device: &mut dyn Device) {
    for line in &par.lines {
        for run in &line.runs {
            render_run(run, pos, line, flip, device);
        }
        for object in &line.objects {
            match object {
                crate::layout::InlineObject::Image { handle, x, size } => {
                    let top = pos.y + line.baseline - size.height;
                    device.draw_image(
                        pos.x + line.x + *x,
                        flip.rect(top, size.height),
                        size.width,
                        size.height,
                        *handle,
                    );
                }
                crate::layout::InlineObject::Math { x, math } => {
                    device.draw_math(
                        pos.x + line.x + *x,
                        flip.baseline(pos.y + line.baseline),
                        math,
                    );
                }
            }
        }
    }
}

fn render_run(run: &Run, pos: Point, line: &Line, flip: Flip, device: &mut dyn Device) {
    device.draw_text_run(
        pos.x + line.x + run.x,
        flip.baseline(pos.y + line.baseline),
        run.font,
        run.size,
        run.color,
        &run.text,
        &run.decor,
    );
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawCall {
    /// A page began.
    BeginPage {
        /// The page size.
        size: Size,
    },
    /// A text run was drawn.
    TextRun {
        /// The left edge.
        x: Abs,
        /// The baseline.
        y: Abs,
        /// The font.
        font: FontId,
        /// The font size.
        size: Abs,
        /// The glyph color.
        color: Color,
        /// The text.
        text: EcoString,
        /// Underline/strikethrough/link state.
        decor: Decor,
    },
    /// A rectangle was filled.
    Rule {
        /// The left edge.
        x: Abs,
        /// The vertical position in device coordinates.
        y: Abs,
        /// The width.
        width: Abs,
        /// The height.
        height: Abs,
        /// The fill color.
        color: Color,
    },
    /// An image was drawn.
    Image {
        /// The left edge.
        x: Abs,
        /// The vertical position in device coordinates.
        y: Abs,
        /// The width.
        width: Abs,
        /// The height.
        height: Abs,
        /// The provider's handle.
        handle: u64,
    },
    /// A math box was drawn.
    Math {
        /// The left edge.
        x: Abs,
        /// The baseline.
        y: Abs,
        /// The math engine's handle.
        handle: u64,
    },
    /// The page ended.
    EndPage,
}

/// A device that records its calls; the display list for tests and for
/// emitters that want the drawing sequence as data.
#[derive(Debug, Clone)]
pub struct Recorder {
    origin: VerticalOrigin,
    /// The recorded calls, in order.
    pub calls: Vec<DrawCall>,
}

impl Recorder {
    /// Create a recorder for the given origin.
    pub fn new(origin: VerticalOrigin) -> Self {
        Self { origin, calls: vec![] }
    }
}

impl Device for Recorder {
    fn origin(&self) -> VerticalOrigin {
        self.origin
    }

    fn begin_page(&mut self, size: Size) {
        self.calls.push(DrawCall::BeginPage { size });
    }

    fn draw_text_run(
        &mut self,
        x: Abs,
        baseline: Abs,
        font: FontId,
        size: Abs,
        color: Color,
        text: &str,
        decor: &Decor,
    ) {
        self.calls.push(DrawCall::TextRun {
            x,
            y: baseline,
            font,
            size,
            color,
            text: text.into(),
            decor: decor.clone(),
        });
    }

    fn draw_rule(&mut self, x: Abs, y: Abs, width: Abs, height: Abs, color: Color) {
        self.calls.push(DrawCall::Rule { x, y, width, height, color });
    }

    fn draw_image(&mut self, x: Abs, y: Abs, width: Abs, height: Abs, handle: u64) {
        self.calls.push(DrawCall::Image { x, y, width, height, handle });
    }

    fn draw_math(&mut self, x: Abs, baseline: Abs, math: &MathBoxData) {
        self.calls.push(DrawCall::Math { x, y: baseline, handle: math.handle });
    }

    fn end_page(&mut self) {
        self.calls.push(DrawCall::EndPage);
    }
}
