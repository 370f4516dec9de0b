//! Paragraph collection and assembly.
//!
//! Inline content is flattened into the breaker's item stream (words become
//! boxes, spaces become glue, break marks become penalties), broken into
//! lines, and assembled back into positioned runs.

use std::hash::{Hash, Hasher};

use ecow::EcoString;
use rustc_hash::FxHasher;
use unicode_segmentation::UnicodeSegmentation;

use super::block::{Decor, InlineObject, Line, ParLayout, Run};
use crate::config::Config;
use crate::diag::{bail, Feedback, LayoutResult, Severity, Warning};
use crate::doc::{ColAlign, InlineNode};
use crate::font::{FontId, FontStyle};
use crate::geom::{Abs, Color, Size};
use crate::image::ImageProvider;
use crate::linebreak::{self, BrokenLine, Breaks, Item, Widths, FORCED};
use crate::math::{MathBox, MathEngine, MathMode};
use crate::measure::Measurements;

/// Space glue stretches by a third and shrinks by a sixth of its width.
const SPACE_STRETCH: f64 = 1.0 / 3.0;
const SPACE_SHRINK: f64 = 1.0 / 6.0;

/// The text style active while collecting inline content.
#[derive(Debug, Clone)]
pub struct TextCx {
    /// The font family.
    pub family: EcoString,
    /// The weight and slant.
    pub style: FontStyle,
    /// The font size.
    pub size: Abs,
    /// The glyph color.
    pub color: Color,
    /// Active decorations.
    pub decor: Decor,
}

impl TextCx {
    /// The base style for body text under a configuration.
    pub fn body(config: &Config) -> Self {
        Self {
            family: config.typography.body_font.clone(),
            style: FontStyle::REGULAR,
            size: config.typography.body_size,
            color: Color::BLACK,
            decor: Decor::default(),
        }
    }
}

/// The content behind a box item.
#[derive(Debug, Clone)]
pub enum Frag {
    /// A word or word fragment.
    Text {
        /// The text.
        text: EcoString,
        /// The resolved font.
        font: FontId,
        /// The font size.
        size: Abs,
        /// The glyph color.
        color: Color,
        /// Active decorations.
        decor: Decor,
        /// The measured width.
        width: Abs,
    },
    /// An inline image.
    Image {
        /// The provider's handle.
        handle: u64,
        /// The displayed size.
        size: Size,
    },
    /// An inline math box.
    Math(MathBox),
}

/// A collected paragraph stream, kept so the solver can re-break it later.
#[derive(Debug, Clone)]
pub struct ParSource {
    /// The breaker items.
    pub items: Vec<Item>,
    /// The box contents, indexed by the items' `frag` fields.
    pub frags: Vec<Frag>,
    /// The target line widths.
    pub widths: Widths,
    /// The baseline-to-baseline distance.
    pub leading: Abs,
    /// The base style, used for empty lines and trailing hyphens.
    pub cx: TextCx,
}

/// Everything collection needs from the session.
pub struct ParEnv<'a> {
    /// The build configuration.
    pub config: &'a Config,
    /// The measurement session.
    pub measure: &'a Measurements<'a>,
    /// The math engine.
    pub math: &'a dyn MathEngine,
    /// The image provider.
    pub images: &'a dyn ImageProvider,
}

impl<'a> ParEnv<'a> {
    fn select(&self, cx: &TextCx) -> LayoutResult<FontId> {
        match self.measure.provider().select(&cx.family, cx.style) {
            Some(id) => Ok(id),
            None => bail!("unknown font family: {}", cx.family),
        }
    }
}

/// Flatten inline content into a paragraph stream.
pub fn collect(
    children: &[InlineNode],
    cx: &TextCx,
    env: &ParEnv,
) -> LayoutResult<(Vec<Item>, Vec<Frag>)> {
    let mut items = vec![];
    let mut frags = vec![];
    walk(children, cx, env, &mut items, &mut frags)?;
    Ok((items, frags))
}

fn walk(
    children: &[InlineNode],
    cx: &TextCx,
    env: &ParEnv,
    items: &mut Vec<Item>,
    frags: &mut Vec<Frag>,
) -> LayoutResult<()> {
    for child in children {
        match child {
            InlineNode::Text(text) => text_items(text, cx, env, items, frags)?,
            InlineNode::Emphasis(inner) => {
                let cx = TextCx {
                    style: FontStyle { italic: true, ..cx.style },
                    ..cx.clone()
                };
                walk(inner, &cx, env, items, frags)?;
            }
            InlineNode::Strong(inner) => {
                let cx = TextCx {
                    style: FontStyle { bold: true, ..cx.style },
                    ..cx.clone()
                };
                walk(inner, &cx, env, items, frags)?;
            }
            InlineNode::Strikethrough(inner) => {
                let cx = TextCx {
                    decor: Decor { strikethrough: true, ..cx.decor.clone() },
                    ..cx.clone()
                };
                walk(inner, &cx, env, items, frags)?;
            }
            InlineNode::Code(inner) => {
                let cx = TextCx {
                    family: env.config.typography.code_font.clone(),
                    ..cx.clone()
                };
                walk(inner, &cx, env, items, frags)?;
            }
            InlineNode::Link { url, children } => {
                let cx = TextCx {
                    decor: Decor {
                        underline: true,
                        link: Some(url.clone()),
                        ..cx.decor.clone()
                    },
                    ..cx.clone()
                };
                walk(children, &cx, env, items, frags)?;
            }
            InlineNode::Image { src, alt: _ } => {
                let Some(info) = env.images.query(src) else {
                    bail!("missing image: {src}");
                };
                items.push(Item::Box { width: info.size.width, frag: frags.len() });
                frags.push(Frag::Image { handle: info.handle, size: info.size });
            }
            InlineNode::MathInline { tex } => {
                let math = env
                    .math
                    .measure(tex, MathMode::Inline)
                    .map_err(crate::diag::Error::Input)?;
                items.push(Item::Box { width: math.width, frag: frags.len() });
                frags.push(Frag::Math(math));
            }
            InlineNode::HardBreak => {
                items.push(Item::Penalty {
                    width: Abs::zero(),
                    cost: FORCED,
                    flagged: false,
                });
            }
            InlineNode::SoftBreak => {
                // A break opportunity that renders as an ordinary space.
                items.push(Item::Penalty {
                    width: Abs::zero(),
                    cost: 0.0,
                    flagged: false,
                });
                push_space(cx, env, items)?;
            }
        }
    }
    Ok(())
}

fn text_items(
    text: &str,
    cx: &TextCx,
    env: &ParEnv,
    items: &mut Vec<Item>,
    frags: &mut Vec<Frag>,
) -> LayoutResult<()> {
    let font = env.select(cx)?;
    for word in text.split_word_bounds() {
        if word.chars().all(char::is_whitespace) {
            push_space(cx, env, items)?;
        } else {
            let metrics = env.measure.run(word, font, cx.size, cx.decor.flags());
            items.push(Item::Box { width: metrics.width, frag: frags.len() });
            frags.push(Frag::Text {
                text: word.into(),
                font,
                size: cx.size,
                color: cx.color,
                decor: cx.decor.clone(),
                width: metrics.width,
            });
        }
    }
    Ok(())
}

fn push_space(cx: &TextCx, env: &ParEnv, items: &mut Vec<Item>) -> LayoutResult<()> {
    let font = env.select(cx)?;
    let width = env.measure.advance(font, cx.size, ' ');
    items.push(Item::Glue {
        width,
        stretch: width * SPACE_STRETCH,
        shrink: width * SPACE_SHRINK,
    });
    Ok(())
}

/// Digest the geometry of an item stream. Break decisions depend only on
/// widths, flexibility and penalties, so geometric equality is enough for the
/// composite cache.
fn digest_items(items: &[Item]) -> u64 {
    let mut hasher = FxHasher::default();
    for item in items {
        match *item {
            Item::Box { width, .. } => {
                0u8.hash(&mut hasher);
                width.hash(&mut hasher);
            }
            Item::Glue { width, stretch, shrink } => {
                1u8.hash(&mut hasher);
                width.hash(&mut hasher);
                stretch.hash(&mut hasher);
                shrink.hash(&mut hasher);
            }
            Item::Penalty { width, cost, flagged } => {
                2u8.hash(&mut hasher);
                width.hash(&mut hasher);
                cost.to_bits().hash(&mut hasher);
                flagged.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

/// Lay out a paragraph stream into positioned lines.
///
/// Splits overlong words at character boundaries and retries when even the
/// emergency pass leaves an overfull line.
pub fn layout_par(
    mut source: ParSource,
    env: &ParEnv,
    feedback: &mut Feedback,
) -> LayoutResult<ParLayout> {
    let max_width = match &source.widths {
        Widths::Constant(width) => *width,
        Widths::PerLine(leading, rest) => {
            leading.iter().copied().fold(*rest, Abs::max)
        }
    };

    let mut breaks = break_cached(&source, env);

    if breaks.overfull {
        let (items, frags) = split_overlong(&source, max_width, env);
        source.items = items;
        source.frags = frags;
        feedback.warn(Warning::bare(
            Severity::Warning,
            "overlong word split at character boundaries",
        ));
        breaks = break_cached(&source, env);
    }

    if breaks.emergency {
        feedback.warn(Warning::bare(
            Severity::Info,
            "line breaking required emergency stretch",
        ));
    }

    Ok(assemble(&source, &breaks.lines, env))
}

fn break_cached(source: &ParSource, env: &ParEnv) -> Breaks {
    let digest = digest_items(&source.items);
    match &source.widths {
        // The common case goes through the composite cache.
        Widths::Constant(width) => {
            let config = &env.config.line_breaking;
            let lines = env.measure.lines(digest, *width, || {
                linebreak::break_lines(&source.items, &source.widths, config).lines
            });
            let lines = (*lines).clone();
            let overfull = lines.iter().any(|line| line.ratio < -1.0 - 1e-9);
            let emergency = lines
                .iter()
                .any(|line| !line.terminal && line.ratio > config.tolerance_first_pass + 1e-9);
            Breaks { lines, emergency, overfull }
        }
        Widths::PerLine(..) => {
            linebreak::break_lines(&source.items, &source.widths, &env.config.line_breaking)
        }
    }
}

/// Replace text boxes wider than the measure with one box per grapheme
/// cluster so that the breaker can split them.
fn split_overlong(
    source: &ParSource,
    max_width: Abs,
    env: &ParEnv,
) -> (Vec<Item>, Vec<Frag>) {
    let mut items = vec![];
    let mut frags = vec![];

    for item in &source.items {
        match *item {
            Item::Box { width, frag } => {
                if width > max_width {
                    if let Frag::Text { ref text, font, size, color, ref decor, .. } =
                        source.frags[frag]
                    {
                        for grapheme in text.graphemes(true) {
                            let metrics =
                                env.measure.run(grapheme, font, size, decor.flags());
                            items.push(Item::Box {
                                width: metrics.width,
                                frag: frags.len(),
                            });
                            frags.push(Frag::Text {
                                text: grapheme.into(),
                                font,
                                size,
                                color,
                                decor: decor.clone(),
                                width: metrics.width,
                            });
                        }
                        continue;
                    }
                }
                items.push(Item::Box { width, frag: frags.len() });
                frags.push(source.frags[frag].clone());
            }
            other => items.push(other),
        }
    }

    (items, frags)
}

/// Assemble broken lines into positioned runs.
fn assemble(source: &ParSource, lines: &[BrokenLine], env: &ParEnv) -> ParLayout {
    let width = match &source.widths {
        Widths::Constant(width) => *width,
        Widths::PerLine(leading, rest) => leading.iter().copied().fold(*rest, Abs::max),
    };
    let leading = source.leading;

    let mut out = Vec::with_capacity(lines.len());
    let mut top = Abs::zero();

    for broken in lines {
        let mut line = assemble_line(source, broken, env);
        line.x = Abs::zero();

        // Each line occupies at least one leading slot; taller content (e.g.
        // inline math) widens its slot.
        let slot = leading.max(line.height);
        line.baseline = top + (slot - line.height) / 2.0 + line.ascent;
        top += slot;

        out.push(line);
    }

    ParLayout {
        lines: out,
        width,
        height: top,
        leading,
    }
}

fn assemble_line(source: &ParSource, broken: &BrokenLine, env: &ParEnv) -> Line {
    // Glue cannot shrink below its shrinkability; an unset ratio stays
    // natural.
    let ratio = if broken.ratio.is_finite() { broken.ratio.max(-1.0) } else { 0.0 };

    let mut runs: Vec<Run> = vec![];
    let mut objects = vec![];
    let mut cursor = Abs::zero();
    let mut ascent = Abs::zero();
    let mut descent = Abs::zero();

    for item in &source.items[broken.range.clone()] {
        match *item {
            Item::Box { frag, .. } => match &source.frags[frag] {
                Frag::Text { text, font, size, color, decor, width } => {
                    let metrics = env.measure.provider().metrics(*font).at(*size);
                    ascent.set_max(metrics.ascent);
                    descent.set_max(metrics.descent);
                    push_text(&mut runs, text, *font, *size, *color, decor, cursor, *width);
                    cursor += *width;
                }
                Frag::Image { handle, size } => {
                    ascent.set_max(size.height);
                    objects.push(InlineObject::Image {
                        handle: *handle,
                        x: cursor,
                        size: *size,
                    });
                    cursor += size.width;
                }
                Frag::Math(math) => {
                    ascent.set_max(math.ascent);
                    descent.set_max(math.descent);
                    objects.push(InlineObject::Math { x: cursor, math: (*math).into() });
                    cursor += math.width;
                }
            },
            Item::Glue { width, stretch, shrink } => {
                let flex = if ratio >= 0.0 { stretch } else { shrink };
                let set = width + flex * ratio;
                if let Some(last) = runs.last_mut() {
                    last.text.push(' ');
                    last.width += set;
                }
                cursor += set;
            }
            Item::Penalty { .. } => {}
        }
    }

    // A flagged break renders its hyphen.
    if broken.flagged {
        if let Some(last) = runs.last_mut() {
            let metrics =
                env.measure.run("-", last.font, last.size, last.decor.flags());
            last.text.push('-');
            last.width += metrics.width;
            cursor += metrics.width;
        }
    }

    // An empty line still takes up the base style's text box.
    if ascent.is_zero() && descent.is_zero() {
        if let Some(font) = env.measure.provider().select(&source.cx.family, source.cx.style)
        {
            let metrics = env.measure.provider().metrics(font).at(source.cx.size);
            ascent = metrics.ascent;
            descent = metrics.descent;
        }
    }

    Line {
        x: Abs::zero(),
        baseline: Abs::zero(),
        width: cursor,
        height: ascent + descent,
        ascent,
        descent,
        ratio,
        runs,
        objects,
    }
}

fn push_text(
    runs: &mut Vec<Run>,
    text: &EcoString,
    font: FontId,
    size: Abs,
    color: Color,
    decor: &Decor,
    x: Abs,
    width: Abs,
) {
    // Extend the current run if the style continues.
    if let Some(last) = runs.last_mut() {
        if last.font == font
            && last.size == size
            && last.color == color
            && &last.decor == decor
            && (last.x + last.width).approx_eq(x)
        {
            last.text.push_str(text);
            last.width += width;
            return;
        }
    }

    runs.push(Run {
        text: text.clone(),
        font,
        size,
        color,
        decor: decor.clone(),
        x,
        width,
    });
}

/// Offset every line for the given alignment within the paragraph width.
pub fn align_lines(par: &mut ParLayout, align: ColAlign) {
    for line in &mut par.lines {
        line.x = match align {
            ColAlign::Left => Abs::zero(),
            ColAlign::Center => (par.width - line.width) / 2.0,
            ColAlign::Right => par.width - line.width,
        }
        .max(Abs::zero());
    }
}
