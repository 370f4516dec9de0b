//! Block layout generation and pagination.
//!
//! Layout happens in two phases. The measurement phase walks the document
//! tree and produces page-independent source blocks: content laid out at the
//! content width, heights known, break flags resolved. The placement phase
//! pours those blocks onto pages with a downward-growing cursor, collapsing
//! margins and splitting breakable blocks at line boundaries.
//!
//! Placement is parameterized by [`Pins`]: forced page breaks, spacing
//! deltas and split-line caps. The constraint solver never edits pages
//! directly; it updates the pins and pours again, so every state the solver
//! sees came out of the same placement routine.

pub mod block;
pub mod grid;
pub mod par;
pub mod state;

pub use self::block::*;
pub use self::state::{Cursor, LayoutState, Page};

use ecow::eco_format;
use rustc_hash::{FxHashMap, FxHashSet};

use self::par::{ParEnv, ParSource, TextCx};
use crate::config::Config;
use crate::diag::{Error, Feedback, LayoutResult, Pass, Severity, Warning};
use crate::doc::{BlockNode, ColAlign, Document, InlineNode, ListItem as DocListItem};
use crate::font::FontStyle;
use crate::geom::{Abs, Color, Point, Size};
use crate::linebreak::Widths;
use crate::math::MathMode;

/// The gap between a list marker and the item content.
const MARKER_GAP: Abs = Abs::pt(4.0);

/// The gap between a figure image and its caption.
const CAPTION_GAP: Abs = Abs::pt(4.0);

/// The padding inside code block backgrounds.
const CODE_INSET: Abs = Abs::pt(6.0);

/// The thickness of a thematic break.
const RULE_THICKNESS: Abs = Abs::pt(0.5);

/// Placement constraints accumulated by the solver.
///
/// Pins encode every adjustment ever applied, so placing the same sources
/// with the same pins is deterministic and reproducible.
#[derive(Debug, Default, Clone)]
pub struct Pins {
    /// Nodes that must start on a fresh page.
    pub break_before: FxHashSet<NodeId>,
    /// Extra spacing (possibly negative) added before a node.
    pub spacing_delta: FxHashMap<NodeId, Abs>,
    /// The maximum number of lines the node's first part may keep; the rest
    /// continues on the following page.
    pub line_caps: FxHashMap<NodeId, usize>,
}

/// The solver's record of applied adjustments, stamped onto blocks so that
/// states carry their own history.
#[derive(Debug, Default, Clone)]
pub struct AppliedLog {
    /// `(node, record)` pairs in application order.
    pub entries: Vec<(NodeId, Applied)>,
}

impl AppliedLog {
    /// The records for one node, in order.
    pub fn for_node(&self, node: NodeId) -> Vec<Applied> {
        self.entries
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, a)| *a)
            .collect()
    }

    /// Whether an adjustment of this kind was already applied to the node,
    /// and if so, at which position in the log.
    pub fn position(&self, node: NodeId, kind: AdjustKind) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|(n, a)| *n == node && a.kind == kind)
    }
}

/// A page-independent measured block.
#[derive(Debug, Clone)]
pub struct SourceBlock {
    /// The block's source node.
    pub node: NodeId,
    /// The measured content.
    pub body: BlockBody,
    /// The block height.
    pub height: Abs,
    /// Avoid a page break directly after this block.
    pub keep_with_next: bool,
    /// Never split this block across pages.
    pub keep_together: bool,
    /// Whether the block may split at line boundaries.
    pub breakable: bool,
    /// The configured spacing above the block.
    pub spacing_before: Abs,
    /// The configured spacing below the block.
    pub spacing_after: Abs,
}

/// Measure a document into page-independent source blocks.
pub fn measure_document(
    doc: &Document,
    env: &ParEnv,
) -> LayoutResult<Pass<Vec<SourceBlock>>> {
    let mut feedback = Feedback::new();
    let mut out = vec![];
    let mut next_id = 0u32;

    for node in &doc.blocks {
        measure_node(node, Abs::zero(), None, env, &mut next_id, &mut out, &mut feedback)?;
    }

    Ok(Pass::new(out, feedback))
}

/// The marker text for a list item, if the block opens one.
struct Marker {
    text: ecow::EcoString,
}

fn alloc_id(next_id: &mut u32) -> NodeId {
    let id = NodeId(*next_id);
    *next_id += 1;
    id
}

fn measure_node(
    node: &BlockNode,
    indent: Abs,
    marker: Option<Marker>,
    env: &ParEnv,
    next_id: &mut u32,
    out: &mut Vec<SourceBlock>,
    feedback: &mut Feedback,
) -> LayoutResult<()> {
    let config = env.config;
    let content_width = config.page.content_width();

    match node {
        BlockNode::Paragraph { children } => {
            let Some(mut par) =
                measure_par(children, &TextCx::body(config), content_width - indent, env, feedback)?
            else {
                return Ok(());
            };
            indent_lines(&mut par.lines, indent);
            let height = par.height;

            let body = match marker {
                Some(marker) => {
                    let run = marker_run(&marker.text, indent, env)?;
                    BlockBody::ListItem { marker: Some(run), par }
                }
                None if indent > Abs::zero() => BlockBody::ListItem { marker: None, par },
                None => BlockBody::Par(par),
            };

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body,
                height,
                keep_with_next: false,
                keep_together: false,
                breakable: true,
                spacing_before: Abs::zero(),
                spacing_after: config.typography.paragraph_spacing,
            });
        }

        BlockNode::Heading { level, children } => {
            let cx = TextCx {
                size: config.typography.heading_size(*level),
                style: FontStyle::BOLD,
                ..TextCx::body(config)
            };
            let Some(mut par) =
                measure_par(children, &cx, content_width - indent, env, feedback)?
            else {
                return Ok(());
            };
            indent_lines(&mut par.lines, indent);
            let height = par.height;

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Heading { level: *level, par },
                height,
                keep_with_next: true,
                keep_together: false,
                breakable: false,
                spacing_before: config.typography.heading_spacing_before,
                spacing_after: config.typography.heading_spacing_after,
            });
        }

        BlockNode::List { ordered, start, items } => {
            measure_list(*ordered, *start, items, indent, env, next_id, out, feedback)?;
        }

        BlockNode::Table { rows, alignments } => {
            let table = grid::layout_table(
                rows,
                alignments,
                content_width - indent,
                env,
                feedback,
            )?;
            if table.rows.is_empty() {
                return Ok(());
            }
            let height = table.rows.iter().map(|row| row.height).sum();

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Table(table),
                height,
                keep_with_next: false,
                keep_together: false,
                breakable: false,
                spacing_before: config.typography.paragraph_spacing,
                spacing_after: config.typography.paragraph_spacing,
            });
        }

        BlockNode::CodeBlock { language: _, text } => {
            let Some(code) =
                measure_code(text, content_width - indent - 2.0 * CODE_INSET, env, feedback)?
            else {
                return Ok(());
            };
            let height = code.par.height + 2.0 * code.inset;
            let mut body = code;
            indent_lines(&mut body.par.lines, indent + CODE_INSET);

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Code(body),
                height,
                keep_with_next: false,
                keep_together: false,
                breakable: true,
                spacing_before: config.typography.paragraph_spacing,
                spacing_after: config.typography.paragraph_spacing,
            });
        }

        BlockNode::MathBlock { tex } => {
            let math = env
                .math
                .measure(tex, MathMode::Display)
                .map_err(Error::Input)?;
            if math.width > content_width {
                feedback.warn(Warning::bare(
                    Severity::Warning,
                    eco_format!(
                        "math block is {:?} wide but the content area is {:?}",
                        math.width,
                        content_width,
                    ),
                ));
            }
            let x = ((content_width - math.width) / 2.0).max(Abs::zero());

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Math { math: math.into(), x },
                height: math.height,
                keep_with_next: false,
                keep_together: false,
                breakable: false,
                spacing_before: config.typography.paragraph_spacing,
                spacing_after: config.typography.paragraph_spacing,
            });
        }

        BlockNode::Rule => {
            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Rule(RuleLayout {
                    thickness: RULE_THICKNESS,
                    color: Color::new(0x88, 0x88, 0x88),
                }),
                height: RULE_THICKNESS,
                keep_with_next: false,
                keep_together: false,
                breakable: false,
                spacing_before: config.typography.paragraph_spacing,
                spacing_after: config.typography.paragraph_spacing,
            });
        }

        BlockNode::Figure { image, caption } => {
            let Some(info) = env.images.query(image) else {
                return Err(Error::Input(eco_format!("missing image: {image}")));
            };
            if info.size.width > content_width {
                feedback.warn(Warning::bare(
                    Severity::Warning,
                    eco_format!(
                        "image {image} is {:?} wide but the content area is {:?}",
                        info.size.width,
                        content_width,
                    ),
                ));
            }

            let caption_par = if caption.is_empty() {
                None
            } else {
                let cx = TextCx { style: FontStyle::ITALIC, ..TextCx::body(config) };
                measure_par(caption, &cx, content_width, env, feedback)?.map(|mut par| {
                    par::align_lines(&mut par, ColAlign::Center);
                    par
                })
            };

            let mut height = info.size.height;
            if let Some(caption) = &caption_par {
                height += CAPTION_GAP + caption.height;
            }

            out.push(SourceBlock {
                node: alloc_id(next_id),
                body: BlockBody::Figure {
                    image: ImageLayout { handle: info.handle, size: info.size },
                    caption: caption_par,
                },
                height,
                keep_with_next: false,
                keep_together: true,
                breakable: false,
                spacing_before: config.typography.paragraph_spacing,
                spacing_after: config.typography.paragraph_spacing,
            });
        }
    }

    Ok(())
}

fn measure_list(
    ordered: bool,
    start: u64,
    items: &[DocListItem],
    indent: Abs,
    env: &ParEnv,
    next_id: &mut u32,
    out: &mut Vec<SourceBlock>,
    feedback: &mut Feedback,
) -> LayoutResult<()> {
    let inner = indent + env.config.typography.list_indent;

    for (index, item) in items.iter().enumerate() {
        let text = if ordered {
            eco_format!("{}.", start + index as u64)
        } else {
            "\u{2022}".into()
        };
        let mut marker = Some(Marker { text });

        for node in &item.blocks {
            // The marker attaches to the item's first paragraph.
            let attach = marker.is_some() && matches!(node, BlockNode::Paragraph { .. });
            let taken = if attach { marker.take() } else { None };
            measure_node(node, inner, taken, env, next_id, out, feedback)?;
        }
    }

    Ok(())
}

/// Lay out inline content into a paragraph. Returns `None` for content that
/// produces no boxes at all (e.g. an empty paragraph).
fn measure_par(
    children: &[InlineNode],
    cx: &TextCx,
    width: Abs,
    env: &ParEnv,
    feedback: &mut Feedback,
) -> LayoutResult<Option<ParLayout>> {
    let (items, frags) = par::collect(children, cx, env)?;
    if frags.is_empty() {
        return Ok(None);
    }

    let source = ParSource {
        items,
        frags,
        widths: Widths::Constant(width),
        leading: env.config.typography.leading(cx.size),
        cx: cx.clone(),
    };

    Ok(Some(par::layout_par(source, env, feedback)?))
}

/// Lay out verbatim code, one layout line per source line.
fn measure_code(
    text: &str,
    width: Abs,
    env: &ParEnv,
    feedback: &mut Feedback,
) -> LayoutResult<Option<CodeLayout>> {
    let config = env.config;
    let cx = TextCx {
        family: config.typography.code_font.clone(),
        ..TextCx::body(config)
    };
    let Some(font) = env.measure.provider().select(&cx.family, cx.style) else {
        return Err(Error::Input(eco_format!("unknown font family: {}", cx.family)));
    };

    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    if trimmed.is_empty() {
        return Ok(None);
    }

    let leading = config.typography.leading(cx.size);
    let metrics = env.measure.provider().metrics(font).at(cx.size);
    let mut lines = vec![];
    let mut top = Abs::zero();

    for source_line in trimmed.split('\n') {
        let run = env.measure.run(source_line, font, cx.size, 0);
        if run.width > width {
            feedback.warn(Warning::bare(
                Severity::Warning,
                eco_format!("code line wider than the content area: {source_line:?}"),
            ));
        }

        let height = metrics.ascent + metrics.descent;
        let slot = leading.max(height);
        let runs = if source_line.is_empty() {
            vec![]
        } else {
            vec![Run {
                text: source_line.into(),
                font,
                size: cx.size,
                color: cx.color,
                decor: Decor::default(),
                x: Abs::zero(),
                width: run.width,
            }]
        };

        lines.push(Line {
            x: Abs::zero(),
            baseline: top + (slot - height) / 2.0 + metrics.ascent,
            width: run.width,
            height,
            ascent: metrics.ascent,
            descent: metrics.descent,
            ratio: 0.0,
            runs,
            objects: vec![],
        });
        top += slot;
    }

    Ok(Some(CodeLayout {
        par: ParLayout { lines, width, height: top, leading },
        inset: CODE_INSET,
        background: Color::CODE_BACKGROUND,
    }))
}

fn indent_lines(lines: &mut [Line], indent: Abs) {
    if indent > Abs::zero() {
        for line in lines {
            line.x += indent;
        }
    }
}

fn marker_run(text: &ecow::EcoString, indent: Abs, env: &ParEnv) -> LayoutResult<Run> {
    let cx = TextCx::body(env.config);
    let Some(font) = env.measure.provider().select(&cx.family, cx.style) else {
        return Err(Error::Input(eco_format!("unknown font family: {}", cx.family)));
    };
    let metrics = env.measure.run(text, font, cx.size, 0);
    Ok(Run {
        text: text.clone(),
        font,
        size: cx.size,
        color: cx.color,
        decor: Decor::default(),
        x: (indent - metrics.width - MARKER_GAP).max(Abs::zero()),
        width: metrics.width,
    })
}

/// Pour measured source blocks onto pages.
pub fn place(
    sources: &[SourceBlock],
    config: &Config,
    pins: &Pins,
    iteration: usize,
    log: &AppliedLog,
) -> LayoutResult<LayoutState> {
    let mut placer = Placer::new(config, iteration, log);

    for src in sources {
        placer.place(src, pins)?;
    }

    let state = placer.finish();
    validate(&state, iteration)?;
    Ok(state)
}

struct Placer<'a> {
    config: &'a Config,
    iteration: usize,
    log: &'a AppliedLog,
    pages: Vec<Page>,
    y: Abs,
    prev_after: Abs,
    fresh: bool,
}

impl<'a> Placer<'a> {
    fn new(config: &'a Config, iteration: usize, log: &'a AppliedLog) -> Self {
        let page = Page::new(0, config.page.size(), config.page.margins);
        let y = page.content_top();
        Self {
            config,
            iteration,
            log,
            pages: vec![page],
            y,
            prev_after: Abs::zero(),
            fresh: true,
        }
    }

    fn content_bottom(&self) -> Abs {
        self.pages.last().unwrap().content_bottom()
    }

    fn new_page(&mut self) {
        let number = self.pages.len();
        let page = Page::new(number, self.config.page.size(), self.config.page.margins);
        self.y = page.content_top();
        self.pages.push(page);
        self.prev_after = Abs::zero();
        self.fresh = true;
    }

    /// Place one source block, splitting it across pages if necessary.
    fn place(&mut self, src: &SourceBlock, pins: &Pins) -> LayoutResult<()> {
        let mut body = src.body.clone();
        let mut height = body_height(&body, src.height);

        if pins.break_before.contains(&src.node) && !self.fresh {
            self.new_page();
        }

        // Margins collapse: the gap between two blocks is the larger of the
        // first's spacing-after and the second's spacing-before. At the top
        // of a page no spacing is consumed.
        let mut spacing = if self.fresh {
            Abs::zero()
        } else {
            let delta = pins.spacing_delta.get(&src.node).copied().unwrap_or(Abs::zero());
            (self.prev_after.max(src.spacing_before) + delta).max(Abs::zero())
        };

        let cap = pins.line_caps.get(&src.node).copied();
        let mut part = 0u32;

        loop {
            let remaining = self.content_bottom() - (self.y + spacing);

            // A split-line cap forces the split even when the whole block
            // would fit.
            let capped = part == 0
                && src.breakable
                && splittable(&body)
                && cap.is_some_and(|cap| {
                    body.par().is_some_and(|par| par.len() > cap)
                });

            if remaining.fits(height) && !capped {
                self.push(src, body, height, spacing, part);
                return Ok(());
            }

            if splittable(&body) && src.breakable {
                // Cap applies to the first part only.
                let cap_here = if part == 0 { cap } else { None };
                let take = split_count(&body, remaining, cap_here);
                let total = body.par().map_or(0, ParLayout::len);

                if take == 0 {
                    if self.fresh {
                        // Not even one line fits on an empty page; place a
                        // single line anyway rather than looping forever.
                        let take = 1.min(total);
                        if take == total {
                            self.push(src, body, height, spacing, part);
                            return Ok(());
                        }
                        let (first, rest) = split_body(&body, take);
                        let first_height = body_height(&first, Abs::zero());
                        self.push(src, first, first_height, spacing, part);
                        part += 1;
                        body = rest;
                        height = body_height(&body, Abs::zero());
                        spacing = Abs::zero();
                        self.new_page();
                        continue;
                    }
                    self.new_page();
                    spacing = Abs::zero();
                    continue;
                }

                if take >= total {
                    self.push(src, body, height, spacing, part);
                    return Ok(());
                }

                let (first, rest) = split_body(&body, take);
                let first_height = body_height(&first, Abs::zero());
                self.push(src, first, first_height, spacing, part);
                part += 1;
                body = rest;
                height = body_height(&body, Abs::zero());
                spacing = Abs::zero();
                self.new_page();
                continue;
            }

            // Unbreakable and does not fit: move to a fresh page. A block
            // taller than the page is placed at the top and overflows; the
            // solver reports it.
            if self.fresh {
                self.push(src, body, height, spacing, part);
                return Ok(());
            }
            self.new_page();
            spacing = Abs::zero();
        }
    }

    fn push(
        &mut self,
        src: &SourceBlock,
        body: BlockBody,
        height: Abs,
        spacing: Abs,
        part: u32,
    ) {
        let page = self.pages.last_mut().unwrap();
        let pos = Point::new(page.content_left(), self.y + spacing);
        let size = Size::new(page.content_width(), height);

        page.blocks.push(Block {
            id: BlockId { node: src.node, part },
            pos,
            size,
            body,
            keep_with_next: src.keep_with_next,
            keep_together: src.keep_together,
            breakable: src.breakable,
            spacing_before: src.spacing_before,
            spacing_after: src.spacing_after,
            applied: self.log.for_node(src.node),
        });

        self.y = pos.y + height;
        self.prev_after = src.spacing_after;
        self.fresh = false;
    }

    fn finish(self) -> LayoutState {
        let cursor = Cursor { page: self.pages.len() - 1, y: self.y };
        LayoutState { pages: self.pages, cursor, iteration: self.iteration }
    }
}

/// Whether a body kind can split at line boundaries.
fn splittable(body: &BlockBody) -> bool {
    matches!(
        body,
        BlockBody::Par(_) | BlockBody::ListItem { .. } | BlockBody::Code(_)
    )
}

/// The height of a body, preferring the live paragraph content.
fn body_height(body: &BlockBody, fallback: Abs) -> Abs {
    match body {
        BlockBody::Par(par)
        | BlockBody::Heading { par, .. }
        | BlockBody::ListItem { par, .. } => par.height,
        BlockBody::Code(code) => code.par.height + 2.0 * code.inset,
        _ => fallback,
    }
}

/// How many lines of the body fit into the remaining height.
fn split_count(body: &BlockBody, remaining: Abs, cap: Option<usize>) -> usize {
    let Some(par) = body.par() else { return 0 };
    let inset = match body {
        BlockBody::Code(code) => 2.0 * code.inset,
        _ => Abs::zero(),
    };

    let avail = remaining - inset;
    let mut used = Abs::zero();
    let mut count = 0;
    for line in &par.lines {
        used += par.leading.max(line.height);
        if !avail.fits(used) {
            break;
        }
        count += 1;
    }

    match cap {
        Some(cap) => count.min(cap),
        None => count,
    }
}

/// Split a body's paragraph after `count` lines.
fn split_body(body: &BlockBody, count: usize) -> (BlockBody, BlockBody) {
    match body {
        BlockBody::Par(par) => {
            let (first, rest) = split_par(par, count);
            (BlockBody::Par(first), BlockBody::Par(rest))
        }
        BlockBody::ListItem { marker, par } => {
            let (first, rest) = split_par(par, count);
            (
                BlockBody::ListItem { marker: marker.clone(), par: first },
                BlockBody::ListItem { marker: None, par: rest },
            )
        }
        BlockBody::Code(code) => {
            let (first, rest) = split_par(&code.par, count);
            (
                BlockBody::Code(CodeLayout {
                    par: first,
                    inset: code.inset,
                    background: code.background,
                }),
                BlockBody::Code(CodeLayout {
                    par: rest,
                    inset: code.inset,
                    background: code.background,
                }),
            )
        }
        other => (other.clone(), other.clone()),
    }
}

/// Split a paragraph after `count` lines, re-basing the remainder.
fn split_par(par: &ParLayout, count: usize) -> (ParLayout, ParLayout) {
    let count = count.min(par.lines.len());
    let offset: Abs = par
        .lines
        .iter()
        .take(count)
        .map(|line| par.leading.max(line.height))
        .sum();

    let first = ParLayout {
        lines: par.lines[..count].to_vec(),
        width: par.width,
        height: offset,
        leading: par.leading,
    };

    let mut rest_lines = par.lines[count..].to_vec();
    for line in &mut rest_lines {
        line.baseline -= offset;
    }

    let rest = ParLayout {
        lines: rest_lines,
        width: par.width,
        height: par.height - offset,
        leading: par.leading,
    };

    (first, rest)
}

/// Check the state's structural invariants.
fn validate(state: &LayoutState, iteration: usize) -> LayoutResult<()> {
    for (_, block) in state.blocks() {
        if block.size.width <= Abs::zero() || block.size.height <= Abs::zero() {
            return Err(Error::internal(
                iteration,
                Some(block.id),
                eco_format!("block has non-positive size {:?}", block.size),
            ));
        }

        if let Some(par) = block.body.par() {
            for line in &par.lines {
                if !(line.ascent + line.descent).approx_eq(line.height) {
                    return Err(Error::internal(
                        iteration,
                        Some(block.id),
                        "line height does not equal ascent plus descent",
                    ));
                }
            }
        }
    }
    Ok(())
}
