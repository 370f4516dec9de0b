//! The built-in rule set.
//!
//! A rule is a record of two functions: `check` reports violations of one
//! typographic constraint, `suggest` proposes adjustments for a violation.
//! Rules never mutate state.

use ecow::{eco_format, EcoString};

use super::adjust::{Adjustment, RebreakHint};
use crate::config::Config;
use crate::diag::{Severity, Warning};
use crate::geom::Abs;
use crate::layout::{Block, BlockBody, BlockId, LayoutState, Page};

/// Identifies a built-in rule.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RuleId {
    /// Content must stay inside the content rectangle.
    NoOverflow,
    /// Blocks must keep a minimum distance.
    MinSpacing,
    /// No lone first line at a page bottom.
    NoOrphan,
    /// No lone last line at a page top.
    NoWidow,
    /// No heading stranded at a page bottom.
    HeadingOrphan,
    /// Keep-together blocks must not cross pages.
    KeepTogether,
    /// Pages must not exceed a line budget.
    MaxLinesPerPage,
    /// Non-terminal pages should be reasonably full.
    MinPageFullness,
    /// Consecutive gaps should be similar.
    BalancedSpacing,
}

impl RuleId {
    /// The rule's configuration key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOverflow => "no-overflow",
            Self::MinSpacing => "min-spacing",
            Self::NoOrphan => "no-orphan",
            Self::NoWidow => "no-widow",
            Self::HeadingOrphan => "heading-orphan",
            Self::KeepTogether => "keep-together",
            Self::MaxLinesPerPage => "max-lines-per-page",
            Self::MinPageFullness => "min-page-fullness",
            Self::BalancedSpacing => "balanced-spacing",
        }
    }
}

/// A concrete instance of a rule not being satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// The violated rule.
    pub rule: RuleId,
    /// The effective severity (after configuration overrides).
    pub severity: Severity,
    /// The offending block, if the violation concerns one.
    pub block: Option<BlockId>,
    /// The zero-based page the violation occurred on.
    pub page: usize,
    /// A human-readable description.
    pub message: EcoString,
}

impl Violation {
    /// The identity used for fixed-point detection.
    pub fn key(&self) -> (RuleId, Option<BlockId>, usize) {
        (self.rule, self.block, self.page)
    }

    /// Convert into a warning for the feedback channel.
    pub fn into_warning(self) -> Warning {
        Warning {
            severity: self.severity,
            rule: Some(self.rule.as_str().into()),
            block: self.block,
            page: Some(self.page),
            message: self.message,
        }
    }
}

/// What rules get to see.
pub struct RuleCx<'a> {
    /// The build configuration, for rule parameters.
    pub config: &'a Config,
}

/// A rule record.
#[derive(Copy, Clone)]
pub struct Rule {
    /// The rule's identity.
    pub id: RuleId,
    /// The rule's built-in severity.
    pub severity: Severity,
    /// Report violations of this rule.
    pub check: fn(&RuleCx, &LayoutState) -> Vec<Violation>,
    /// Propose adjustments for one of this rule's violations.
    pub suggest: fn(&RuleCx, &Violation, &LayoutState) -> Vec<Adjustment>,
}

/// The built-in rule set, in check order.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: RuleId::NoOverflow,
            severity: Severity::Error,
            check: check_no_overflow,
            suggest: suggest_move,
        },
        Rule {
            id: RuleId::MinSpacing,
            severity: Severity::Info,
            check: check_min_spacing,
            suggest: suggest_min_spacing,
        },
        Rule {
            id: RuleId::NoOrphan,
            severity: Severity::Warning,
            check: check_no_orphan,
            suggest: suggest_move,
        },
        Rule {
            id: RuleId::NoWidow,
            severity: Severity::Warning,
            check: check_no_widow,
            suggest: suggest_pull_line,
        },
        Rule {
            id: RuleId::HeadingOrphan,
            severity: Severity::Warning,
            check: check_heading_orphan,
            suggest: suggest_move,
        },
        Rule {
            id: RuleId::KeepTogether,
            severity: Severity::Warning,
            check: check_keep_together,
            suggest: suggest_keep_together,
        },
        Rule {
            id: RuleId::MaxLinesPerPage,
            severity: Severity::Info,
            check: check_max_lines,
            suggest: suggest_max_lines,
        },
        Rule {
            id: RuleId::MinPageFullness,
            severity: Severity::Info,
            check: check_fullness,
            suggest: suggest_nothing,
        },
        Rule {
            id: RuleId::BalancedSpacing,
            severity: Severity::Info,
            check: check_balanced,
            suggest: suggest_balanced,
        },
    ]
}

/// The number of overflow errors in a state, for the solver's monotonicity
/// guard.
pub fn overflow_errors(cx: &RuleCx, state: &LayoutState) -> usize {
    check_no_overflow(cx, state).len()
}

/// The geometric gap between two vertically adjacent blocks.
fn gap(first: &Block, second: &Block) -> Abs {
    second.pos.y - first.bottom()
}

/// Whether the block's paragraph spans further parts after this one.
fn has_continuation(state: &LayoutState, id: BlockId) -> bool {
    state.block(BlockId { node: id.node, part: id.part + 1 }).is_some()
}

fn line_count(block: &Block) -> usize {
    block.body.par().map_or(0, |par| par.lines.len())
}

fn is_paragraph(block: &Block) -> bool {
    matches!(block.body, BlockBody::Par(_) | BlockBody::ListItem { .. })
}

// --- no-overflow ---

fn check_no_overflow(_: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        for block in &page.blocks {
            // A block taller than the content area cannot fit anywhere; that
            // is keep-together territory, not a movable overflow.
            if block.size.height > page.content_height() {
                continue;
            }
            if !page.content_bottom().fits(block.bottom()) {
                let excess = block.bottom() - page.content_bottom();
                out.push(Violation {
                    rule: RuleId::NoOverflow,
                    severity: Severity::Error,
                    block: Some(block.id),
                    page: p,
                    message: eco_format!(
                        "{} crosses the bottom content edge by {excess:?}",
                        block.body.name(),
                    ),
                });
            }
        }
    }
    out
}

fn suggest_move(_: &RuleCx, violation: &Violation, _: &LayoutState) -> Vec<Adjustment> {
    match violation.block {
        Some(id) => vec![Adjustment::MoveToNextPage(id)],
        None => vec![],
    }
}

// --- min-spacing ---

fn check_min_spacing(cx: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let min = cx.config.rules.min_spacing();
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        for pair in page.blocks.windows(2) {
            let gap = gap(&pair[0], &pair[1]);
            if gap + Abs::pt(1e-6) < min {
                out.push(Violation {
                    rule: RuleId::MinSpacing,
                    severity: Severity::Info,
                    block: Some(pair[1].id),
                    page: p,
                    message: eco_format!("gap of {gap:?} is below the minimum of {min:?}"),
                });
            }
        }
    }
    out
}

fn suggest_min_spacing(
    cx: &RuleCx,
    violation: &Violation,
    state: &LayoutState,
) -> Vec<Adjustment> {
    let Some(id) = violation.block else { return vec![] };
    let Some((p, b)) = state.find(id) else { return vec![] };
    if b == 0 {
        return vec![];
    }
    let page = &state.pages[p];
    let current = gap(&page.blocks[b - 1], &page.blocks[b]);
    let min = cx.config.rules.min_spacing();
    vec![Adjustment::AddSpacingBefore(id, min - current)]
}

// --- no-orphan ---

fn check_no_orphan(_: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        let Some(block) = page.blocks.last() else { continue };
        if is_paragraph(block)
            && block.id.part == 0
            && line_count(block) == 1
            && has_continuation(state, block.id)
        {
            out.push(Violation {
                rule: RuleId::NoOrphan,
                severity: Severity::Warning,
                block: Some(block.id),
                page: p,
                message: "first line of a paragraph sits alone at the page bottom".into(),
            });
        }
    }
    out
}

// --- no-widow ---

fn check_no_widow(_: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate().skip(1) {
        let Some(block) = page.blocks.first() else { continue };
        if is_paragraph(block)
            && block.id.part > 0
            && line_count(block) == 1
            && !has_continuation(state, block.id)
        {
            out.push(Violation {
                rule: RuleId::NoWidow,
                severity: Severity::Warning,
                block: Some(block.id),
                page: p,
                message: "last line of a paragraph is stranded at the page top".into(),
            });
        }
    }
    out
}

fn suggest_pull_line(
    _: &RuleCx,
    violation: &Violation,
    _: &LayoutState,
) -> Vec<Adjustment> {
    match violation.block {
        Some(id) => vec![Adjustment::PullLineFromPrevious(id)],
        None => vec![],
    }
}

// --- heading-orphan ---

fn check_heading_orphan(_: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        let Some(block) = page.blocks.last() else { continue };
        let followed = state
            .pages
            .get(p + 1)
            .is_some_and(|next| !next.blocks.is_empty());
        if block.keep_with_next && followed {
            out.push(Violation {
                rule: RuleId::HeadingOrphan,
                severity: Severity::Warning,
                block: Some(block.id),
                page: p,
                message: eco_format!(
                    "{} is the last block on the page but keeps with the next",
                    block.body.name(),
                ),
            });
        }
    }
    out
}

// --- keep-together ---

fn check_keep_together(_: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        for block in &page.blocks {
            if block.keep_together && !page.content_bottom().fits(block.bottom()) {
                out.push(Violation {
                    rule: RuleId::KeepTogether,
                    severity: Severity::Warning,
                    block: Some(block.id),
                    page: p,
                    message: eco_format!(
                        "{} cannot be kept on one page",
                        block.body.name(),
                    ),
                });
            }
        }
    }
    out
}

fn suggest_keep_together(
    _: &RuleCx,
    violation: &Violation,
    state: &LayoutState,
) -> Vec<Adjustment> {
    let Some(id) = violation.block else { return vec![] };
    let Some((_, b)) = state.find(id) else { return vec![] };
    // Already at the top of its page: moving cannot help, the violation is
    // residual.
    if b == 0 {
        return vec![];
    }
    vec![Adjustment::MoveToNextPage(id)]
}

// --- max-lines-per-page ---

fn check_max_lines(cx: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let max = cx.config.rules.max_lines_per_page();
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        let count: usize = page.blocks.iter().map(line_count).sum();
        if count > max {
            let block = offending_block(page, max).map(|block| block.id);
            out.push(Violation {
                rule: RuleId::MaxLinesPerPage,
                severity: Severity::Info,
                block,
                page: p,
                message: eco_format!("page holds {count} lines, more than the maximum {max}"),
            });
        }
    }
    out
}

/// The block containing the first line past the budget.
fn offending_block(page: &Page, max: usize) -> Option<&Block> {
    let mut seen = 0;
    for block in &page.blocks {
        let lines = line_count(block);
        if seen + lines > max {
            return Some(block);
        }
        seen += lines;
    }
    None
}

fn suggest_max_lines(
    cx: &RuleCx,
    violation: &Violation,
    state: &LayoutState,
) -> Vec<Adjustment> {
    let max = cx.config.rules.max_lines_per_page();
    let Some(id) = violation.block else { return vec![] };
    let Some((p, b)) = state.find(id) else { return vec![] };
    let page = &state.pages[p];

    let before: usize = page.blocks[..b].iter().map(line_count).sum();
    let within = max.saturating_sub(before);

    if within == 0 {
        vec![Adjustment::ForceBreakBefore(id)]
    } else if id.part == 0 && state.pages[p].blocks[b].breakable {
        // Break before the offending line by capping the paragraph's first
        // part.
        vec![Adjustment::RebreakParagraph(id, RebreakHint { split_after: within })]
    } else {
        vec![]
    }
}

// --- min-page-fullness ---

fn check_fullness(cx: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let threshold = cx.config.rules.min_page_fullness();
    let mut out = vec![];
    // The terminal page may be as empty as it likes.
    for (p, page) in state.pages.iter().enumerate() {
        if p + 1 == state.pages.len() {
            continue;
        }
        let fullness = page.fullness();
        if fullness < threshold {
            out.push(Violation {
                rule: RuleId::MinPageFullness,
                severity: Severity::Info,
                block: page.blocks.last().map(|block| block.id),
                page: p,
                message: eco_format!(
                    "page is only {:.0}% full, below the {:.0}% threshold",
                    fullness * 100.0,
                    threshold * 100.0,
                ),
            });
        }
    }
    out
}

/// Pulling the next block forward would undo the very move that created the
/// gap; the violation stays residual.
fn suggest_nothing(_: &RuleCx, _: &Violation, _: &LayoutState) -> Vec<Adjustment> {
    vec![]
}

// --- balanced-spacing ---

fn check_balanced(cx: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let tolerance = cx.config.rules.balanced_spacing_tolerance();
    let mut out = vec![];
    for (p, page) in state.pages.iter().enumerate() {
        let gaps: Vec<Abs> = page
            .blocks
            .windows(2)
            .map(|pair| gap(&pair[0], &pair[1]))
            .collect();
        if gaps.len() < 2 {
            continue;
        }

        let mean: Abs = gaps.iter().sum::<Abs>() / gaps.len() as f64;
        if mean <= Abs::zero() {
            continue;
        }

        for (i, &gap) in gaps.iter().enumerate() {
            let deviation = (gap - mean).abs() / mean;
            if deviation > tolerance {
                out.push(Violation {
                    rule: RuleId::BalancedSpacing,
                    severity: Severity::Info,
                    block: Some(page.blocks[i + 1].id),
                    page: p,
                    message: eco_format!(
                        "gap of {gap:?} deviates {:.0}% from the page mean of {mean:?}",
                        deviation * 100.0,
                    ),
                });
            }
        }
    }
    out
}

fn suggest_balanced(
    _: &RuleCx,
    violation: &Violation,
    state: &LayoutState,
) -> Vec<Adjustment> {
    let Some(id) = violation.block else { return vec![] };
    let Some((p, b)) = state.find(id) else { return vec![] };
    let page = &state.pages[p];

    let gaps: Vec<Abs> = page
        .blocks
        .windows(2)
        .map(|pair| gap(&pair[0], &pair[1]))
        .collect();
    if gaps.is_empty() || b == 0 {
        return vec![];
    }

    let mean: Abs = gaps.iter().sum::<Abs>() / gaps.len() as f64;
    let current = gaps[b - 1];
    vec![Adjustment::AddSpacingBefore(id, mean - current)]
}
