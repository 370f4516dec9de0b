//! Optimal line breaking.
//!
//! The breaker consumes a paragraph stream of boxes, glues and penalties and
//! assigns break points so that the total demerits over all lines are
//! minimal. It uses dynamic programming: for each possible breakpoint it
//! determines the best predecessor, i.e. the optimal paragraph layout up to
//! that point. The final result is the chain retraced from the last
//! breakpoint at the end of the stream.
//!
//! A line which has a very tight or very loose fit costs more than one that
//! is just right; breaking at a flagged penalty right after another flagged
//! break costs extra, as does a drastic change in looseness between adjacent
//! lines.

use std::ops::Range;

use crate::config::LineBreakConfig;
use crate::geom::Abs;

/// The cost of a potential break point.
pub type Cost = f64;

/// A penalty cost that forces a break.
pub const FORCED: Cost = f64::NEG_INFINITY;

/// A penalty cost that forbids a break.
pub const FORBIDDEN: Cost = f64::INFINITY;

/// Demerits past which a line is only taken if nothing else works.
const MAX_DEMERITS: Cost = 1e9;

/// Cap on the ratio magnitude entering the demerits formula.
const RATIO_CAP: f64 = 10.0;

/// Slack for ratio feasibility comparisons.
const EPS: f64 = 1e-9;

/// An element of the paragraph input stream.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Item {
    /// Unbreakable content of fixed width: a word, a math atom, an inline
    /// image. `frag` indexes the collector's fragment table.
    Box { width: Abs, frag: usize },
    /// Flexible whitespace.
    Glue { width: Abs, stretch: Abs, shrink: Abs },
    /// A potential break point. The width is consumed only when the break is
    /// taken (e.g. a hyphen mark).
    Penalty { width: Abs, cost: Cost, flagged: bool },
}

impl Item {
    /// The width the item contributes to a line it sits inside.
    fn width(&self) -> Abs {
        match *self {
            Self::Box { width, .. } => width,
            Self::Glue { width, .. } => width,
            Self::Penalty { .. } => Abs::zero(),
        }
    }
}

/// The target widths for the lines of a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub enum Widths {
    /// Every line has the same width.
    Constant(Abs),
    /// The leading lines have individual widths (e.g. for a running indent);
    /// all lines past the list get the trailing width.
    PerLine(Vec<Abs>, Abs),
}

impl Widths {
    /// The target width of the line with the given index.
    pub fn line(&self, index: usize) -> Abs {
        match self {
            Self::Constant(width) => *width,
            Self::PerLine(leading, rest) => {
                leading.get(index).copied().unwrap_or(*rest)
            }
        }
    }
}

/// One line of a broken paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenLine {
    /// The item range making up the line. The break item itself (glue or
    /// penalty) is excluded.
    pub range: Range<usize>,
    /// The adjustment ratio: positive stretches the line's glue, negative
    /// shrinks it. Zero for underfull terminal lines.
    pub ratio: f64,
    /// The natural width of the line's content.
    pub width: Abs,
    /// Whether the line ends the stream or a forced sub-stream.
    pub terminal: bool,
    /// Whether the line ends at a flagged penalty.
    pub flagged: bool,
}

/// The result of breaking a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Breaks {
    /// The lines in order.
    pub lines: Vec<BrokenLine>,
    /// Whether the emergency pass (unbounded stretch) was needed.
    pub emergency: bool,
    /// Whether some line is overfull even after the emergency pass. The
    /// caller is expected to split overlong boxes and retry.
    pub overfull: bool,
}

/// Find the optimal break points for a paragraph stream.
pub fn break_lines(items: &[Item], widths: &Widths, config: &LineBreakConfig) -> Breaks {
    if items.is_empty() {
        return Breaks { lines: vec![], emergency: false, overfull: false };
    }

    let (lines, ok) = attempt(items, widths, config, config.tolerance_first_pass);
    if ok {
        let overfull = has_overfull(&lines);
        return Breaks { lines, emergency: false, overfull };
    }

    let (lines, _) = attempt(items, widths, config, config.tolerance_second_pass);
    let overfull = has_overfull(&lines);
    Breaks { lines, emergency: true, overfull }
}

fn has_overfull(lines: &[BrokenLine]) -> bool {
    lines.iter().any(|line| line.ratio < -1.0 - EPS)
}

/// A candidate break point.
struct Candidate {
    /// The index of the break item (`n` for the end of the stream).
    at: usize,
    /// The break cost.
    cost: Cost,
    /// Whether the break is flagged.
    flagged: bool,
    /// The width added to the line when this break is taken.
    width: Abs,
}

/// An entry in the dynamic programming table.
struct Entry {
    /// The index of the predecessor entry.
    pred: usize,
    /// The accumulated demerits of the chain ending here.
    total: Cost,
    /// The index of the break item.
    at: usize,
    /// Where the line ending at this break starts.
    start: usize,
    /// The line's adjustment ratio.
    ratio: f64,
    /// The line's natural width.
    width: Abs,
    /// The number of lines in the chain.
    lines: u32,
    /// Whether the break is flagged.
    flagged: bool,
    /// How many flagged breaks end consecutively at this one.
    consecutive: u32,
    /// The fitness class of the line ending here.
    fitness: u8,
    /// Whether the line ends the stream or a forced sub-stream.
    terminal: bool,
    /// Whether every line in the chain respects the tolerance.
    ok: bool,
}

/// Run the dynamic program at one tolerance. The second return value tells
/// whether the winning chain respects the tolerance throughout.
fn attempt(
    items: &[Item],
    widths: &Widths,
    config: &LineBreakConfig,
    tolerance: f64,
) -> (Vec<BrokenLine>, bool) {
    let n = items.len();

    // Prefix sums of width, stretchability and shrinkability.
    let mut width_at = vec![Abs::zero(); n + 1];
    let mut stretch_at = vec![Abs::zero(); n + 1];
    let mut shrink_at = vec![Abs::zero(); n + 1];
    for (k, item) in items.iter().enumerate() {
        width_at[k + 1] = width_at[k] + item.width();
        let (stretch, shrink) = match *item {
            Item::Glue { stretch, shrink, .. } => (stretch, shrink),
            _ => (Abs::zero(), Abs::zero()),
        };
        stretch_at[k + 1] = stretch_at[k] + stretch;
        shrink_at[k + 1] = shrink_at[k] + shrink;
    }

    // After a break, glue and unforced penalties at the line start are
    // discarded.
    let next_start = |after: usize| -> usize {
        let mut k = after;
        while k < n {
            match items[k] {
                Item::Box { .. } => break,
                Item::Penalty { cost, .. } if cost == FORCED => break,
                _ => k += 1,
            }
        }
        k
    };

    let mut candidates: Vec<Candidate> = vec![];
    for (i, item) in items.iter().enumerate() {
        match *item {
            Item::Penalty { cost, flagged, width } if cost < FORBIDDEN => {
                candidates.push(Candidate { at: i, cost, flagged, width });
            }
            Item::Glue { .. } if i > 0 && matches!(items[i - 1], Item::Box { .. }) => {
                candidates.push(Candidate {
                    at: i,
                    cost: 0.0,
                    flagged: false,
                    width: Abs::zero(),
                });
            }
            _ => {}
        }
    }

    // The end of the stream is a break point unless the stream already ends
    // with a forced break.
    if !matches!(items[n - 1], Item::Penalty { cost, .. } if cost == FORCED) {
        candidates.push(Candidate {
            at: n,
            cost: FORCED,
            flagged: false,
            width: Abs::zero(),
        });
    }

    // The dynamic programming table, seeded with the start of the paragraph.
    let mut table = vec![Entry {
        pred: 0,
        total: 0.0,
        at: 0,
        start: 0,
        ratio: 0.0,
        width: Abs::zero(),
        lines: 0,
        flagged: false,
        consecutive: 0,
        fitness: 1,
        terminal: false,
        ok: true,
    }];
    let mut active = 0;

    for cand in &candidates {
        let forced = cand.cost == FORCED;
        let terminal = forced || cand.at == n;
        let mut best: Option<Entry> = None;

        // Find the optimal predecessor.
        for (i, pred) in table.iter().enumerate() {
            if i < active {
                continue;
            }

            let start = if pred.at == 0 && pred.lines == 0 {
                next_start(0)
            } else {
                next_start(pred.at + 1)
            };
            if start > cand.at {
                continue;
            }

            // The line's natural extent, including the break item's own
            // width when the break is taken at a penalty.
            let natural = width_at[cand.at] - width_at[start] + cand.width;
            let stretch = stretch_at[cand.at] - stretch_at[start];
            let shrink = shrink_at[cand.at] - shrink_at[start];
            let target = widths.line(pred.lines as usize);

            let delta = target - natural;
            let mut ratio = if delta > Abs::zero() {
                if stretch > Abs::zero() { delta / stretch } else { f64::INFINITY }
            } else if delta < Abs::zero() {
                if shrink > Abs::zero() { delta / shrink } else { f64::NEG_INFINITY }
            } else {
                0.0
            };

            // A terminal line need not fill the measure.
            if terminal && ratio > 0.0 {
                ratio = 0.0;
            }

            let feasible = if ratio < -1.0 - EPS {
                // The line is overfull. Any longer line from this
                // predecessor will be too, so it can be deactivated.
                active = i + 1;
                false
            } else {
                terminal || ratio <= tolerance + EPS
            };

            // The demerits of this line.
            let p = if cand.cost.is_finite() { cand.cost } else { 0.0 };
            let capped = ratio.abs().min(RATIO_CAP);
            let mut demerits = (1.0 + 100.0 * capped.powi(3) + p).powi(2);

            // Breaking at flagged penalties on consecutive lines reads
            // badly; each additional one costs more.
            let consecutive = if cand.flagged && pred.flagged {
                pred.consecutive + 1
            } else {
                u32::from(cand.flagged)
            };
            if consecutive > 1 {
                demerits += config.flagged_demerits * f64::from(consecutive).powi(2);
            }

            // Visibly different looseness between adjacent lines.
            let fitness = fitness_class(ratio);
            if pred.lines > 0 && fitness.abs_diff(pred.fitness) > 1 {
                demerits += config.fitness_demerits;
            }

            if !feasible {
                demerits = MAX_DEMERITS;
            }

            let total = pred.total + demerits;
            let lines = pred.lines + 1;
            let ok = pred.ok && feasible;

            // Strictly better, or equal with fewer lines wins; scanning
            // predecessors left to right keeps the earliest break on full
            // ties.
            let better = match &best {
                None => true,
                Some(best) => {
                    total < best.total || (total == best.total && lines < best.lines)
                }
            };

            if better {
                best = Some(Entry {
                    pred: i,
                    total,
                    at: cand.at,
                    start,
                    ratio,
                    width: natural,
                    lines,
                    flagged: cand.flagged,
                    consecutive,
                    fitness,
                    terminal,
                    ok,
                });
            }
        }

        let Some(best) = best else { continue };
        table.push(best);

        // No line can span across a forced break.
        if forced {
            active = table.len() - 1;
        }
    }

    // Retrace the best chain from the last breakpoint.
    let mut lines = vec![];
    let mut idx = table.len() - 1;
    let ok = table[idx].ok;
    while idx != 0 {
        let entry = &table[idx];
        lines.push(BrokenLine {
            range: entry.start..entry.at,
            ratio: entry.ratio,
            width: entry.width,
            terminal: entry.terminal,
            flagged: entry.flagged,
        });
        idx = entry.pred;
    }

    lines.reverse();
    (lines, ok)
}

/// The fitness class of a line: 0 = tight, 1 = decent, 2 = loose,
/// 3 = very loose.
fn fitness_class(ratio: f64) -> u8 {
    if ratio < -0.5 {
        0
    } else if ratio <= 0.5 {
        1
    } else if ratio <= 1.0 {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(width: f64) -> Item {
        Item::Box { width: Abs::pt(width), frag: 0 }
    }

    fn space(width: f64) -> Item {
        Item::Glue {
            width: Abs::pt(width),
            stretch: Abs::pt(width / 3.0),
            shrink: Abs::pt(width / 6.0),
        }
    }

    fn stream(words: usize, word_width: f64, space_width: f64) -> Vec<Item> {
        let mut items = vec![];
        for i in 0..words {
            if i > 0 {
                items.push(space(space_width));
            }
            items.push(word(word_width));
        }
        items
    }

    fn config() -> LineBreakConfig {
        LineBreakConfig::default()
    }

    #[test]
    fn test_empty_stream() {
        let breaks = break_lines(&[], &Widths::Constant(Abs::pt(100.0)), &config());
        assert!(breaks.lines.is_empty());
    }

    #[test]
    fn test_single_word_is_one_short_line() {
        let items = [word(30.0)];
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(100.0)), &config());
        assert_eq!(breaks.lines.len(), 1);
        let line = &breaks.lines[0];
        assert!(line.terminal);
        assert_eq!(line.ratio, 0.0);
        assert_eq!(line.width, Abs::pt(30.0));
    }

    #[test]
    fn test_justification_law() {
        // 12 words of 20pt with 5pt spaces against a 70pt measure.
        let items = stream(12, 20.0, 5.0);
        let target = Abs::pt(70.0);
        let breaks = break_lines(&items, &Widths::Constant(target), &config());
        assert!(breaks.lines.len() > 1);

        for line in &breaks.lines[..breaks.lines.len() - 1] {
            let stretch: Abs = items[line.range.clone()]
                .iter()
                .map(|item| match *item {
                    Item::Glue { stretch, shrink, .. } => {
                        if line.ratio >= 0.0 { stretch } else { shrink }
                    }
                    _ => Abs::zero(),
                })
                .sum();
            let set = line.width + stretch * line.ratio;
            assert!(
                set.approx_eq(target),
                "non-terminal line set to {set:?}, want {target:?}",
            );
        }
    }

    #[test]
    fn test_ratios_within_tolerance_on_first_pass() {
        let items = stream(30, 18.0, 6.0);
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(120.0)), &config());
        assert!(!breaks.emergency);
        for line in &breaks.lines {
            assert!(line.ratio >= -1.0 - 1e-9);
            assert!(line.ratio <= 2.0 + 1e-9);
        }
    }

    #[test]
    fn test_forced_break_partitions_stream() {
        let mut items = stream(2, 10.0, 5.0);
        items.push(Item::Penalty { width: Abs::zero(), cost: FORCED, flagged: false });
        items.extend(stream(2, 10.0, 5.0));

        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(200.0)), &config());
        assert_eq!(breaks.lines.len(), 2);
        assert!(breaks.lines[0].terminal);
        assert!(breaks.lines[1].terminal);
        // The short first line is not stretched.
        assert_eq!(breaks.lines[0].ratio, 0.0);
    }

    #[test]
    fn test_forbidden_penalty_is_never_taken() {
        // A forbidden penalty between the only two break chances.
        let items = [
            word(60.0),
            Item::Penalty { width: Abs::zero(), cost: FORBIDDEN, flagged: false },
            word(60.0),
        ];
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(70.0)), &config());
        // Nothing to break at: one overfull line survives both passes.
        assert_eq!(breaks.lines.len(), 1);
        assert!(breaks.overfull);
    }

    #[test]
    fn test_overlong_word_flagged_as_overfull() {
        let items = stream(3, 150.0, 5.0);
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(100.0)), &config());
        assert!(breaks.overfull);
    }

    #[test]
    fn test_emergency_pass_loosens_tolerance() {
        // Two words that fit only with extreme stretching of one space.
        let items = [word(10.0), space(3.0), word(10.0), space(3.0), word(80.0)];
        let tight = LineBreakConfig {
            tolerance_first_pass: 0.1,
            ..LineBreakConfig::default()
        };
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(100.0)), &tight);
        assert!(breaks.emergency);
        assert!(!breaks.overfull);
    }

    #[test]
    fn test_trailing_forced_break_adds_no_empty_line() {
        let mut items = stream(2, 10.0, 5.0);
        items.push(Item::Penalty { width: Abs::zero(), cost: FORCED, flagged: false });
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(100.0)), &config());
        assert_eq!(breaks.lines.len(), 1);
    }

    #[test]
    fn test_flagged_break_recorded() {
        let items = [
            word(45.0),
            Item::Penalty { width: Abs::pt(5.0), cost: 50.0, flagged: true },
            word(45.0),
        ];
        let breaks = break_lines(&items, &Widths::Constant(Abs::pt(50.0)), &config());
        assert_eq!(breaks.lines.len(), 2);
        assert!(breaks.lines[0].flagged);
        // The taken penalty's width counts towards the line.
        assert_eq!(breaks.lines[0].width, Abs::pt(50.0));
    }
}
