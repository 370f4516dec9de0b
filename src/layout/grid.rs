//! Table layout.
//!
//! Tables are sized in two passes: first the minimum (widest unbreakable box)
//! and maximum (unwrapped) width of every column is computed, then the
//! available width is distributed proportionally and each cell is laid out as
//! an independent paragraph at its column width.

use super::block::{BorderSeg, CellLayout, RowLayout, TableLayout};
use super::par::{self, ParEnv, ParSource, TextCx};
use crate::diag::{Feedback, LayoutResult};
use crate::doc::{ColAlign, InlineNode};
use crate::geom::{Abs, Point, Size};
use crate::linebreak::{Item, Widths};

/// The thickness of cell border rules.
const BORDER: Abs = Abs::pt(0.5);

/// Lay out a table into the available width.
pub fn layout_table(
    rows: &[Vec<Vec<InlineNode>>],
    alignments: &[ColAlign],
    available: Abs,
    env: &ParEnv,
    feedback: &mut Feedback,
) -> LayoutResult<TableLayout> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return Ok(TableLayout {
            columns: vec![],
            rows: vec![],
            borders: vec![],
            padding: Abs::zero(),
        });
    }

    let padding = env.config.typography.table_cell_padding;
    let cx = TextCx::body(env.config);

    // First pass: collect every cell once and track per-column extremes.
    let mut collected: Vec<Vec<(Vec<Item>, Vec<par::Frag>)>> = vec![];
    let mut min = vec![Abs::zero(); columns];
    let mut max = vec![Abs::zero(); columns];

    for row in rows {
        let mut cells = vec![];
        for (c, cell) in row.iter().enumerate() {
            let (items, frags) = par::collect(cell, &cx, env)?;
            let (cell_min, cell_max) = extremes(&items);
            min[c].set_max(cell_min + 2.0 * padding);
            max[c].set_max(cell_max + 2.0 * padding);
            cells.push((items, frags));
        }
        collected.push(cells);
    }

    let widths = distribute(&min, &max, available);
    let table_width: Abs = widths.iter().sum();

    // Second pass: lay out each cell at its column width.
    let leading = env.config.typography.leading(cx.size);
    let mut out_rows = vec![];
    let mut y = Abs::zero();

    for cells in collected {
        let mut out_cells = vec![];
        let mut row_height = Abs::zero();
        let mut x = Abs::zero();

        for (c, width) in widths.iter().copied().enumerate() {
            let inner = (width - 2.0 * padding).max(Abs::pt(1.0));
            let (items, frags) = match cells.get(c) {
                Some(cell) => cell.clone(),
                None => (vec![], vec![]),
            };

            let source = ParSource {
                items,
                frags,
                widths: Widths::Constant(inner),
                leading,
                cx: cx.clone(),
            };
            let mut par = par::layout_par(source, env, feedback)?;
            par::align_lines(&mut par, alignments.get(c).copied().unwrap_or_default());

            row_height.set_max(par.height + 2.0 * padding);
            out_cells.push(CellLayout { x: x + padding, width: inner, par });
            x += width;
        }

        // Every row is at least one line tall.
        row_height.set_max(leading + 2.0 * padding);
        out_rows.push(RowLayout { y, height: row_height, cells: out_cells });
        y += row_height;
    }

    let borders = borders(&widths, &out_rows, table_width, y);

    Ok(TableLayout { columns: widths, rows: out_rows, borders, padding })
}

/// The minimum (widest box) and maximum (unwrapped) width of a cell stream.
fn extremes(items: &[Item]) -> (Abs, Abs) {
    let mut min = Abs::zero();
    let mut max = Abs::zero();
    for item in items {
        match *item {
            Item::Box { width, .. } => {
                min.set_max(width);
                max += width;
            }
            Item::Glue { width, .. } => max += width,
            Item::Penalty { .. } => {}
        }
    }
    (min, max)
}

/// Distribute the available width over the columns.
fn distribute(min: &[Abs], max: &[Abs], available: Abs) -> Vec<Abs> {
    let total_max: Abs = max.iter().sum();
    if available.fits(total_max) {
        return max.to_vec();
    }

    // Shrink proportionally, but no column below its minimum. Columns pinned
    // at their minimum drop out and the rest is redistributed once.
    let scale = available / total_max;
    let mut widths: Vec<Abs> = max
        .iter()
        .zip(min)
        .map(|(&max, &min)| (max * scale).max(min))
        .collect();

    let pinned: Abs = widths
        .iter()
        .zip(max)
        .filter(|&(&w, &m)| w > m * scale)
        .map(|(&w, _)| w)
        .sum();
    let flexible: Abs = widths
        .iter()
        .zip(max)
        .filter(|&(&w, &m)| w <= m * scale)
        .map(|(&w, _)| w)
        .sum();

    let remaining = available - pinned;
    if flexible > Abs::zero() && remaining > Abs::zero() && remaining < flexible {
        let rescale = remaining / flexible;
        for (w, &m) in widths.iter_mut().zip(max) {
            if *w <= m * scale {
                *w *= rescale;
            }
        }
    }

    // Even the minimums do not fit: shrink purely proportionally and let the
    // cells split their overlong words.
    let total: Abs = widths.iter().sum();
    if !available.fits(total) {
        widths = max.iter().map(|&m| m * scale).collect();
    }

    widths
}

/// Cell borders as thin rules relative to the table's top-left corner.
fn borders(
    columns: &[Abs],
    rows: &[RowLayout],
    width: Abs,
    height: Abs,
) -> Vec<BorderSeg> {
    let mut segments = vec![];

    // Horizontal rules above each row and below the last.
    for row in rows {
        segments.push(BorderSeg {
            pos: Point::with_y(row.y),
            size: Size::new(width, BORDER),
        });
    }
    segments.push(BorderSeg {
        pos: Point::with_y(height - BORDER),
        size: Size::new(width, BORDER),
    });

    // Vertical rules left of each column and right of the last.
    let mut x = Abs::zero();
    for &column in columns {
        segments.push(BorderSeg {
            pos: Point::with_x(x),
            size: Size::new(BORDER, height),
        });
        x += column;
    }
    segments.push(BorderSeg {
        pos: Point::with_x(width - BORDER),
        size: Size::new(BORDER, height),
    });

    segments
}
