//! The layout and pagination engine for _Compose_, a Markdown typesetting
//! system with publication-quality output.
//!
//! # Steps
//! - **Measurement:** The document tree handed over by the parser is walked
//!   in order and turned into page-independent source blocks. Paragraphs are
//!   flattened into streams of boxes, glues and penalties, broken into lines
//!   by the [Knuth–Plass breaker][linebreak], and assembled into positioned
//!   runs; tables, code blocks, math blocks, rules and figures are measured
//!   into their own block bodies. Text measurement goes through a
//!   [session cache][measure] over the [font metrics provider][font].
//! - **Placement:** The measured blocks are poured onto pages with a
//!   downward-growing cursor, collapsing margins between neighbours and
//!   splitting breakable blocks at line boundaries. The result is an
//!   immutable [`LayoutState`].
//! - **Solving:** The [constraint solver][solve] runs the typographic rule
//!   set over the state, ranks violations, translates the suggested
//!   adjustments into placement pins and pours again, iterating to a fixed
//!   point or the configured cap. Residual violations become warnings.
//! - **Rendering:** The final state is handed to the [adapter][export],
//!   which converts coordinates for the target and emits typed drawing
//!   calls. Everything up to here is target-independent.
//!
//! The engine is single-threaded, synchronous and stateless across builds:
//! fonts and configuration are passed in explicitly, the measurement cache
//! lives and dies with one call to [`typeset`].

pub mod config;
pub mod diag;
pub mod doc;
pub mod export;
pub mod font;
pub mod geom;
pub mod image;
pub mod layout;
pub mod linebreak;
pub mod math;
pub mod measure;
pub mod solve;

use crate::config::Config;
use crate::diag::{LayoutResult, Pass};
use crate::doc::Document;
use crate::font::FontProvider;
use crate::image::ImageProvider;
use crate::layout::par::ParEnv;
use crate::layout::{AppliedLog, LayoutState, Pins};
use crate::math::MathEngine;
use crate::measure::Measurements;

/// Typeset a document into a solved, paginated layout.
///
/// This runs measurement, placement and constraint solving; rendering is the
/// caller's move via [`export::render`]. Warnings (residual rule violations,
/// missing glyphs, emergency line breaks) ride along in the returned pass;
/// input errors and internal invariant violations abort.
pub fn typeset(
    document: &Document,
    config: &Config,
    fonts: &dyn FontProvider,
    images: &dyn ImageProvider,
    math: &dyn MathEngine,
) -> LayoutResult<Pass<LayoutState>> {
    let measure = Measurements::new(fonts, config.cache.capacity);
    let env = ParEnv { config, measure: &measure, math, images };

    let Pass { output: sources, feedback: measured } =
        layout::measure_document(document, &env)?;

    let initial =
        layout::place(&sources, config, &Pins::default(), 0, &AppliedLog::default())?;

    let Pass { output: state, feedback: solved } =
        solve::solve(&sources, config, initial)?;

    let mut feedback = measured.join(solved);
    feedback.warnings.extend(measure.take_missing_warnings());
    Ok(Pass::new(state, feedback))
}
