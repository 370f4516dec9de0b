//! Build configuration.
//!
//! All options are passed in by value; the engine never reads configuration
//! from the environment. The structs deserialize from any serde format the
//! embedder chooses.

use std::collections::BTreeMap;

use ecow::EcoString;
use serde::Deserialize;

use crate::diag::Severity;
use crate::geom::{Abs, Sides, Size};

/// The complete configuration for one build.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page geometry.
    pub page: PageConfig,
    /// Fonts, sizes and spacing.
    pub typography: TypographyConfig,
    /// Line breaker tuning.
    pub line_breaking: LineBreakConfig,
    /// Per-rule settings, keyed by rule id.
    pub rules: RulesConfig,
    /// Constraint solver tuning.
    pub solver: SolverConfig,
    /// Measurement cache tuning.
    pub cache: CacheConfig,
}

/// Page dimensions and margins, in points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// The width of the page.
    pub width: Abs,
    /// The height of the page.
    pub height: Abs,
    /// The margins on each side.
    pub margins: Sides<Abs>,
}

impl PageConfig {
    /// The page size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// The width of the area inside the margins.
    pub fn content_width(&self) -> Abs {
        self.width - self.margins.sum_x()
    }

    /// The height of the area inside the margins.
    pub fn content_height(&self) -> Abs {
        self.height - self.margins.sum_y()
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        // US letter.
        Self {
            width: Abs::pt(612.0),
            height: Abs::pt(792.0),
            margins: Sides::splat(Abs::inches(1.0)),
        }
    }
}

/// Fonts, sizes and block spacing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TypographyConfig {
    /// The font family for body text.
    pub body_font: EcoString,
    /// The font family for code.
    pub code_font: EcoString,
    /// The body font size.
    pub body_size: Abs,
    /// Heading font sizes by level, index 0 = level 1.
    pub heading_sizes: [Abs; 6],
    /// Line height as a multiple of the font size.
    pub line_height_factor: f64,
    /// Vertical space after a paragraph.
    pub paragraph_spacing: Abs,
    /// Vertical space before a heading.
    pub heading_spacing_before: Abs,
    /// Vertical space after a heading.
    pub heading_spacing_after: Abs,
    /// Horizontal indent per list nesting level.
    pub list_indent: Abs,
    /// Padding inside table cells.
    pub table_cell_padding: Abs,
}

impl TypographyConfig {
    /// The font size for a heading of the given 1-based level.
    pub fn heading_size(&self, level: u8) -> Abs {
        let idx = usize::from(level.clamp(1, 6)) - 1;
        self.heading_sizes[idx]
    }

    /// The resolved distance between two consecutive baselines.
    pub fn leading(&self, size: Abs) -> Abs {
        size * self.line_height_factor
    }
}

impl Default for TypographyConfig {
    fn default() -> Self {
        Self {
            body_font: "serif".into(),
            code_font: "monospace".into(),
            body_size: Abs::pt(12.0),
            heading_sizes: [
                Abs::pt(24.0),
                Abs::pt(20.0),
                Abs::pt(16.0),
                Abs::pt(14.0),
                Abs::pt(12.0),
                Abs::pt(12.0),
            ],
            line_height_factor: 1.2,
            paragraph_spacing: Abs::pt(6.0),
            heading_spacing_before: Abs::pt(12.0),
            heading_spacing_after: Abs::pt(6.0),
            list_indent: Abs::pt(18.0),
            table_cell_padding: Abs::pt(4.0),
        }
    }
}

/// Line breaker tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LineBreakConfig {
    /// The maximum adjustment ratio accepted in the first pass.
    pub tolerance_first_pass: f64,
    /// The maximum adjustment ratio accepted in the emergency pass.
    pub tolerance_second_pass: f64,
    /// Extra demerits for consecutive flagged breaks.
    pub flagged_demerits: f64,
    /// Extra demerits for a fitness class mismatch between adjacent lines.
    pub fitness_demerits: f64,
}

impl Default for LineBreakConfig {
    fn default() -> Self {
        Self {
            tolerance_first_pass: 2.0,
            tolerance_second_pass: f64::INFINITY,
            flagged_demerits: 100.0,
            fitness_demerits: 3000.0,
        }
    }
}

/// Settings for a single rule, applied on top of its built-in defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Whether the rule runs at all.
    pub enabled: bool,
    /// Overrides the rule's built-in severity.
    pub severity: Option<Severity>,
    /// `min-spacing`: the smallest allowed inter-block gap.
    pub min: Option<Abs>,
    /// `max-lines-per-page`: the largest allowed number of lines.
    pub max: Option<usize>,
    /// `min-page-fullness`: the smallest allowed used ratio.
    pub threshold: Option<f64>,
    /// `balanced-spacing`: the allowed relative gap deviation.
    pub tolerance: Option<f64>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
            min: None,
            max: None,
            threshold: None,
            tolerance: None,
        }
    }
}

/// Per-rule settings, keyed by rule id.
///
/// Rules not present in the map run with their built-in defaults. The map is
/// ordered so that iteration over configured rules is deterministic.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RulesConfig(pub BTreeMap<EcoString, RuleSettings>);

impl RulesConfig {
    /// The settings for the given rule id, if any were configured.
    pub fn get(&self, id: &str) -> Option<&RuleSettings> {
        self.0.get(id)
    }

    /// Whether the given rule is enabled.
    pub fn enabled(&self, id: &str) -> bool {
        self.get(id).map_or(true, |s| s.enabled)
    }

    /// The smallest allowed inter-block gap.
    pub fn min_spacing(&self) -> Abs {
        self.get("min-spacing")
            .and_then(|s| s.min)
            .unwrap_or(Abs::pt(6.0))
    }

    /// The largest allowed number of lines per page.
    pub fn max_lines_per_page(&self) -> usize {
        self.get("max-lines-per-page").and_then(|s| s.max).unwrap_or(50)
    }

    /// The smallest allowed used ratio for non-terminal pages.
    pub fn min_page_fullness(&self) -> f64 {
        self.get("min-page-fullness")
            .and_then(|s| s.threshold)
            .unwrap_or(0.7)
    }

    /// The allowed relative deviation between consecutive gaps.
    pub fn balanced_spacing_tolerance(&self) -> f64 {
        self.get("balanced-spacing")
            .and_then(|s| s.tolerance)
            .unwrap_or(0.2)
    }
}

/// Constraint solver tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// How many refinement iterations to run at most.
    pub max_iterations: usize,
    /// How many violations to address per iteration.
    pub top_k_violations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_iterations: 10, top_k_violations: 3 }
    }
}

/// Measurement cache tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How many run measurements to keep before evicting.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 2048 }
    }
}
