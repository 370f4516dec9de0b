//! Font metrics.
//!
//! The engine needs nothing from a font but horizontal advances and a handful
//! of vertical metrics. Those are extracted once when a font is registered;
//! afterwards every lookup is a pure table access with no I/O.

use ecow::{eco_format, EcoString};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use ttf_parser::GlyphId;

use crate::diag::StrResult;
use crate::geom::{Abs, Em};

/// Identifies a registered font.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontId(pub u16);

/// The weight and slant axes the engine distinguishes.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontStyle {
    /// Whether the bold face is requested.
    pub bold: bool,
    /// Whether the italic face is requested.
    pub italic: bool,
}

impl FontStyle {
    /// The regular style.
    pub const REGULAR: Self = Self { bold: false, italic: false };

    /// The bold style.
    pub const BOLD: Self = Self { bold: true, italic: false };

    /// The italic style.
    pub const ITALIC: Self = Self { bold: false, italic: true };
}

/// Font-relative vertical metrics.
///
/// All values are in ems; the descender is stored as a positive depth below
/// the baseline.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FontMetrics {
    /// The typographic ascender.
    pub ascender: Em,
    /// The typographic descender, as a positive depth.
    pub descender: Em,
    /// The height of the lowercase x.
    pub x_height: Em,
    /// The approximate height of capital letters.
    pub cap_height: Em,
    /// The recommended extra gap between lines.
    pub line_gap: Em,
}

impl FontMetrics {
    /// Resolve the metrics at a font size, in points.
    pub fn at(&self, size: Abs) -> ScaledMetrics {
        ScaledMetrics {
            ascent: self.ascender.at(size),
            descent: self.descender.at(size),
            x_height: self.x_height.at(size),
            cap_height: self.cap_height.at(size),
            line_gap: self.line_gap.at(size),
        }
    }
}

/// [`FontMetrics`] resolved at a concrete size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScaledMetrics {
    /// The distance from the baseline to the top of the text box.
    pub ascent: Abs,
    /// The distance from the baseline to the bottom of the text box.
    pub descent: Abs,
    /// The height of the lowercase x.
    pub x_height: Abs,
    /// The approximate height of capital letters.
    pub cap_height: Abs,
    /// The recommended extra gap between lines.
    pub line_gap: Abs,
}

/// Supplies glyph advances and vertical metrics for registered fonts.
///
/// Implementations must be pure: the same query always yields the same
/// answer for the lifetime of a build session.
pub trait FontProvider {
    /// Resolve a family and style to a font.
    fn select(&self, family: &str, style: FontStyle) -> Option<FontId>;

    /// The vertical metrics of a font.
    fn metrics(&self, id: FontId) -> FontMetrics;

    /// The advance width of the glyph a codepoint maps to, or `None` if the
    /// font has no glyph for it.
    fn advance(&self, id: FontId, c: char) -> Option<Em>;

    /// The advance of the font's `.notdef` glyph, used as the fallback for
    /// missing glyphs.
    fn notdef_advance(&self, id: FontId) -> Em;
}

/// A collection of fonts parsed from raw font programs.
#[derive(Debug, Default)]
pub struct FontBook {
    fonts: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    family: EcoString,
    style: FontStyle,
    metrics: FontMetrics,
    advances: FxHashMap<char, Em>,
    notdef: Em,
}

impl FontBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a font program and register it under a family name and style.
    ///
    /// The program is fully digested here; the book keeps no reference to the
    /// data afterwards.
    pub fn register(
        &mut self,
        family: impl Into<EcoString>,
        style: FontStyle,
        data: &[u8],
        index: u32,
    ) -> StrResult<FontId> {
        let family = family.into();
        let face = ttf_parser::Face::parse(data, index)
            .map_err(|err| eco_format!("failed to parse font {family}: {err}"))?;

        let upem = f64::from(face.units_per_em());
        let to_em = |units: f64| Em::from_units(units, upem);

        let ascender = to_em(face.ascender().into());
        let descender = to_em(f64::from(-face.descender()));
        let metrics = FontMetrics {
            ascender,
            descender,
            x_height: face
                .x_height()
                .map(|h| to_em(h.into()))
                .unwrap_or(ascender * 0.5),
            cap_height: face
                .capital_height()
                .map(|h| to_em(h.into()))
                .unwrap_or(ascender),
            line_gap: to_em(face.line_gap().into()),
        };

        let mut advances = FxHashMap::default();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let Some(c) = char::from_u32(cp) {
                        if let Some(glyph) = face.glyph_index(c) {
                            if let Some(advance) = face.glyph_hor_advance(glyph) {
                                advances.entry(c).or_insert_with(|| to_em(advance.into()));
                            }
                        }
                    }
                });
            }
        }

        let notdef = face
            .glyph_hor_advance(GlyphId(0))
            .map(|units| to_em(units.into()))
            .unwrap_or(Em::new(0.5));

        let id = FontId(self.fonts.len() as u16);
        self.fonts.push(Entry { family, style, metrics, advances, notdef });
        Ok(id)
    }

    fn entry(&self, id: FontId) -> &Entry {
        &self.fonts[usize::from(id.0)]
    }
}

impl FontProvider for FontBook {
    fn select(&self, family: &str, style: FontStyle) -> Option<FontId> {
        let find = |style: FontStyle| {
            self.fonts
                .iter()
                .position(|entry| {
                    entry.style == style && entry.family.eq_ignore_ascii_case(family)
                })
                .map(|idx| FontId(idx as u16))
        };

        // Fall back to the family's regular face if the exact style is not
        // registered.
        find(style).or_else(|| find(FontStyle::REGULAR))
    }

    fn metrics(&self, id: FontId) -> FontMetrics {
        self.entry(id).metrics
    }

    fn advance(&self, id: FontId, c: char) -> Option<Em> {
        self.entry(id).advances.get(&c).copied()
    }

    fn notdef_advance(&self, id: FontId) -> Em {
        self.entry(id).notdef
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_scale_linearly() {
        let metrics = FontMetrics {
            ascender: Em::new(0.8),
            descender: Em::new(0.2),
            x_height: Em::new(0.5),
            cap_height: Em::new(0.7),
            line_gap: Em::new(0.0),
        };

        let scaled = metrics.at(Abs::pt(10.0));
        assert_eq!(scaled.ascent, Abs::pt(8.0));
        assert_eq!(scaled.descent, Abs::pt(2.0));
        assert_eq!(scaled.ascent + scaled.descent, Abs::pt(10.0));
    }
}
