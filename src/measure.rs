//! Text measurement and its cache.
//!
//! Measurement is always the sum of glyph advances plus the font's scaled
//! vertical metrics; the cache only short-circuits recomputation. It is owned
//! by the build session, re-created per document, and never invalidated
//! mid-build, so identical queries yield identical results across solver
//! iterations.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use ecow::{eco_format, EcoString};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::diag::{Severity, Warning};
use crate::font::{FontId, FontProvider};
use crate::geom::Abs;
use crate::linebreak::BrokenLine;

/// The measured extent of a text run.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RunMetrics {
    /// The sum of the glyph advances.
    pub width: Abs,
    /// The distance from the baseline to the top of the text box.
    pub ascent: Abs,
    /// The distance from the baseline to the bottom of the text box.
    pub descent: Abs,
}

/// Cache key for a run measurement.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct RunKey {
    text: EcoString,
    font: FontId,
    size: Abs,
    flags: u8,
}

/// Cache key for a composite measurement (e.g. a broken paragraph).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct ParKey {
    digest: u64,
    width: Abs,
}

struct Slot<T> {
    value: T,
    last_used: u64,
}

/// The measurement session: a font provider plus memoization tables.
///
/// Writers are serialized through the interior `RefCell`s; readers get values
/// out by copy. The session records each distinct missing glyph once and
/// surfaces the collected warnings at the end of the build.
pub struct Measurements<'a> {
    provider: &'a dyn FontProvider,
    capacity: usize,
    stamp: RefCell<u64>,
    runs: RefCell<FxHashMap<RunKey, Slot<RunMetrics>>>,
    lines: RefCell<FxHashMap<ParKey, Slot<Rc<Vec<BrokenLine>>>>>,
    missing: RefCell<FxHashSet<(FontId, char)>>,
}

impl<'a> Measurements<'a> {
    /// Create a session over a font provider.
    pub fn new(provider: &'a dyn FontProvider, capacity: usize) -> Self {
        Self {
            provider,
            capacity: capacity.max(1),
            stamp: RefCell::new(0),
            runs: RefCell::new(FxHashMap::default()),
            lines: RefCell::new(FxHashMap::default()),
            missing: RefCell::new(FxHashSet::default()),
        }
    }

    /// The font provider backing this session.
    pub fn provider(&self) -> &dyn FontProvider {
        self.provider
    }

    /// The advance width of a single codepoint, falling back to the font's
    /// `.notdef` advance for missing glyphs.
    pub fn advance(&self, font: FontId, size: Abs, c: char) -> Abs {
        match self.provider.advance(font, c) {
            Some(em) => em.at(size),
            None => {
                self.missing.borrow_mut().insert((font, c));
                self.provider.notdef_advance(font).at(size)
            }
        }
    }

    /// Measure a run of text in a single font and size.
    pub fn run(&self, text: &str, font: FontId, size: Abs, flags: u8) -> RunMetrics {
        let key = RunKey { text: text.into(), font, size, flags };
        let stamp = self.bump();

        if let Some(slot) = self.runs.borrow_mut().get_mut(&key) {
            slot.last_used = stamp;
            return slot.value;
        }

        let width = text.chars().map(|c| self.advance(font, size, c)).sum();
        let scaled = self.provider.metrics(font).at(size);
        let value = RunMetrics {
            width,
            ascent: scaled.ascent,
            descent: scaled.descent,
        };

        let mut runs = self.runs.borrow_mut();
        runs.insert(key, Slot { value, last_used: stamp });
        if runs.len() > self.capacity {
            evict(&mut runs, self.capacity);
        }

        value
    }

    /// Memoize a paragraph's break result under a digest of its item stream
    /// and the target width.
    pub fn lines(
        &self,
        digest: u64,
        width: Abs,
        compute: impl FnOnce() -> Vec<BrokenLine>,
    ) -> Rc<Vec<BrokenLine>> {
        let key = ParKey { digest, width };
        let stamp = self.bump();

        if let Some(slot) = self.lines.borrow_mut().get_mut(&key) {
            slot.last_used = stamp;
            return Rc::clone(&slot.value);
        }

        let value = Rc::new(compute());
        let mut lines = self.lines.borrow_mut();
        lines.insert(key, Slot { value: Rc::clone(&value), last_used: stamp });
        if lines.len() > self.capacity {
            evict(&mut lines, self.capacity);
        }

        value
    }

    /// Drain the recorded missing glyphs into warnings, in a deterministic
    /// order.
    pub fn take_missing_warnings(&self) -> Vec<Warning> {
        let mut missing: Vec<_> = self.missing.borrow_mut().drain().collect();
        missing.sort();
        missing
            .into_iter()
            .map(|(font, c)| Warning {
                severity: Severity::Warning,
                rule: None,
                block: None,
                page: None,
                message: eco_format!(
                    "font {} has no glyph for {c:?} (U+{:04X}); substituted .notdef",
                    font.0,
                    u32::from(c),
                ),
            })
            .collect()
    }

    fn bump(&self) -> u64 {
        let mut stamp = self.stamp.borrow_mut();
        *stamp += 1;
        *stamp
    }
}

/// Drop the least recently used entries until the table is back at capacity.
fn evict<K: Eq + Hash, T>(table: &mut FxHashMap<K, Slot<T>>, capacity: usize) {
    let excess = table.len().saturating_sub(capacity);
    let mut stamps: Vec<u64> = table.values().map(|slot| slot.last_used).collect();
    stamps.sort_unstable();
    let cutoff = stamps[excess - 1];
    table.retain(|_, slot| slot.last_used > cutoff);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontMetrics, FontStyle};
    use crate::geom::Em;

    /// Every glyph advances half an em; `#` is missing from the font.
    struct HalfEm;

    impl FontProvider for HalfEm {
        fn select(&self, _: &str, _: FontStyle) -> Option<FontId> {
            Some(FontId(0))
        }

        fn metrics(&self, _: FontId) -> FontMetrics {
            FontMetrics {
                ascender: Em::new(0.8),
                descender: Em::new(0.2),
                x_height: Em::new(0.5),
                cap_height: Em::new(0.7),
                line_gap: Em::zero(),
            }
        }

        fn advance(&self, _: FontId, c: char) -> Option<Em> {
            (c != '#').then(|| Em::new(0.5))
        }

        fn notdef_advance(&self, _: FontId) -> Em {
            Em::new(1.0)
        }
    }

    #[test]
    fn test_run_is_sum_of_glyphs() {
        let measure = Measurements::new(&HalfEm, 16);
        let font = FontId(0);
        let size = Abs::pt(10.0);

        let run = measure.run("hello", font, size, 0);
        let glyphs: Abs = "hello".chars().map(|c| measure.advance(font, size, c)).sum();
        assert!(run.width.approx_eq(glyphs));
        assert_eq!(run.width, Abs::pt(25.0));
        assert_eq!(run.ascent + run.descent, Abs::pt(10.0));
    }

    #[test]
    fn test_cache_is_transparent() {
        let measure = Measurements::new(&HalfEm, 2);
        let font = FontId(0);
        let size = Abs::pt(12.0);

        let first = measure.run("alpha", font, size, 0);
        // Evict "alpha" by inserting past capacity.
        measure.run("beta", font, size, 0);
        measure.run("gamma", font, size, 0);
        measure.run("delta", font, size, 0);
        let again = measure.run("alpha", font, size, 0);
        assert_eq!(first, again);
    }

    #[test]
    fn test_missing_glyph_warns_once() {
        let measure = Measurements::new(&HalfEm, 16);
        let font = FontId(0);
        let size = Abs::pt(10.0);

        assert_eq!(measure.advance(font, size, '#'), Abs::pt(10.0));
        measure.run("##", font, size, 0);
        let warnings = measure.take_missing_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }
}
