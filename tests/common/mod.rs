//! Shared fixtures: a deterministic synthetic font, math engine and image
//! provider, plus document builders.

// Not every test crate uses every fixture.
#![allow(dead_code)]

use compose::config::Config;
use compose::diag::StrResult;
use compose::doc::{BlockNode, Document, InlineNode};
use compose::font::{FontId, FontMetrics, FontProvider, FontStyle};
use compose::geom::{Abs, Color, Em, Size};
use compose::image::{ImageInfo, ImageProvider};
use compose::layout::par::ParEnv;
use compose::layout::{BlockBody, NodeId, RuleLayout, SourceBlock};
use compose::math::{MathBox, MathEngine, MathMode};
use compose::measure::Measurements;

/// A synthetic font: every glyph advances half an em, ascender 0.8em,
/// descender 0.2em. At 12pt this gives 6pt glyphs and a 12pt text box.
pub struct TestFont;

impl FontProvider for TestFont {
    fn select(&self, _: &str, style: FontStyle) -> Option<FontId> {
        // One face per style, so runs in different styles stay distinct.
        Some(FontId(u16::from(style.bold) | u16::from(style.italic) << 1))
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

    fn advance(&self, _: FontId, _: char) -> Option<Em> {
        Some(Em::new(0.5))
    }

    fn notdef_advance(&self, _: FontId) -> Em {
        Em::new(0.5)
    }
}

/// A math engine with fixed-size boxes: 6pt per source char, 20pt tall.
pub struct TestMath;

impl MathEngine for TestMath {
    fn measure(&self, tex: &str, _: MathMode) -> StrResult<MathBox> {
        Ok(MathBox {
            width: Abs::pt(6.0 * tex.chars().count() as f64),
            height: Abs::pt(20.0),
            ascent: Abs::pt(14.0),
            descent: Abs::pt(6.0),
            handle: tex.len() as u64,
        })
    }
}

/// Images by well-known name.
pub struct TestImages;

impl ImageProvider for TestImages {
    fn query(&self, src: &str) -> Option<ImageInfo> {
        let (width, height, handle) = match src {
            "small.png" => (100.0, 80.0, 1),
            "tall.png" => (300.0, 500.0, 2),
            "giant.png" => (300.0, 700.0, 3),
            "wide.png" => (700.0, 100.0, 4),
            _ => return None,
        };
        Some(ImageInfo {
            size: Size::new(Abs::pt(width), Abs::pt(height)),
            handle,
        })
    }
}

/// Run a closure with a fully wired layout environment.
pub fn with_env<R>(config: &Config, f: impl FnOnce(&ParEnv) -> R) -> R {
    let measure = Measurements::new(&TestFont, config.cache.capacity);
    let env = ParEnv {
        config,
        measure: &measure,
        math: &TestMath,
        images: &TestImages,
    };
    f(&env)
}

/// Typeset a document with the default configuration and the test fixtures.
pub fn typeset(doc: &Document) -> compose::diag::Pass<compose::layout::LayoutState> {
    compose::typeset(doc, &Config::default(), &TestFont, &TestImages, &TestMath)
        .expect("layout failed")
}

/// A paragraph of `words` five-letter words.
pub fn long_paragraph(words: usize) -> BlockNode {
    let mut text = String::new();
    for i in 0..words {
        if i > 0 {
            text.push(' ');
        }
        text.push_str("lorem");
    }
    BlockNode::Paragraph { children: vec![InlineNode::text(text)] }
}

/// A document from a list of blocks.
pub fn document(blocks: Vec<BlockNode>) -> Document {
    Document { blocks }
}

/// An unbreakable filler block of the given height, used to pin where the
/// following content starts.
pub fn spacer(node: u32, height: f64) -> SourceBlock {
    SourceBlock {
        node: NodeId(node),
        body: BlockBody::Rule(RuleLayout {
            thickness: Abs::pt(height),
            color: Color::BLACK,
        }),
        height: Abs::pt(height),
        keep_with_next: false,
        keep_together: false,
        breakable: false,
        spacing_before: Abs::zero(),
        spacing_after: Abs::pt(6.0),
    }
}

/// Measure a lone paragraph into a source block with the given node id.
pub fn paragraph_source(words: usize, node: u32, env: &ParEnv) -> SourceBlock {
    let doc = document(vec![long_paragraph(words)]);
    let mut sources = compose::layout::measure_document(&doc, env)
        .expect("measurement failed")
        .output;
    assert_eq!(sources.len(), 1);
    let mut source = sources.remove(0);
    source.node = NodeId(node);
    source
}
