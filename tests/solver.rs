//! End-to-end constraint solving scenarios.

mod common;

use common::*;

use compose::config::Config;
use compose::diag::Severity;
use compose::doc::{BlockNode, InlineNode};
use compose::export::{render, Recorder, VerticalOrigin};
use compose::geom::Abs;
use compose::layout::{self, AppliedLog, BlockBody, Pins, SourceBlock};
use compose::solve;

fn solve_sources(
    sources: &[SourceBlock],
    config: &Config,
) -> compose::diag::Pass<compose::layout::LayoutState> {
    let initial = layout::place(
        sources,
        config,
        &Pins::default(),
        0,
        &AppliedLog::default(),
    )
    .unwrap();
    solve::solve(sources, config, initial).unwrap()
}

fn lines_of(block: &compose::layout::Block) -> usize {
    block.body.par().map_or(0, |par| par.lines.len())
}

/// Scenario A: a heading followed by a long paragraph near the page top.
/// At least two paragraph lines must stay on page one.
#[test]
fn test_orphan_scenario_heading_then_long_paragraph() {
    let doc = document(vec![
        BlockNode::Heading { level: 1, children: vec![InlineNode::text("chapter")] },
        long_paragraph(780),
    ]);

    let pass = typeset(&doc);
    let state = &pass.output;

    let first_page = &state.pages[0];
    assert!(matches!(first_page.blocks[0].body, BlockBody::Heading { .. }));
    assert!(lines_of(&first_page.blocks[1]) >= 2);
    assert!(!pass
        .feedback
        .warnings
        .iter()
        .any(|w| w.rule.as_deref() == Some("no-orphan")));
}

/// A paragraph whose first line lands alone at a page bottom is moved to the
/// next page entirely.
#[test]
fn test_orphan_is_resolved_by_moving_the_paragraph() {
    let config = Config::default();
    with_env(&config, |env| {
        // Exactly one line fits below the filler.
        let filler = spacer(0, 620.0);
        let par = paragraph_source(130, 1, env);
        let sources = vec![filler, par];

        let initial = layout::place(
            &sources,
            &config,
            &Pins::default(),
            0,
            &AppliedLog::default(),
        )
        .unwrap();
        let last = initial.pages[0].blocks.last().unwrap();
        assert_eq!(lines_of(last), 1, "the scenario must start with an orphan");

        let pass = solve::solve(&sources, &config, initial).unwrap();
        let state = &pass.output;

        // The paragraph moved wholly onto page two.
        assert_eq!(state.pages[0].blocks.len(), 1);
        let moved = &state.pages[1].blocks[0];
        assert!(lines_of(moved) >= 2);
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("no-orphan")));
    });
}

/// Scenario B: a ten-line paragraph overflows by one line; the solver pulls
/// another line forward so the continuation has at least two.
#[test]
fn test_widow_is_resolved_by_pulling_a_line() {
    let config = Config::default();
    with_env(&config, |env| {
        // Exactly nine of the ten lines fit below the filler.
        let filler = spacer(0, 505.0);
        let par = paragraph_source(130, 1, env);
        assert_eq!(
            par.body.par().map(|p| p.lines.len()),
            Some(10),
            "the paragraph must measure ten lines",
        );
        let sources = vec![filler, par];

        let initial = layout::place(
            &sources,
            &config,
            &Pins::default(),
            0,
            &AppliedLog::default(),
        )
        .unwrap();
        assert_eq!(lines_of(initial.pages[0].blocks.last().unwrap()), 9);
        assert_eq!(lines_of(&initial.pages[1].blocks[0]), 1);

        let pass = solve::solve(&sources, &config, initial).unwrap();
        let state = &pass.output;

        assert_eq!(lines_of(state.pages[0].blocks.last().unwrap()), 8);
        let widow = &state.pages[1].blocks[0];
        assert!(lines_of(widow) >= 2);
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("no-widow")));
    });
}

/// Scenario C: a heading stranded at a page bottom moves to the next page.
#[test]
fn test_heading_orphan_moves_to_next_page() {
    let config = Config::default();
    with_env(&config, |env| {
        let doc = document(vec![
            BlockNode::Heading { level: 2, children: vec![InlineNode::text("lorem")] },
            long_paragraph(50),
        ]);
        let mut measured = layout::measure_document(&doc, env).unwrap().output;
        for (offset, source) in measured.iter_mut().enumerate() {
            source.node = compose::layout::NodeId(1 + offset as u32);
        }

        let mut sources = vec![spacer(0, 600.0)];
        sources.append(&mut measured);

        let initial = layout::place(
            &sources,
            &config,
            &Pins::default(),
            0,
            &AppliedLog::default(),
        )
        .unwrap();
        assert!(
            matches!(
                initial.pages[0].blocks.last().unwrap().body,
                BlockBody::Heading { .. }
            ),
            "the scenario must start with a stranded heading",
        );

        let pass = solve::solve(&sources, &config, initial).unwrap();
        let state = &pass.output;

        assert_eq!(state.pages[0].blocks.len(), 1);
        assert!(matches!(state.pages[1].blocks[0].body, BlockBody::Heading { .. }));
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("heading-orphan")));
    });
}

/// Scenario D: a figure that no longer fits moves to the top of the next
/// page; the sparse page it left behind is reported, but only as info.
#[test]
fn test_keep_together_figure_moves_and_leaves_a_sparse_page() {
    let config = Config::default();
    with_env(&config, |env| {
        let doc = document(vec![BlockNode::Figure {
            image: "tall.png".into(),
            caption: vec![],
        }]);
        let mut measured = layout::measure_document(&doc, env).unwrap().output;
        measured[0].node = compose::layout::NodeId(1);

        let mut sources = vec![spacer(0, 342.0)];
        sources.append(&mut measured);

        let pass = solve_sources(&sources, &config);
        let state = &pass.output;

        let figure = &state.pages[1].blocks[0];
        assert!(matches!(figure.body, BlockBody::Figure { .. }));
        assert!(figure.pos.y.approx_eq(state.pages[1].content_top()));

        assert!(pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("min-page-fullness")));
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.severity == Severity::Error));
    });
}

/// A figure taller than the page keeps a residual keep-together warning and
/// sits at the top of its own page.
#[test]
fn test_figure_taller_than_page_is_residual() {
    let doc = document(vec![
        long_paragraph(20),
        BlockNode::Figure { image: "giant.png".into(), caption: vec![] },
    ]);

    let pass = typeset(&doc);
    let state = &pass.output;

    let (page_index, figure) = state
        .blocks()
        .find(|(_, block)| matches!(block.body, BlockBody::Figure { .. }))
        .expect("figure placed");
    assert!(figure.pos.y.approx_eq(state.pages[page_index].content_top()));

    assert!(pass
        .feedback
        .warnings
        .iter()
        .any(|w| w.rule.as_deref() == Some("keep-together")));
}

/// Scenario E: uneven gaps of 6, 18 and 6 points normalize to the mean.
#[test]
fn test_balanced_spacing_normalizes_gaps() {
    let config = Config::default();
    with_env(&config, |env| {
        let after = [6.0, 18.0, 6.0, 6.0];
        let sources: Vec<SourceBlock> = after
            .iter()
            .enumerate()
            .map(|(i, &spacing)| {
                let mut source = paragraph_source(5, i as u32, env);
                source.spacing_after = Abs::pt(spacing);
                source
            })
            .collect();

        let pass = solve_sources(&sources, &config);
        let page = &pass.output.pages[0];
        assert_eq!(page.blocks.len(), 4);

        for pair in page.blocks.windows(2) {
            let gap = pair[1].pos.y - pair[0].bottom();
            assert!(
                gap.approx_eq(Abs::pt(10.0)),
                "gap is {gap:?}, want the 10pt mean",
            );
        }
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("balanced-spacing")));
    });
}

/// A gap squeezed below the minimum is widened by the solver.
#[test]
fn test_min_spacing_gap_is_widened() {
    let config = Config::default();
    with_env(&config, |env| {
        let mut first = paragraph_source(5, 0, env);
        first.spacing_after = Abs::pt(2.0);
        let second = paragraph_source(5, 1, env);
        let sources = vec![first, second];

        let initial = layout::place(
            &sources,
            &config,
            &Pins::default(),
            0,
            &AppliedLog::default(),
        )
        .unwrap();
        let page = &initial.pages[0];
        let gap = page.blocks[1].pos.y - page.blocks[0].bottom();
        assert!(gap.approx_eq(Abs::pt(2.0)), "the scenario must start too tight");

        let pass = solve::solve(&sources, &config, initial).unwrap();
        let page = &pass.output.pages[0];
        let gap = page.blocks[1].pos.y - page.blocks[0].bottom();
        assert!(gap.approx_eq(Abs::pt(6.0)), "gap is {gap:?}, want the 6pt minimum");
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("min-spacing")));
    });
}

/// A page over its line budget is split before the offending line: the
/// paragraph's first part is capped and the rest continues on a new page.
#[test]
fn test_max_lines_splits_the_offending_paragraph() {
    let mut config = Config::default();
    config.rules.0.insert(
        "max-lines-per-page".into(),
        compose::config::RuleSettings { max: Some(20), ..Default::default() },
    );
    config.rules.0.insert(
        "min-page-fullness".into(),
        compose::config::RuleSettings { enabled: false, ..Default::default() },
    );

    with_env(&config, |env| {
        let sources = vec![paragraph_source(390, 0, env)];
        assert_eq!(
            sources[0].body.par().map(|p| p.lines.len()),
            Some(30),
            "the paragraph must measure thirty lines",
        );

        let pass = solve_sources(&sources, &config);
        let state = &pass.output;

        assert_eq!(state.pages.len(), 2);
        assert_eq!(lines_of(&state.pages[0].blocks[0]), 20);
        let rest = &state.pages[1].blocks[0];
        assert_eq!(rest.id.part, 1);
        assert_eq!(lines_of(rest), 10);
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("max-lines-per-page")));
    });
}

/// When the line budget is already spent before the offending block starts,
/// the whole block is forced onto the next page instead of split.
#[test]
fn test_max_lines_breaks_before_the_next_block() {
    let mut config = Config::default();
    config.rules.0.insert(
        "max-lines-per-page".into(),
        compose::config::RuleSettings { max: Some(20), ..Default::default() },
    );
    config.rules.0.insert(
        "min-page-fullness".into(),
        compose::config::RuleSettings { enabled: false, ..Default::default() },
    );

    with_env(&config, |env| {
        let sources = vec![
            paragraph_source(260, 0, env),
            paragraph_source(130, 1, env),
        ];

        let pass = solve_sources(&sources, &config);
        let state = &pass.output;

        assert_eq!(state.pages.len(), 2);
        assert_eq!(state.pages[0].blocks.len(), 1);
        assert_eq!(lines_of(&state.pages[0].blocks[0]), 20);
        // The second paragraph moved wholly, it was not split.
        let moved = &state.pages[1].blocks[0];
        assert_eq!(moved.id.part, 0);
        assert_eq!(lines_of(moved), 10);
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("max-lines-per-page")));
    });
}

/// Scenario F: rendering the same document twice yields element-wise equal
/// drawing call sequences.
#[test]
fn test_rendering_is_deterministic() {
    let doc = document(vec![
        BlockNode::Heading { level: 1, children: vec![InlineNode::text("report")] },
        long_paragraph(120),
        BlockNode::MathBlock { tex: "a+b".into() },
        BlockNode::CodeBlock { language: None, text: "let x = 1;\n".into() },
        long_paragraph(90),
    ]);

    let first = typeset(&doc).output;
    let second = typeset(&doc).output;

    let mut calls_first = Recorder::new(VerticalOrigin::Bottom);
    render(&first, &mut calls_first);
    let mut calls_second = Recorder::new(VerticalOrigin::Bottom);
    render(&second, &mut calls_second);

    assert_eq!(calls_first.calls, calls_second.calls);
}

/// A state the solver accepted stays accepted: solving it again changes
/// nothing.
#[test]
fn test_solver_is_idempotent_at_fixed_point() {
    let config = Config::default();
    with_env(&config, |env| {
        let sources = vec![
            paragraph_source(30, 0, env),
            paragraph_source(40, 1, env),
        ];

        let solved = solve_sources(&sources, &config).output;
        let again = solve::solve(&sources, &config, solved.clone())
            .unwrap()
            .output;
        assert_eq!(solved, again);
    });
}

/// Disabling a rule suppresses both its adjustments and its warnings.
#[test]
fn test_disabled_rule_stays_silent() {
    let mut config = Config::default();
    config.rules.0.insert(
        "no-widow".into(),
        compose::config::RuleSettings { enabled: false, ..Default::default() },
    );

    with_env(&config, |env| {
        let sources = vec![spacer(0, 505.0), paragraph_source(130, 1, env)];
        let pass = solve_sources(&sources, &config);

        // The widow stays: nine lines, then a lone one.
        assert_eq!(lines_of(&pass.output.pages[1].blocks[0]), 1);
        assert!(!pass
            .feedback
            .warnings
            .iter()
            .any(|w| w.rule.as_deref() == Some("no-widow")));
    });
}

/// Severity overrides flow through to the surfaced warnings.
#[test]
fn test_severity_override_applies() {
    let mut config = Config::default();
    config.rules.0.insert(
        "min-page-fullness".into(),
        compose::config::RuleSettings {
            severity: Some(Severity::Warning),
            ..Default::default()
        },
    );

    with_env(&config, |env| {
        let doc = document(vec![BlockNode::Figure {
            image: "tall.png".into(),
            caption: vec![],
        }]);
        let mut measured = layout::measure_document(&doc, env).unwrap().output;
        measured[0].node = compose::layout::NodeId(1);
        let mut sources = vec![spacer(0, 342.0)];
        sources.append(&mut measured);

        let pass = solve_sources(&sources, &config);
        let fullness = pass
            .feedback
            .warnings
            .iter()
            .find(|w| w.rule.as_deref() == Some("min-page-fullness"))
            .expect("fullness warning surfaced");
        assert_eq!(fullness.severity, Severity::Warning);
    });
}
