//! The iteration loop.

use rustc_hash::FxHashSet;

use super::rules::{builtin_rules, overflow_errors, Rule, RuleCx, RuleId, Violation};
use crate::config::Config;
use crate::diag::{Feedback, LayoutResult, Pass};
use crate::layout::{self, Applied, AppliedLog, LayoutState, Pins, SourceBlock};

/// Iteratively refine a layout until no rule reports a violation, the
/// violation set reaches a fixed point, or the iteration cap is hit.
///
/// Residual violations of the final state are surfaced as warnings with
/// their severity preserved.
pub fn solve(
    sources: &[SourceBlock],
    config: &Config,
    initial: LayoutState,
) -> LayoutResult<Pass<LayoutState>> {
    let rules = active_rules(config);
    let cx = RuleCx { config };

    let mut pins = Pins::default();
    let mut log = AppliedLog::default();
    let mut state = initial;
    let mut feedback = Feedback::new();
    let mut previous_keys: Option<Vec<(RuleId, Option<layout::BlockId>, usize)>> = None;

    for iteration in 1..=config.solver.max_iterations {
        let mut violations = check_all(&rules, &cx, &state);
        if violations.is_empty() {
            return Ok(Pass::new(state, feedback));
        }

        // Fixed point: the same violations as last time around mean further
        // iterations would not make progress.
        let mut keys: Vec<_> = violations.iter().map(Violation::key).collect();
        keys.sort();
        if previous_keys.as_ref() == Some(&keys) {
            break;
        }
        previous_keys = Some(keys);

        // Errors first, then by page; the sort is stable, so violations on
        // the same page keep their check order.
        violations.sort_by_key(|v| (v.severity, v.page));

        // Address only the worst few violations per iteration so that
        // competing rules cannot oscillate.
        let mut adjustments = vec![];
        for violation in violations.iter().take(config.solver.top_k_violations) {
            let Some(rule) = rules.iter().find(|rule| rule.id == violation.rule) else {
                continue;
            };
            adjustments.extend((rule.suggest)(&cx, violation, &state));
        }

        // Two adjustments targeting the same block: the earlier one came
        // from the more severe violation and wins.
        let mut targeted = FxHashSet::default();
        adjustments.retain(|adjustment| targeted.insert(adjustment.target().node));

        // Anti-thrash: an adjustment already applied to a block is only
        // retried if some other block's state changed since.
        adjustments.retain(|adjustment| {
            let node = adjustment.target().node;
            match log.position(node, adjustment.kind()) {
                None => true,
                Some(at) => log.entries[at + 1..].iter().any(|(n, _)| *n != node),
            }
        });

        if adjustments.is_empty() {
            break;
        }

        let overflow_clean = overflow_errors(&cx, &state) == 0;
        let mut progressed = false;

        for adjustment in adjustments {
            let node = adjustment.target().node;
            let record = Applied { kind: adjustment.kind(), iteration };

            let mut trial_pins = pins.clone();
            if !adjustment.apply(&mut trial_pins, &state) {
                continue;
            }

            let mut trial_log = log.clone();
            trial_log.entries.push((node, record));

            let trial = layout::place(sources, config, &trial_pins, iteration, &trial_log)?;

            // Error-severity rules are monotone: once the layout is free of
            // overflow, no adjustment may reintroduce it.
            if overflow_clean && overflow_errors(&cx, &trial) > 0 {
                log.entries.push((node, record));
                continue;
            }

            pins = trial_pins;
            log = trial_log;
            state = trial;
            progressed = true;
        }

        if !progressed {
            break;
        }
    }

    // Terminated with residual violations: surface each one.
    for violation in check_all(&rules, &cx, &state) {
        feedback.warn(violation.into_warning());
    }

    Ok(Pass::new(state, feedback))
}

/// The built-in rules with configuration applied: disabled rules are
/// dropped, severity overrides are folded in.
fn active_rules(config: &Config) -> Vec<Rule> {
    builtin_rules()
        .into_iter()
        .filter(|rule| config.rules.enabled(rule.id.as_str()))
        .map(|mut rule| {
            if let Some(settings) = config.rules.get(rule.id.as_str()) {
                if let Some(severity) = settings.severity {
                    rule.severity = severity;
                }
            }
            rule
        })
        .collect()
}

/// Run every rule and collect all violations with effective severities.
fn check_all(rules: &[Rule], cx: &RuleCx, state: &LayoutState) -> Vec<Violation> {
    let mut out = vec![];
    for rule in rules {
        for mut violation in (rule.check)(cx, state) {
            violation.severity = rule.severity;
            out.push(violation);
        }
    }
    out
}

