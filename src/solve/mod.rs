//! The constraint solver.
//!
//! Rules inspect a layout state and report violations; the solver ranks the
//! violations, asks the responsible rules for adjustments, applies them to a
//! cloned state and pours the layout again, iterating until no rule
//! complains, the violation set stops changing, or the iteration cap is hit.

pub mod adjust;
pub mod rules;
pub mod solver;

pub use self::adjust::{Adjustment, RebreakHint};
pub use self::rules::{builtin_rules, Rule, RuleCx, RuleId, Violation};
pub use self::solver::solve;
