//! Conflict resolution.
//!
//! Each cell of the action table starts with every candidate action of its
//! state and terminal. Precedence and associativity eliminate candidates that
//! another candidate beats; whatever survives in numbers is kept as an
//! [`Action::Overflow`] for the GLR driver to fork on, and reported as a
//! [`Conflict`].

use super::automaton::{Action, Automaton};
use super::error::GrammarError;
use super::grammar::{Assoc, Grammar};
use std::collections::{BTreeMap, BTreeSet};

/// An action cell that kept more than one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub state: usize,
    pub terminal: usize,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub conflicts: Vec<Conflict>,
    /// Cells whose candidates were narrowed to one by precedence.
    pub resolved: usize,
}

/// One row per state: the surviving action of every terminal that has one.
pub type ActionRows = Vec<BTreeMap<usize, Action>>;

/// Resolves the candidate actions of every state.
pub fn resolve(g: &Grammar, a: &Automaton) -> Result<(ActionRows, Diagnostics), GrammarError> {
    let mut rows = Vec::with_capacity(a.states.len());
    let mut diag = Diagnostics::default();
    for state in 0..a.states.len() {
        let mut row = BTreeMap::new();
        for (terminal, cands) in a.candidates(g, state)? {
            let multiple = cands.len() > 1;
            let mut kept = survivors(g, &cands);
            let action = match kept.len() {
                0 => {
                    return Err(GrammarError::Internal(format!(
                        "every action of state {state} on {:?} was eliminated",
                        g.term_name(terminal)
                    )));
                }
                1 => {
                    if multiple {
                        diag.resolved += 1;
                    }
                    kept.remove(0)
                }
                _ => {
                    log::trace!(
                        "conflict in state {state} on {:?}: {kept:?}",
                        g.term_name(terminal)
                    );
                    diag.conflicts.push(Conflict {
                        state,
                        terminal,
                        actions: kept.clone(),
                    });
                    Action::Overflow(kept)
                }
            };
            row.insert(terminal, action);
        }
        rows.push(row);
    }
    if diag.conflicts.is_empty() {
        log::debug!("resolve: {} cells resolved by precedence", diag.resolved);
    } else {
        log::info!(
            "resolve: {} conflicts kept, {} cells resolved by precedence",
            diag.conflicts.len(),
            diag.resolved
        );
    }
    Ok((rows, diag))
}

/// Candidates that no other candidate beats, in ascending order.
fn survivors(g: &Grammar, cands: &BTreeSet<Action>) -> Vec<Action> {
    cands
        .iter()
        .filter(|&y| !cands.iter().any(|x| beats(g, x, y)))
        .cloned()
        .collect()
}

/// Rule whose precedence a reduce-like action carries.
fn reduced_rule(g: &Grammar, action: &Action) -> Option<usize> {
    match *action {
        Action::Reduce(r) => Some(r),
        Action::Accept(s) => g.starts().iter().find(|st| st.nonterm == s).map(|st| st.rule),
        _ => None,
    }
}

/// Whether `x` eliminates `y` from the same cell.
fn beats(g: &Grammar, x: &Action, y: &Action) -> bool {
    match (x, y) {
        (_, Action::Lookahead { .. }) | (Action::Lookahead { .. }, _) => false,
        (Action::Shift { prec: Some(ps), .. }, _) => {
            let Some(r) = reduced_rule(g, y) else {
                return false;
            };
            let rule = g.rule(r);
            match rule.prec {
                Some(pr) => *ps > pr || (*ps == pr && rule.assoc == Assoc::Right),
                None => false,
            }
        }
        (_, Action::Shift { prec: Some(ps), .. }) => {
            let Some(r) = reduced_rule(g, x) else {
                return false;
            };
            let rule = g.rule(r);
            match rule.prec {
                Some(pr) => pr > *ps || (pr == *ps && rule.assoc == Assoc::Left),
                None => false,
            }
        }
        _ => match (reduced_rule(g, x), reduced_rule(g, y)) {
            (Some(rx), Some(ry)) => match (g.rule(rx).prec, g.rule(ry).prec) {
                (Some(px), Some(py)) => px > py,
                _ => false,
            },
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::{Choice, GrammarBuilder, nt, seq, t};
    use super::super::grammar::Symbol;
    use super::*;

    fn run(b: &GrammarBuilder) -> (Grammar, Automaton, ActionRows, Diagnostics) {
        let mut g = b.build().unwrap();
        g.analyze();
        let a = Automaton::build(&g).unwrap();
        let (rows, diag) = resolve(&g, &a).unwrap();
        (g, a, rows, diag)
    }

    fn binop(op: &str, prec: u32, assoc: Assoc) -> Choice {
        Choice::new(seq([nt("E"), t(op), nt("E")])).with_prec(prec, assoc)
    }

    /// State holding the completed item of the rule `E -> E op E`.
    fn completed(g: &Grammar, a: &Automaton, op: &str) -> usize {
        let op = Symbol::Term(g.term_idx(op).unwrap());
        let r = g.rules().iter().position(|r| r.rhs.get(1) == Some(&op)).unwrap();
        a.states
            .iter()
            .position(|s| s.items.keys().any(|i| i.rule == r && i.dot == 3))
            .unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        let mut b = GrammarBuilder::new();
        b.rule(
            "E",
            [
                binop("+", 1, Assoc::Left),
                binop("*", 2, Assoc::Left),
                Choice::new(t("n")),
            ],
        );
        let (g, a, rows, diag) = run(&b);
        assert!(diag.conflicts.is_empty());
        assert!(diag.resolved > 0);

        let plus = g.term_idx("+").unwrap();
        let star = g.term_idx("*").unwrap();
        let after_plus = &rows[completed(&g, &a, "+")];
        assert!(matches!(after_plus[&star], Action::Shift { .. }));
        assert!(matches!(after_plus[&plus], Action::Reduce(_)));
        let after_star = &rows[completed(&g, &a, "*")];
        assert!(matches!(after_star[&star], Action::Reduce(_)));
        assert!(matches!(after_star[&plus], Action::Reduce(_)));
    }

    #[test]
    fn right_associativity_shifts() {
        let mut b = GrammarBuilder::new();
        b.rule("E", [binop("^", 3, Assoc::Right), Choice::new(t("n"))]);
        let (g, a, rows, _) = run(&b);
        let caret = g.term_idx("^").unwrap();
        assert!(matches!(
            rows[completed(&g, &a, "^")][&caret],
            Action::Shift { prec: Some(3), .. }
        ));
    }

    #[test]
    fn nonassoc_keeps_both_actions() {
        let mut b = GrammarBuilder::new();
        b.rule("E", [binop("<", 1, Assoc::None), Choice::new(t("n"))]);
        let (g, a, rows, diag) = run(&b);
        let lt = g.term_idx("<").unwrap();
        let state = completed(&g, &a, "<");
        let Action::Overflow(kept) = &rows[state][&lt] else {
            panic!("expected an overflow cell");
        };
        assert_eq!(kept.len(), 2);
        assert_eq!(diag.conflicts.len(), 1);
        assert_eq!(diag.conflicts[0].state, state);
        assert_eq!(diag.conflicts[0].terminal, lt);
    }

    #[test]
    fn ambiguity_without_precedence_is_kept() {
        let mut b = GrammarBuilder::new();
        b.rule("E", [seq([nt("E"), t("+"), nt("E")]), t("n")]);
        let (_, _, rows, diag) = run(&b);
        assert_eq!(diag.conflicts.len(), 1);
        let c = &diag.conflicts[0];
        assert!(matches!(c.actions[0], Action::Shift { .. }));
        assert!(matches!(c.actions[1], Action::Reduce(_)));
        assert_eq!(rows[c.state][&c.terminal], Action::Overflow(c.actions.clone()));
    }

    #[test]
    fn reduce_reduce_uses_strict_precedence() {
        // S ::= A | B ; A ::= 'x' %2 ; B ::= 'x' %1
        let mut b = GrammarBuilder::new();
        b.rule("S", [nt("A"), nt("B")])
            .rule("A", [Choice::new(t("x")).with_prec(2, Assoc::None)])
            .rule("B", [Choice::new(t("x")).with_prec(1, Assoc::None)]);
        let (g, _, rows, diag) = run(&b);
        assert!(diag.conflicts.is_empty());
        let a_rule = g.rules_of(g.nonterm_idx("A").unwrap())[0];
        assert!(
            rows.iter()
                .any(|row| row.get(&g.eof()) == Some(&Action::Reduce(a_rule)))
        );

        let mut b = GrammarBuilder::new();
        b.rule("S", [nt("A"), nt("B")])
            .rule("A", [Choice::new(t("x")).with_prec(1, Assoc::None)])
            .rule("B", [Choice::new(t("x")).with_prec(1, Assoc::None)]);
        let (_, _, _, diag) = run(&b);
        assert_eq!(diag.conflicts.len(), 1);
    }
}
