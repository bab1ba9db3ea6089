// This module computes the derived sets of a grammar: nullability,
// FIRST/FOLLOW sets over terminals and the transitive derives-relation
// between nonterminals.

use super::error::GrammarError;
use super::grammar::{Grammar, Symbol};
use std::collections::BTreeSet;

/// Cached analysis results owned by a [`Grammar`].
///
/// All vectors are indexed by nonterminal. The cache is filled by
/// [`Grammar::analyze`] and dropped by [`Grammar::invalidate`] whenever the
/// grammar changes.
#[derive(Clone, Debug, Default)]
pub struct Sets {
    pub(super) nullable: Vec<bool>,
    pub(super) first: Vec<BTreeSet<usize>>,
    pub(super) follow: Vec<BTreeSet<usize>>,
    pub(super) derives: Vec<BTreeSet<usize>>,
    pub(super) analyzed: bool,
}

impl Grammar {
    /// Computes the nullable flag of every nonterminal.
    ///
    /// A nonterminal is nullable when one of its rules consists solely of
    /// nullable nonterminals; an ε-rule is trivially such a rule. Lookahead
    /// nonterminals consume no input and are always nullable.
    pub fn compute_nullable(&mut self) {
        let mut nullable: Vec<bool> = (0..self.n_nonterms())
            .map(|nt| self.kind(nt).is_lookahead())
            .collect();
        let mut changed = true;
        while changed {
            changed = false;
            for rule in self.rules() {
                if nullable[rule.lhs] {
                    continue;
                }
                let all = rule.rhs.iter().all(|sym| match *sym {
                    Symbol::Term(_) => false,
                    Symbol::NonTerm(n) => nullable[n],
                });
                if all {
                    nullable[rule.lhs] = true;
                    changed = true;
                }
            }
        }
        self.sets.nullable = nullable;
    }

    /// Computes FIRST sets of every nonterminal. Nullability is computed
    /// first when it is missing.
    ///
    /// The FIRST set of a lookahead nonterminal is empty: its body is only
    /// matched by the predicate parse, and the symbols after it supply the
    /// terminals that can follow.
    pub fn compute_first(&mut self) {
        if self.sets.nullable.len() != self.n_nonterms() {
            self.compute_nullable();
        }
        let mut first: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.n_nonterms()];
        let mut changed = true;
        while changed {
            changed = false;
            for rule in self.rules() {
                if rule.kind.is_lookahead() {
                    continue;
                }
                for &sym in &rule.rhs {
                    match sym {
                        Symbol::Term(t) => {
                            if first[rule.lhs].insert(t) {
                                changed = true;
                            }
                            break;
                        }
                        Symbol::NonTerm(n) => {
                            if n != rule.lhs {
                                // Clone FIRST(n) to avoid simultaneous borrow
                                let first_sym = first[n].clone();
                                for f in first_sym {
                                    if first[rule.lhs].insert(f) {
                                        changed = true;
                                    }
                                }
                            }
                            if !self.sets.nullable[n] {
                                break;
                            }
                        }
                    }
                }
            }
        }
        self.sets.first = first;
    }

    /// Computes FOLLOW sets of every nonterminal. Augmented start
    /// nonterminals are seeded with `$end`.
    pub fn compute_follow(&mut self) {
        if self.sets.first.len() != self.n_nonterms() {
            self.compute_first();
        }
        let mut follow: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); self.n_nonterms()];
        for s in self.starts() {
            follow[s.augmented].insert(self.eof());
        }
        let mut changed = true;
        while changed {
            changed = false;
            for rule in self.rules() {
                for (i, &sym) in rule.rhs.iter().enumerate() {
                    let Symbol::NonTerm(b) = sym else {
                        continue;
                    };
                    let (first_beta, beta_nullable) = self.first_of(&rule.rhs[i + 1..]);
                    for f in first_beta {
                        if follow[b].insert(f) {
                            changed = true;
                        }
                    }
                    if beta_nullable && b != rule.lhs {
                        let follow_lhs = follow[rule.lhs].clone();
                        for f in follow_lhs {
                            if follow[b].insert(f) {
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
        self.sets.follow = follow;
    }

    /// Computes, for every nonterminal `B`, the set of nonterminals `A` such
    /// that `B` derives a sentential form containing `A`.
    pub fn compute_derives(&mut self) {
        self.sets.derives = self.derives_closure();
    }

    pub(super) fn derives_closure(&self) -> Vec<BTreeSet<usize>> {
        let n = self.n_nonterms();
        let mut direct: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for rule in self.rules() {
            for sym in &rule.rhs {
                if let Symbol::NonTerm(a) = *sym {
                    direct[rule.lhs].insert(a);
                }
            }
        }
        (0..n)
            .map(|b| {
                let mut seen = BTreeSet::new();
                let mut stack: Vec<usize> = direct[b].iter().copied().collect();
                while let Some(a) = stack.pop() {
                    if seen.insert(a) {
                        stack.extend(direct[a].iter().copied().filter(|x| !seen.contains(x)));
                    }
                }
                seen
            })
            .collect()
    }

    /// Runs every set computation and marks the cache as current.
    pub fn analyze(&mut self) {
        self.compute_nullable();
        self.compute_first();
        self.compute_follow();
        self.compute_derives();
        self.sets.analyzed = true;
        log::debug!(
            "analyze: {} nullable of {} nonterminals",
            self.sets.nullable.iter().filter(|&&n| n).count(),
            self.n_nonterms()
        );
    }

    /// Drops all cached analysis.
    pub fn invalidate(&mut self) {
        self.sets = Sets::default();
    }

    pub fn is_analyzed(&self) -> bool {
        self.sets.analyzed
    }

    pub(super) fn require_analysis(&self) -> Result<(), GrammarError> {
        if self.sets.analyzed {
            Ok(())
        } else {
            Err(GrammarError::Internal("grammar analysis is missing".into()))
        }
    }

    /// Whether `nonterm` derives the empty string.
    ///
    /// # Panics
    /// The set accessors require [`Grammar::analyze`] to have run since the
    /// last edit.
    pub fn nullable(&self, nonterm: usize) -> bool {
        debug_assert!(self.sets.analyzed, "analyze the grammar before reading its sets");
        self.sets.nullable[nonterm]
    }

    pub fn first(&self, nonterm: usize) -> &BTreeSet<usize> {
        debug_assert!(self.sets.analyzed, "analyze the grammar before reading its sets");
        &self.sets.first[nonterm]
    }

    pub fn follow(&self, nonterm: usize) -> &BTreeSet<usize> {
        debug_assert!(self.sets.analyzed, "analyze the grammar before reading its sets");
        &self.sets.follow[nonterm]
    }

    /// Nonterminals reachable from `nonterm` through one or more rule bodies.
    pub fn derives(&self, nonterm: usize) -> &BTreeSet<usize> {
        debug_assert!(self.sets.analyzed, "analyze the grammar before reading its sets");
        &self.sets.derives[nonterm]
    }

    /// FIRST of a symbol sequence and whether the whole sequence is nullable.
    pub fn first_of(&self, seq: &[Symbol]) -> (BTreeSet<usize>, bool) {
        let mut out = BTreeSet::new();
        for &sym in seq {
            match sym {
                Symbol::Term(t) => {
                    out.insert(t);
                    return (out, false);
                }
                Symbol::NonTerm(n) => {
                    out.extend(self.sets.first[n].iter().copied());
                    if !self.sets.nullable[n] {
                        return (out, false);
                    }
                }
            }
        }
        (out, true)
    }
}
