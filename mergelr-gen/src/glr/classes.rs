//! Terminal equivalence classes.
//!
//! Two terminals are equivalent when every rule occurrence of one can be
//! replaced by the other and still spell a rule of the grammar. Equivalent
//! terminals drive identical parser actions, so the action table only needs
//! one column per class.

use super::grammar::{Assoc, Grammar, NontermKind, Symbol};
use std::collections::{BTreeMap, BTreeSet};

/// A partition of the terminals of one grammar.
///
/// Class `0` is always the singleton `{$end}`; the remaining classes are
/// numbered by their smallest member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalClasses {
    /// Class index of every terminal.
    pub class_of: Vec<usize>,
    /// Members of every class, in ascending terminal order.
    pub members: Vec<Vec<usize>>,
}

impl TerminalClasses {
    /// The discrete partition: one class per terminal.
    pub fn identity(n_terms: usize) -> Self {
        Self {
            class_of: (0..n_terms).collect(),
            members: (0..n_terms).map(|t| vec![t]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn from_keys<K: Ord>(keys: impl IntoIterator<Item = K>) -> Self {
        let mut ids: BTreeMap<K, usize> = BTreeMap::new();
        let mut class_of = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for (t, key) in keys.into_iter().enumerate() {
            let next = ids.len();
            let c = *ids.entry(key).or_insert(next);
            if c == members.len() {
                members.push(Vec::new());
            }
            members[c].push(t);
            class_of.push(c);
        }
        Self { class_of, members }
    }
}

/// A rule with one terminal occurrence replaced by a hole.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Context {
    lhs: usize,
    rhs: Vec<Option<Symbol>>,
    prec: Option<u32>,
    assoc: Assoc,
    kind: NontermKind,
    /// Set for rules named by a merge rule, which must never be identified
    /// with another rule.
    pinned: Option<usize>,
}

impl Grammar {
    /// Partitions the terminals into equivalence classes.
    ///
    /// Starts from the partition by occurrence count (with `$end` alone) and
    /// splits each block by the set of occurrence contexts of its members.
    pub fn terminal_equivalence_classes(&self) -> TerminalClasses {
        let n = self.n_terms();
        let mut pinned = vec![false; self.n_rules()];
        for m in self.merges() {
            pinned[m.left] = true;
            pinned[m.right] = true;
        }

        let mut contexts: Vec<BTreeSet<Context>> = vec![BTreeSet::new(); n];
        let mut count = vec![0usize; n];
        for (r, rule) in self.rules().iter().enumerate() {
            for (i, sym) in rule.rhs.iter().enumerate() {
                let Symbol::Term(t) = *sym else {
                    continue;
                };
                count[t] += 1;
                let mut rhs: Vec<Option<Symbol>> = rule.rhs.iter().copied().map(Some).collect();
                rhs[i] = None;
                contexts[t].insert(Context {
                    lhs: rule.lhs,
                    rhs,
                    prec: rule.prec,
                    assoc: rule.assoc,
                    kind: rule.kind,
                    pinned: pinned[r].then_some(r),
                });
            }
        }

        let eof = self.eof();
        let initial = TerminalClasses::from_keys(
            (0..n).map(|t| if t == eof { None } else { Some(count[t]) }),
        );
        log::trace!("classes: {} occurrence-count blocks", initial.len());

        let classes = TerminalClasses::from_keys(
            (0..n).map(|t| (initial.class_of[t], std::mem::take(&mut contexts[t]))),
        );
        log::debug!("classes: {} terminals in {} classes", n, classes.len());
        classes
    }
}
