//! Grammar representation.
//!
//! A [`Grammar`] owns every terminal, nonterminal, normal [`Rule`] and
//! [`MergeRule`] of one parser, all addressed by dense `usize` indices into
//! flat vectors. Terminal `0` is always the end-of-input marker `$end`.
//!
//! Structural edits ([`Grammar::prune_unreachable`], [`Grammar::sort_rules`],
//! [`Grammar::quotient`]) rebuild a compacted copy and drop the cached
//! analysis; call [`Grammar::analyze`] again afterwards.

use super::classes::TerminalClasses;
use super::error::GrammarError;
use super::sets::Sets;
use super::symtab::Symtab;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt::Write as _;

/// Name of the end-of-input terminal.
pub const EOF_NAME: &str = "$end";

/// A grammar symbol: either a terminal or a nonterminal index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Term(usize),
    NonTerm(usize),
}

/// Kind of a nonterminal. Lookahead kinds wrap a predicate sub-grammar and
/// are never expanded by closure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NontermKind {
    #[default]
    Normal,
    PosLookahead,
    NegLookahead,
}

impl NontermKind {
    pub fn is_lookahead(self) -> bool {
        !matches!(self, NontermKind::Normal)
    }

    pub fn to_str(self) -> &'static str {
        match self {
            NontermKind::Normal => "normal",
            NontermKind::PosLookahead => "pos-lookahead",
            NontermKind::NegLookahead => "neg-lookahead",
        }
    }
}

/// Associativity used to break equal-precedence shift/reduce conflicts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Assoc {
    #[default]
    None,
    Left,
    Right,
}

/// Boolean operator of a merge rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MergeOp {
    And,
    Sub,
}

/// A normal production `lhs ::= rhs`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub lhs: usize,
    pub rhs: Vec<Symbol>,
    pub prec: Option<u32>,
    pub assoc: Assoc,
    /// Mirrors the kind of `lhs`.
    pub kind: NontermKind,
}

/// Pairs two rules of the same nonterminal under an AND/SUB combinator.
///
/// For `And` the reduction is valid only when both rules reduce over the
/// same span; for `Sub` the `left` reduction is cancelled when `right` also
/// reduces over that span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MergeRule {
    pub lhs: usize,
    pub left: usize,
    pub right: usize,
    pub op: MergeOp,
}

/// Per-nonterminal metadata kept in the nonterminal symbol table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NontermInfo {
    pub kind: NontermKind,
    pub rules: Vec<usize>,
    pub merges: Vec<usize>,
}

/// A start symbol together with its augmented nonterminal `S'` and rule
/// `S' ::= S`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartSymbol {
    pub nonterm: usize,
    pub augmented: usize,
    pub rule: usize,
}

#[derive(Clone, Debug)]
pub struct Grammar {
    terms: Symtab,
    nonterms: Symtab<NontermInfo>,
    rules: Vec<Rule>,
    merges: Vec<MergeRule>,
    eof: usize,
    starts: Vec<StartSymbol>,
    pub(super) sets: Sets,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Creates an empty grammar containing only the `$end` terminal.
    pub fn new() -> Self {
        let mut terms = Symtab::new();
        let eof = terms.add(EOF_NAME, ());
        Self {
            terms,
            nonterms: Symtab::new(),
            rules: Vec::new(),
            merges: Vec::new(),
            eof,
            starts: Vec::new(),
            sets: Sets::default(),
        }
    }

    pub fn add_terminal(&mut self, name: &str) -> usize {
        let before = self.terms.len();
        let idx = self.terms.add(name, ());
        if self.terms.len() != before {
            self.invalidate();
        }
        idx
    }

    /// Interns a nonterminal. An existing nonterminal keeps its kind.
    pub fn add_nonterminal(&mut self, name: &str, kind: NontermKind) -> usize {
        let before = self.nonterms.len();
        let idx = self.nonterms.add(
            name,
            NontermInfo {
                kind,
                ..NontermInfo::default()
            },
        );
        if self.nonterms.len() != before {
            self.invalidate();
        }
        idx
    }

    /// Appends a rule to `lhs`. The rule's kind is taken from `lhs`.
    pub fn add_rule(
        &mut self,
        lhs: usize,
        rhs: Vec<Symbol>,
        prec: Option<u32>,
        assoc: Assoc,
    ) -> Result<usize, GrammarError> {
        let idx = self.rules.len();
        let info = self
            .nonterms
            .meta_mut(lhs)
            .ok_or_else(|| GrammarError::Internal(format!("rule for unknown nonterminal {lhs}")))?;
        info.rules.push(idx);
        let kind = info.kind;
        self.rules.push(Rule {
            lhs,
            rhs,
            prec,
            assoc,
            kind,
        });
        self.invalidate();
        Ok(idx)
    }

    /// Records a merge rule pairing `left` and `right`, both of which must
    /// belong to `lhs`.
    pub fn add_merge(
        &mut self,
        lhs: usize,
        left: usize,
        right: usize,
        op: MergeOp,
    ) -> Result<usize, GrammarError> {
        let idx = self.merges.len();
        let side_lhs = |r: usize| {
            self.rules
                .get(r)
                .map(|rule| rule.lhs)
                .ok_or_else(|| GrammarError::Internal(format!("merge {idx} names unknown rule {r}")))
        };
        let (left_lhs, right_lhs) = (side_lhs(left)?, side_lhs(right)?);
        if left_lhs != lhs || right_lhs != lhs {
            return Err(GrammarError::MergeLhsMismatch {
                merge: idx,
                lhs: self.nonterm_name(lhs).into(),
                left: self.nonterm_name(left_lhs).into(),
                right: self.nonterm_name(right_lhs).into(),
            });
        }
        let info = self
            .nonterms
            .meta_mut(lhs)
            .ok_or_else(|| GrammarError::Internal(format!("merge for unknown nonterminal {lhs}")))?;
        info.merges.push(idx);
        self.merges.push(MergeRule {
            lhs,
            left,
            right,
            op,
        });
        self.invalidate();
        Ok(idx)
    }

    /// Designates `nonterm` as a start symbol, creating its augmented
    /// nonterminal and rule. Returns the index of the augmented rule.
    pub fn add_start(&mut self, nonterm: usize) -> Result<usize, GrammarError> {
        if let Some(s) = self.starts.iter().find(|s| s.nonterm == nonterm) {
            return Ok(s.rule);
        }
        let name = self.nonterms.name(nonterm).ok_or_else(|| GrammarError::UnknownStart {
            name: format!("#{nonterm}"),
        })?;
        let aug_name = format!("{name}'");
        let augmented = self.add_nonterminal(&aug_name, NontermKind::Normal);
        let rule = self.add_rule(augmented, vec![Symbol::NonTerm(nonterm)], None, Assoc::None)?;
        self.starts.push(StartSymbol {
            nonterm,
            augmented,
            rule,
        });
        Ok(rule)
    }

    pub fn eof(&self) -> usize {
        self.eof
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn n_nonterms(&self) -> usize {
        self.nonterms.len()
    }

    pub fn n_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, idx: usize) -> &Rule {
        &self.rules[idx]
    }

    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    pub fn starts(&self) -> &[StartSymbol] {
        &self.starts
    }

    pub fn term_name(&self, idx: usize) -> &str {
        self.terms.name(idx).unwrap_or("?")
    }

    pub fn nonterm_name(&self, idx: usize) -> &str {
        self.nonterms.name(idx).unwrap_or("?")
    }

    pub fn term_idx(&self, name: &str) -> Option<usize> {
        self.terms.idx(name)
    }

    pub fn nonterm_idx(&self, name: &str) -> Option<usize> {
        self.nonterms.idx(name)
    }

    pub fn terminals(&self) -> impl Iterator<Item = &str> {
        self.terms.names()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = (&str, &NontermInfo)> {
        self.nonterms.iter()
    }

    pub fn kind(&self, nonterm: usize) -> NontermKind {
        self.nonterms
            .meta(nonterm)
            .map(|info| info.kind)
            .unwrap_or_default()
    }

    pub fn rules_of(&self, nonterm: usize) -> &[usize] {
        self.nonterms
            .meta(nonterm)
            .map(|info| info.rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn merges_of(&self, nonterm: usize) -> &[usize] {
        self.nonterms
            .meta(nonterm)
            .map(|info| info.merges.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the start record whose augmented rule is `rule`, if any.
    pub fn start_of_rule(&self, rule: usize) -> Option<&StartSymbol> {
        self.starts.iter().find(|s| s.rule == rule)
    }

    pub fn symbol_name(&self, sym: Symbol) -> &str {
        match sym {
            Symbol::Term(t) => self.term_name(t),
            Symbol::NonTerm(n) => self.nonterm_name(n),
        }
    }

    /// Renders `rule` as `Lhs -> a B c`, with a `.` at `dot` when given.
    pub fn rule_string(&self, rule: usize, dot: Option<usize>) -> String {
        let r = &self.rules[rule];
        let mut s = String::new();
        let _ = write!(s, "{} ->", self.nonterm_name(r.lhs));
        for (i, &sym) in r.rhs.iter().enumerate() {
            if dot == Some(i) {
                s.push_str(" .");
            }
            let _ = write!(s, " {}", self.symbol_name(sym));
        }
        if dot == Some(r.rhs.len()) {
            s.push_str(" .");
        }
        s
    }

    /// Checks the structural invariants that the builder cannot express in
    /// types: rule ownership, merge-rule sides and start productivity.
    pub fn validate(&self) -> Result<(), GrammarError> {
        if self.starts.is_empty() {
            return Err(GrammarError::NoStart);
        }
        for (nt, (name, info)) in self.nonterms.iter().enumerate() {
            for &r in &info.rules {
                if self.rules.get(r).map(|rule| rule.lhs) != Some(nt) {
                    return Err(GrammarError::Internal(format!(
                        "rule {r} is owned by {name:?} but has a different lhs"
                    )));
                }
            }
        }
        for (m, merge) in self.merges.iter().enumerate() {
            let left = self.rules[merge.left].lhs;
            let right = self.rules[merge.right].lhs;
            if left != merge.lhs || right != merge.lhs {
                return Err(GrammarError::MergeLhsMismatch {
                    merge: m,
                    lhs: self.nonterm_name(merge.lhs).into(),
                    left: self.nonterm_name(left).into(),
                    right: self.nonterm_name(right).into(),
                });
            }
        }
        let productive = self.productive();
        for s in &self.starts {
            if !productive[s.nonterm] {
                return Err(GrammarError::UnproductiveStart {
                    name: self.nonterm_name(s.nonterm).into(),
                });
            }
        }
        Ok(())
    }

    /// Nonterminals that derive at least one terminal string.
    fn productive(&self) -> Vec<bool> {
        let mut productive = vec![false; self.n_nonterms()];
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &self.rules {
                if productive[rule.lhs] {
                    continue;
                }
                let all = rule.rhs.iter().all(|sym| match *sym {
                    Symbol::Term(_) => true,
                    Symbol::NonTerm(n) => productive[n],
                });
                if all {
                    productive[rule.lhs] = true;
                    changed = true;
                }
            }
        }
        productive
    }

    /// Drops every nonterminal, terminal, rule and merge rule that cannot be
    /// reached from a start symbol, compacting indices in their original
    /// relative order. `$end` always survives.
    pub fn prune_unreachable(&mut self) -> Result<(), GrammarError> {
        let mut reachable = vec![false; self.n_nonterms()];
        let mut stack: Vec<usize> = self
            .starts
            .iter()
            .flat_map(|s| [s.augmented, s.nonterm])
            .collect();
        while let Some(nt) = stack.pop() {
            if reachable[nt] {
                continue;
            }
            reachable[nt] = true;
            for &r in self.rules_of(nt) {
                for sym in &self.rules[r].rhs {
                    if let Symbol::NonTerm(n) = *sym {
                        if !reachable[n] {
                            stack.push(n);
                        }
                    }
                }
            }
        }

        let mut used = vec![false; self.n_terms()];
        used[self.eof] = true;
        let rule_order: Vec<usize> = (0..self.n_rules())
            .filter(|&r| reachable[self.rules[r].lhs])
            .collect();
        for &r in &rule_order {
            for sym in &self.rules[r].rhs {
                if let Symbol::Term(t) = *sym {
                    used[t] = true;
                }
            }
        }

        let mut terms = Vec::new();
        let mut term_map = vec![None; self.n_terms()];
        for (t, name) in self.terms.names().enumerate() {
            if used[t] {
                term_map[t] = Some(terms.len());
                terms.push(String::from(name));
            }
        }

        log::debug!(
            "prune: kept {}/{} terminals, {}/{} nonterminals, {}/{} rules",
            terms.len(),
            self.n_terms(),
            reachable.iter().filter(|&&r| r).count(),
            self.n_nonterms(),
            rule_order.len(),
            self.n_rules()
        );
        *self = self.rebuild(&terms, &term_map, &reachable, &rule_order)?;
        Ok(())
    }

    /// Reorders rules so that, whenever `B` derives `A`, the rules of `A`
    /// come before the rules of `B`. Mutually recursive nonterminals form one
    /// group; groups that are not ordered by the derives relation, and rules
    /// inside a group, keep their original relative order.
    pub fn sort_rules(&mut self) -> Result<(), GrammarError> {
        let derives = self.derives_closure();
        let n = self.n_nonterms();

        // Strongly connected groups of the derives relation.
        let mut group = vec![usize::MAX; n];
        let mut members: Vec<Vec<usize>> = Vec::new();
        for a in 0..n {
            if group[a] != usize::MAX {
                continue;
            }
            let g = members.len();
            let mut list = vec![a];
            group[a] = g;
            for &b in &derives[a] {
                if b != a && group[b] == usize::MAX && derives[b].contains(&a) {
                    group[b] = g;
                    list.push(b);
                }
            }
            list.sort_unstable();
            members.push(list);
        }

        let key: Vec<usize> = members
            .iter()
            .map(|list| {
                list.iter()
                    .flat_map(|&nt| self.rules_of(nt).iter().copied())
                    .min()
                    .unwrap_or(usize::MAX)
            })
            .collect();

        let mut pending = vec![0usize; members.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); members.len()];
        for (g, list) in members.iter().enumerate() {
            let mut deps: Vec<usize> = list
                .iter()
                .flat_map(|&nt| derives[nt].iter().map(|&d| group[d]))
                .filter(|&d| d != g)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            pending[g] = deps.len();
            for d in deps {
                dependents[d].push(g);
            }
        }

        let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..members.len())
            .filter(|&g| pending[g] == 0)
            .map(|g| Reverse((key[g], g)))
            .collect();
        let mut rule_order = Vec::with_capacity(self.n_rules());
        while let Some(Reverse((_, g))) = ready.pop() {
            let mut rules: Vec<usize> = members[g]
                .iter()
                .flat_map(|&nt| self.rules_of(nt).iter().copied())
                .collect();
            rules.sort_unstable();
            rule_order.extend(rules);
            for &dep in &dependents[g] {
                pending[dep] -= 1;
                if pending[dep] == 0 {
                    ready.push(Reverse((key[dep], dep)));
                }
            }
        }
        if rule_order.len() != self.n_rules() {
            return Err(GrammarError::Internal(format!(
                "rule sort emitted {} of {} rules",
                rule_order.len(),
                self.n_rules()
            )));
        }

        let terms: Vec<String> = self.terms.names().map(String::from).collect();
        let term_map: Vec<Option<usize>> = (0..self.n_terms()).map(Some).collect();
        let keep = vec![true; n];
        *self = self.rebuild(&terms, &term_map, &keep, &rule_order)?;
        Ok(())
    }

    /// Builds the grammar over terminal classes: each class becomes one
    /// terminal named after its first member, and rules that become identical
    /// collapse into the first of them unless a merge rule refers to them.
    pub fn quotient(&self, classes: &TerminalClasses) -> Result<Grammar, GrammarError> {
        let terms: Vec<String> = classes
            .members
            .iter()
            .map(|m| String::from(self.term_name(m[0])))
            .collect();
        let term_map: Vec<Option<usize>> = classes.class_of.iter().copied().map(Some).collect();

        let merged: Vec<bool> = {
            let mut v = vec![false; self.n_rules()];
            for m in &self.merges {
                v[m.left] = true;
                v[m.right] = true;
            }
            v
        };
        let mut seen: BTreeMap<(usize, Vec<Symbol>, Option<u32>, Assoc), usize> = BTreeMap::new();
        let mut rule_order = Vec::with_capacity(self.n_rules());
        for (r, rule) in self.rules.iter().enumerate() {
            if !merged[r] {
                let rhs: Vec<Symbol> = rule
                    .rhs
                    .iter()
                    .map(|&sym| match sym {
                        Symbol::Term(t) => Symbol::Term(classes.class_of[t]),
                        other => other,
                    })
                    .collect();
                let key = (rule.lhs, rhs, rule.prec, rule.assoc);
                if seen.contains_key(&key) {
                    continue;
                }
                seen.insert(key, r);
            }
            rule_order.push(r);
        }
        let keep = vec![true; self.n_nonterms()];
        self.rebuild(&terms, &term_map, &keep, &rule_order)
    }

    /// Builds a compacted copy: `terms` are the new terminal names (`$end`
    /// first), `term_map` maps old terminals to new ones, `keep` selects the
    /// surviving nonterminals and `rule_order` lists the surviving old rules
    /// in their new order.
    fn rebuild(
        &self,
        terms: &[String],
        term_map: &[Option<usize>],
        keep: &[bool],
        rule_order: &[usize],
    ) -> Result<Grammar, GrammarError> {
        let mut g = Grammar::new();
        for name in terms {
            g.add_terminal(name);
        }
        if g.eof != term_map[self.eof].unwrap_or(usize::MAX) {
            return Err(GrammarError::Internal("$end was renumbered".into()));
        }

        let mut nonterm_map = vec![None; self.n_nonterms()];
        for (nt, (name, info)) in self.nonterms.iter().enumerate() {
            if keep[nt] {
                nonterm_map[nt] = Some(g.add_nonterminal(name, info.kind));
            }
        }

        let missing = |what: &str, idx: usize| GrammarError::Internal(format!("{what} {idx} lost while rebuilding"));
        let mut rule_map = vec![None; self.n_rules()];
        for &r in rule_order {
            let rule = &self.rules[r];
            let lhs = nonterm_map[rule.lhs].ok_or_else(|| missing("nonterminal", rule.lhs))?;
            let rhs = rule
                .rhs
                .iter()
                .map(|&sym| match sym {
                    Symbol::Term(t) => term_map[t].map(Symbol::Term).ok_or_else(|| missing("terminal", t)),
                    Symbol::NonTerm(n) => nonterm_map[n].map(Symbol::NonTerm).ok_or_else(|| missing("nonterminal", n)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rule_map[r] = Some(g.add_rule(lhs, rhs, rule.prec, rule.assoc)?);
        }

        for merge in &self.merges {
            if let (Some(left), Some(right), Some(lhs)) = (
                rule_map[merge.left],
                rule_map[merge.right],
                nonterm_map[merge.lhs],
            ) {
                g.add_merge(lhs, left, right, merge.op)?;
            }
        }

        for s in &self.starts {
            let (Some(nonterm), Some(augmented), Some(rule)) =
                (nonterm_map[s.nonterm], nonterm_map[s.augmented], rule_map[s.rule])
            else {
                return Err(missing("start symbol", s.nonterm));
            };
            g.starts.push(StartSymbol {
                nonterm,
                augmented,
                rule,
            });
        }
        Ok(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(g: &mut Grammar, name: &str) -> Symbol {
        Symbol::Term(g.add_terminal(name))
    }

    #[test]
    fn eof_is_terminal_zero() {
        let g = Grammar::new();
        assert_eq!(g.eof(), 0);
        assert_eq!(g.term_name(0), EOF_NAME);
    }

    #[test]
    fn rules_inherit_lhs_kind() {
        let mut g = Grammar::new();
        let l = g.add_nonterminal("L", NontermKind::NegLookahead);
        let a = t(&mut g, "a");
        let r = g.add_rule(l, vec![a], None, Assoc::None).unwrap();
        assert_eq!(g.rule(r).kind, NontermKind::NegLookahead);
        assert_eq!(g.rules_of(l), &[r]);
    }

    #[test]
    fn merge_rejects_foreign_rules() {
        let mut g = Grammar::new();
        let x = g.add_nonterminal("X", NontermKind::Normal);
        let y = g.add_nonterminal("Y", NontermKind::Normal);
        let a = t(&mut g, "a");
        let rx = g.add_rule(x, vec![a], None, Assoc::None).unwrap();
        let ry = g.add_rule(y, vec![a], None, Assoc::None).unwrap();
        let err = g.add_merge(x, rx, ry, MergeOp::And).unwrap_err();
        assert!(matches!(err, GrammarError::MergeLhsMismatch { ref right, .. } if right == "Y"));
        assert!(g.merges().is_empty());
    }

    #[test]
    fn start_must_be_productive() {
        let mut g = Grammar::new();
        let s = g.add_nonterminal("S", NontermKind::Normal);
        let a = t(&mut g, "a");
        g.add_rule(s, vec![Symbol::NonTerm(s), a], None, Assoc::None).unwrap();
        g.add_start(s).unwrap();
        assert_eq!(
            g.validate(),
            Err(GrammarError::UnproductiveStart { name: "S".into() })
        );
    }

    #[test]
    fn validate_requires_a_start() {
        let g = Grammar::new();
        assert_eq!(g.validate(), Err(GrammarError::NoStart));
    }

    #[test]
    fn prune_compacts_indices() {
        let mut g = Grammar::new();
        let u = g.add_nonterminal("U", NontermKind::Normal);
        let s = g.add_nonterminal("S", NontermKind::Normal);
        let z = t(&mut g, "z");
        let a = t(&mut g, "a");
        g.add_rule(u, vec![z], None, Assoc::None).unwrap();
        g.add_rule(s, vec![a], None, Assoc::None).unwrap();
        g.add_start(s).unwrap();
        g.prune_unreachable().unwrap();

        assert_eq!(g.terminals().collect::<Vec<_>>(), vec![EOF_NAME, "a"]);
        assert_eq!(
            g.nonterminals().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["S", "S'"]
        );
        assert_eq!(g.n_rules(), 2);
        assert_eq!(g.rule_string(0, None), "S -> a");
        assert_eq!(g.starts()[0].nonterm, 0);
        assert_eq!(g.starts()[0].augmented, 1);
        assert_eq!(g.rule_string(g.starts()[0].rule, None), "S' -> S");
    }

    #[test]
    fn sort_puts_derived_rules_first() {
        // S ::= A B ; B ::= 'b' A ; A ::= 'a'   (declared in that order)
        let mut g = Grammar::new();
        let s = g.add_nonterminal("S", NontermKind::Normal);
        let b = g.add_nonterminal("B", NontermKind::Normal);
        let a = g.add_nonterminal("A", NontermKind::Normal);
        let tb = t(&mut g, "b");
        let ta = t(&mut g, "a");
        g.add_rule(s, vec![Symbol::NonTerm(a), Symbol::NonTerm(b)], None, Assoc::None)
            .unwrap();
        g.add_rule(b, vec![tb, Symbol::NonTerm(a)], None, Assoc::None).unwrap();
        g.add_rule(a, vec![ta], None, Assoc::None).unwrap();
        g.add_start(s).unwrap();
        g.sort_rules().unwrap();

        let order: Vec<String> = (0..g.n_rules()).map(|r| g.rule_string(r, None)).collect();
        assert_eq!(order, vec!["A -> a", "B -> b A", "S -> A B", "S' -> S"]);
        assert_eq!(g.rule_string(g.starts()[0].rule, None), "S' -> S");
    }

    #[test]
    fn sort_keeps_recursive_groups_in_original_order() {
        // E ::= E '+' T | T ; T ::= '(' E ')' | 'n'   (E and T are mutually recursive)
        let mut g = Grammar::new();
        let e = g.add_nonterminal("E", NontermKind::Normal);
        let tt = g.add_nonterminal("T", NontermKind::Normal);
        let plus = t(&mut g, "+");
        let lp = t(&mut g, "(");
        let rp = t(&mut g, ")");
        let n = t(&mut g, "n");
        g.add_rule(e, vec![Symbol::NonTerm(e), plus, Symbol::NonTerm(tt)], None, Assoc::None)
            .unwrap();
        g.add_rule(e, vec![Symbol::NonTerm(tt)], None, Assoc::None).unwrap();
        g.add_rule(tt, vec![lp, Symbol::NonTerm(e), rp], None, Assoc::None).unwrap();
        g.add_rule(tt, vec![n], None, Assoc::None).unwrap();
        g.add_start(e).unwrap();
        let before: Vec<String> = (0..g.n_rules()).map(|r| g.rule_string(r, None)).collect();
        g.sort_rules().unwrap();
        let after: Vec<String> = (0..g.n_rules()).map(|r| g.rule_string(r, None)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn merge_rules_survive_renumbering() {
        let mut g = Grammar::new();
        let x = g.add_nonterminal("X", NontermKind::Normal);
        let a = g.add_nonterminal("A", NontermKind::Normal);
        let ta = t(&mut g, "a");
        let r1 = g.add_rule(x, vec![Symbol::NonTerm(a)], None, Assoc::None).unwrap();
        let r2 = g.add_rule(x, vec![ta], None, Assoc::None).unwrap();
        g.add_rule(a, vec![ta], None, Assoc::None).unwrap();
        g.add_merge(x, r1, r2, MergeOp::Sub).unwrap();
        g.add_start(x).unwrap();
        g.sort_rules().unwrap();

        let m = g.merges()[0];
        assert_eq!(m.op, MergeOp::Sub);
        assert_eq!(g.rule_string(m.left, None), "X -> A");
        assert_eq!(g.rule_string(m.right, None), "X -> a");
        assert_eq!(g.merges_of(m.lhs), &[0]);
        g.validate().unwrap();
    }
}
