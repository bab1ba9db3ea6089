// This module builds the LALR(1) automaton: item closure and goto, state
// interning with lookahead merging, entry states for start symbols and
// lookahead predicates, and the per-state action candidates.

use super::error::GrammarError;
use super::grammar::{Assoc, Grammar, NontermKind, Symbol};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// An LR(0) item core: a rule and a dot position.
///
/// Lookaheads are never part of the core; they live as values of an
/// [`ItemSet`] so that growing them never touches a map key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Item {
    pub rule: usize,
    pub dot: usize,
}

/// Item cores with their accumulated lookahead terminals.
pub type ItemSet = BTreeMap<Item, BTreeSet<usize>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub kernel: ItemSet,
    /// Closure of the kernel, filled once the lookahead fixed point is reached.
    pub items: ItemSet,
    pub transitions: BTreeMap<Symbol, usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    Start,
    Lookahead { negate: bool },
}

/// A state in which the driver may begin a parse of `nonterminal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entry {
    pub nonterminal: usize,
    pub state: usize,
    pub kind: EntryKind,
}

/// A parser action for one terminal in one state.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Shift {
        state: usize,
        prec: Option<u32>,
        assoc: Assoc,
    },
    Reduce(usize),
    /// Completion of the augmented rule of start symbol `S`.
    Accept(usize),
    /// Run the predicate whose rule is `rule`.
    Lookahead { rule: usize, negate: bool },
    Overflow(Vec<Action>),
}

impl Action {
    pub fn to_str(&self) -> &'static str {
        match self {
            Action::Shift { .. } => "Shift",
            Action::Reduce(_) => "Reduce",
            Action::Accept(_) => "Accept",
            Action::Lookahead { negate: false, .. } => "Lookahead",
            Action::Lookahead { negate: true, .. } => "NegLookahead",
            Action::Overflow(_) => "Overflow",
        }
    }
}

/// Computes the LR(1) closure of `kernel`.
///
/// Every item `A -> α . X β` with a normal nonterminal `X` adds `X -> . γ`
/// for each rule of `X`, with lookahead `FIRST(β · la)`. Lookahead-kind
/// nonterminals are not expanded.
pub fn closure(g: &Grammar, kernel: &ItemSet) -> ItemSet {
    let mut items = kernel.clone();
    let mut work: Vec<Item> = items.keys().copied().collect();
    while let Some(item) = work.pop() {
        let rule = g.rule(item.rule);
        let Some(&Symbol::NonTerm(x)) = rule.rhs.get(item.dot) else {
            continue;
        };
        if g.kind(x).is_lookahead() {
            continue;
        }
        let (mut la, nullable) = g.first_of(&rule.rhs[item.dot + 1..]);
        if nullable {
            if let Some(own) = items.get(&item) {
                la.extend(own.iter().copied());
            }
        }
        for &r in g.rules_of(x) {
            let key = Item { rule: r, dot: 0 };
            let is_new = !items.contains_key(&key);
            let set = items.entry(key).or_default();
            let before = set.len();
            set.extend(la.iter().copied());
            if is_new || set.len() != before {
                work.push(key);
            }
        }
    }
    items
}

/// Advances every item whose post-dot symbol is `sym`, keeping lookaheads.
pub fn advance(g: &Grammar, items: &ItemSet, sym: Symbol) -> ItemSet {
    items
        .iter()
        .filter(|(item, _)| g.rule(item.rule).rhs.get(item.dot) == Some(&sym))
        .map(|(item, la)| {
            (
                Item {
                    rule: item.rule,
                    dot: item.dot + 1,
                },
                la.clone(),
            )
        })
        .collect()
}

pub fn goto(g: &Grammar, items: &ItemSet, sym: Symbol) -> ItemSet {
    closure(g, &advance(g, items, sym))
}

/// The LALR(1) automaton of a grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Automaton {
    pub states: Vec<State>,
    pub entries: Vec<Entry>,
}

struct Construction {
    states: Vec<State>,
    index: HashMap<Vec<Item>, usize>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
}

impl Construction {
    /// Returns the state with the same kernel core as `kernel`, merging the
    /// lookaheads in, or creates it. Any state that is new or grew is queued.
    fn intern(&mut self, kernel: ItemSet) -> usize {
        let core: Vec<Item> = kernel.keys().copied().collect();
        if let Some(&s) = self.index.get(&core) {
            let mut grew = false;
            for (item, la) in kernel {
                let set = self.states[s].kernel.entry(item).or_default();
                let before = set.len();
                set.extend(la);
                grew |= set.len() != before;
            }
            if grew && !self.queued[s] {
                self.queued[s] = true;
                self.queue.push_back(s);
            }
            s
        } else {
            let s = self.states.len();
            self.index.insert(core, s);
            self.states.push(State {
                kernel,
                items: ItemSet::new(),
                transitions: BTreeMap::new(),
            });
            self.queued.push(true);
            self.queue.push_back(s);
            s
        }
    }
}

impl Automaton {
    /// Builds the automaton. The grammar must be analyzed.
    pub fn build(g: &Grammar) -> Result<Self, GrammarError> {
        g.require_analysis()?;
        let mut c = Construction {
            states: Vec::new(),
            index: HashMap::new(),
            queue: VecDeque::new(),
            queued: Vec::new(),
        };

        let mut entries = Vec::new();
        for s in g.starts() {
            let kernel = ItemSet::from([(Item { rule: s.rule, dot: 0 }, BTreeSet::from([g.eof()]))]);
            entries.push(Entry {
                nonterminal: s.nonterm,
                state: c.intern(kernel),
                kind: EntryKind::Start,
            });
        }
        // A predicate matches a prefix, so its completion is valid on any
        // following terminal.
        let all: BTreeSet<usize> = (0..g.n_terms()).collect();
        for (nt, (_, info)) in g.nonterminals().enumerate() {
            if !info.kind.is_lookahead() {
                continue;
            }
            let kernel: ItemSet = info
                .rules
                .iter()
                .map(|&rule| (Item { rule, dot: 0 }, all.clone()))
                .collect();
            if kernel.is_empty() {
                return Err(GrammarError::Internal(format!(
                    "lookahead nonterminal {:?} has no rule",
                    g.nonterm_name(nt)
                )));
            }
            entries.push(Entry {
                nonterminal: nt,
                state: c.intern(kernel),
                kind: EntryKind::Lookahead {
                    negate: info.kind == NontermKind::NegLookahead,
                },
            });
        }

        let mut passes = 0usize;
        while let Some(s) = c.queue.pop_front() {
            passes += 1;
            c.queued[s] = false;
            let items = closure(g, &c.states[s].kernel);
            let symbols: BTreeSet<Symbol> = items
                .keys()
                .filter_map(|item| g.rule(item.rule).rhs.get(item.dot).copied())
                .collect();
            for sym in symbols {
                let next = advance(g, &items, sym);
                let target = c.intern(next);
                c.states[s].transitions.insert(sym, target);
            }
        }

        for state in c.states.iter_mut() {
            state.items = closure(g, &state.kernel);
        }
        log::debug!(
            "automaton: {} states, {} entries, {} worklist passes",
            c.states.len(),
            entries.len(),
            passes
        );
        Ok(Automaton {
            states: c.states,
            entries,
        })
    }

    /// Collects every candidate action of `state`, keyed by terminal.
    pub fn candidates(
        &self,
        g: &Grammar,
        state: usize,
    ) -> Result<BTreeMap<usize, BTreeSet<Action>>, GrammarError> {
        let st = &self.states[state];
        let mut out: BTreeMap<usize, BTreeSet<Action>> = BTreeMap::new();
        let mut shifts: BTreeMap<usize, (Option<u32>, Assoc)> = BTreeMap::new();

        for (item, la) in &st.items {
            let rule = g.rule(item.rule);
            match rule.rhs.get(item.dot) {
                Some(&Symbol::Term(t)) => {
                    let best = shifts.entry(t).or_insert((rule.prec, rule.assoc));
                    if rule.prec > best.0 {
                        *best = (rule.prec, rule.assoc);
                    }
                }
                Some(&Symbol::NonTerm(x)) if g.kind(x).is_lookahead() => {
                    let Some(&pred) = g.rules_of(x).first() else {
                        return Err(GrammarError::Internal(format!(
                            "lookahead nonterminal {:?} has no rule",
                            g.nonterm_name(x)
                        )));
                    };
                    let action = Action::Lookahead {
                        rule: pred,
                        negate: g.kind(x) == NontermKind::NegLookahead,
                    };
                    let (mut on, nullable) = g.first_of(&rule.rhs[item.dot + 1..]);
                    if nullable {
                        on.extend(la.iter().copied());
                    }
                    for t in on {
                        out.entry(t).or_default().insert(action.clone());
                    }
                }
                Some(&Symbol::NonTerm(_)) => {}
                None => {
                    let action = match g.start_of_rule(item.rule) {
                        Some(s) => Action::Accept(s.nonterm),
                        None => Action::Reduce(item.rule),
                    };
                    for &t in la {
                        out.entry(t).or_default().insert(action.clone());
                    }
                }
            }
        }

        for (t, (prec, assoc)) in shifts {
            let Some(&target) = st.transitions.get(&Symbol::Term(t)) else {
                return Err(GrammarError::Internal(format!(
                    "state {state} has no transition on {:?}",
                    g.term_name(t)
                )));
            };
            out.entry(t).or_default().insert(Action::Shift {
                state: target,
                prec,
                assoc,
            });
        }
        Ok(out)
    }

    /// Goto entries of `state`: nonterminal transitions.
    pub fn gotos(&self, state: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.states[state]
            .transitions
            .iter()
            .filter_map(|(sym, &target)| match *sym {
                Symbol::NonTerm(n) => Some((n, target)),
                Symbol::Term(_) => None,
            })
    }
}
