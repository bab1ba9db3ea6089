//! # Grammar Builder
//!
//! Grammars are described as nonterminals with ordered lists of [`Choice`]s,
//! each wrapping an [`Expr`] in the combinator algebra. [`GrammarBuilder`]
//! lowers these trees into the flat normal rules and merge rules of a
//! [`Grammar`]:
//!
//! * a sequence becomes one rule whose rhs is the spliced symbol list;
//! * `And(a, b)` / `Sub(a, b)` at the top of a choice become two rules of the
//!   same nonterminal plus a [`MergeRule`](super::grammar::MergeRule);
//! * a lookahead becomes a synthetic nonterminal of kind
//!   [`NontermKind::PosLookahead`] or [`NontermKind::NegLookahead`] with a
//!   single rule;
//! * a combinator nested inside a sequence is lifted into a fresh synthetic
//!   nonterminal named `Owner$n`.

use super::error::GrammarError;
use super::grammar::{Assoc, Grammar, MergeOp, NontermKind, Symbol};
use indexmap::IndexMap;
use smartstring::alias::String;

/// A combinator expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Term(String),
    NonTerm(String),
    Seq(Vec<Expr>),
    And(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Lookahead { item: Box<Expr>, negate: bool },
}

pub fn t(name: &str) -> Expr {
    Expr::Term(name.into())
}

pub fn nt(name: &str) -> Expr {
    Expr::NonTerm(name.into())
}

pub fn seq(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Seq(items.into_iter().collect())
}

pub fn and(a: Expr, b: Expr) -> Expr {
    Expr::And(Box::new(a), Box::new(b))
}

pub fn sub(a: Expr, b: Expr) -> Expr {
    Expr::Sub(Box::new(a), Box::new(b))
}

/// Positive lookahead `[item]`.
pub fn pos(item: Expr) -> Expr {
    Expr::Lookahead {
        item: Box::new(item),
        negate: false,
    }
}

/// Negative lookahead `![item]`.
pub fn neg(item: Expr) -> Expr {
    Expr::Lookahead {
        item: Box::new(item),
        negate: true,
    }
}

/// One alternative of a nonterminal, with optional precedence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    pub expr: Expr,
    pub prec: Option<u32>,
    pub assoc: Assoc,
}

impl Choice {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            prec: None,
            assoc: Assoc::None,
        }
    }

    pub fn with_prec(mut self, prec: u32, assoc: Assoc) -> Self {
        self.prec = Some(prec);
        self.assoc = assoc;
        self
    }
}

impl From<Expr> for Choice {
    fn from(expr: Expr) -> Self {
        Choice::new(expr)
    }
}

/// Collects terminal declarations, nonterminal definitions and start symbols,
/// then lowers them into a [`Grammar`].
#[derive(Clone, Debug, Default)]
pub struct GrammarBuilder {
    terminals: Vec<String>,
    defs: IndexMap<String, Vec<Choice>>,
    starts: Vec<String>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a terminal up front. Terminals used in choices are declared
    /// implicitly; explicit declaration only fixes their order.
    pub fn terminal(&mut self, name: &str) -> &mut Self {
        self.terminals.push(name.into());
        self
    }

    /// Appends `choices` to the definition of `lhs`, creating it if needed.
    pub fn rule<C: Into<Choice>>(
        &mut self,
        lhs: &str,
        choices: impl IntoIterator<Item = C>,
    ) -> &mut Self {
        self.defs
            .entry(lhs.into())
            .or_default()
            .extend(choices.into_iter().map(Into::into));
        self
    }

    pub fn start(&mut self, name: &str) -> &mut Self {
        self.starts.push(name.into());
        self
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&str, &[Choice])> {
        self.defs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Lowers the definitions into a grammar. When no start symbol was named
    /// the first definition is the start symbol.
    pub fn build(&self) -> Result<Grammar, GrammarError> {
        let mut lower = Lowering {
            g: Grammar::new(),
            defs: &self.defs,
            next_synth: 0,
        };
        for name in &self.terminals {
            lower.g.add_terminal(name);
        }
        for name in self.defs.keys() {
            lower.g.add_nonterminal(name, NontermKind::Normal);
        }

        for (lhs, (name, choices)) in self.defs.iter().enumerate() {
            if choices.is_empty() {
                return Err(GrammarError::NoChoices {
                    name: name.to_string(),
                });
            }
            for choice in choices {
                lower.choice(name, lhs, &choice.expr, choice.prec, choice.assoc)?;
            }
        }

        let starts: Vec<&str> = if self.starts.is_empty() {
            self.defs.keys().take(1).map(|k| k.as_str()).collect()
        } else {
            self.starts.iter().map(|s| s.as_str()).collect()
        };
        if starts.is_empty() {
            return Err(GrammarError::NoStart);
        }
        for name in starts {
            let nt = self
                .defs
                .get_index_of(name)
                .ok_or_else(|| GrammarError::UnknownStart {
                    name: name.to_string(),
                })?;
            lower.g.add_start(nt)?;
        }

        let g = lower.g;
        log::debug!(
            "build: {} terminals, {} nonterminals, {} rules, {} merge rules",
            g.n_terms(),
            g.n_nonterms(),
            g.n_rules(),
            g.merges().len()
        );
        Ok(g)
    }
}

struct Lowering<'a> {
    g: Grammar,
    defs: &'a IndexMap<String, Vec<Choice>>,
    next_synth: usize,
}

impl Lowering<'_> {
    /// Lowers one choice of nonterminal `lhs`; `owner` names the user
    /// definition it came from.
    fn choice(
        &mut self,
        owner: &str,
        lhs: usize,
        expr: &Expr,
        prec: Option<u32>,
        assoc: Assoc,
    ) -> Result<(), GrammarError> {
        let (a, b, op) = match expr {
            Expr::And(a, b) => (a, b, MergeOp::And),
            Expr::Sub(a, b) => (a, b, MergeOp::Sub),
            _ => {
                let rhs = self.flatten(owner, expr)?;
                self.g.add_rule(lhs, rhs, prec, assoc)?;
                return Ok(());
            }
        };
        let left = self.operand(owner, a, op)?;
        let right = self.operand(owner, b, op)?;
        let left = self.g.add_rule(lhs, left, prec, assoc)?;
        let right = self.g.add_rule(lhs, right, prec, assoc)?;
        self.g.add_merge(lhs, left, right, op)?;
        Ok(())
    }

    fn operand(&mut self, owner: &str, expr: &Expr, op: MergeOp) -> Result<Vec<Symbol>, GrammarError> {
        match expr {
            Expr::Term(_) | Expr::NonTerm(_) | Expr::Seq(_) => self.flatten(owner, expr),
            Expr::And(..) | Expr::Sub(..) | Expr::Lookahead { .. } => {
                Err(GrammarError::MalformedNesting {
                    name: owner.to_string(),
                    detail: format!(
                        "{op:?} operand must be a terminal, nonterminal or sequence, found {}",
                        describe(expr)
                    ),
                })
            }
        }
    }

    fn flatten(&mut self, owner: &str, expr: &Expr) -> Result<Vec<Symbol>, GrammarError> {
        match expr {
            Expr::Term(name) => Ok(vec![Symbol::Term(self.g.add_terminal(name))]),
            Expr::NonTerm(name) => match self.defs.get_index_of(name.as_str()) {
                Some(n) => Ok(vec![Symbol::NonTerm(n)]),
                None => Err(GrammarError::UndefinedNonterminal {
                    name: name.to_string(),
                    referenced_from: owner.to_string(),
                }),
            },
            Expr::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.extend(self.flatten(owner, item)?);
                }
                Ok(out)
            }
            Expr::And(..) | Expr::Sub(..) => {
                let synth = self.synthetic(owner, NontermKind::Normal);
                self.choice(owner, synth, expr, None, Assoc::None)?;
                Ok(vec![Symbol::NonTerm(synth)])
            }
            Expr::Lookahead { item, negate } => {
                let kind = if *negate {
                    NontermKind::NegLookahead
                } else {
                    NontermKind::PosLookahead
                };
                let synth = self.synthetic(owner, kind);
                let rhs = self.flatten(owner, item)?;
                self.g.add_rule(synth, rhs, None, Assoc::None)?;
                Ok(vec![Symbol::NonTerm(synth)])
            }
        }
    }

    fn synthetic(&mut self, owner: &str, kind: NontermKind) -> usize {
        loop {
            self.next_synth += 1;
            let name = format!("{owner}${}", self.next_synth);
            if self.g.nonterm_idx(&name).is_none() {
                return self.g.add_nonterminal(&name, kind);
            }
        }
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Term(_) => "a terminal",
        Expr::NonTerm(_) => "a nonterminal",
        Expr::Seq(_) => "a sequence",
        Expr::And(..) => "an AND",
        Expr::Sub(..) => "a SUB",
        Expr::Lookahead { .. } => "a lookahead",
    }
}
