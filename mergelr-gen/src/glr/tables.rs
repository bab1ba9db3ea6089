//! # Table Encoding
//!
//! [`Tables`] is the flat, integer-only form of a resolved automaton that a
//! GLR driver consumes:
//!
//! * `action[state * n_columns + column]` holds `payload << 3 | tag`;
//! * an overflow cell's payload is an offset into `overflow`, where
//!   `overflow[off]` is a count followed by that many encoded actions;
//! * `goto[state * n_nonterms + nonterminal]` is a state or [`NO_STATE`];
//! * `rules[r]` is `[lhs, rhs_len]`;
//! * `merge[r]` is `other << 2 | role` (see the `MERGE_*` roles);
//! * `terminal_column[t]` maps every terminal to its action column.

use super::automaton::{Action, Automaton, Entry, EntryKind};
use super::classes::TerminalClasses;
use super::conflict::ActionRows;
use super::error::GrammarError;
use super::grammar::{Grammar, MergeOp};
use anyhow::{Result, bail};

pub const TAG_BITS: u32 = 3;
pub const TAG_MASK: u32 = (1 << TAG_BITS) - 1;
pub const MAX_PAYLOAD: u32 = u32::MAX >> TAG_BITS;

pub const ERROR: u32 = 0;
pub const SHIFT: u32 = 1;
pub const REDUCE: u32 = 2;
pub const ACCEPT: u32 = 3;
pub const LOOKAHEAD: u32 = 4;
pub const NEG_LOOKAHEAD: u32 = 5;
pub const OVERFLOW: u32 = 6;

pub const NO_STATE: u32 = u32::MAX;

pub const MERGE_NONE: u32 = 0;
pub const MERGE_AND: u32 = 1;
/// The rule is cancelled when its partner reduces over the same span.
pub const MERGE_SUB_MINUEND: u32 = 2;
/// The rule cancels its partner.
pub const MERGE_SUB_SUBTRAHEND: u32 = 3;

const MAGIC: u32 = 0x4d4c_5231;

/// A decoded action cell entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    Error,
    Shift(usize),
    Reduce(usize),
    Accept(usize),
    Lookahead(usize),
    NegLookahead(usize),
}

/// Decodes one non-overflow action word.
pub fn decode(word: u32) -> Cell {
    let payload = (word >> TAG_BITS) as usize;
    match word & TAG_MASK {
        SHIFT => Cell::Shift(payload),
        REDUCE => Cell::Reduce(payload),
        ACCEPT => Cell::Accept(payload),
        LOOKAHEAD => Cell::Lookahead(payload),
        NEG_LOOKAHEAD => Cell::NegLookahead(payload),
        _ => Cell::Error,
    }
}

fn pack(payload: usize, tag: u32) -> Result<u32, GrammarError> {
    match u32::try_from(payload) {
        Ok(p) if p <= MAX_PAYLOAD => Ok(p << TAG_BITS | tag),
        _ => Err(GrammarError::Internal(format!(
            "payload {payload} does not fit in an action word"
        ))),
    }
}

fn word(n: usize) -> Result<u32, GrammarError> {
    u32::try_from(n).map_err(|_| GrammarError::Internal(format!("{n} does not fit in a table word")))
}

fn encode_action(action: &Action, overflow: &mut Vec<u32>) -> Result<u32, GrammarError> {
    match action {
        Action::Shift { state, .. } => pack(*state, SHIFT),
        Action::Reduce(r) => pack(*r, REDUCE),
        Action::Accept(s) => pack(*s, ACCEPT),
        Action::Lookahead { rule, negate: false } => pack(*rule, LOOKAHEAD),
        Action::Lookahead { rule, negate: true } => pack(*rule, NEG_LOOKAHEAD),
        Action::Overflow(actions) => {
            let offset = overflow.len();
            overflow.push(word(actions.len())?);
            for a in actions {
                if matches!(a, Action::Overflow(_)) {
                    return Err(GrammarError::Internal("nested overflow cell".into()));
                }
                let w = encode_action(a, overflow)?;
                overflow.push(w);
            }
            pack(offset, OVERFLOW)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tables {
    pub n_states: usize,
    pub n_columns: usize,
    pub n_nonterms: usize,
    pub eof: u32,
    pub action: Vec<u32>,
    pub overflow: Vec<u32>,
    pub goto: Vec<u32>,
    pub rules: Vec<[u32; 2]>,
    pub merge: Vec<u32>,
    pub terminal_column: Vec<u32>,
    pub entries: Vec<Entry>,
    /// Names of the terminals of the source grammar. Not serialized.
    pub terminal_labels: Vec<String>,
    /// Names of the nonterminals. Not serialized.
    pub nonterminal_labels: Vec<String>,
}

impl Tables {
    /// Encodes the resolved automaton of `g`, whose terminals are the
    /// `classes` of the terminals of `source`.
    pub fn encode(
        g: &Grammar,
        a: &Automaton,
        rows: &ActionRows,
        source: &Grammar,
        classes: &TerminalClasses,
    ) -> Result<Tables, GrammarError> {
        let n_states = a.states.len();
        let n_columns = g.n_terms();
        let n_nonterms = g.n_nonterms();
        if classes.len() != n_columns || classes.class_of.len() != source.n_terms() {
            return Err(GrammarError::Internal(format!(
                "{} terminal classes for {} columns",
                classes.len(),
                n_columns
            )));
        }
        if rows.len() != n_states {
            return Err(GrammarError::Internal("action rows do not match states".into()));
        }

        let mut action = vec![ERROR; n_states * n_columns];
        let mut overflow = Vec::new();
        for (s, row) in rows.iter().enumerate() {
            for (&t, act) in row {
                action[s * n_columns + t] = encode_action(act, &mut overflow)?;
            }
        }

        let mut goto = vec![NO_STATE; n_states * n_nonterms];
        for s in 0..n_states {
            for (n, target) in a.gotos(s) {
                goto[s * n_nonterms + n] = word(target)?;
            }
        }

        let rules = g
            .rules()
            .iter()
            .map(|r| -> Result<[u32; 2], GrammarError> { Ok([word(r.lhs)?, word(r.rhs.len())?]) })
            .collect::<Result<Vec<_>, _>>()?;

        let mut merge = vec![MERGE_NONE; g.n_rules()];
        for m in g.merges() {
            let (left_role, right_role) = match m.op {
                MergeOp::And => (MERGE_AND, MERGE_AND),
                MergeOp::Sub => (MERGE_SUB_MINUEND, MERGE_SUB_SUBTRAHEND),
            };
            for (rule, other, role) in [(m.left, m.right, left_role), (m.right, m.left, right_role)] {
                if merge[rule] != MERGE_NONE {
                    return Err(GrammarError::Internal(format!(
                        "rule {rule} takes part in several merge rules"
                    )));
                }
                merge[rule] = word(other)? << 2 | role;
            }
        }

        let terminal_column = classes
            .class_of
            .iter()
            .map(|&c| word(c))
            .collect::<Result<Vec<_>, _>>()?;

        let tables = Tables {
            n_states,
            n_columns,
            n_nonterms,
            eof: word(g.eof())?,
            action,
            overflow,
            goto,
            rules,
            merge,
            terminal_column,
            entries: a.entries.clone(),
            terminal_labels: source.terminals().map(String::from).collect(),
            nonterminal_labels: g.nonterminals().map(|(n, _)| String::from(n)).collect(),
        };
        log::debug!(
            "encode: {} states x {} columns, {} overflow words",
            n_states,
            n_columns,
            tables.overflow.len()
        );
        Ok(tables)
    }

    /// Every action for `state` on source terminal `terminal`, with overflow
    /// cells expanded.
    pub fn actions(&self, state: usize, terminal: usize) -> Vec<Cell> {
        let column = self.terminal_column[terminal] as usize;
        let w = self.action[state * self.n_columns + column];
        if w & TAG_MASK == OVERFLOW {
            let off = (w >> TAG_BITS) as usize;
            let count = self.overflow[off] as usize;
            self.overflow[off + 1..off + 1 + count]
                .iter()
                .map(|&w| decode(w))
                .collect()
        } else {
            match decode(w) {
                Cell::Error => Vec::new(),
                cell => vec![cell],
            }
        }
    }

    pub fn goto_state(&self, state: usize, nonterm: usize) -> Option<usize> {
        match self.goto[state * self.n_nonterms + nonterm] {
            NO_STATE => None,
            s => Some(s as usize),
        }
    }

    /// Entry state for parsing start symbol `nonterm`.
    pub fn start_state(&self, nonterm: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.nonterminal == nonterm && e.kind == EntryKind::Start)
            .map(|e| e.state)
    }

    /// Flattens the integer tables into one word stream.
    pub fn to_words(&self) -> Vec<u32> {
        let mut w = vec![
            MAGIC,
            self.n_states as u32,
            self.n_columns as u32,
            self.n_nonterms as u32,
            self.eof,
        ];
        let section = |w: &mut Vec<u32>, items: &[u32]| {
            w.push(items.len() as u32);
            w.extend_from_slice(items);
        };
        section(&mut w, &self.action);
        section(&mut w, &self.overflow);
        section(&mut w, &self.goto);
        section(&mut w, &self.rules.concat());
        section(&mut w, &self.merge);
        section(&mut w, &self.terminal_column);
        let entries: Vec<u32> = self
            .entries
            .iter()
            .flat_map(|e| {
                let kind = match e.kind {
                    EntryKind::Start => 0,
                    EntryKind::Lookahead { negate: false } => 1,
                    EntryKind::Lookahead { negate: true } => 2,
                };
                [e.nonterminal as u32, e.state as u32, kind]
            })
            .collect();
        section(&mut w, &entries);
        w
    }

    /// Reads tables back from [`Tables::to_words`] output. Labels are empty.
    pub fn from_words(words: &[u32]) -> Result<Tables> {
        let mut r = Reader { words, pos: 0 };
        if r.next()? != MAGIC {
            bail!("not a table stream");
        }
        let n_states = r.next()? as usize;
        let n_columns = r.next()? as usize;
        let n_nonterms = r.next()? as usize;
        let eof = r.next()?;
        let action = r.section()?;
        let overflow = r.section()?;
        let goto = r.section()?;
        let flat_rules = r.section()?;
        let merge = r.section()?;
        let terminal_column = r.section()?;
        let flat_entries = r.section()?;
        if r.pos != words.len() {
            bail!("{} trailing words after tables", words.len() - r.pos);
        }
        if action.len() != n_states * n_columns || goto.len() != n_states * n_nonterms {
            bail!("table sizes do not match {n_states} states");
        }
        if flat_rules.len() % 2 != 0 || flat_entries.len() % 3 != 0 {
            bail!("truncated rule or entry table");
        }
        let rules: Vec<[u32; 2]> = flat_rules.chunks(2).map(|c| [c[0], c[1]]).collect();
        let n_rules = rules.len();
        for &w in &action {
            if w & TAG_MASK != OVERFLOW {
                check_action(w, n_states, n_rules, n_nonterms)?;
                continue;
            }
            let off = (w >> TAG_BITS) as usize;
            let Some(&count) = overflow.get(off) else {
                bail!("overflow offset {off} is past the overflow table");
            };
            let Some(list) = overflow.get(off + 1..off + 1 + count as usize) else {
                bail!("overflow list at {off} overruns the overflow table");
            };
            for &x in list {
                check_action(x, n_states, n_rules, n_nonterms)?;
            }
        }
        if let Some(g) = goto.iter().find(|&&g| g != NO_STATE && g as usize >= n_states) {
            bail!("goto target {g} out of {n_states} states");
        }
        if let Some([lhs, _]) = rules.iter().find(|r| r[0] as usize >= n_nonterms) {
            bail!("rule lhs {lhs} out of {n_nonterms} nonterminals");
        }
        if merge.len() != n_rules {
            bail!("{} merge words for {n_rules} rules", merge.len());
        }
        if let Some(m) = merge.iter().find(|&&m| m & 3 != MERGE_NONE && (m >> 2) as usize >= n_rules) {
            bail!("merge word {m:#x} names a missing rule");
        }
        if eof as usize >= n_columns {
            bail!("end of input column {eof} out of {n_columns}");
        }
        if let Some(c) = terminal_column.iter().find(|&&c| c as usize >= n_columns) {
            bail!("terminal column {c} out of {n_columns}");
        }
        let entries = flat_entries
            .chunks(3)
            .map(|c| {
                let kind = match c[2] {
                    0 => EntryKind::Start,
                    1 => EntryKind::Lookahead { negate: false },
                    2 => EntryKind::Lookahead { negate: true },
                    k => bail!("unknown entry kind {k}"),
                };
                if c[0] as usize >= n_nonterms || c[1] as usize >= n_states {
                    bail!("entry ({}, {}) is out of range", c[0], c[1]);
                }
                Ok(Entry {
                    nonterminal: c[0] as usize,
                    state: c[1] as usize,
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tables {
            n_states,
            n_columns,
            n_nonterms,
            eof,
            action,
            overflow,
            goto,
            rules,
            merge,
            terminal_column,
            entries,
            terminal_labels: Vec::new(),
            nonterminal_labels: Vec::new(),
        })
    }
}

/// Checks that a plain action word names an existing state, rule or
/// nonterminal.
fn check_action(w: u32, n_states: usize, n_rules: usize, n_nonterms: usize) -> Result<()> {
    let payload = (w >> TAG_BITS) as usize;
    let (limit, what) = match w & TAG_MASK {
        ERROR => return Ok(()),
        SHIFT => (n_states, "state"),
        REDUCE | LOOKAHEAD | NEG_LOOKAHEAD => (n_rules, "rule"),
        ACCEPT => (n_nonterms, "nonterminal"),
        tag => bail!("action word {w:#x} has unexpected tag {tag}"),
    };
    if payload >= limit {
        bail!("action word {w:#x} names {what} {payload} of {limit}");
    }
    Ok(())
}

struct Reader<'a> {
    words: &'a [u32],
    pos: usize,
}

impl Reader<'_> {
    fn next(&mut self) -> Result<u32> {
        let Some(&w) = self.words.get(self.pos) else {
            bail!("table stream ends at word {}", self.pos);
        };
        self.pos += 1;
        Ok(w)
    }

    fn section(&mut self) -> Result<Vec<u32>> {
        let len = self.next()? as usize;
        let Some(items) = self.words.get(self.pos..self.pos + len) else {
            bail!("section of {len} words overruns the stream");
        };
        self.pos += len;
        Ok(items.to_vec())
    }
}
