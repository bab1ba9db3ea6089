// Human-readable listings of a compiled grammar: symbols, rules, sets,
// automaton states and retained conflicts. Every line starts with a short
// record tag so the output can be grepped or loaded as CSV.

use super::automaton::{Action, Automaton};
use super::classes::TerminalClasses;
use super::conflict::Diagnostics;
use super::grammar::{Assoc, Grammar, MergeOp};
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Writes terminals (`T`) and nonterminals (`N`).
pub fn write_symbols<W: Write>(out: &mut W, g: &Grammar) -> io::Result<()> {
    writeln!(out, "TS,{}", g.n_terms())?;
    for (i, name) in g.terminals().enumerate() {
        writeln!(out, "T,{},{}", i, name)?;
    }
    writeln!(out, "NS,{}", g.n_nonterms())?;
    for (i, (name, info)) in g.nonterminals().enumerate() {
        writeln!(out, "N,{},{},{}", i, name, info.kind.to_str())?;
    }
    Ok(())
}

/// Writes the terminal classes (`K`) with their members.
pub fn write_classes<W: Write>(out: &mut W, g: &Grammar, classes: &TerminalClasses) -> io::Result<()> {
    writeln!(out, "KS,{}", classes.len())?;
    for (i, members) in classes.members.iter().enumerate() {
        write!(out, "K,{},", i)?;
        for &t in members {
            write!(out, "{} ", g.term_name(t))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the rules (`P`) with precedence, and the merge rules (`M`).
///
/// # Output Format
/// ```text
/// PS,<number of rules>
/// P,<index>,<lhs> -> <rhs symbols>[ %left N]
/// M,<index>,AND|SUB,<left rule>,<right rule>
/// ```
pub fn write_rules<W: Write>(out: &mut W, g: &Grammar) -> io::Result<()> {
    writeln!(out, "PS,{}", g.n_rules())?;
    for (i, rule) in g.rules().iter().enumerate() {
        write!(out, "P,{},{}", i, g.rule_string(i, None))?;
        if let Some(p) = rule.prec {
            let kw = match rule.assoc {
                Assoc::Left => "left",
                Assoc::Right => "right",
                Assoc::None => "nonassoc",
            };
            write!(out, " %{} {}", kw, p)?;
        }
        writeln!(out)?;
    }
    for (i, m) in g.merges().iter().enumerate() {
        let op = match m.op {
            MergeOp::And => "AND",
            MergeOp::Sub => "SUB",
        };
        writeln!(out, "M,{},{},{},{}", i, op, m.left, m.right)?;
    }
    Ok(())
}

fn write_set<W: Write>(out: &mut W, g: &Grammar, set: &BTreeSet<usize>) -> io::Result<()> {
    for &t in set {
        write!(out, "{}, ", g.term_name(t))?;
    }
    Ok(())
}

/// Writes FIRST and FOLLOW sets of every nonterminal. The grammar must be
/// analyzed.
pub fn write_sets<W: Write>(out: &mut W, g: &Grammar) -> io::Result<()> {
    for nt in 0..g.n_nonterms() {
        write!(out, "FIRST,{},{{", g.nonterm_name(nt))?;
        if g.nullable(nt) {
            write!(out, "`empty', ")?;
        }
        write_set(out, g, g.first(nt))?;
        writeln!(out, "}}")?;
    }
    for nt in 0..g.n_nonterms() {
        write!(out, "FOLLOW,{},{{", g.nonterm_name(nt))?;
        write_set(out, g, g.follow(nt))?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn action_string(g: &Grammar, action: &Action) -> String {
    match action {
        Action::Shift { state, .. } => format!("Shift({state})"),
        Action::Reduce(r) => format!("Reduce({r})"),
        Action::Accept(s) => format!("Accept({})", g.nonterm_name(*s)),
        Action::Lookahead { rule, .. } => format!("{}({rule})", action.to_str()),
        Action::Overflow(actions) => {
            let inner: Vec<String> = actions.iter().map(|a| action_string(g, a)).collect();
            format!("Overflow[{}]", inner.join(" "))
        }
    }
}

/// Writes the automaton: kernel items with lookaheads (`C`), entry states
/// (`E`) and transitions (`G`).
pub fn write_states<W: Write>(out: &mut W, g: &Grammar, a: &Automaton) -> io::Result<()> {
    writeln!(out, "CS,{}", a.states.len())?;
    for e in &a.entries {
        writeln!(out, "E,{},{},{:?}", g.nonterm_name(e.nonterminal), e.state, e.kind)?;
    }
    for (i, state) in a.states.iter().enumerate() {
        for (item, la) in &state.kernel {
            write!(out, "C,{},{} [", i, g.rule_string(item.rule, Some(item.dot)))?;
            write_set(out, g, la)?;
            writeln!(out, "]")?;
        }
        for (sym, target) in &state.transitions {
            writeln!(out, "G,{},{},{}", i, g.symbol_name(*sym), target)?;
        }
    }
    Ok(())
}

/// Writes every retained conflict (`X`).
pub fn write_conflicts<W: Write>(out: &mut W, g: &Grammar, diag: &Diagnostics) -> io::Result<()> {
    writeln!(out, "XS,{}", diag.conflicts.len())?;
    for c in &diag.conflicts {
        let acts: Vec<String> = c.actions.iter().map(|a| action_string(g, a)).collect();
        writeln!(out, "X,{},{},{}", c.state, g.term_name(c.terminal), acts.join(" "))?;
    }
    Ok(())
}
