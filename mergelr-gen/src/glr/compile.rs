//! The compilation pipeline from a [`Grammar`] to encoded [`Tables`].

use super::automaton::Automaton;
use super::classes::TerminalClasses;
use super::conflict::{Diagnostics, resolve};
use super::dump;
use super::error::GrammarError;
use super::grammar::Grammar;
use super::tables::Tables;
use std::io::{self, Write};

/// Switches for the optional pipeline stages and for table output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Drop symbols and rules unreachable from a start symbol.
    pub prune: bool,
    /// Order rules so that derived nonterminals come first.
    pub sort_rules: bool,
    /// Merge terminals that no parse can tell apart into one column.
    pub equivalence_classes: bool,
    /// Also write the packed form of the tables.
    pub packed: bool,
    /// Longest line of packed output.
    pub max_chunk_len: usize,
    /// Put the diagnostics dump into the generated source.
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prune: true,
            sort_rules: true,
            equivalence_classes: true,
            packed: false,
            max_chunk_len: 76,
            debug: false,
        }
    }
}

/// Everything the pipeline produced for one grammar.
#[derive(Clone, Debug)]
pub struct Compiled {
    /// The validated, pruned and sorted grammar over the source terminals.
    pub grammar: Grammar,
    pub classes: TerminalClasses,
    /// `grammar` over terminal classes; the automaton is built from it.
    pub quotient: Grammar,
    pub automaton: Automaton,
    pub tables: Tables,
    pub diagnostics: Diagnostics,
}

/// Runs the whole pipeline. On error nothing is produced.
pub fn compile(mut grammar: Grammar, options: &Options) -> Result<Compiled, GrammarError> {
    grammar.validate()?;
    if options.prune {
        grammar.prune_unreachable()?;
    }
    if options.sort_rules {
        grammar.sort_rules()?;
    }
    grammar.analyze();

    let classes = if options.equivalence_classes {
        grammar.terminal_equivalence_classes()
    } else {
        TerminalClasses::identity(grammar.n_terms())
    };
    let mut quotient = grammar.quotient(&classes)?;
    quotient.analyze();

    let automaton = Automaton::build(&quotient)?;
    let (rows, diagnostics) = resolve(&quotient, &automaton)?;
    let tables = Tables::encode(&quotient, &automaton, &rows, &grammar, &classes)?;
    log::info!(
        "compile: {} rules, {} terminals in {} columns, {} states, {} conflicts",
        quotient.n_rules(),
        grammar.n_terms(),
        tables.n_columns,
        tables.n_states,
        diagnostics.conflicts.len()
    );
    Ok(Compiled {
        grammar,
        classes,
        quotient,
        automaton,
        tables,
        diagnostics,
    })
}

impl Compiled {
    /// Writes the diagnostics dump: symbols, classes, rules, sets, states and
    /// retained conflicts.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        dump::write_symbols(out, &self.grammar)?;
        dump::write_classes(out, &self.grammar, &self.classes)?;
        dump::write_rules(out, &self.quotient)?;
        dump::write_sets(out, &self.quotient)?;
        dump::write_states(out, &self.quotient, &self.automaton)?;
        dump::write_conflicts(out, &self.quotient, &self.diagnostics)?;
        Ok(())
    }

    /// The dump as a string.
    pub fn dump_string(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.dump(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::{Choice, GrammarBuilder, and, neg, nt, seq, t};
    use super::super::grammar::Assoc;
    use super::super::tables::{Cell, MERGE_AND};
    use super::*;

    fn digits() -> GrammarBuilder {
        let mut b = GrammarBuilder::new();
        b.rule("Num", [seq([nt("Num"), nt("D")]), nt("D")]);
        b.rule("D", (0..10).map(|d| t(&d.to_string())));
        b
    }

    #[test]
    fn digits_share_one_column() {
        let _ = env_logger::builder().is_test(true).try_init();
        let c = compile(digits().build().unwrap(), &Options::default()).unwrap();
        assert_eq!(c.grammar.n_terms(), 11);
        assert_eq!(c.tables.n_columns, 2);
        assert_eq!(c.quotient.rules_of(c.quotient.nonterm_idx("D").unwrap()).len(), 1);
        let column = c.tables.terminal_column[c.grammar.term_idx("0").unwrap()];
        for d in 1..10 {
            let t = c.grammar.term_idx(&d.to_string()).unwrap();
            assert_eq!(c.tables.terminal_column[t], column);
        }

        let off = Options {
            equivalence_classes: false,
            ..Options::default()
        };
        let c = compile(digits().build().unwrap(), &off).unwrap();
        assert_eq!(c.tables.n_columns, 11);
    }

    #[test]
    fn compiling_twice_gives_identical_tables() {
        let mut b = GrammarBuilder::new();
        b.rule(
            "E",
            [
                Choice::new(seq([nt("E"), t("+"), nt("E")])).with_prec(1, Assoc::Left),
                Choice::new(seq([nt("E"), t("*"), nt("E")])).with_prec(2, Assoc::Left),
                Choice::new(t("num")),
            ],
        );
        let first = compile(b.build().unwrap(), &Options::default()).unwrap();
        let second = compile(b.build().unwrap(), &Options::default()).unwrap();
        assert_eq!(first.tables, second.tables);
        assert!(first.diagnostics.conflicts.is_empty());
    }

    #[test]
    fn pruning_drops_unreachable_rules() {
        let mut b = GrammarBuilder::new();
        b.rule("S", [t("a")]).rule("Unused", [t("z")]);
        let c = compile(b.build().unwrap(), &Options::default()).unwrap();
        assert_eq!(c.grammar.nonterm_idx("Unused"), None);
        assert_eq!(c.grammar.term_idx("z"), None);

        let keep = Options {
            prune: false,
            ..Options::default()
        };
        let c = compile(b.build().unwrap(), &keep).unwrap();
        assert!(c.grammar.nonterm_idx("Unused").is_some());
    }

    #[test]
    fn invalid_grammars_produce_nothing() {
        let mut b = GrammarBuilder::new();
        b.rule("S", [seq([t("a"), nt("S")])]);
        let err = compile(b.build().unwrap(), &Options::default()).unwrap_err();
        assert_eq!(err, GrammarError::UnproductiveStart { name: "S".into() });
    }

    #[test]
    fn and_operands_keep_their_columns() {
        // S ::= X D ; X ::= 'a' & 'b' ; D ::= '0' | '1' | '2'
        let mut b = GrammarBuilder::new();
        b.rule("S", [seq([nt("X"), nt("D")])])
            .rule("X", [and(t("a"), t("b"))])
            .rule("D", [t("0"), t("1"), t("2")]);
        let c = compile(b.build().unwrap(), &Options::default()).unwrap();
        let column = |n| c.tables.terminal_column[c.grammar.term_idx(n).unwrap()];
        assert_eq!(c.tables.n_columns, 4);
        assert_ne!(column("a"), column("b"));
        assert_eq!(column("0"), column("2"));
        assert_eq!(c.quotient.rules_of(c.quotient.nonterm_idx("D").unwrap()).len(), 1);

        let x = c.quotient.nonterm_idx("X").unwrap() as u32;
        let m = c.quotient.merges()[0];
        assert_eq!(c.tables.merge[m.left], (m.right as u32) << 2 | MERGE_AND);
        assert_eq!(c.tables.merge[m.right], (m.left as u32) << 2 | MERGE_AND);
        assert_eq!(c.tables.rules[m.left], [x, 1]);
        assert_eq!(c.tables.rules[m.right], [x, 1]);
        assert!(c.diagnostics.conflicts.is_empty());
    }

    #[test]
    fn predicate_after_a_reduction_is_zero_width() {
        // Y ::= Z X ; Z ::= 'z' ; X ::= ![A] 'c' ; A ::= 'a'
        let mut b = GrammarBuilder::new();
        b.rule("Y", [seq([nt("Z"), nt("X")])])
            .rule("Z", [t("z")])
            .rule("X", [seq([neg(nt("A")), t("c")])])
            .rule("A", [t("a")]);
        let c = compile(b.build().unwrap(), &Options::default()).unwrap();
        let term = |n| c.grammar.term_idx(n).unwrap();
        let z = c.quotient.nonterm_idx("Z").unwrap();
        let start = c.tables.start_state(c.quotient.nonterm_idx("Y").unwrap()).unwrap();

        let [Cell::Shift(after_z)] = c.tables.actions(start, term("z"))[..] else {
            panic!("no shift on 'z'");
        };
        let reduce = c.tables.actions(after_z, term("c"));
        assert!(matches!(reduce[..], [Cell::Reduce(r)] if c.tables.rules[r][0] as usize == z));
        assert!(c.tables.actions(after_z, term("a")).is_empty());

        let before_x = c.tables.goto_state(start, z).unwrap();
        assert!(matches!(
            c.tables.actions(before_x, term("c"))[..],
            [Cell::NegLookahead(_)]
        ));
        assert!(c.tables.actions(before_x, term("a")).is_empty());
    }

    #[test]
    fn dump_lists_every_section() {
        let c = compile(digits().build().unwrap(), &Options::default()).unwrap();
        let text = c.dump_string();
        for tag in ["TS,", "NS,", "KS,2", "PS,", "FIRST,", "FOLLOW,", "CS,", "XS,0"] {
            assert!(text.contains(tag), "missing {tag}");
        }
    }
}
