//! Implementation of the `mergelr` GLR parser-table generator.
//!
//! A grammar is assembled with [`GrammarBuilder`] (or parsed from a `.glr`
//! file with [`parse_grammar`]) and turned into [`Tables`] by [`compile`].
//! Cells the grammar leaves ambiguous are kept as overflow lists for a GLR
//! driver to fork on. [`generate`] does the whole trip from a grammar file to
//! a Rust source file and can be called from a `build.rs` script.

mod automaton;
mod builder;
mod classes;
mod compile;
mod conflict;
mod dump;
mod error;
mod generate;
mod grammar;
mod lexer;
mod parser;
mod sets;
mod sink;
mod symtab;
pub mod tables;

#[cfg(test)]
mod test_driver;

pub use automaton::{Action, Automaton, Entry, EntryKind, Item, ItemSet, State, advance, closure, goto};
pub use builder::{Choice, Expr, GrammarBuilder, and, neg, nt, pos, seq, sub, t};
pub use classes::TerminalClasses;
pub use compile::{Compiled, Options, compile};
pub use conflict::{ActionRows, Conflict, Diagnostics, resolve};
pub use dump::{write_classes, write_conflicts, write_rules, write_sets, write_states, write_symbols};
pub use error::GrammarError;
pub use generate::{generate, generate_with};
pub use grammar::{Assoc, Grammar, MergeOp, MergeRule, NontermInfo, NontermKind, Rule, StartSymbol, Symbol};
pub use lexer::{Lexer, Token};
pub use parser::{Decl, parse_grammar};
pub use sets::Sets;
pub use sink::{PackedSink, RustSink, TableSink, pack, unpack};
pub use symtab::Symtab;
pub use tables::{Cell, Tables, decode};
