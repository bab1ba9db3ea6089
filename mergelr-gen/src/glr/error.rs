//! # Generator Error Type
//!
//! [`GrammarError`] is the single error surface of the table generator. Input
//! errors name the offending nonterminal or rule; [`GrammarError::Internal`]
//! signals a broken construction invariant and is never expected on valid
//! input.
use thiserror::Error;

/// Represents every failure that aborts table construction.
///
/// Ambiguity is *not* an error: unresolved conflicts are kept as overflow
/// cells and reported through [`Diagnostics`](super::conflict::Diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// A nonterminal was defined with an empty list of choices.
    #[error("nonterminal {name:?} has no choices")]
    NoChoices { name: String },

    /// A choice refers to a nonterminal that has no definition.
    #[error("nonterminal {name:?} (referenced from {referenced_from:?}) is never defined")]
    UndefinedNonterminal {
        name: String,
        referenced_from: String,
    },

    /// An `And`/`Sub` operand is not a terminal, nonterminal or sequence.
    #[error("malformed combinator in {name:?}: {detail}")]
    MalformedNesting { name: String, detail: String },

    /// The grammar declares no start symbol.
    #[error("grammar has no start symbol")]
    NoStart,

    /// A start symbol names no defined nonterminal.
    #[error("start symbol {name:?} is not a defined nonterminal")]
    UnknownStart { name: String },

    /// A start symbol cannot derive any terminal string through its rules.
    #[error("start symbol {name:?} derives no terminal string")]
    UnproductiveStart { name: String },

    /// A merge rule pairs rules whose left-hand sides differ from its own.
    #[error("merge rule {merge} of {lhs:?} pairs rules of {left:?} and {right:?}")]
    MergeLhsMismatch {
        merge: usize,
        lhs: String,
        left: String,
        right: String,
    },

    /// The grammar source could not be tokenized or parsed.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A construction invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}
