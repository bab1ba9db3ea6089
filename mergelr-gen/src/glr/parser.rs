use super::builder::{Choice, Expr, GrammarBuilder, and, sub};
use super::error::GrammarError;
use super::grammar::{Assoc, MergeOp};
use super::lexer::{Lexer, Token};
use chumsky::prelude::*;
use smartstring::alias::String;

/// A top-level declaration of a grammar file.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Start(String),
    Rule { lhs: String, choices: Vec<Choice> },
}

pub fn parser<'a>() -> impl Parser<'a, &'a [Token], Vec<Decl>, extra::Err<Rich<'a, Token>>> {
    let term = select! { Token::Term(t) => Expr::Term(t) }.labelled("terminal");
    let nonterm = select! { Token::NonTerm(n) => Expr::NonTerm(n) }.labelled("nonterminal");
    let name = select! { Token::NonTerm(n) => n }.labelled("nonterminal");

    let expr = recursive(|expr| {
        let group = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));
        let lookahead = just(Token::Bang)
            .or_not()
            .then(expr.delimited_by(just(Token::LBracket), just(Token::RBracket)))
            .map(|(bang, item)| Expr::Lookahead {
                item: Box::new(item),
                negate: bang.is_some(),
            });
        let atom = term.or(nonterm).or(group).or(lookahead);

        // A one-item sequence is the item itself so that `(A) & (B)` keeps
        // plain operands.
        let sequence = atom.repeated().collect::<Vec<_>>().map(|mut items| {
            if items.len() == 1 {
                items.remove(0)
            } else {
                Expr::Seq(items)
            }
        });

        let op = choice((
            just(Token::Amp).to(MergeOp::And),
            just(Token::Minus).to(MergeOp::Sub),
        ));
        sequence
            .clone()
            .then(op.then(sequence).or_not())
            .map(|(a, rest)| match rest {
                None => a,
                Some((MergeOp::And, b)) => and(a, b),
                Some((MergeOp::Sub, b)) => sub(a, b),
            })
    });

    let assoc = choice((
        just(Token::Left).to(Assoc::Left),
        just(Token::Right).to(Assoc::Right),
        just(Token::Nonassoc).to(Assoc::None),
        just(Token::Prec).to(Assoc::None),
    ))
    .labelled("precedence");
    let level = select! { Token::Int(n) => n }.labelled("integer");

    let alternative = expr
        .then(assoc.then(level).or_not())
        .map(|(expr, prec)| match prec {
            Some((assoc, level)) => Choice::new(expr).with_prec(level, assoc),
            None => Choice::new(expr),
        });

    let rule = name
        .clone()
        .then_ignore(just(Token::Colon))
        .then(
            alternative
                .separated_by(just(Token::Bar))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::Semi))
        .map(|(lhs, choices)| Decl::Rule { lhs, choices });

    let start = just(Token::Start).ignore_then(name).map(Decl::Start);

    start
        .or(rule)
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Parses grammar source text into a [`GrammarBuilder`].
pub fn parse_grammar(src: &str) -> Result<GrammarBuilder, GrammarError> {
    let (tokens, lines) = Lexer::tokenize_all(src)?;
    let decls = parser().parse(&tokens).into_result().map_err(|errs| {
        let first = &errs[0];
        let at = first.span().start;
        let line = lines
            .get(at)
            .or(lines.last())
            .copied()
            .unwrap_or(1);
        GrammarError::Syntax {
            line,
            message: format!("{:?}", first.reason()),
        }
    })?;

    let mut builder = GrammarBuilder::new();
    for decl in decls {
        match decl {
            Decl::Start(name) => {
                builder.start(&name);
            }
            Decl::Rule { lhs, choices } => {
                builder.rule(&lhs, choices);
            }
        }
    }
    Ok(builder)
}
