//! Lexer module.
//!
//! This module tokenizes `.glr` grammar files into [`Token`]s consumed by the
//! [`parser`](super::parser) module. It is built on the [`logos`] crate: the
//! private `LogosToken` enum declares the lexical grammar and [`Lexer`] maps
//! its output to owned tokens, tracking line numbers for diagnostics.
//!
//! # Notes
//! - Whitespace and `--` comments are skipped.
//! - Identifiers starting with an uppercase letter are nonterminals; other
//!   identifiers and quoted literals (`'+'`) are terminals.
//! - Quoted literals understand the escapes `\n`, `\t`, `\\`, `\'` and `\xHH`.
use super::error::GrammarError;
use logos::Logos;
use smartstring::alias::String;

/// Tokens produced by the grammar lexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A nonterminal name (e.g., `Expr`).
    NonTerm(String),
    /// A terminal: a lowercase identifier or the contents of a quoted literal.
    Term(String),
    /// An unsigned integer (precedence levels).
    Int(u32),
    Colon,
    Bar,
    Semi,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Bang,
    Amp,
    Minus,
    /// `%start`
    Start,
    /// `%left`
    Left,
    /// `%right`
    Right,
    /// `%nonassoc`
    Nonassoc,
    /// `%prec`
    Prec,
}

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
#[logos(skip r"([ \t\r\n\f]+|--[^\n]*)")]
enum LogosToken {
    #[token(":")]
    Colon,
    #[token("|")]
    Bar,
    #[token(";")]
    Semi,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("-")]
    Minus,
    #[token("%start")]
    Start,
    #[token("%left")]
    Left,
    #[token("%right")]
    Right,
    #[token("%nonassoc")]
    Nonassoc,
    #[token("%prec")]
    Prec,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r"[A-Z][A-Za-z0-9_]*")]
    Var,
    #[regex(r"[a-z_][A-Za-z0-9_]*")]
    Atom,
    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    Quoted,
}

/// Source-level lexer for grammar files.
pub struct Lexer<'source> {
    source: &'source str,
    inner: logos::Lexer<'source, LogosToken>,
}

impl<'source> Lexer<'source> {
    pub fn new(input: &'source str) -> Self {
        Self {
            source: input,
            inner: LogosToken::lexer(input),
        }
    }

    /// Line (1-based) of the token most recently returned.
    pub fn line(&self) -> usize {
        line_at(self.source, self.inner.span().start)
    }

    /// Retrieves the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Result<Token, GrammarError>> {
        let kind = self.inner.next()?;
        let slice = self.inner.slice();
        let token = match kind {
            Ok(LogosToken::Colon) => Token::Colon,
            Ok(LogosToken::Bar) => Token::Bar,
            Ok(LogosToken::Semi) => Token::Semi,
            Ok(LogosToken::LParen) => Token::LParen,
            Ok(LogosToken::RParen) => Token::RParen,
            Ok(LogosToken::LBracket) => Token::LBracket,
            Ok(LogosToken::RBracket) => Token::RBracket,
            Ok(LogosToken::Bang) => Token::Bang,
            Ok(LogosToken::Amp) => Token::Amp,
            Ok(LogosToken::Minus) => Token::Minus,
            Ok(LogosToken::Start) => Token::Start,
            Ok(LogosToken::Left) => Token::Left,
            Ok(LogosToken::Right) => Token::Right,
            Ok(LogosToken::Nonassoc) => Token::Nonassoc,
            Ok(LogosToken::Prec) => Token::Prec,
            Ok(LogosToken::Int) => match slice.parse() {
                Ok(n) => Token::Int(n),
                Err(_) => return Some(Err(self.error(format!("integer {slice} is too large")))),
            },
            Ok(LogosToken::Var) => Token::NonTerm(slice.into()),
            Ok(LogosToken::Atom) => Token::Term(slice.into()),
            Ok(LogosToken::Quoted) => match unescape(&slice[1..slice.len() - 1]) {
                Ok(s) => Token::Term(s),
                Err(msg) => return Some(Err(self.error(msg))),
            },
            Err(()) => return Some(Err(self.error(format!("unexpected input {slice:?}")))),
        };
        Some(Ok(token))
    }

    fn error(&self, message: std::string::String) -> GrammarError {
        GrammarError::Syntax {
            line: self.line(),
            message,
        }
    }

    /// Tokenizes the entire input. Returns the tokens together with the line
    /// of each token.
    pub fn tokenize_all(input: &'source str) -> Result<(Vec<Token>, Vec<usize>), GrammarError> {
        let mut lex = Lexer::new(input);
        let mut tokens = Vec::new();
        let mut lines = Vec::new();
        while let Some(tok) = lex.next_token() {
            tokens.push(tok?);
            lines.push(lex.line());
        }
        log::trace!("lexer: {} tokens", tokens.len());
        Ok((tokens, lines))
    }
}

fn line_at(source: &str, offset: usize) -> usize {
    1 + source.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count()
}

fn unescape(body: &str) -> Result<String, std::string::String> {
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('x') => {
                let hex: std::string::String = chars.by_ref().take(2).collect();
                let code = u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| format!("bad escape \\x{hex}"))?;
                out.push(char::from(code));
            }
            Some(other) => return Err(format!("unknown escape \\{other}")),
            None => return Err("dangling backslash".into()),
        }
    }
    if out.is_empty() {
        return Err("empty terminal literal".into());
    }
    Ok(out)
}
