// A deterministic shift/reduce driver over encoded tables, used to check that
// the generated tables parse what the grammar describes. It refuses forks and
// predicates; grammars under test must be free of retained conflicts.

use super::builder::{Choice, GrammarBuilder, nt, seq, t};
use super::compile::{Compiled, Options, compile};
use super::grammar::Assoc;
use super::parser::parse_grammar;
use super::tables::{Cell, Tables};

/// Parses `input` (whitespace-separated terminal names) from `start` and
/// returns the tree as `Lhs(child child ...)`.
fn run(c: &Compiled, start: &str, input: &str) -> Result<String, String> {
    let tables: &Tables = &c.tables;
    let mut tokens = Vec::new();
    for word in input.split_whitespace() {
        tokens.push(
            c.grammar
                .term_idx(word)
                .ok_or_else(|| format!("unknown terminal {word:?}"))?,
        );
    }
    let start = c.quotient.nonterm_idx(start).ok_or("unknown start")?;
    let mut states = vec![tables.start_state(start).ok_or("no entry state")?];
    let mut trees: Vec<String> = Vec::new();
    let mut pos = 0;
    loop {
        let tok = tokens.get(pos).copied().unwrap_or(c.grammar.eof());
        let state = *states.last().unwrap();
        let cells = tables.actions(state, tok);
        let [cell] = cells[..] else {
            return Err(format!(
                "{} actions in state {state} at token {pos}",
                cells.len()
            ));
        };
        match cell {
            Cell::Shift(next) => {
                states.push(next);
                trees.push(tables.terminal_labels[tok].clone());
                pos += 1;
            }
            Cell::Reduce(r) => {
                let [lhs, len] = tables.rules[r];
                let (lhs, len) = (lhs as usize, len as usize);
                let children = trees.split_off(trees.len() - len);
                states.truncate(states.len() - len);
                trees.push(format!(
                    "{}({})",
                    tables.nonterminal_labels[lhs],
                    children.join(" ")
                ));
                let top = *states.last().unwrap();
                states.push(tables.goto_state(top, lhs).ok_or("missing goto")?);
            }
            Cell::Accept(_) => return trees.pop().ok_or_else(|| "empty accept".to_string()),
            other => return Err(format!("unsupported action {other:?}")),
        }
    }
}

/// Recursive descent for `E ::= E + T | T; T ::= T * F | F; F ::= ( E ) | num`.
struct Descent<'a> {
    toks: Vec<&'a str>,
    pos: usize,
}

impl<'a> Descent<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            toks: input.split_whitespace().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.toks.get(self.pos).copied()
    }

    fn expect(&mut self, tok: &str) {
        assert_eq!(self.peek(), Some(tok));
        self.pos += 1;
    }

    fn expr(&mut self) -> String {
        let mut left = format!("E({})", self.term());
        while self.peek() == Some("+") {
            self.pos += 1;
            left = format!("E({} + {})", left, self.term());
        }
        left
    }

    fn term(&mut self) -> String {
        let mut left = format!("T({})", self.factor());
        while self.peek() == Some("*") {
            self.pos += 1;
            left = format!("T({} * {})", left, self.factor());
        }
        left
    }

    fn factor(&mut self) -> String {
        if self.peek() == Some("(") {
            self.pos += 1;
            let inner = self.expr();
            self.expect(")");
            format!("F(( {} ))", inner)
        } else {
            self.expect("num");
            "F(num)".to_string()
        }
    }

    fn parse(input: &str) -> String {
        let mut d = Descent::new(input);
        let tree = d.expr();
        assert_eq!(d.pos, d.toks.len());
        tree
    }
}

fn layered() -> Compiled {
    let b = parse_grammar(
        "E : E '+' T | T ;
         T : T '*' F | F ;
         F : '(' E ')' | num ;",
    )
    .unwrap();
    compile(b.build().unwrap(), &Options::default()).unwrap()
}

#[test]
fn tables_agree_with_recursive_descent() {
    let _ = env_logger::builder().is_test(true).try_init();
    let c = layered();
    assert!(c.diagnostics.conflicts.is_empty());
    for input in [
        "num",
        "num + num",
        "num * num + num",
        "num + num * num",
        "( num + num ) * num",
        "num * ( num * ( num + num ) ) + num + num",
    ] {
        assert_eq!(run(&c, "E", input).unwrap(), Descent::parse(input), "{input}");
    }
}

#[test]
fn rejects_bad_input() {
    let c = layered();
    assert!(run(&c, "E", "num +").is_err());
    assert!(run(&c, "E", "( num").is_err());
    assert!(run(&c, "E", "num num").is_err());
}

#[test]
fn precedence_shapes_the_tree() {
    let mut b = GrammarBuilder::new();
    b.rule(
        "E",
        [
            Choice::new(seq([nt("E"), t("+"), nt("E")])).with_prec(1, Assoc::Left),
            Choice::new(seq([nt("E"), t("*"), nt("E")])).with_prec(2, Assoc::Left),
            Choice::new(t("num")),
        ],
    );
    let c = compile(b.build().unwrap(), &Options::default()).unwrap();
    assert_eq!(
        run(&c, "E", "num + num * num").unwrap(),
        "E(E(num) + E(E(num) * E(num)))"
    );
    assert_eq!(
        run(&c, "E", "num + num + num").unwrap(),
        "E(E(E(num) + E(num)) + E(num))"
    );
    assert_eq!(
        run(&c, "E", "num * num + num").unwrap(),
        "E(E(E(num) * E(num)) + E(num))"
    );
}

#[test]
fn digit_classes_parse_like_separate_terminals() {
    let src = "Num : Num D | D ;
               D : '0' | '1' | '2' | '3' | '4' | '5' | '6' | '7' | '8' | '9' ;";
    let merged = compile(
        parse_grammar(src).unwrap().build().unwrap(),
        &Options::default(),
    )
    .unwrap();
    let separate = compile(
        parse_grammar(src).unwrap().build().unwrap(),
        &Options {
            equivalence_classes: false,
            ..Options::default()
        },
    )
    .unwrap();
    assert_eq!(merged.tables.n_columns, 2);
    assert_eq!(separate.tables.n_columns, 11);
    for input in ["7", "1 2 3", "9 0 0 4 2"] {
        let tree = run(&merged, "Num", input).unwrap();
        assert_eq!(tree, run(&separate, "Num", input).unwrap());
    }
    assert_eq!(
        run(&merged, "Num", "1 2").unwrap(),
        "Num(Num(D(1)) D(2))"
    );
}

#[test]
fn several_start_symbols_have_their_own_entries() {
    let b = parse_grammar("%start S %start T S : a T ; T : b ;").unwrap();
    let c = compile(b.build().unwrap(), &Options::default()).unwrap();
    assert_eq!(run(&c, "S", "a b").unwrap(), "S(a T(b))");
    assert_eq!(run(&c, "T", "b").unwrap(), "T(b)");
    assert!(run(&c, "T", "a b").is_err());
}
