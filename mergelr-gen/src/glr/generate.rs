use super::compile::{Options, compile};
use super::parser::parse_grammar;
use super::sink::{PackedSink, RustSink, TableSink};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Generate parser tables from a grammar file into `<output_dir>/<name>.rs`.
///
/// With `debug` set, the diagnostics dump of the grammar is written into the
/// leading comment of the generated file.
pub fn generate<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<str>>(
    grammar_path: P,
    output_dir: Q,
    name: S,
    debug: bool,
) -> Result<()> {
    let options = Options {
        debug,
        ..Options::default()
    };
    generate_with(grammar_path, output_dir, name, &options).map(|_| ())
}

/// Like [`generate`], with every pipeline option exposed. Returns the paths
/// of the files written.
pub fn generate_with<P: AsRef<Path>, Q: AsRef<Path>, S: AsRef<str>>(
    grammar_path: P,
    output_dir: Q,
    name: S,
    options: &Options,
) -> Result<Vec<PathBuf>> {
    let grammar_path = grammar_path.as_ref();
    let output_dir = output_dir.as_ref();
    let name = name.as_ref();

    let source = std::fs::read_to_string(grammar_path)
        .with_context(|| format!("reading grammar {}", grammar_path.display()))?;
    let grammar = parse_grammar(&source)
        .and_then(|b| b.build())
        .with_context(|| format!("in grammar {}", grammar_path.display()))?;
    let compiled = compile(grammar, options)
        .with_context(|| format!("compiling grammar {}", grammar_path.display()))?;
    for c in &compiled.diagnostics.conflicts {
        log::warn!(
            "{} actions kept in state {} on {:?}",
            c.actions.len(),
            c.state,
            compiled.quotient.term_name(c.terminal)
        );
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let mut written = Vec::new();

    let rs_path = output_dir.join(format!("{name}.rs"));
    let file = File::create(&rs_path).with_context(|| format!("creating {}", rs_path.display()))?;
    let mut sink = RustSink::new(BufWriter::new(file));
    if options.debug {
        sink = sink.with_header(compiled.dump_string());
    }
    sink.write_tables(&compiled.tables)
        .with_context(|| format!("writing {}", rs_path.display()))?;
    written.push(rs_path);

    if options.packed {
        let packed_path = output_dir.join(format!("{name}.packed"));
        let file = File::create(&packed_path)
            .with_context(|| format!("creating {}", packed_path.display()))?;
        PackedSink::new(BufWriter::new(file), options.max_chunk_len)
            .write_tables(&compiled.tables)
            .with_context(|| format!("writing {}", packed_path.display()))?;
        written.push(packed_path);
    }

    log::info!("generate: wrote {:?}", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::super::sink::unpack;
    use super::*;

    const CALC: &str = "
        -- arithmetic with precedence
        %start Expr
        Expr : Expr '+' Expr %left 1
             | Expr '*' Expr %left 2
             | '(' Expr ')'
             | num
             ;
    ";

    #[test]
    fn writes_rust_tables() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let grammar = dir.path().join("calc.glr");
        std::fs::write(&grammar, CALC).unwrap();

        generate(&grammar, dir.path().join("out"), "calc", true).unwrap();
        let src = std::fs::read_to_string(dir.path().join("out/calc.rs")).unwrap();
        assert!(src.contains("Produced by parser generator MERGELR"));
        assert!(src.contains("P,0,"));
        assert!(src.contains("pub const ACTION: [u32; N_STATES * N_COLUMNS]"));
        assert!(src.contains("\"num\""));
        assert!(!dir.path().join("out/calc.packed").exists());
    }

    #[test]
    fn writes_packed_tables() {
        let dir = tempfile::tempdir().unwrap();
        let grammar = dir.path().join("calc.glr");
        std::fs::write(&grammar, CALC).unwrap();
        let options = Options {
            packed: true,
            max_chunk_len: 40,
            ..Options::default()
        };
        let written = generate_with(&grammar, dir.path(), "calc", &options).unwrap();
        assert_eq!(written.len(), 2);
        let text = std::fs::read_to_string(&written[1]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let tables = unpack(&lines).unwrap();
        assert!(tables.n_states > 0);
    }

    #[test]
    fn reports_grammar_errors_with_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let grammar = dir.path().join("bad.glr");
        std::fs::write(&grammar, "S : A ;").unwrap();
        let err = generate(&grammar, dir.path(), "bad", false).unwrap_err();
        assert!(format!("{err:#}").contains("bad.glr"));
        assert!(format!("{err:#}").contains("A"));
        assert!(generate(dir.path().join("missing.glr"), dir.path(), "x", false).is_err());
    }
}
