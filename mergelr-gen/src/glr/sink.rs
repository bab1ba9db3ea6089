//! Table sinks.
//!
//! A [`TableSink`] receives the encoded [`Tables`] of a grammar and packages
//! them for a consumer. [`RustSink`] writes Rust source with one `pub const`
//! per table; [`PackedSink`] writes a compressed word stream as base64 lines
//! that [`unpack`] turns back into [`Tables`].

use super::automaton::EntryKind;
use super::tables::{NO_STATE, Tables};
use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Destination for encoded tables.
pub trait TableSink {
    fn write_tables(&mut self, tables: &Tables) -> Result<()>;
}

/// Writes tables as Rust constants.
pub struct RustSink<W: Write> {
    out: W,
    header: Option<String>,
}

impl<W: Write> RustSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, header: None }
    }

    /// Text placed in the leading block comment, typically the diagnostics
    /// dump of the grammar.
    pub fn with_header(mut self, header: String) -> Self {
        self.header = Some(header);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_words<W: Write>(out: &mut W, name: &str, len: &str, words: &[u32]) -> Result<()> {
    writeln!(out, "pub const {}: [u32; {}] = [", name, len)?;
    for row in words.chunks(16) {
        write!(out, "   ")?;
        for w in row {
            if *w == NO_STATE {
                write!(out, " NO_STATE,")?;
            } else {
                write!(out, " {},", w)?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "];\n")?;
    Ok(())
}

impl<W: Write> TableSink for RustSink<W> {
    fn write_tables(&mut self, t: &Tables) -> Result<()> {
        let out = &mut self.out;
        writeln!(out, "/*")?;
        writeln!(out, "Produced by parser generator MERGELR")?;
        if let Some(header) = &self.header {
            writeln!(out, "\n{}", header.replace("*/", "* /"))?;
        }
        writeln!(out, "*/\n")?;

        writeln!(out, "pub const N_STATES: usize = {};", t.n_states)?;
        writeln!(out, "pub const N_COLUMNS: usize = {};", t.n_columns)?;
        writeln!(out, "pub const N_NONTERMINALS: usize = {};", t.n_nonterms)?;
        writeln!(out, "pub const N_TERMINALS: usize = {};", t.terminal_column.len())?;
        writeln!(out, "pub const N_RULES: usize = {};", t.rules.len())?;
        writeln!(out, "pub const EOF: u32 = {};", t.eof)?;
        writeln!(out, "pub const NO_STATE: u32 = u32::MAX;")?;
        writeln!(out)?;

        writeln!(out, "pub const ACTION: [u32; N_STATES * N_COLUMNS] = [")?;
        for (s, row) in t.action.chunks(t.n_columns.max(1)).enumerate() {
            write!(out, "    /* STATE {} */", s)?;
            for w in row {
                write!(out, " {},", w)?;
            }
            writeln!(out)?;
        }
        writeln!(out, "];\n")?;

        write_words(out, "OVERFLOW", &t.overflow.len().to_string(), &t.overflow)?;
        write_words(out, "GOTO", "N_STATES * N_NONTERMINALS", &t.goto)?;

        writeln!(out, "/// (lhs, rhs length)")?;
        writeln!(out, "pub const RULES: [(u32, u32); N_RULES] = [")?;
        for (i, [lhs, len]) in t.rules.iter().enumerate() {
            let label = t.nonterminal_labels.get(*lhs as usize).map_or("", String::as_str);
            writeln!(out, "    ({}, {}), // {} {}", lhs, len, i, label)?;
        }
        writeln!(out, "];\n")?;

        write_words(out, "MERGE", "N_RULES", &t.merge)?;
        write_words(out, "TERMINAL_COLUMN", "N_TERMINALS", &t.terminal_column)?;

        writeln!(out, "/// (nonterminal, state, kind): 0 start, 1 lookahead, 2 negative lookahead")?;
        writeln!(out, "pub const ENTRIES: [(u32, u32, u8); {}] = [", t.entries.len())?;
        for e in &t.entries {
            let kind = match e.kind {
                EntryKind::Start => 0,
                EntryKind::Lookahead { negate: false } => 1,
                EntryKind::Lookahead { negate: true } => 2,
            };
            writeln!(out, "    ({}, {}, {}),", e.nonterminal, e.state, kind)?;
        }
        writeln!(out, "];\n")?;

        writeln!(out, "pub const TERMINAL_LABELS: [&str; {}] = [", t.terminal_labels.len())?;
        for (i, s) in t.terminal_labels.iter().enumerate() {
            writeln!(out, "    {:?}, // {}", s, i)?;
        }
        writeln!(out, "];\n")?;

        writeln!(
            out,
            "pub const NONTERMINAL_LABELS: [&str; {}] = [",
            t.nonterminal_labels.len()
        )?;
        for (i, s) in t.nonterminal_labels.iter().enumerate() {
            writeln!(out, "    {:?}, // {}", s, i)?;
        }
        writeln!(out, "];")?;
        out.flush()?;
        Ok(())
    }
}

/// Writes tables as zlib-compressed, base64-encoded chunks, one per line.
pub struct PackedSink<W: Write> {
    out: W,
    max_chunk_len: usize,
}

impl<W: Write> PackedSink<W> {
    pub fn new(out: W, max_chunk_len: usize) -> Self {
        Self { out, max_chunk_len }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TableSink for PackedSink<W> {
    fn write_tables(&mut self, tables: &Tables) -> Result<()> {
        for chunk in pack(tables, self.max_chunk_len)? {
            writeln!(self.out, "{}", chunk)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Compresses and encodes `tables` into chunks of at most `max_chunk_len`
/// characters.
pub fn pack(tables: &Tables, max_chunk_len: usize) -> Result<Vec<String>> {
    if max_chunk_len == 0 {
        bail!("chunk length must be positive");
    }
    let bytes: Vec<u8> = tables
        .to_words()
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();
    let mut z = ZlibEncoder::new(Vec::new(), Compression::best());
    z.write_all(&bytes)?;
    let compressed = z.finish().context("compressing tables")?;
    let text = STANDARD.encode(&compressed);
    log::debug!(
        "pack: {} bytes, {} compressed, {} base64 characters",
        bytes.len(),
        compressed.len(),
        text.len()
    );
    // base64 output is ASCII, so byte chunks are character chunks
    Ok(text
        .as_bytes()
        .chunks(max_chunk_len)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect())
}

/// Reverses [`pack`]. Labels of the result are empty.
pub fn unpack<S: AsRef<str>>(chunks: &[S]) -> Result<Tables> {
    let text: String = chunks.iter().map(|c| c.as_ref().trim()).collect();
    let compressed = STANDARD.decode(text.as_bytes()).context("decoding base64 tables")?;
    let mut bytes = Vec::new();
    ZlibDecoder::new(&compressed[..])
        .read_to_end(&mut bytes)
        .context("decompressing tables")?;
    if bytes.len() % 4 != 0 {
        bail!("packed tables hold {} bytes, not whole words", bytes.len());
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Tables::from_words(&words)
}

#[cfg(test)]
mod tests {
    use super::super::automaton::Automaton;
    use super::super::builder::{GrammarBuilder, nt, seq, t};
    use super::super::classes::TerminalClasses;
    use super::super::conflict::resolve;
    use super::*;

    fn tables() -> Tables {
        let mut b = GrammarBuilder::new();
        b.rule("E", [seq([nt("E"), t("+"), nt("E")]), t("n")]);
        let mut g = b.build().unwrap();
        g.analyze();
        let a = Automaton::build(&g).unwrap();
        let (rows, _) = resolve(&g, &a).unwrap();
        let classes = TerminalClasses::identity(g.n_terms());
        Tables::encode(&g, &a, &rows, &g, &classes).unwrap()
    }

    #[test]
    fn rust_sink_writes_constants() {
        let t = tables();
        let mut sink = RustSink::new(Vec::new()).with_header("PS,3".to_string());
        sink.write_tables(&t).unwrap();
        let src = String::from_utf8(sink.into_inner()).unwrap();
        assert!(src.starts_with("/*\nProduced by parser generator MERGELR\n\nPS,3\n*/\n"));
        assert!(src.contains(&format!("pub const N_STATES: usize = {};", t.n_states)));
        assert!(src.contains("pub const ACTION: [u32; N_STATES * N_COLUMNS] = [\n    /* STATE 0 */"));
        assert!(src.contains("pub const GOTO: [u32; N_STATES * N_NONTERMINALS] = ["));
        assert!(src.contains("NO_STATE,"));
        assert!(src.contains("    \"$end\", // 0\n"));
        assert!(src.contains("pub const ENTRIES: [(u32, u32, u8); 1] = [\n    (0, 0, 0),"));
    }

    #[test]
    fn packed_sink_round_trips() {
        let t = tables();
        let mut sink = PackedSink::new(Vec::new(), 16);
        sink.write_tables(&t).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 16));

        let back = unpack(&lines).unwrap();
        let mut expected = t.clone();
        expected.terminal_labels.clear();
        expected.nonterminal_labels.clear();
        assert_eq!(back, expected);
    }

    #[test]
    fn damaged_packs_are_rejected() {
        let t = tables();
        assert!(pack(&t, 0).is_err());
        let mut chunks = pack(&t, 1000).unwrap();
        assert!(unpack(&["not base64!"]).is_err());
        let half = chunks[0].len() / 2;
        chunks[0].truncate(half);
        assert!(unpack(&chunks).is_err());
    }
}
