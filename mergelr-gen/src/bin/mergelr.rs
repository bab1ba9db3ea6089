//! Command-line interface for the `mergelr` parser-table generator.
//!
//! This binary wraps [`glr::generate_with`] and exposes command-line options
//! for generating GLR tables from a grammar file. It reads an input `.glr`
//! file and writes `<name>.rs` (and optionally `<name>.packed`) into the
//! output directory.

#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use mergelr_gen::glr;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Generate GLR parser tables from a grammar")]
    struct Args {
        /// Path to the input grammar file
        #[arg(short = 'g', long)]
        grammar: PathBuf,

        /// Path to the output directory.
        #[arg(short = 'o', long)]
        output_dir: PathBuf,

        /// Prefix used to construct output file names
        #[arg(short = 'n', long)]
        name: String,

        /// Write the grammar dump into the generated file (off by default).
        #[arg(short = 'd', long)]
        debug: bool,

        /// Also write the tables compressed and base64-encoded.
        #[arg(short = 'p', long)]
        packed: bool,

        /// Longest line of packed output.
        #[arg(long, default_value_t = 76)]
        max_chunk_len: usize,

        /// Keep symbols that cannot be reached from a start symbol.
        #[arg(long)]
        no_prune: bool,

        /// Keep rules in their source order.
        #[arg(long)]
        no_sort: bool,

        /// Give every terminal its own action column.
        #[arg(long)]
        no_classes: bool,
    }

    pub fn main() -> anyhow::Result<()> {
        env_logger::init();
        let args = Args::parse();
        let options = glr::Options {
            prune: !args.no_prune,
            sort_rules: !args.no_sort,
            equivalence_classes: !args.no_classes,
            packed: args.packed,
            max_chunk_len: args.max_chunk_len,
            debug: args.debug,
        };
        let written = glr::generate_with(args.grammar, args.output_dir, args.name, &options)?;
        for path in written {
            log::info!("wrote {}", path.display());
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("mergelr disabled (compiled without `cli` feature)");
}
