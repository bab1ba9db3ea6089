//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! GLR parser-table generator.
//!
//! `mergelr-gen` compiles a grammar written in a small combinator algebra
//! (sequences, alternatives, the Boolean merge operators AND and SUB, and
//! positive/negative lookahead predicates) into LALR(1)-based tables for a
//! generalized LR driver. Grammar ambiguity is not an error: conflicting
//! actions are kept for the driver to fork on and reported as diagnostics.
//!
//! The [`glr`] module holds the whole pipeline; the `mergelr` binary wraps
//! [`glr::generate`] for use on the command line.

pub mod glr;
