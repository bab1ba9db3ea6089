//! Interning table for grammar symbols.
//!
//! Terminals and nonterminals are stored in two separate [`Symtab`]s. Each
//! name is assigned a dense index in insertion order, and an arbitrary
//! metadata value travels with it (the nonterminal table keeps the
//! [`NontermInfo`](super::grammar::NontermInfo) there).

use indexmap::{IndexMap, map::Entry};
use smartstring::alias::String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symtab<M = ()> {
    tab: IndexMap<String, M>,
}

impl<M> Default for Symtab<M> {
    fn default() -> Self {
        Self {
            tab: IndexMap::new(),
        }
    }
}

impl<M> Symtab<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning its index. The metadata is only stored
    /// when the name is new; an existing entry keeps its value.
    pub fn add(&mut self, name: &str, meta: M) -> usize {
        match self.tab.entry(String::from(name)) {
            Entry::Occupied(o) => o.index(),
            Entry::Vacant(v) => {
                let idx = v.index();
                v.insert(meta);
                idx
            }
        }
    }

    pub fn idx(&self, name: &str) -> Option<usize> {
        self.tab.get_index_of(name)
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.tab.get_index(idx).map(|(k, _)| k.as_str())
    }

    pub fn meta(&self, idx: usize) -> Option<&M> {
        self.tab.get_index(idx).map(|(_, v)| v)
    }

    pub fn meta_mut(&mut self, idx: usize) -> Option<&mut M> {
        self.tab.get_index_mut(idx).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &M)> {
        self.tab.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tab.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.tab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tab.is_empty()
    }
}
