//! Interned grammar symbols.

use crate::{types::Set, util::display_fn};
use std::{fmt, rc::Rc};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID {
    raw: u16,
}

impl SymbolID {
    /// Reserved symbol that marks an empty (nullable) derivation.
    pub const EPSILON: Self = Self::from_raw(0);

    /// Reserved terminal symbol that means the end of input.
    pub const EOF: Self = Self::from_raw(1);

    const OFFSET: u16 = 2;

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.raw < Self::OFFSET
    }
}

/// The name table shared by every symbol of a grammar.
#[derive(Debug, Clone)]
pub struct Symbols {
    names: Set<Rc<str>>,
}

impl Default for Symbols {
    fn default() -> Self {
        let mut names = Set::default();
        names.insert(Rc::from(""));
        names.insert(Rc::from("EOF"));
        Self { names }
    }
}

impl Symbols {
    /// Return the ID of `name`, registering it if it has not been seen yet.
    pub fn intern(&mut self, name: &str) -> SymbolID {
        if let Some(id) = self.get(name) {
            return id;
        }
        let (index, _) = self.names.insert_full(Rc::from(name));
        SymbolID::from_raw(index.try_into().expect("too many symbols"))
    }

    pub fn get(&self, name: &str) -> Option<SymbolID> {
        self.names
            .get_index_of(name)
            .map(|index| SymbolID::from_raw(index as u16))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn name(&self, id: SymbolID) -> &str {
        self.rc_name(id)
    }

    pub(crate) fn rc_name(&self, id: SymbolID) -> &Rc<str> {
        &self.names[id.into_raw() as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Human readable form of a symbol, rendering the empty marker as `ε`.
    pub fn display(&self, id: SymbolID) -> impl fmt::Display + '_ {
        display_fn(move |f| match id {
            SymbolID::EPSILON => f.write_str("ε"),
            id => f.write_str(self.name(id)),
        })
    }
}

/// A set of symbols, used for FIRST, FOLLOW and expected-terminal sets.
#[derive(Debug, Default, Clone)]
pub struct SymbolSet {
    inner: bit_set::BitSet,
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self, id: SymbolID) -> bool {
        self.inner.contains(id.into_raw().into())
    }
    pub fn insert(&mut self, id: SymbolID) -> bool {
        self.inner.insert(id.into_raw().into())
    }
    pub fn remove(&mut self, id: SymbolID) -> bool {
        self.inner.remove(id.into_raw().into())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    pub fn difference_with(&mut self, other: &Self) {
        self.inner.difference_with(&other.inner)
    }
    pub fn is_subset(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner)
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn clear(&mut self) {
        self.inner.clear()
    }
    pub fn iter(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.inner
            .iter()
            .map(|raw| SymbolID::from_raw(raw as u16))
    }

    /// Add every member of `other`, reporting whether this set grew.
    pub fn extend_from(&mut self, other: &Self) -> bool {
        if other.is_subset(self) {
            return false;
        }
        self.union_with(other);
        true
    }

    pub fn without_epsilon(&self) -> Self {
        let mut set = self.clone();
        set.remove(SymbolID::EPSILON);
        set
    }

    /// The member names, in symbol order.
    pub fn names<'s>(&self, symbols: &'s Symbols) -> Vec<&'s str> {
        self.iter().map(|id| symbols.name(id)).collect()
    }

    pub fn display<'s>(&'s self, symbols: &'s Symbols) -> impl fmt::Display + 's {
        display_fn(move |f| {
            f.write_str("{")?;
            for (i, id) in self.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", symbols.display(id))?;
            }
            f.write_str("}")
        })
    }
}

impl PartialEq for SymbolSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}
impl Eq for SymbolSet {}

impl FromIterator<SymbolID> for SymbolSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = SymbolID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.into_raw().into()).collect(),
        }
    }
}

impl Extend<SymbolID> for SymbolSet {
    fn extend<I: IntoIterator<Item = SymbolID>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_symbols() {
        let mut symbols = Symbols::default();
        assert_eq!(symbols.get(""), Some(SymbolID::EPSILON));
        assert_eq!(symbols.get("EOF"), Some(SymbolID::EOF));
        let id = symbols.intern("id");
        assert!(!id.is_reserved());
        assert_eq!(symbols.intern("id"), id);
        assert_eq!(symbols.display(SymbolID::EPSILON).to_string(), "ε");
    }

    #[test]
    fn extend_reports_growth() {
        let a = SymbolID::from_raw(3);
        let b = SymbolID::from_raw(4);
        let mut set: SymbolSet = [a].into_iter().collect();
        assert!(!set.extend_from(&[a].into_iter().collect()));
        assert!(set.extend_from(&[a, b].into_iter().collect()));
        assert_eq!(set.len(), 2);
    }
}
