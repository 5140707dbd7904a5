//! Calculation of follow set function.

use crate::{
    ebnf::EbnfGrammar,
    first_sets::FirstSets,
    grammar::Grammar,
    symbol::{SymbolID, SymbolSet, Symbols},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// `FOLLOW(A)` for every non-terminal of a grammar. Never contains `ε`.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowSets {
    map: Map<SymbolID, SymbolSet>,
}

impl FollowSets {
    /// Compute the FOLLOW sets of a BNF grammar.
    #[tracing::instrument(skip_all)]
    pub fn compute(grammar: &Grammar, firsts: &FirstSets) -> Self {
        let mut follows = Self::init(grammar.nonterminals(), grammar.start());

        let mut pass = 0;
        let mut changed = true;
        while changed {
            changed = false;
            pass += 1;
            for (left, alternatives) in grammar.productions() {
                for alternative in alternatives {
                    let symbols = alternative.symbols();
                    for (i, symbol) in symbols.iter().enumerate() {
                        // terminal symbols は FOLLOW を持たない
                        if !grammar.is_nonterminal(*symbol) {
                            continue;
                        }
                        let rest = firsts.first_of_string(&symbols[i + 1..]);
                        changed |= follows.extend(*symbol, &rest);
                        if rest.contains(SymbolID::EPSILON) {
                            let inherited = follows.get(left).cloned().unwrap_or_default();
                            changed |= follows.extend(*symbol, &inherited);
                        }
                    }
                }
            }
            tracing::trace!("pass {}: changed = {}", pass, changed);
        }

        follows
    }

    /// Compute the FOLLOW sets of an EBNF grammar, delegating to the expression tree.
    #[tracing::instrument(skip_all)]
    pub fn compute_ebnf(grammar: &EbnfGrammar, firsts: &FirstSets) -> Self {
        let mut follows = Self::init(grammar.nonterminals(), grammar.start());

        let mut pass = 0;
        let mut changed = true;
        while changed {
            changed = false;
            pass += 1;
            for (left, expr) in grammar.productions() {
                let inherited = follows.get(left).cloned().unwrap_or_default();
                changed |= expr.follow(firsts, &mut follows, &inherited);
            }
            tracing::trace!("pass {}: changed = {}", pass, changed);
        }

        follows
    }

    fn init(nonterminals: impl Iterator<Item = SymbolID>, start: SymbolID) -> Self {
        let mut map: Map<SymbolID, SymbolSet> = nonterminals
            .map(|id| (id, SymbolSet::new()))
            .collect();
        if let Some(set) = map.get_mut(&start) {
            set.insert(SymbolID::EOF);
        }
        Self { map }
    }

    /// Add `added` minus `ε` into `FOLLOW(symbol)`, reporting whether it grew.
    pub(crate) fn extend(&mut self, symbol: SymbolID, added: &SymbolSet) -> bool {
        let Some(set) = self.map.get_mut(&symbol) else {
            return false;
        };
        if added.contains(SymbolID::EPSILON) {
            set.extend_from(&added.without_epsilon())
        } else {
            set.extend_from(added)
        }
    }

    pub fn get(&self, symbol: SymbolID) -> Option<&SymbolSet> {
        self.map.get(&symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolID, &SymbolSet)> + '_ {
        self.map.iter().map(|(id, set)| (*id, set))
    }

    pub fn display<'a>(&'a self, symbols: &'a Symbols) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (id, set) in self.iter() {
                writeln!(f, "{}: {}", symbols.display(id), set.display(symbols))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_sets::tests::{arithmetic, names};

    #[test]
    fn arithmetic_follow_sets() {
        let grammar = arithmetic();
        let firsts = FirstSets::compute(&grammar);
        let follows = FollowSets::compute(&grammar, &firsts);
        let follow =
            |name: &str| names(&grammar, follows.get(grammar.symbol(name).unwrap()).unwrap());

        assert_eq!(follow("E"), [")", "EOF"]);
        assert_eq!(follow("Ed"), [")", "EOF"]);
        assert_eq!(follow("T"), [")", "+", "EOF"]);
        assert_eq!(follow("Td"), [")", "+", "EOF"]);
        assert_eq!(follow("F"), [")", "*", "+", "EOF"]);
        assert!(grammar.symbol("id").and_then(|id| follows.get(id)).is_none());
    }

    #[test]
    fn follow_never_contains_epsilon() {
        let grammar = Grammar::from_str("S : A B ; A : a | ; B : b | ;").unwrap();
        let firsts = FirstSets::compute(&grammar);
        let follows = FollowSets::compute(&grammar, &firsts);
        for (_, set) in follows.iter() {
            assert!(!set.contains(SymbolID::EPSILON));
        }
        let a = grammar.symbol("A").unwrap();
        assert_eq!(names(&grammar, follows.get(a).unwrap()), ["EOF", "b"]);
    }
}
