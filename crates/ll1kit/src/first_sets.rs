//! Calculation of first set function.

use crate::{
    ebnf::EbnfGrammar,
    grammar::Grammar,
    symbol::{SymbolID, SymbolSet, Symbols},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// `FIRST(X)` for every symbol of a grammar.
///
/// The sets of non-terminals may contain `ε`, meaning the symbol is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstSets {
    map: Map<SymbolID, SymbolSet>,
}

impl FirstSets {
    /// Compute the FIRST sets of a BNF grammar.
    #[tracing::instrument(skip_all)]
    pub fn compute(grammar: &Grammar) -> Self {
        let mut firsts = Self::init(grammar.terminals(), grammar.nonterminals());

        // 値が更新されなくなるまで繰り返す
        let mut pass = 0;
        let mut changed = true;
        while changed {
            changed = false;
            pass += 1;
            for (left, alternatives) in grammar.productions() {
                let mut added = SymbolSet::new();
                for alternative in alternatives {
                    added.union_with(&firsts.first_of_string(alternative.symbols()));
                }
                changed |= firsts.extend(left, &added);
            }
            tracing::trace!("pass {}: changed = {}", pass, changed);
        }

        firsts
    }

    /// Compute the FIRST sets of an EBNF grammar, delegating to the expression tree.
    #[tracing::instrument(skip_all)]
    pub fn compute_ebnf(grammar: &EbnfGrammar) -> Self {
        let mut firsts = Self::init(grammar.terminals(), grammar.nonterminals());

        let mut pass = 0;
        let mut changed = true;
        while changed {
            changed = false;
            pass += 1;
            for (left, expr) in grammar.productions() {
                let added = expr.first(&firsts);
                changed |= firsts.extend(left, &added);
            }
            tracing::trace!("pass {}: changed = {}", pass, changed);
        }

        firsts
    }

    fn init(
        terminals: impl Iterator<Item = SymbolID>,
        nonterminals: impl Iterator<Item = SymbolID>,
    ) -> Self {
        let mut map = Map::default();

        // terminal symbols については First(T) = {T} になる
        for id in terminals.chain([SymbolID::EOF, SymbolID::EPSILON]) {
            map.insert(id, Some(id).into_iter().collect());
        }

        // nonterminal symbols は First(T) = {} と初期化する
        for id in nonterminals {
            map.insert(id, SymbolSet::new());
        }

        Self { map }
    }

    fn extend(&mut self, symbol: SymbolID, added: &SymbolSet) -> bool {
        match self.map.get_mut(&symbol) {
            Some(set) => set.extend_from(added),
            None => false,
        }
    }

    pub fn get(&self, symbol: SymbolID) -> Option<&SymbolSet> {
        self.map.get(&symbol)
    }

    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        self.get(symbol)
            .map_or(false, |set| set.contains(SymbolID::EPSILON))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolID, &SymbolSet)> + '_ {
        self.map.iter().map(|(id, set)| (*id, set))
    }

    /// `FIRST(Y1 Y2 ... Yn)`
    ///
    /// Contains `ε` only when every symbol of the sequence is nullable,
    /// which includes the empty sequence.
    pub fn first_of_string(&self, sequence: &[SymbolID]) -> SymbolSet {
        let mut res = SymbolSet::new();
        for symbol in sequence {
            let Some(first) = self.get(*symbol) else {
                return res;
            };
            res.union_with(first);
            if !first.contains(SymbolID::EPSILON) {
                res.remove(SymbolID::EPSILON);
                return res;
            }
        }
        res.insert(SymbolID::EPSILON);
        res
    }

    /// Render the sets of the given symbols, one `X: {a, b}` line each.
    pub fn display<'a>(
        &'a self,
        symbols: &'a Symbols,
        targets: impl Iterator<Item = SymbolID> + Clone + 'a,
    ) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for id in targets.clone() {
                if let Some(set) = self.get(id) {
                    writeln!(f, "{}: {}", symbols.display(id), set.display(symbols))?;
                }
            }
            Ok(())
        })
    }
}
