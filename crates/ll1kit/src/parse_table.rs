//! Predictive parse tables.

use crate::{
    ebnf::{EbnfGrammar, Expr},
    first_sets::FirstSets,
    follow_sets::FollowSets,
    grammar::{Alternative, Grammar},
    symbol::{SymbolID, SymbolSet, Symbols},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// The `non-terminal × terminal → entry` table of an LL(1) parser.
///
/// When the grammar is not LL(1), a cell written twice keeps the entry of the
/// production processed last. Every overwrite is kept as a [`Conflict`].
#[derive(Debug, Clone)]
pub struct ParseTable<A> {
    rows: Map<SymbolID, Map<SymbolID, A>>,
    conflicts: Vec<Conflict<A>>,
}

/// A parse table cell that was claimed by two productions (or two
/// alternatives of one production, even identical ones).
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<A> {
    pub nonterminal: SymbolID,
    pub terminal: SymbolID,
    pub replaced: A,
    pub chosen: A,
}

impl<A> ParseTable<A>
where
    A: Clone,
{
    fn new(nonterminals: impl Iterator<Item = SymbolID>) -> Self {
        Self {
            rows: nonterminals.map(|id| (id, Map::default())).collect(),
            conflicts: vec![],
        }
    }

    /// Put `entry` into the cells `(nonterminal, t)` for every `t` selected by
    /// `first`, the FIRST set of the entry.
    fn fill(
        &mut self,
        symbols: &Symbols,
        nonterminal: SymbolID,
        first: &SymbolSet,
        follow: Option<&SymbolSet>,
        entry: A,
    ) {
        let mut lookaheads = first.without_epsilon();
        if first.contains(SymbolID::EPSILON) {
            if let Some(follow) = follow {
                lookaheads.union_with(follow);
            }
        }
        for terminal in lookaheads.iter() {
            self.insert(symbols, nonterminal, terminal, entry.clone());
        }
    }

    fn insert(&mut self, symbols: &Symbols, nonterminal: SymbolID, terminal: SymbolID, entry: A) {
        let row = self.rows.entry(nonterminal).or_default();
        // 同じセルへの二度目の書き込みは、たとえ同一の選択肢でも衝突とみなす
        if let Some(replaced) = row.insert(terminal, entry.clone()) {
            tracing::debug!(
                "conflict at ({}, {})",
                symbols.name(nonterminal),
                symbols.name(terminal)
            );
            self.conflicts.push(Conflict {
                nonterminal,
                terminal,
                replaced,
                chosen: entry,
            });
        }
    }

    pub fn get(&self, nonterminal: SymbolID, terminal: SymbolID) -> Option<&A> {
        self.rows.get(&nonterminal)?.get(&terminal)
    }

    pub fn row(&self, nonterminal: SymbolID) -> Option<&Map<SymbolID, A>> {
        self.rows.get(&nonterminal)
    }

    /// The terminals that have an entry in the row of `nonterminal`.
    pub fn lookaheads(&self, nonterminal: SymbolID) -> SymbolSet {
        self.rows
            .get(&nonterminal)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> impl Iterator<Item = (SymbolID, &Map<SymbolID, A>)> + '_ {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn conflicts(&self) -> &[Conflict<A>] {
        &self.conflicts
    }

    pub fn is_ll1(&self) -> bool {
        self.conflicts.is_empty()
    }
}

impl ParseTable<Alternative> {
    /// Build the table of a BNF grammar.
    #[tracing::instrument(skip_all)]
    pub fn build(grammar: &Grammar, firsts: &FirstSets, follows: &FollowSets) -> Self {
        let mut table = Self::new(grammar.nonterminals());
        for (nonterminal, alternatives) in grammar.productions() {
            for alternative in alternatives {
                let first = firsts.first_of_string(alternative.symbols());
                table.fill(
                    grammar.symbols(),
                    nonterminal,
                    &first,
                    follows.get(nonterminal),
                    alternative.clone(),
                );
            }
        }
        table
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (nonterminal, row)) in self.rows().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### {}", g.name(nonterminal))?;
                for (terminal, alternative) in row {
                    writeln!(
                        f,
                        "- {} => {} := {}",
                        g.name(*terminal),
                        g.name(nonterminal),
                        alternative.display(g)
                    )?;
                }
            }
            Ok(())
        })
    }
}

impl<'e> ParseTable<&'e Expr> {
    /// Build the table of an EBNF grammar, whose cells hold the root
    /// expression of each non-terminal.
    #[tracing::instrument(skip_all)]
    pub fn build_ebnf(grammar: &'e EbnfGrammar, firsts: &FirstSets, follows: &FollowSets) -> Self {
        let mut table = Self::new(grammar.nonterminals());
        for (nonterminal, expr) in grammar.productions() {
            let first = expr.first(firsts);
            table.fill(
                grammar.symbols(),
                nonterminal,
                &first,
                follows.get(nonterminal),
                expr,
            );
        }
        table
    }

    pub fn display<'g>(&'g self, g: &'g EbnfGrammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (nonterminal, row)) in self.rows().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### {}", g.name(nonterminal))?;
                for (terminal, expr) in row {
                    writeln!(f, "- {} => {}", g.name(*terminal), expr.display(g.symbols()))?;
                }
            }
            Ok(())
        })
    }
}

impl Conflict<Alternative> {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(
                f,
                "conflict at ({}, {}): `{}' is overwritten by `{}'",
                g.name(self.nonterminal),
                g.name(self.terminal),
                self.replaced.display(g),
                self.chosen.display(g)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ebnf::tests::select_clause, first_sets::tests::arithmetic};

    fn build(grammar: &Grammar) -> ParseTable<Alternative> {
        let firsts = FirstSets::compute(grammar);
        let follows = FollowSets::compute(grammar, &firsts);
        ParseTable::build(grammar, &firsts, &follows)
    }

    #[test]
    fn arithmetic_table() {
        let grammar = arithmetic();
        let table = build(&grammar);
        let sym = |name: &str| grammar.symbol(name).unwrap();

        let entry = table.get(sym("Ed"), sym("+")).unwrap();
        assert_eq!(entry.symbols(), [sym("+"), sym("T"), sym("Ed")]);
        assert!(table.get(sym("Ed"), sym(")")).unwrap().is_epsilon());
        assert!(table.get(sym("Ed"), SymbolID::EOF).unwrap().is_epsilon());
        assert!(table.get(sym("Ed"), sym("*")).is_none());
        assert_eq!(
            table.get(sym("F"), sym("(")).unwrap().symbols(),
            [sym("("), sym("E"), sym(")")]
        );
        assert_eq!(
            table.lookaheads(sym("Td")).names(grammar.symbols()),
            ["EOF", "+", "*", ")"]
        );
        assert!(table.is_ll1());
    }

    #[test]
    fn conflicts_keep_the_last_entry() {
        let grammar = Grammar::from_str("S : a | a b ;").unwrap();
        let table = build(&grammar);
        let s = grammar.symbol("S").unwrap();
        let a = grammar.symbol("a").unwrap();

        assert!(!table.is_ll1());
        let [conflict] = table.conflicts() else {
            panic!("expected exactly one conflict");
        };
        assert_eq!((conflict.nonterminal, conflict.terminal), (s, a));
        assert_eq!(table.get(s, a), Some(&conflict.chosen));
        assert_eq!(conflict.chosen.len(), 2);
        assert_eq!(
            conflict.display(&grammar).to_string(),
            "conflict at (S, a): `a' is overwritten by `a b'"
        );
    }

    #[test]
    fn identical_alternatives_conflict() {
        let grammar = Grammar::from_str("S : a | a ;").unwrap();
        let table = build(&grammar);

        assert!(!table.is_ll1());
        let [conflict] = table.conflicts() else {
            panic!("expected exactly one conflict");
        };
        assert_eq!(conflict.replaced, conflict.chosen);
        assert_eq!(
            conflict.display(&grammar).to_string(),
            "conflict at (S, a): `a' is overwritten by `a'"
        );
    }

    #[test]
    fn ebnf_table() {
        let grammar = select_clause();
        let firsts = FirstSets::compute_ebnf(&grammar);
        let follows = FollowSets::compute_ebnf(&grammar, &firsts);
        let table = ParseTable::build_ebnf(&grammar, &firsts, &follows);
        let sym = |name: &str| grammar.symbol(name).unwrap();

        let clause = sym("SelectClause");
        assert_eq!(
            table.get(clause, sym("SELECT")).copied(),
            grammar.expression(clause)
        );
        assert_eq!(table.lookaheads(clause).len(), 1);
        assert_eq!(table.lookaheads(sym("Var")).len(), 2);
        assert!(table.is_ll1());
        assert!(table.display(&grammar).to_string().contains("- VAR1 => VAR1 | VAR2"));
    }

    #[test]
    fn display_rows() {
        let grammar = arithmetic();
        let table = build(&grammar);
        let rendered = table.display(&grammar).to_string();
        assert!(rendered.starts_with("#### E\n"));
        assert!(rendered.contains("- + => Ed := + T Ed\n"));
        assert!(rendered.contains("- EOF => Ed := ε\n"));
    }
}
