//! EBNF grammars and their conversion into BNF.

mod expr;

pub use self::expr::{chain, choice, one_or_more, optional, zero_or_more, Expr};

use crate::{
    grammar::{declare, Alternative, Grammar, GrammarDefError},
    symbol::{SymbolID, Symbols},
    types::{Map, Set},
};
use std::fmt;

/// A grammar whose non-terminals are each defined by one expression tree.
#[derive(Debug, Clone)]
pub struct EbnfGrammar {
    symbols: Symbols,
    terminals: Set<SymbolID>,
    productions: Map<SymbolID, Expr>,
    start: SymbolID,
}

impl fmt::Display for EbnfGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in &self.terminals {
            writeln!(f, "{}", self.name(*terminal))?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.productions.keys() {
            write!(f, "{}", self.name(*nonterminal))?;
            if *nonterminal == self.start {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for (nonterminal, expr) in &self.productions {
            writeln!(
                f,
                "{} := {}",
                self.name(*nonterminal),
                expr.display(&self.symbols)
            )?;
        }

        Ok(())
    }
}

impl EbnfGrammar {
    /// Define an EBNF grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut EbnfGrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = EbnfGrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<SymbolID> {
        self.symbols.get(name)
    }

    pub fn name(&self, id: SymbolID) -> &str {
        self.symbols.name(id)
    }

    pub fn terminals(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.terminals.iter().copied()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.productions.keys().copied()
    }

    pub fn productions(&self) -> impl Iterator<Item = (SymbolID, &Expr)> + '_ {
        self.productions.iter().map(|(id, expr)| (*id, expr))
    }

    pub fn expression(&self, nonterminal: SymbolID) -> Option<&Expr> {
        self.productions.get(&nonterminal)
    }

    pub fn start(&self) -> SymbolID {
        self.start
    }

    pub fn is_terminal(&self, id: SymbolID) -> bool {
        id == SymbolID::EOF || self.terminals.contains(&id)
    }

    pub fn is_nonterminal(&self, id: SymbolID) -> bool {
        self.productions.contains_key(&id)
    }
}

/// The contextural values for building an `EbnfGrammar`.
#[derive(Debug, Default)]
pub struct EbnfGrammarDef {
    symbols: Symbols,
    terminals: Set<SymbolID>,
    nonterminals: Set<SymbolID>,
    rules: Map<SymbolID, Expr>,
    start: Option<SymbolID>,
}

impl EbnfGrammarDef {
    /// Declare a terminal symbol, to be referenced by `Expr::Terminal`.
    pub fn terminal(&mut self, name: &str) -> Result<SymbolID, GrammarDefError> {
        if name == "EOF" {
            return Ok(SymbolID::EOF);
        }
        let id = declare(&mut self.symbols, name)?;
        if self.nonterminals.contains(&id) {
            return Err(GrammarDefError::KindMismatch { name: name.into() });
        }
        self.terminals.insert(id);
        Ok(id)
    }

    /// Declare a nonterminal symbol, to be referenced by `Expr::Token`.
    pub fn nonterminal(&mut self, name: &str) -> Result<SymbolID, GrammarDefError> {
        let id = declare(&mut self.symbols, name)?;
        if self.terminals.contains(&id) {
            return Err(GrammarDefError::KindMismatch { name: name.into() });
        }
        self.nonterminals.insert(id);
        Ok(id)
    }

    /// Give `left` its defining expression.
    pub fn rule(&mut self, left: SymbolID, expr: Expr) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains(&left) {
            return Err(GrammarDefError::NotNonterminal {
                name: self.symbols.name(left).into(),
            });
        }
        if self.rules.contains_key(&left) {
            return Err(format!("duplicate rule for `{}'", self.symbols.name(left)).into());
        }
        self.rules.insert(left, expr);
        Ok(())
    }

    pub fn start_symbol(&mut self, symbol: SymbolID) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains(&symbol) {
            return Err(GrammarDefError::NotNonterminal {
                name: self.symbols.name(symbol).into(),
            });
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn end(mut self) -> Result<EbnfGrammar, GrammarDefError> {
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .first()
                .copied()
                .ok_or(GrammarDefError::EmptyNonterminals)?,
        };

        for nonterminal in &self.nonterminals {
            if !self.rules.contains_key(nonterminal) {
                return Err(GrammarDefError::NoAlternatives {
                    name: self.symbols.name(*nonterminal).into(),
                });
            }
        }

        for (left, expr) in &self.rules {
            self.check(*left, expr)?;
        }

        // 宣言順に並べ直す
        let mut rules = self.rules;
        let productions = self
            .nonterminals
            .iter()
            .filter_map(|id| rules.swap_remove(id).map(|expr| (*id, expr)))
            .collect();

        Ok(EbnfGrammar {
            symbols: self.symbols,
            terminals: self.terminals,
            productions,
            start,
        })
    }

    fn check(&self, left: SymbolID, expr: &Expr) -> Result<(), GrammarDefError> {
        let undefined = |id: SymbolID| GrammarDefError::UndefinedSymbol {
            name: self.symbols.name(id).into(),
            referenced_by: self.symbols.name(left).into(),
        };
        match expr {
            Expr::Terminal(id) => {
                if !self.symbols_known(*id) {
                    return Err(undefined(*id));
                }
                if *id != SymbolID::EOF && !self.terminals.contains(id) {
                    return Err(GrammarDefError::KindMismatch {
                        name: self.symbols.name(*id).into(),
                    });
                }
            }
            Expr::Token(id) => {
                if !self.symbols_known(*id) {
                    return Err(undefined(*id));
                }
                if !self.nonterminals.contains(id) {
                    return Err(GrammarDefError::NotNonterminal {
                        name: self.symbols.name(*id).into(),
                    });
                }
            }
            Expr::Chain(children) => {
                for child in children {
                    self.check(left, child)?;
                }
            }
            Expr::Choice(children) => {
                if children.is_empty() {
                    return Err(format!(
                        "empty choice in the rule of `{}'",
                        self.symbols.name(left)
                    )
                    .into());
                }
                for child in children {
                    self.check(left, child)?;
                }
            }
            Expr::Optional(child) | Expr::ZeroOrMore(child) | Expr::OneOrMore(child) => {
                self.check(left, child)?;
            }
        }
        Ok(())
    }

    fn symbols_known(&self, id: SymbolID) -> bool {
        (id.into_raw() as usize) < self.symbols.len() && id != SymbolID::EPSILON
    }
}

/// Convert an EBNF grammar into an equivalent BNF grammar.
///
/// Every non-terminal `S` becomes the single alternative `S := root`, where
/// `root` is the synthetic non-terminal built from its expression with the
/// name prefix `_S`. Symbol IDs are shared with the source grammar.
#[tracing::instrument(skip_all)]
pub fn transform_from_ebnf(ebnf: &EbnfGrammar) -> Grammar {
    let mut grammar =
        Grammar::from_parts(ebnf.symbols.clone(), ebnf.terminals.clone(), ebnf.start);
    for (nonterminal, expr) in ebnf.productions() {
        let prefix = format!("_{}", ebnf.name(nonterminal));
        let root = expr.transform(&mut grammar, &prefix);
        tracing::trace!("{} -> {}", ebnf.name(nonterminal), grammar.name(root));
        grammar.set_alternatives(nonterminal, vec![Alternative::new([root])]);
    }
    grammar
}
