//! Grammar types.

mod lexer;

use self::lexer::Token;
use crate::{
    symbol::{SymbolID, Symbols},
    types::{Map, Set},
    util::display_fn,
};
use logos::Logos;
use std::{fmt, fs, io, path::Path};

/// One alternative of a BNF production. The empty sequence is the `ε` alternative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Alternative {
    symbols: Vec<SymbolID>,
}

impl Alternative {
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = SymbolID>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .filter(|s| *s != SymbolID::EPSILON)
                .collect(),
        }
    }

    pub fn epsilon() -> Self {
        Self::default()
    }

    pub fn is_epsilon(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[SymbolID] {
        &self.symbols[..]
    }

    pub fn first(&self) -> Option<SymbolID> {
        self.symbols.first().copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    // `"x y z"`, or `"ε"` for the empty alternative.
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            if self.is_epsilon() {
                return f.write_str("ε");
            }
            for (i, symbol) in self.symbols.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(g.name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// The BNF grammar that parse tables are derived from.
#[derive(Debug, Clone)]
pub struct Grammar {
    symbols: Symbols,
    terminals: Set<SymbolID>,
    productions: Map<SymbolID, Vec<Alternative>>,
    start: SymbolID,
}

impl fmt::Display for Grammar {
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
        for nonterminal in self.productions.keys() {
            writeln!(f, "{}", self.display_production(*nonterminal))?;
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarDefError> {
        let source = fs::read_to_string(path).map_err(GrammarDefError::IO)?;
        Self::from_str(&source)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> Result<Grammar, GrammarDefError> {
        let source = GrammarSource::parse(source)?;
        Self::from_source(&source)
    }

    /// Convert the loader structure into a grammar.
    ///
    /// Every symbol that is used in an alternative but has no production of
    /// its own is a terminal.
    pub fn from_source(source: &GrammarSource) -> Result<Grammar, GrammarDefError> {
        Grammar::define(|g| {
            let mut nonterminals = Map::default();
            for name in source.bnf.keys() {
                nonterminals.insert(name.as_str(), g.nonterminal(name)?);
            }
            if let Some(start) = &source.start {
                let start = nonterminals
                    .get(start.as_str())
                    .copied()
                    .ok_or_else(|| format!("unknown start symbol: `{}'", start))?;
                g.start_symbol(start)?;
            }
            for (name, alternatives) in &source.bnf {
                let left = nonterminals[name.as_str()];
                for alternative in alternatives {
                    let mut right = vec![];
                    for symbol in alternative.split_whitespace() {
                        let symbol = match nonterminals.get(symbol) {
                            Some(n) => *n,
                            None => g.terminal(symbol)?,
                        };
                        right.push(symbol);
                    }
                    g.rule(left, right)?;
                }
            }
            Ok(())
        })
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub(crate) fn from_parts(
        symbols: Symbols,
        terminals: Set<SymbolID>,
        start: SymbolID,
    ) -> Self {
        Self {
            symbols,
            terminals,
            productions: Map::default(),
            start,
        }
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

    pub fn productions(&self) -> impl Iterator<Item = (SymbolID, &[Alternative])> + '_ {
        self.productions
            .iter()
            .map(|(id, alternatives)| (*id, &alternatives[..]))
    }

    pub fn alternatives(&self, nonterminal: SymbolID) -> Option<&[Alternative]> {
        self.productions.get(&nonterminal).map(|a| &a[..])
    }

    pub fn start(&self) -> SymbolID {
        self.start
    }

    /// Whether `id` is a terminal symbol. The end of input counts as one.
    pub fn is_terminal(&self, id: SymbolID) -> bool {
        id == SymbolID::EOF || self.terminals.contains(&id)
    }

    pub fn is_nonterminal(&self, id: SymbolID) -> bool {
        self.productions.contains_key(&id)
    }

    /// Register a fresh non-terminal named `name`, or a suffixed variant of it
    /// when the name is already taken.
    pub(crate) fn fresh_nonterminal(&mut self, name: &str) -> SymbolID {
        let mut candidate = name.to_owned();
        let mut n = 1;
        while self.symbols.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        let id = self.symbols.intern(&candidate);
        self.productions.insert(id, vec![]);
        id
    }

    pub(crate) fn intern_nonterminal(&mut self, name: &str) -> SymbolID {
        let id = self.symbols.intern(name);
        debug_assert!(
            !self.productions.contains_key(&id),
            "synthetic nonterminal `{}' defined twice",
            name
        );
        id
    }

    pub(crate) fn set_alternatives(&mut self, nonterminal: SymbolID, alternatives: Vec<Alternative>) {
        self.productions.insert(nonterminal, alternatives);
    }

    // `"LHS := R1 R2 | R3"`
    pub fn display_production(&self, nonterminal: SymbolID) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            write!(f, "{} := ", self.name(nonterminal))?;
            for (i, alternative) in self
                .alternatives(nonterminal)
                .unwrap_or_default()
                .iter()
                .enumerate()
            {
                if i > 0 {
                    f.write_str(" | ")?;
                }
                write!(f, "{}", alternative.display(self))?;
            }
            Ok(())
        })
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    symbols: Symbols,
    terminals: Set<SymbolID>,
    nonterminals: Set<SymbolID>,
    rules: Map<SymbolID, Vec<Alternative>>,
    start: Option<SymbolID>,
}

impl Default for GrammarDef {
    fn default() -> Self {
        Self {
            symbols: Symbols::default(),
            terminals: Set::default(),
            nonterminals: Set::default(),
            rules: Map::default(),
            start: None,
        }
    }
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    ///
    /// Declaring the same terminal twice returns the same ID.
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

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<SymbolID, GrammarDefError> {
        let id = declare(&mut self.symbols, name)?;
        if self.terminals.contains(&id) {
            return Err(GrammarDefError::KindMismatch { name: name.into() });
        }
        if self.nonterminals.insert(id) {
            self.rules.insert(id, vec![]);
        }
        Ok(id)
    }

    /// Add an alternative to the production of `left`.
    ///
    /// An empty `right` adds the `ε` alternative.
    pub fn rule<I>(&mut self, left: SymbolID, right: I) -> Result<(), GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right = Alternative::new(right);
        if let Some(foreign) = right
            .symbols()
            .iter()
            .find(|s| s.into_raw() as usize >= self.symbols.len())
        {
            return Err(GrammarDefError::Other {
                msg: format!("unknown symbol ID {:?}", foreign),
            });
        }
        let alternatives = self
            .rules
            .get_mut(&left)
            .ok_or_else(|| GrammarDefError::NotNonterminal {
                name: self.symbols.name(left).into(),
            })?;
        alternatives.push(right);
        Ok(())
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: SymbolID) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains(&symbol) {
            return Err(GrammarDefError::NotNonterminal {
                name: self.symbols.name(symbol).into(),
            });
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn end(mut self) -> Result<Grammar, GrammarDefError> {
        // 指定されていない場合は最初に登録されたnonterminal symbolを用いる
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .first()
                .copied()
                .ok_or(GrammarDefError::EmptyNonterminals)?,
        };

        for (left, alternatives) in &self.rules {
            if alternatives.is_empty() {
                return Err(GrammarDefError::NoAlternatives {
                    name: self.symbols.name(*left).into(),
                });
            }
            for symbol in alternatives.iter().flat_map(|a| a.symbols()) {
                let known = *symbol == SymbolID::EOF
                    || self.terminals.contains(symbol)
                    || self.nonterminals.contains(symbol);
                if !known {
                    return Err(GrammarDefError::UndefinedSymbol {
                        name: self.symbols.name(*symbol).into(),
                        referenced_by: self.symbols.name(*left).into(),
                    });
                }
            }
        }

        Ok(Grammar {
            symbols: self.symbols,
            terminals: self.terminals,
            productions: self.rules,
            start,
        })
    }
}

pub(crate) fn declare(symbols: &mut Symbols, name: &str) -> Result<SymbolID, GrammarDefError> {
    if name.is_empty() || name == "EOF" || name.chars().any(char::is_whitespace) {
        return Err(GrammarDefError::InvalidName { name: name.into() });
    }
    Ok(symbols.intern(name))
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("Syntax error at line {}: {}", line, msg)]
    Syntax { line: usize, msg: String },

    #[error("incorrect symbol name: `{}'", name)]
    InvalidName { name: String },

    #[error("`{}' is declared both as a terminal and a nonterminal", name)]
    KindMismatch { name: String },

    #[error("`{}' is not a nonterminal", name)]
    NotNonterminal { name: String },

    #[error("the nonterminal `{}' has no alternatives", name)]
    NoAlternatives { name: String },

    #[error("undefined symbol `{}' referenced by `{}'", name, referenced_by)]
    UndefinedSymbol { name: String, referenced_by: String },

    #[error("empty nonterminal symbols")]
    EmptyNonterminals,

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

/// The structure produced by a grammar loader.
///
/// Each alternative is a space-separated list of symbol names, the empty
/// string standing for `ε`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrammarSource {
    pub bnf: Map<String, Vec<String>>,
    pub start: Option<String>,
}

impl GrammarSource {
    /// Read a grammar of the form
    ///
    /// ```text
    /// %start E
    /// E  : T Ed ;
    /// Ed : '+' T Ed | ;
    /// ```
    ///
    /// Quoted symbols keep punctuation such as `|` or `;` as plain terminal
    /// names. They may not contain whitespace.
    pub fn parse(source: &str) -> Result<Self, GrammarDefError> {
        let mut parsed = Self::default();
        let mut parser = SourceParser::new(source);

        while let Some(token) = parser.next()? {
            match token {
                Token::Start => {
                    let name = match parser.next()? {
                        Some(Token::Ident(name) | Token::Quoted(name)) => name,
                        _ => return Err(parser.error("missing start symbol")),
                    };
                    parsed.start = Some(name.into());
                }
                Token::Ident(name) | Token::Quoted(name) => {
                    if parser.next()? != Some(Token::Colon) {
                        return Err(parser.error("expected `:' after the rule name"));
                    }
                    let alternatives = parser.alternatives(name)?;
                    if parsed.bnf.contains_key(name) {
                        return Err(parser.error("duplicate rule"));
                    }
                    parsed.bnf.insert(name.into(), alternatives);
                }
                _ => return Err(parser.error("expected a rule name or `%start'")),
            }
        }

        Ok(parsed)
    }
}

struct SourceParser<'source> {
    source: &'source str,
    tokens: logos::SpannedIter<'source, Token<'source>>,
    offset: usize,
}

impl<'source> SourceParser<'source> {
    fn new(source: &'source str) -> Self {
        Self {
            source,
            tokens: Token::lexer(source).spanned(),
            offset: 0,
        }
    }

    fn next(&mut self) -> Result<Option<Token<'source>>, GrammarDefError> {
        let Some((token, span)) = self.tokens.next() else {
            return Ok(None);
        };
        self.offset = span.start;
        match token {
            Ok(token) => Ok(Some(token)),
            Err(()) => Err(self.error(&format!(
                "unrecognized token `{}'",
                &self.source[span]
            ))),
        }
    }

    /// Read `alt | alt | ... ;` after the `:` of a rule.
    fn alternatives(&mut self, name: &str) -> Result<Vec<String>, GrammarDefError> {
        let mut alternatives = vec![];
        let mut current: Vec<&str> = vec![];
        loop {
            match self.next()? {
                Some(Token::Ident(symbol) | Token::Quoted(symbol)) => current.push(symbol),
                Some(Token::VertBar) => alternatives.push(std::mem::take(&mut current).join(" ")),
                Some(Token::Semicolon) => {
                    alternatives.push(current.join(" "));
                    return Ok(alternatives);
                }
                Some(Token::Colon) => return Err(self.error("unexpected `:'")),
                Some(Token::Start) => return Err(self.error("unexpected `%start'")),
                None => {
                    return Err(self.error(&format!(
                        "the rule `{}' is not terminated by `;'",
                        name
                    )))
                }
            }
        }
    }

    fn error(&self, msg: &str) -> GrammarDefError {
        GrammarDefError::Syntax {
            line: self.source[..self.offset].matches('\n').count() + 1,
            msg: msg.into(),
        }
    }
}
