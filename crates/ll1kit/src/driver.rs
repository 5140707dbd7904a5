//! Table-driven and recursive-descent parse drivers.

use crate::{
    ebnf::EbnfGrammar,
    grammar::{Alternative, Grammar},
    lexer::{LexError, Lexer, TokenStream, EOF},
    parse_table::ParseTable,
    symbol::{SymbolID, SymbolSet},
    tree::{NodeID, Tree},
};

/// The outcome of a table-driven parse.
///
/// A failed parse still carries the partial tree, the log up to the failure
/// and the terminals that would have been accepted at that point.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub log: Vec<String>,
    /// The terminals acceptable at the current position. Cleared on each
    /// shifted token, extended with the lookaheads of each consulted row.
    pub expected: SymbolSet,
    pub tree: Tree,
    pub failure: Option<ParseFailure>,
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// A snapshot of the driver state at the point of failure.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub kind: FailureKind,
    /// The name of the lookahead token as returned by the lexer.
    pub lookahead: String,
    pub current_node: Option<NodeID>,
    pub node_stack: Vec<NodeID>,
    pub stack: Vec<SymbolID>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FailureKind {
    /// The terminal on the stack top does not match the lookahead.
    UnexpectedToken,
    /// The parse table has no entry for the stack top and the lookahead.
    NoTableEntry,
    /// The start symbol was fully derived before the end of input
    /// (only reported by [`parse_strict`]).
    TrailingInput,
    /// The lexer rejected the input.
    LexicalError,
}

/// Notified once per symbol occurrence consumed by the driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// `node` has been expanded by the table entry of `(nonterminal, lookahead)`.
    Expand {
        nonterminal: SymbolID,
        lookahead: SymbolID,
        node: NodeID,
    },
    /// The leaf `node` has matched the input.
    Shift { terminal: SymbolID, node: NodeID },
}

/// Parse `input` with an LL(1) parse table.
///
/// The parse succeeds as soon as the start symbol has been fully derived,
/// whatever input is left after it. Use [`parse_strict`] to reject
/// trailing input.
pub fn parse<L>(
    input: &str,
    table: &ParseTable<Alternative>,
    grammar: &Grammar,
    lexer: &mut L,
) -> ParseResult
where
    L: Lexer + ?Sized,
{
    run(input, table, grammar, lexer, false, |_, _| ())
}

/// Same as [`parse`], but reporting each step to `visitor`.
pub fn parse_with<L, F>(
    input: &str,
    table: &ParseTable<Alternative>,
    grammar: &Grammar,
    lexer: &mut L,
    visitor: F,
) -> ParseResult
where
    L: Lexer + ?Sized,
    F: FnMut(ParseEvent, &Tree),
{
    run(input, table, grammar, lexer, false, visitor)
}

/// Same as [`parse`], but the whole input must be consumed: a token left
/// after the start symbol fails the parse with [`FailureKind::TrailingInput`].
pub fn parse_strict<L>(
    input: &str,
    table: &ParseTable<Alternative>,
    grammar: &Grammar,
    lexer: &mut L,
) -> ParseResult
where
    L: Lexer + ?Sized,
{
    run(input, table, grammar, lexer, true, |_, _| ())
}

#[tracing::instrument(skip_all)]
fn run<L, F>(
    input: &str,
    table: &ParseTable<Alternative>,
    grammar: &Grammar,
    lexer: &mut L,
    strict: bool,
    mut visitor: F,
) -> ParseResult
where
    L: Lexer + ?Sized,
    F: FnMut(ParseEvent, &Tree),
{
    let symbols = grammar.symbols();
    let mut driver = Driver {
        log: vec![],
        expected: SymbolSet::new(),
        tree: Tree::new(symbols, grammar.start()),
        stack: vec![SymbolID::EOF, grammar.start()],
        nodes: vec![NodeID::ROOT],
    };

    lexer.set_input(input);
    let mut lookahead = match Lookahead::read(lexer, grammar) {
        Ok(lookahead) => lookahead,
        Err(err) => return driver.lexical_error(err),
    };

    while let Some(&top) = driver.stack.last() {
        if top == SymbolID::EOF {
            break;
        }
        let node = match driver.nodes.last() {
            Some(node) => *node,
            None => break,
        };

        if lookahead.symbol == Some(top) {
            let text = lexer.matched().to_owned();
            tracing::trace!("shift {} {:?}", lookahead.name, text);
            driver.log.push(format!("Match {} `{}'", lookahead.name, text));
            driver.tree.set_text(node, text);
            driver.stack.pop();
            driver.nodes.pop();
            driver.expected.clear();
            visitor(ParseEvent::Shift { terminal: top, node }, &driver.tree);

            lookahead = match Lookahead::read(lexer, grammar) {
                Ok(lookahead) => lookahead,
                Err(err) => return driver.lexical_error(err),
            };
            continue;
        }

        if grammar.is_terminal(top) {
            driver.log.push(format!(
                "Unexpected token {}, expected {}",
                lookahead.name,
                grammar.name(top)
            ));
            driver.expected.insert(top);
            return driver.fail(FailureKind::UnexpectedToken, lookahead);
        }

        let row = table.lookaheads(top);
        driver.expected.union_with(&row);
        let Some((terminal, alternative)) = lookahead
            .symbol
            .and_then(|t| table.get(top, t).map(|alt| (t, alt)))
        else {
            driver.log.push(format!(
                "Unexpected token {}, expected one of {}",
                lookahead.name,
                row.display(symbols)
            ));
            return driver.fail(FailureKind::NoTableEntry, lookahead);
        };

        tracing::trace!("expand {} := {}", grammar.name(top), alternative.display(grammar));
        driver.log.push(format!(
            "{} := {}",
            grammar.name(top),
            alternative.display(grammar)
        ));
        driver.stack.pop();
        driver.nodes.pop();
        let children: Vec<NodeID> = alternative
            .symbols()
            .iter()
            .map(|symbol| driver.tree.push(symbols, *symbol, Some(node)))
            .collect();
        // 左端の記号がスタックの一番上に来るよう逆順に積む
        for (symbol, child) in alternative.symbols().iter().zip(&children).rev() {
            driver.stack.push(*symbol);
            driver.nodes.push(*child);
        }
        visitor(
            ParseEvent::Expand {
                nonterminal: top,
                lookahead: terminal,
                node,
            },
            &driver.tree,
        );
    }

    if strict && lookahead.symbol != Some(SymbolID::EOF) {
        driver
            .log
            .push(format!("Unexpected token {}, expected EOF", lookahead.name));
        driver.expected.insert(SymbolID::EOF);
        return driver.fail(FailureKind::TrailingInput, lookahead);
    }

    driver.log.push("success".into());
    ParseResult {
        log: driver.log,
        expected: driver.expected,
        tree: driver.tree,
        failure: None,
    }
}

struct Driver {
    log: Vec<String>,
    expected: SymbolSet,
    tree: Tree,
    stack: Vec<SymbolID>,
    nodes: Vec<NodeID>,
}

impl Driver {
    fn fail(self, kind: FailureKind, lookahead: Lookahead) -> ParseResult {
        tracing::trace!("failed: {:?}", kind);
        ParseResult {
            log: self.log,
            expected: self.expected,
            tree: self.tree,
            failure: Some(ParseFailure {
                kind,
                lookahead: lookahead.name,
                current_node: self.nodes.last().copied(),
                node_stack: self.nodes,
                stack: self.stack,
            }),
        }
    }

    fn lexical_error(mut self, err: LexError) -> ParseResult {
        self.log.push(format!("Lexical error: {}", err));
        self.fail(
            FailureKind::LexicalError,
            Lookahead {
                symbol: None,
                name: String::new(),
            },
        )
    }
}

struct Lookahead {
    symbol: Option<SymbolID>,
    name: String,
}

impl Lookahead {
    fn read<L>(lexer: &mut L, grammar: &Grammar) -> Result<Self, LexError>
    where
        L: Lexer + ?Sized,
    {
        let name = lexer.lex()?;
        let symbol = match name {
            EOF => Some(SymbolID::EOF),
            name => grammar.symbol(name).filter(|id| grammar.is_terminal(*id)),
        };
        Ok(Self {
            symbol,
            name: name.to_owned(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecursiveParseError {
    #[error("lexical error: {}", _0)]
    Lex(
        #[from]
        #[source]
        LexError,
    ),

    #[error("no match for `{}' (at token #{}: {})", start, position, found)]
    NoMatch {
        start: String,
        position: usize,
        found: String,
    },

    #[error("unexpected trailing input at token #{}: {}", position, found)]
    TrailingInput { position: usize, found: String },
}

/// Parse `input` by recursive descent over the expressions of an EBNF grammar,
/// without any parse table.
///
/// Choices are committed to their first matching alternative, and tokens
/// consumed by a failed alternative are not given back.
#[tracing::instrument(skip_all)]
pub fn parse_recursively<L>(
    input: &str,
    lexer: &mut L,
    grammar: &EbnfGrammar,
) -> Result<Tree, RecursiveParseError>
where
    L: Lexer,
{
    let mut tokens = TokenStream::tokenize(lexer, input, grammar.symbols())?;
    let start = grammar.start();
    let mut tree = Tree::new(grammar.symbols(), start);

    let no_match = |tokens: &TokenStream| RecursiveParseError::NoMatch {
        start: grammar.name(start).into(),
        position: tokens.position(),
        found: tokens.peek().map_or_else(String::new, |t| t.name.clone()),
    };
    let children = grammar
        .expression(start)
        .and_then(|expr| expr.parse(&mut tokens, grammar, &mut tree))
        .ok_or_else(|| no_match(&tokens))?;
    tree.adopt(NodeID::ROOT, children);

    if tokens.peek_symbol() != Some(SymbolID::EOF) {
        return Err(RecursiveParseError::TrailingInput {
            position: tokens.position(),
            found: tokens.peek().map_or_else(String::new, |t| t.name.clone()),
        });
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ebnf::tests::select_clause,
        first_sets::{tests::arithmetic, FirstSets},
        follow_sets::FollowSets,
        lexer::{tests::arithmetic_lexer, LexRule, RuleLexer},
    };

    fn arithmetic_table(grammar: &Grammar) -> ParseTable<Alternative> {
        let firsts = FirstSets::compute(grammar);
        let follows = FollowSets::compute(grammar, &firsts);
        ParseTable::build(grammar, &firsts, &follows)
    }

    #[test]
    fn parse_success() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse("foo+bar*test", &table, &grammar, &mut arithmetic_lexer());

        assert!(result.is_success(), "{:?}", result.log);
        assert_eq!(result.log.last().map(String::as_str), Some("success"));
        assert!(result.log.iter().any(|line| line == "Ed := + T Ed"));

        let root = result.tree.root();
        assert_eq!(root.name(), "E");
        assert_eq!(root.get_text(""), "foo+bar*test");
        let ids: Vec<_> = root
            .descendants_of_type(&["id"])
            .iter()
            .filter_map(|n| n.text())
            .collect();
        assert_eq!(ids, ["foo", "bar", "test"]);

        let test = root.descendants_of_type(&["id"])[2];
        let term = test.ancestor_of_type("T").unwrap();
        assert_eq!(term.get_text(" "), "bar * test");
    }

    #[test]
    fn parse_unexpected_token() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse("id+*id", &table, &grammar, &mut arithmetic_lexer());

        let failure = result.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::NoTableEntry);
        assert_eq!(failure.lookahead, "*");
        assert!(result.log.iter().any(|line| line.starts_with("Unexpected token ")));
        assert_ne!(result.log.last().map(String::as_str), Some("success"));

        // the suggestions are the terminals that may start a `T'.
        assert_eq!(result.expected.names(grammar.symbols()), ["(", "id"]);
        assert_eq!(failure.stack.last().map(|s| grammar.name(*s)), Some("T"));
        assert_eq!(failure.stack.len(), failure.node_stack.len() + 1);
        let current = result.tree.node(failure.current_node.unwrap());
        assert_eq!(current.name(), "T");
        assert_eq!(current.parent().map(|n| n.name()), Some("Ed"));
    }

    #[test]
    fn parse_terminal_mismatch() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse("(a+b", &table, &grammar, &mut arithmetic_lexer());

        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::UnexpectedToken);
        assert_eq!(failure.lookahead, "EOF");
        assert_eq!(
            result.log.last().map(String::as_str),
            Some("Unexpected token EOF, expected )")
        );
        assert!(result.expected.contains(grammar.symbol(")").unwrap()));
    }

    #[test]
    fn parse_stops_once_the_start_symbol_is_derived() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse("a )", &table, &grammar, &mut arithmetic_lexer());

        assert!(result.is_success(), "{:?}", result.log);
        assert_eq!(result.log.last().map(String::as_str), Some("success"));
        assert_eq!(result.tree.root().get_text(""), "a");
    }

    #[test]
    fn parse_strict_rejects_trailing_input() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse_strict("a )", &table, &grammar, &mut arithmetic_lexer());

        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::TrailingInput);
        assert_eq!(failure.lookahead, ")");
        assert_eq!(failure.stack, [SymbolID::EOF]);
        assert!(result.expected.contains(SymbolID::EOF));
        assert_eq!(
            result.log.last().map(String::as_str),
            Some("Unexpected token ), expected EOF")
        );

        let result = parse_strict("a * b", &table, &grammar, &mut arithmetic_lexer());
        assert!(result.is_success());
    }

    #[test]
    fn parse_lexical_error() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let result = parse("a ? b", &table, &grammar, &mut arithmetic_lexer());

        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::LexicalError);
        assert!(result
            .log
            .last()
            .map_or(false, |line| line.starts_with("Lexical error: ")));
        // `a' has been shifted before the lexer gave up.
        assert_eq!(result.tree.root().get_text(""), "a");
    }

    #[test]
    fn visitor_sees_every_step() {
        let grammar = arithmetic();
        let table = arithmetic_table(&grammar);
        let f = grammar.symbol("F").unwrap();

        let mut shifts = 0;
        let mut factors = vec![];
        let result = parse_with(
            "foo+bar*test",
            &table,
            &grammar,
            &mut arithmetic_lexer(),
            |event, tree| match event {
                ParseEvent::Shift { .. } => shifts += 1,
                ParseEvent::Expand {
                    nonterminal, node, ..
                } if nonterminal == f => {
                    factors.push(tree.node(node).children().count());
                }
                ParseEvent::Expand { .. } => (),
            },
        );
        assert!(result.is_success());
        assert_eq!(shifts, 5);
        assert_eq!(factors, [1, 1, 1]);
    }

    fn select_lexer() -> RuleLexer {
        RuleLexer::new([
            LexRule::skip(r"\s+"),
            LexRule::token("SELECT", "SELECT"),
            LexRule::token("DISTINCT", "DISTINCT"),
            LexRule::token("REDUCED", "REDUCED"),
            LexRule::token(r"\*", "*"),
            LexRule::token(r"\?[a-z]+", "VAR1"),
            LexRule::token(r"\$[a-z]+", "VAR2"),
        ])
        .unwrap()
    }

    #[test]
    fn recursive_parse() {
        let grammar = select_clause();
        let tree = parse_recursively("SELECT DISTINCT ?a $b", &mut select_lexer(), &grammar)
            .unwrap();
        let root = tree.root();
        assert_eq!(root.name(), "SelectClause");
        assert_eq!(root.get_text(" "), "SELECT DISTINCT ?a $b");

        let vars = root.descendants_of_type(&["Var"]);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[1].get_text(""), "$b");
        assert_eq!(vars[0].parent().map(|n| n.id()), Some(NodeID::ROOT));

        let tree = parse_recursively("SELECT *", &mut select_lexer(), &grammar).unwrap();
        assert_eq!(tree.root().children().count(), 2);
    }

    #[test]
    fn recursive_parse_errors() {
        let grammar = select_clause();
        let err = parse_recursively("SELECT", &mut select_lexer(), &grammar).unwrap_err();
        assert!(matches!(err, RecursiveParseError::NoMatch { .. }));

        let err = parse_recursively("SELECT * ?a", &mut select_lexer(), &grammar).unwrap_err();
        assert!(
            matches!(err, RecursiveParseError::TrailingInput { position: 2, ref found } if found == "VAR1")
        );

        let err = parse_recursively("SELECT !", &mut select_lexer(), &grammar).unwrap_err();
        assert!(matches!(err, RecursiveParseError::Lex(..)));
    }
}
