//! Lexer interface and a rule-based implementation.

use crate::symbol::{SymbolID, Symbols};
use regex::Regex;

/// The name of the token returned once the input is exhausted.
pub const EOF: &str = "EOF";

/// A pull-based tokenizer.
pub trait Lexer {
    /// Reset the lexer to the start of `input`.
    fn set_input(&mut self, input: &str);

    /// Read the next token and return its name, or [`EOF`] at the end of input.
    fn lex(&mut self) -> Result<&str, LexError>;

    /// The input text matched by the last token returned from `lex`.
    fn matched(&self) -> &str;
}

impl<L: Lexer + ?Sized> Lexer for &mut L {
    fn set_input(&mut self, input: &str) {
        (**self).set_input(input)
    }

    fn lex(&mut self) -> Result<&str, LexError> {
        (**self).lex()
    }

    fn matched(&self) -> &str {
        (**self).matched()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unrecognized input at offset {}: {:?}", offset, snippet)]
    Unrecognized { offset: usize, snippet: String },

    #[error("invalid lexer rule `{}': {}", pattern, source)]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("syntax error in lexer rules at line {}: {}", line, msg)]
    Syntax { line: usize, msg: String },
}

/// One rule of a `RuleLexer`. A rule without a token name discards its match.
#[derive(Debug, Clone)]
pub struct LexRule {
    pub pattern: String,
    pub token: Option<String>,
}

impl LexRule {
    pub fn token(pattern: &str, token: &str) -> Self {
        Self {
            pattern: pattern.into(),
            token: Some(token.into()),
        }
    }

    pub fn skip(pattern: &str) -> Self {
        Self {
            pattern: pattern.into(),
            token: None,
        }
    }
}

/// Parse lexer rules, one `TOKEN REGEX` pair per line.
///
/// A `-` token skips the match. Blank lines and lines starting with `#` are ignored.
pub fn parse_rules(source: &str) -> Result<Vec<LexRule>, LexError> {
    let mut rules = vec![];
    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((token, pattern)) = line.split_once(char::is_whitespace) else {
            return Err(LexError::Syntax {
                line: index + 1,
                msg: "expected `TOKEN REGEX'".into(),
            });
        };
        let pattern = pattern.trim();
        rules.push(match token {
            "-" => LexRule::skip(pattern),
            token => LexRule::token(pattern, token),
        });
    }
    Ok(rules)
}

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    token: Option<String>,
}

/// A lexer driven by an ordered list of regular expressions.
///
/// At each position the first rule that matches a non-empty prefix wins.
#[derive(Debug)]
pub struct RuleLexer {
    rules: Vec<CompiledRule>,
    input: String,
    pos: usize,
    matched: (usize, usize),
}

impl RuleLexer {
    pub fn new<I>(rules: I) -> Result<Self, LexError>
    where
        I: IntoIterator<Item = LexRule>,
    {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = Regex::new(&format!("^(?:{})", rule.pattern)).map_err(|source| {
                    LexError::InvalidRule {
                        pattern: rule.pattern.clone(),
                        source,
                    }
                })?;
                Ok(CompiledRule {
                    regex,
                    token: rule.token,
                })
            })
            .collect::<Result<_, LexError>>()?;
        Ok(Self {
            rules,
            input: String::new(),
            pos: 0,
            matched: (0, 0),
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> Result<Self, LexError> {
        Self::new(parse_rules(source)?)
    }
}

impl Lexer for RuleLexer {
    fn set_input(&mut self, input: &str) {
        self.input.clear();
        self.input.push_str(input);
        self.pos = 0;
        self.matched = (0, 0);
    }

    fn lex(&mut self) -> Result<&str, LexError> {
        loop {
            if self.pos >= self.input.len() {
                self.matched = (self.pos, self.pos);
                return Ok(EOF);
            }

            let rest = &self.input[self.pos..];
            let found = self.rules.iter().enumerate().find_map(|(i, rule)| {
                rule.regex
                    .find(rest)
                    .filter(|m| !m.as_str().is_empty())
                    .map(|m| (i, m.end()))
            });
            let Some((rule, len)) = found else {
                return Err(LexError::Unrecognized {
                    offset: self.pos,
                    snippet: rest.chars().take(16).collect(),
                });
            };

            let start = self.pos;
            self.pos += len;
            if let Some(token) = &self.rules[rule].token {
                self.matched = (start, self.pos);
                return Ok(token.as_str());
            }
        }
    }

    fn matched(&self) -> &str {
        &self.input[self.matched.0..self.matched.1]
    }
}

/// A token read ahead of parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct LexedToken {
    /// `None` if the lexer produced a name the grammar does not know.
    pub symbol: Option<SymbolID>,
    pub name: String,
    pub text: String,
}

/// The whole token sequence of an input, terminated by an `EOF` token.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<LexedToken>,
    pos: usize,
}

impl TokenStream {
    /// Run `lexer` over `input` up to the end of input.
    pub fn tokenize<L: Lexer>(
        lexer: &mut L,
        input: &str,
        symbols: &Symbols,
    ) -> Result<Self, LexError> {
        lexer.set_input(input);
        let mut tokens = vec![];
        loop {
            let name = lexer.lex()?.to_owned();
            let symbol = match &*name {
                EOF => Some(SymbolID::EOF),
                name => symbols.get(name).filter(|id| !id.is_reserved()),
            };
            let is_eof = symbol == Some(SymbolID::EOF);
            tokens.push(LexedToken {
                symbol,
                name,
                text: lexer.matched().to_owned(),
            });
            if is_eof {
                break;
            }
        }
        Ok(Self { tokens, pos: 0 })
    }

    pub fn peek(&self) -> Option<&LexedToken> {
        self.tokens.get(self.pos)
    }

    pub fn peek_symbol(&self) -> Option<SymbolID> {
        self.peek().and_then(|t| t.symbol)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&LexedToken> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn arithmetic_lexer() -> RuleLexer {
        RuleLexer::new([
            LexRule::skip(r"\s+"),
            LexRule::token(r"[A-Za-z_][A-Za-z0-9_]*", "id"),
            LexRule::token(r"\+", "+"),
            LexRule::token(r"\*", "*"),
            LexRule::token(r"\(", "("),
            LexRule::token(r"\)", ")"),
        ])
        .unwrap()
    }

    fn collect(lexer: &mut impl Lexer, input: &str) -> Result<Vec<(String, String)>, LexError> {
        lexer.set_input(input);
        let mut tokens = vec![];
        loop {
            let name = lexer.lex()?.to_owned();
            if name == EOF {
                return Ok(tokens);
            }
            tokens.push((name, lexer.matched().to_owned()));
        }
    }

    #[test]
    fn lex_arithmetic() {
        let mut lexer = arithmetic_lexer();
        let tokens = collect(&mut lexer, "foo + bar*(test)").unwrap();
        let names: Vec<_> = tokens.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["id", "+", "id", "*", "(", "id", ")"]);
        assert_eq!(tokens[2].1, "bar");

        // the lexer is reusable after `set_input'.
        let tokens = collect(&mut lexer, "x").unwrap();
        assert_eq!(tokens, [("id".to_owned(), "x".to_owned())]);
    }

    #[test]
    fn first_rule_wins() {
        let mut lexer = RuleLexer::new([
            LexRule::token("SELECT", "SELECT"),
            LexRule::token("[A-Z]+", "NAME"),
            LexRule::skip(" +"),
        ])
        .unwrap();
        let tokens = collect(&mut lexer, "SELECT FOO").unwrap();
        assert_eq!(tokens[0].0, "SELECT");
        assert_eq!(tokens[1].0, "NAME");
    }

    #[test]
    fn unrecognized_input() {
        let mut lexer = arithmetic_lexer();
        let err = collect(&mut lexer, "a ? b").unwrap_err();
        assert!(matches!(err, LexError::Unrecognized { offset: 2, .. }));
    }

    #[test]
    fn rules_from_text() {
        let rules = parse_rules("# arithmetic\n- \\s+\nid [a-z]+\n\n+ \\+\n").unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules[0].token.is_none());
        assert_eq!(rules[2].token.as_deref(), Some("+"));
        assert!(parse_rules("lonely").is_err());
        assert!(matches!(
            RuleLexer::from_str("x (").unwrap_err(),
            LexError::InvalidRule { .. }
        ));
    }

    #[test]
    fn token_stream_ends_with_eof() {
        let mut symbols = Symbols::default();
        let id = symbols.intern("id");
        let mut lexer = arithmetic_lexer();
        let mut stream = TokenStream::tokenize(&mut lexer, "a + b", &symbols).unwrap();
        assert_eq!(stream.peek_symbol(), Some(id));
        stream.next();
        // `+' is not known to this symbol table.
        assert_eq!(stream.peek().map(|t| t.symbol), Some(None));
        stream.next();
        stream.next();
        assert_eq!(stream.peek_symbol(), Some(SymbolID::EOF));
        assert_eq!(stream.position(), 3);
    }
}
