//! EBNF expression trees.

use super::EbnfGrammar;
use crate::{
    first_sets::FirstSets,
    follow_sets::FollowSets,
    grammar::{Alternative, Grammar},
    lexer::TokenStream,
    symbol::{SymbolID, SymbolSet, Symbols},
    tree::{NodeID, Tree},
    util::display_fn,
};
use std::fmt;

/// The right-hand side of an EBNF production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Matches exactly one token.
    Terminal(SymbolID),
    /// Refers to the production of a non-terminal.
    Token(SymbolID),
    /// Every sub-expression in order.
    Chain(Vec<Expr>),
    /// The first sub-expression that matches.
    Choice(Vec<Expr>),
    Optional(Box<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
}

pub fn chain<I>(exprs: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    Expr::Chain(exprs.into_iter().collect())
}

pub fn choice<I>(exprs: I) -> Expr
where
    I: IntoIterator<Item = Expr>,
{
    Expr::Choice(exprs.into_iter().collect())
}

pub fn optional(expr: Expr) -> Expr {
    Expr::Optional(Box::new(expr))
}

pub fn zero_or_more(expr: Expr) -> Expr {
    Expr::ZeroOrMore(Box::new(expr))
}

pub fn one_or_more(expr: Expr) -> Expr {
    Expr::OneOrMore(Box::new(expr))
}

impl Expr {
    /// The FIRST set of this expression, given the FIRST sets of the
    /// symbols it refers to.
    pub fn first(&self, firsts: &FirstSets) -> SymbolSet {
        match self {
            Expr::Terminal(id) | Expr::Token(id) => firsts.get(*id).cloned().unwrap_or_default(),
            Expr::Chain(children) => first_of_chain(children, firsts),
            Expr::Choice(children) => {
                let mut set = SymbolSet::new();
                for child in children {
                    set.union_with(&child.first(firsts));
                }
                set
            }
            Expr::Optional(child) | Expr::ZeroOrMore(child) => {
                let mut set = child.first(firsts);
                set.insert(SymbolID::EPSILON);
                set
            }
            Expr::OneOrMore(child) => child.first(firsts),
        }
    }

    /// Propagate `follow`, the set of terminals that may come right after
    /// this expression, into the FOLLOW sets of the non-terminals it refers to.
    ///
    /// Returns whether any FOLLOW set changed.
    pub fn follow(&self, firsts: &FirstSets, follows: &mut FollowSets, follow: &SymbolSet) -> bool {
        match self {
            Expr::Terminal(..) => false,
            Expr::Token(id) => follows.extend(*id, follow),
            Expr::Chain(children) => {
                let mut changed = false;
                for (i, child) in children.iter().enumerate() {
                    let rest = first_of_chain(&children[i + 1..], firsts);
                    let mut inner = rest.without_epsilon();
                    // 残りが空になりうるなら親の FOLLOW も続く
                    if rest.contains(SymbolID::EPSILON) {
                        inner.union_with(follow);
                    }
                    changed |= child.follow(firsts, follows, &inner);
                }
                changed
            }
            Expr::Choice(children) => {
                let mut changed = false;
                for child in children {
                    changed |= child.follow(firsts, follows, follow);
                }
                changed
            }
            Expr::Optional(child) => child.follow(firsts, follows, follow),
            Expr::ZeroOrMore(child) | Expr::OneOrMore(child) => {
                let mut inner = follow.clone();
                inner.union_with(&child.first(firsts).without_epsilon());
                child.follow(firsts, follows, &inner)
            }
        }
    }

    /// Match this expression against the front of `input` by recursive descent.
    ///
    /// On success the created nodes are returned without a parent; the caller
    /// attaches them. On failure every node created here has been dropped
    /// again, but consumed tokens are not given back.
    pub fn parse(
        &self,
        input: &mut TokenStream,
        grammar: &EbnfGrammar,
        tree: &mut Tree,
    ) -> Option<Vec<NodeID>> {
        match self {
            Expr::Terminal(id) => {
                if input.peek_symbol() != Some(*id) {
                    return None;
                }
                let token = input.next()?;
                let node = tree.push(grammar.symbols(), *id, None);
                tree.set_text(node, token.text.clone());
                Some(vec![node])
            }

            Expr::Token(id) => {
                let mark = tree.len();
                let children = grammar.expression(*id)?.parse(input, grammar, tree);
                let Some(children) = children else {
                    tree.truncate(mark);
                    return None;
                };
                let node = tree.push(grammar.symbols(), *id, None);
                tree.adopt(node, children);
                Some(vec![node])
            }

            Expr::Chain(children) => {
                let mark = tree.len();
                let mut nodes = vec![];
                for child in children {
                    match child.parse(input, grammar, tree) {
                        Some(matched) => nodes.extend(matched),
                        None => {
                            tree.truncate(mark);
                            return None;
                        }
                    }
                }
                Some(nodes)
            }

            Expr::Choice(children) => {
                for child in children {
                    let mark = tree.len();
                    if let Some(nodes) = child.parse(input, grammar, tree) {
                        return Some(nodes);
                    }
                    tree.truncate(mark);
                }
                None
            }

            Expr::Optional(child) => Some(child.parse(input, grammar, tree).unwrap_or_default()),

            Expr::ZeroOrMore(child) => Some(parse_repeated(child, input, grammar, tree)),

            Expr::OneOrMore(child) => {
                let mut nodes = child.parse(input, grammar, tree)?;
                nodes.extend(parse_repeated(child, input, grammar, tree));
                Some(nodes)
            }
        }
    }

    /// Add the BNF productions equivalent to this expression to `grammar`,
    /// returning the symbol standing for it.
    ///
    /// Terminals and non-terminal references stand for themselves. Any other
    /// node becomes the non-terminal `prefix + Kind`.
    pub fn transform(&self, grammar: &mut Grammar, prefix: &str) -> SymbolID {
        match self {
            Expr::Terminal(id) | Expr::Token(id) => *id,

            Expr::Chain(children) => {
                let name = format!("{}Chain", prefix);
                let id = reserve(grammar, &name);
                let symbols: Vec<_> = children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| child.transform(grammar, &format!("{}{}", name, i)))
                    .collect();
                grammar.set_alternatives(id, vec![Alternative::new(symbols)]);
                id
            }

            Expr::Choice(children) => {
                let name = format!("{}Choice", prefix);
                let id = reserve(grammar, &name);
                let alternatives = children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        Alternative::new([child.transform(grammar, &format!("{}{}", name, i))])
                    })
                    .collect();
                grammar.set_alternatives(id, alternatives);
                id
            }

            Expr::Optional(child) => {
                let name = format!("{}Optional", prefix);
                let id = reserve(grammar, &name);
                let inner = child.transform(grammar, &name);
                grammar.set_alternatives(id, vec![Alternative::new([inner]), Alternative::epsilon()]);
                id
            }

            Expr::ZeroOrMore(child) => {
                let name = format!("{}ZeroOrMore", prefix);
                let id = reserve(grammar, &name);
                let inner = child.transform(grammar, &name);
                grammar.set_alternatives(
                    id,
                    vec![Alternative::new([inner, id]), Alternative::epsilon()],
                );
                id
            }

            Expr::OneOrMore(child) => {
                let name = format!("{}OneOrMore", prefix);
                let id = reserve(grammar, &name);
                let rest = reserve(grammar, &format!("{}Opt", name));
                let inner = child.transform(grammar, &name);
                grammar.set_alternatives(id, vec![Alternative::new([inner, rest])]);
                grammar.set_alternatives(
                    rest,
                    vec![Alternative::new([inner, rest]), Alternative::epsilon()],
                );
                id
            }
        }
    }

    /// Render the expression with `?`, `*` and `+` suffixes.
    pub fn display<'a>(&'a self, symbols: &'a Symbols) -> impl fmt::Display + 'a {
        display_fn(move |f| self.fmt_with(f, symbols, false))
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, symbols: &Symbols, nested: bool) -> fmt::Result {
        match self {
            Expr::Terminal(id) | Expr::Token(id) => write!(f, "{}", symbols.display(*id)),
            Expr::Chain(children) => fmt_list(f, symbols, children, " ", nested),
            Expr::Choice(children) => fmt_list(f, symbols, children, " | ", nested),
            Expr::Optional(child) => {
                child.fmt_with(f, symbols, true)?;
                f.write_str("?")
            }
            Expr::ZeroOrMore(child) => {
                child.fmt_with(f, symbols, true)?;
                f.write_str("*")
            }
            Expr::OneOrMore(child) => {
                child.fmt_with(f, symbols, true)?;
                f.write_str("+")
            }
        }
    }
}

fn fmt_list(
    f: &mut fmt::Formatter<'_>,
    symbols: &Symbols,
    children: &[Expr],
    separator: &str,
    nested: bool,
) -> fmt::Result {
    if children.is_empty() {
        return f.write_str("ε");
    }
    if nested {
        f.write_str("(")?;
    }
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        child.fmt_with(f, symbols, true)?;
    }
    if nested {
        f.write_str(")")?;
    }
    Ok(())
}

/// `FIRST(e1 e2 ... en)` of a sequence of expressions.
fn first_of_chain(exprs: &[Expr], firsts: &FirstSets) -> SymbolSet {
    let mut set = SymbolSet::new();
    for expr in exprs {
        let first = expr.first(firsts);
        set.union_with(&first);
        if !first.contains(SymbolID::EPSILON) {
            set.remove(SymbolID::EPSILON);
            return set;
        }
    }
    set.insert(SymbolID::EPSILON);
    set
}

fn parse_repeated(
    expr: &Expr,
    input: &mut TokenStream,
    grammar: &EbnfGrammar,
    tree: &mut Tree,
) -> Vec<NodeID> {
    let mut nodes = vec![];
    loop {
        let position = input.position();
        let mark = tree.len();
        match expr.parse(input, grammar, tree) {
            Some(matched) if input.position() > position => nodes.extend(matched),
            // 入力を消費しない繰り返しは打ち切る
            Some(..) => {
                tree.truncate(mark);
                break;
            }
            None => break,
        }
    }
    nodes
}

fn reserve(grammar: &mut Grammar, name: &str) -> SymbolID {
    let id = grammar.intern_nonterminal(name);
    grammar.set_alternatives(id, vec![]);
    id
}
