//! LL(1) parsing table construction for BNF and EBNF grammars.

pub mod driver;
pub mod ebnf;
pub mod first_sets;
pub mod follow_sets;
pub mod grammar;
pub mod left_factor;
pub mod lexer;
pub mod parse_table;
pub mod symbol;
pub mod tree;
pub mod types;
pub mod util;

pub use crate::{
    driver::{parse, parse_recursively, parse_strict, parse_with, ParseEvent, ParseResult},
    ebnf::{transform_from_ebnf, EbnfGrammar, Expr},
    first_sets::FirstSets,
    follow_sets::FollowSets,
    grammar::{Alternative, Grammar},
    left_factor::left_factorize,
    lexer::{Lexer, RuleLexer},
    parse_table::ParseTable,
    symbol::{SymbolID, SymbolSet},
    tree::{Node, NodeID, Tree},
};
