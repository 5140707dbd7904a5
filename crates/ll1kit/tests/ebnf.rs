use ll1kit::{
    ebnf::{chain, choice, one_or_more, optional, zero_or_more},
    lexer::LexRule,
    parse, parse_recursively, parse_with,
    parse_table::ParseTable,
    transform_from_ebnf, EbnfGrammar, Expr, FirstSets, FollowSets, Node, ParseEvent, RuleLexer,
};

/// A small subset of SPARQL `SELECT` queries.
fn query_grammar() -> EbnfGrammar {
    EbnfGrammar::define(|g| {
        let select = g.terminal("SELECT")?;
        let distinct = g.terminal("DISTINCT")?;
        let where_ = g.terminal("WHERE")?;
        let star = g.terminal("*")?;
        let dot = g.terminal(".")?;
        let lbrace = g.terminal("{")?;
        let rbrace = g.terminal("}")?;
        let var = g.terminal("VAR")?;
        let iri = g.terminal("IRI")?;

        let query = g.nonterminal("Query")?;
        let projection = g.nonterminal("Projection")?;
        let group = g.nonterminal("GroupGraphPattern")?;
        let triples = g.nonterminal("TriplesSameSubject")?;
        let term = g.nonterminal("VarOrIri")?;

        g.rule(
            query,
            chain([
                Expr::Terminal(select),
                Expr::Token(projection),
                optional(Expr::Terminal(where_)),
                Expr::Token(group),
            ]),
        )?;
        g.rule(
            projection,
            chain([
                optional(Expr::Terminal(distinct)),
                choice([one_or_more(Expr::Terminal(var)), Expr::Terminal(star)]),
            ]),
        )?;
        g.rule(
            group,
            chain([
                Expr::Terminal(lbrace),
                zero_or_more(chain([Expr::Token(triples), optional(Expr::Terminal(dot))])),
                Expr::Terminal(rbrace),
            ]),
        )?;
        g.rule(
            triples,
            chain([Expr::Token(term), Expr::Token(term), Expr::Token(term)]),
        )?;
        g.rule(term, choice([Expr::Terminal(var), Expr::Terminal(iri)]))?;
        Ok(())
    })
    .unwrap()
}

fn query_lexer() -> RuleLexer {
    RuleLexer::new([
        LexRule::skip(r"\s+"),
        LexRule::token("SELECT", "SELECT"),
        LexRule::token("DISTINCT", "DISTINCT"),
        LexRule::token("WHERE", "WHERE"),
        LexRule::token(r"\*", "*"),
        LexRule::token(r"\.", "."),
        LexRule::token(r"\{", "{"),
        LexRule::token(r"\}", "}"),
        LexRule::token(r"\?[A-Za-z_][A-Za-z0-9_]*", "VAR"),
        LexRule::token(r"<[^>]*>", "IRI"),
    ])
    .unwrap()
}

const QUERY: &str = "SELECT DISTINCT ?s ?o WHERE { ?s <p> ?o . ?o <q> <r> }";

#[test]
fn table_driven_parse_of_transformed_grammar() {
    let ebnf = query_grammar();
    let grammar = transform_from_ebnf(&ebnf);
    let firsts = FirstSets::compute(&grammar);
    let follows = FollowSets::compute(&grammar, &firsts);
    let table = ParseTable::build(&grammar, &firsts, &follows);
    assert!(table.is_ll1(), "{}", table.display(&grammar));

    let result = parse(QUERY, &table, &grammar, &mut query_lexer());
    assert!(result.is_success(), "{:#?}", result.log);

    let root = result.tree.root();
    assert_eq!(root.name(), "Query");
    let triples = root.descendants_of_type(&["TriplesSameSubject"]);
    assert_eq!(triples.len(), 2);
    assert_eq!(triples[1].get_text(" "), "?o <q> <r>");
    let vars = triples[0].descendants_of_type(&["VAR"]);
    assert_eq!(
        vars[0].ancestor_of_type("GroupGraphPattern").map(|n| n.name()),
        Some("GroupGraphPattern")
    );
}

#[test]
fn suggestions_after_incomplete_query() {
    let ebnf = query_grammar();
    let grammar = transform_from_ebnf(&ebnf);
    let firsts = FirstSets::compute(&grammar);
    let follows = FollowSets::compute(&grammar, &firsts);
    let table = ParseTable::build(&grammar, &firsts, &follows);

    let result = parse("SELECT ?s WHERE { ?s", &table, &grammar, &mut query_lexer());
    assert!(!result.is_success());
    assert_eq!(result.failure.as_ref().map(|f| f.lookahead.as_str()), Some("EOF"));
    assert_eq!(result.expected.names(grammar.symbols()), ["VAR", "IRI"]);

    let result = parse("SELECT", &table, &grammar, &mut query_lexer());
    let mut expected = result.expected.names(grammar.symbols());
    expected.sort();
    assert_eq!(expected, ["*", "DISTINCT", "VAR"]);
}

#[test]
fn visitor_collects_variables() {
    let ebnf = query_grammar();
    let grammar = transform_from_ebnf(&ebnf);
    let firsts = FirstSets::compute(&grammar);
    let follows = FollowSets::compute(&grammar, &firsts);
    let table = ParseTable::build(&grammar, &firsts, &follows);
    let var = grammar.symbol("VAR").unwrap();

    let mut seen = vec![];
    let result = parse_with(QUERY, &table, &grammar, &mut query_lexer(), |event, tree| {
        if let ParseEvent::Shift { terminal, node } = event {
            if terminal == var {
                seen.extend(tree.node(node).text().map(str::to_owned));
            }
        }
    });
    assert!(result.is_success());
    assert_eq!(seen, ["?s", "?o", "?s", "?o", "?o"]);
}

#[test]
fn recursive_and_table_driven_parses_agree() {
    let ebnf = query_grammar();
    let tree = parse_recursively(QUERY, &mut query_lexer(), &ebnf).unwrap();

    let grammar = transform_from_ebnf(&ebnf);
    let firsts = FirstSets::compute(&grammar);
    let follows = FollowSets::compute(&grammar, &firsts);
    let table = ParseTable::build(&grammar, &firsts, &follows);
    let result = parse(QUERY, &table, &grammar, &mut query_lexer());

    assert_eq!(
        tree.root().get_text(" "),
        result.tree.root().get_text(" ")
    );
    fn names(root: Node<'_>) -> Vec<String> {
        root.descendants_of_type(&["TriplesSameSubject", "VarOrIri"])
            .iter()
            .map(|n| n.get_text(" "))
            .collect()
    }
    assert_eq!(names(tree.root()), names(result.tree.root()));
}

#[test]
fn ebnf_first_and_table() {
    let ebnf = query_grammar();
    let firsts = FirstSets::compute_ebnf(&ebnf);
    let follows = FollowSets::compute_ebnf(&ebnf, &firsts);
    let table = ParseTable::build_ebnf(&ebnf, &firsts, &follows);

    let query = ebnf.symbol("Query").unwrap();
    let projection = ebnf.symbol("Projection").unwrap();
    let triples = ebnf.symbol("TriplesSameSubject").unwrap();
    assert_eq!(
        firsts.get(query).unwrap().names(ebnf.symbols()),
        ["SELECT"]
    );
    assert_eq!(
        firsts.get(projection).unwrap().names(ebnf.symbols()),
        ["DISTINCT", "*", "VAR"]
    );
    assert_eq!(
        follows.get(triples).unwrap().names(ebnf.symbols()),
        [".", "}", "VAR", "IRI"]
    );
    assert!(table.is_ll1());
    assert_eq!(table.lookaheads(projection).len(), 3);
}
