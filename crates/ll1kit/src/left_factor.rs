//! Left-factorization of BNF grammars.

use crate::{
    grammar::{Alternative, Grammar},
    symbol::SymbolID,
    types::Worklist,
};

/// Remove the common prefixes among the alternatives of every production.
///
/// Each group of alternatives sharing a first symbol is replaced with
/// `prefix <A>_LF<k>`, where `k` is the position of the group's first member
/// and the new non-terminal derives the remaining suffixes. Rewriting is
/// repeated until no production changes, so applying this function to its
/// own output is a no-op. Returns whether the grammar was modified.
#[tracing::instrument(skip_all)]
pub fn left_factorize(grammar: &mut Grammar) -> bool {
    let mut changed = false;
    let mut worklist: Worklist<SymbolID> = grammar.nonterminals().collect();
    while let Some(nonterminal) = worklist.pop() {
        if let Some(factored) = factor_once(grammar, nonterminal) {
            changed = true;
            // 新しい選択肢同士が再び衝突しうるので両方を再検査する
            worklist.extend([nonterminal, factored]);
        }
    }
    changed
}

/// Factor out the first group of alternatives sharing a head symbol, if any.
fn factor_once(grammar: &mut Grammar, nonterminal: SymbolID) -> Option<SymbolID> {
    let alternatives = grammar.alternatives(nonterminal)?.to_vec();

    let (k, group) = alternatives.iter().enumerate().find_map(|(k, alt)| {
        let head = alt.first()?;
        let partners: Vec<usize> = (k + 1..alternatives.len())
            .filter(|j| alternatives[*j].first() == Some(head))
            .collect();
        if partners.is_empty() {
            return None;
        }
        Some((k, [k].into_iter().chain(partners).collect::<Vec<_>>()))
    })?;

    let prefix_len = common_prefix_len(group.iter().map(|j| alternatives[*j].symbols()));
    let prefix = &alternatives[k].symbols()[..prefix_len];

    let name = format!("{}_LF{}", grammar.name(nonterminal), k);
    let factored = grammar.fresh_nonterminal(&name);
    let suffixes = group
        .iter()
        .map(|j| Alternative::new(alternatives[*j].symbols()[prefix_len..].iter().copied()))
        .collect();
    grammar.set_alternatives(factored, suffixes);

    let mut rewritten = Vec::with_capacity(alternatives.len() - group.len() + 1);
    for (j, alt) in alternatives.iter().enumerate() {
        if j == k {
            rewritten.push(Alternative::new(
                prefix.iter().copied().chain(Some(factored)),
            ));
        } else if !group.contains(&j) {
            rewritten.push(alt.clone());
        }
    }
    grammar.set_alternatives(nonterminal, rewritten);

    tracing::debug!(
        "factored {} -> {}",
        grammar.display_production(nonterminal),
        grammar.display_production(factored)
    );

    Some(factored)
}

fn common_prefix_len<'a>(mut sequences: impl Iterator<Item = &'a [SymbolID]> + Clone) -> usize {
    let Some(first) = sequences.next() else {
        return 0;
    };
    let mut len = 0;
    while len < first.len() && sequences.clone().all(|s| s.get(len) == Some(&first[len])) {
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(grammar: &Grammar) -> Vec<String> {
        let mut rules: Vec<_> = grammar
            .nonterminals()
            .map(|id| grammar.display_production(id).to_string())
            .collect();
        rules.sort();
        rules
    }

    #[test]
    fn factorize_common_prefixes() {
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let mut grammar =
            Grammar::from_str("A : a b c | a c b | B c ;\nB : b b a | b b | b c | ;").unwrap();
        assert!(left_factorize(&mut grammar));
        assert_eq!(
            rules(&grammar),
            [
                "A := a A_LF0 | B c",
                "A_LF0 := b c | c b",
                "B := b B_LF0 | ε",
                "B_LF0 := b B_LF0_LF0 | c",
                "B_LF0_LF0 := a | ε",
            ]
        );
    }

    #[test]
    fn factorize_is_idempotent() {
        let mut grammar =
            Grammar::from_str("A : a b c | a c b | B c ;\nB : b b a | b b | b c | ;").unwrap();
        left_factorize(&mut grammar);
        let once = grammar.to_string();
        assert!(!left_factorize(&mut grammar));
        assert_eq!(grammar.to_string(), once);
    }

    #[test]
    fn longest_common_prefix_is_taken() {
        let mut grammar = Grammar::from_str("S : x y z | x y | w ;").unwrap();
        left_factorize(&mut grammar);
        assert_eq!(rules(&grammar), ["S := x y S_LF0 | w", "S_LF0 := z | ε"]);
    }

    #[test]
    fn group_position_names_the_new_symbol() {
        let mut grammar = Grammar::from_str("S : w | x y | x z ;").unwrap();
        left_factorize(&mut grammar);
        assert_eq!(rules(&grammar), ["S := w | x S_LF1", "S_LF1 := y | z"]);
    }

    #[test]
    fn untouched_grammar() {
        let mut grammar = Grammar::from_str("S : a S | b ;").unwrap();
        assert!(!left_factorize(&mut grammar));
    }
}
