//! FIRST / FOLLOW sets and the LL(1) parse table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{Atom, EPSILON, Grammar};

pub type AtomSet = BTreeSet<usize>;

/// FIRST set of every atom, indexed by atom.
pub fn first_sets(grammar: &Grammar) -> Vec<AtomSet> {
    let mut first: Vec<AtomSet> = grammar
        .atoms()
        .iter()
        .enumerate()
        .map(|(index, atom)| match atom {
            Atom::Symbol(_) => AtomSet::new(),
            _ => AtomSet::from([index]),
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (symbol, rules) in grammar.rules() {
            for rule in rules {
                let found = first_of(&first, rule);
                let before = first[symbol].len();
                first[symbol].extend(found);
                changed |= first[symbol].len() != before;
            }
        }
    }
    first
}

/// FIRST of an atom sequence; contains epsilon when every atom can vanish.
pub fn first_of(first: &[AtomSet], sequence: &[usize]) -> AtomSet {
    let mut out = AtomSet::new();
    for &atom in sequence {
        let set = &first[atom];
        out.extend(set.iter().copied().filter(|&a| a != EPSILON));
        if !set.contains(&EPSILON) {
            return out;
        }
    }
    out.insert(EPSILON);
    out
}

/// FOLLOW set of every symbol that has rules.
pub fn follow_sets(grammar: &Grammar, first: &[AtomSet]) -> BTreeMap<usize, AtomSet> {
    let mut follow: BTreeMap<usize, AtomSet> = BTreeMap::new();
    follow.entry(grammar.start()).or_default().insert(grammar.end());

    let mut changed = true;
    while changed {
        changed = false;
        for (symbol, rules) in grammar.rules() {
            for rule in rules {
                for (at, &atom) in rule.iter().enumerate() {
                    if !matches!(grammar.atom(atom), Atom::Symbol(_)) {
                        continue;
                    }
                    let suffix = first_of(first, &rule[at + 1..]);
                    let mut gained: AtomSet =
                        suffix.iter().copied().filter(|&a| a != EPSILON).collect();
                    if suffix.contains(&EPSILON) {
                        if let Some(outer) = follow.get(&symbol) {
                            gained.extend(outer.iter().copied());
                        }
                    }
                    let entry = follow.entry(atom).or_default();
                    let before = entry.len();
                    entry.extend(gained);
                    changed |= entry.len() != before;
                }
            }
        }
    }
    follow
}

/// `(symbol, lookahead) -> production ordinal`.
///
/// Conflicting entries are not reported: the later production wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseTable {
    entries: HashMap<(usize, usize), usize>,
}

impl ParseTable {
    pub fn build(grammar: &Grammar) -> Self {
        let first = first_sets(grammar);
        let follow = follow_sets(grammar, &first);

        let mut entries = HashMap::new();
        for (symbol, rules) in grammar.rules() {
            for (ordinal, rule) in rules.iter().enumerate() {
                let set = first_of(&first, rule);
                for &lookahead in set.iter().filter(|&&a| a != EPSILON) {
                    entries.insert((symbol, lookahead), ordinal);
                }
                if set.contains(&EPSILON) {
                    for &lookahead in follow.get(&symbol).into_iter().flatten() {
                        entries.insert((symbol, lookahead), ordinal);
                    }
                }
            }
        }
        Self { entries }
    }

    /// Production to expand `symbol` with when `lookahead` is next.
    pub fn production<'g>(
        &self,
        grammar: &'g Grammar,
        symbol: usize,
        lookahead: usize,
    ) -> Option<&'g [usize]> {
        let ordinal = *self.entries.get(&(symbol, lookahead))?;
        grammar.productions(symbol).get(ordinal).map(Vec::as_slice)
    }

    /// Lookaheads with an entry for `symbol`, ascending.
    pub fn expected(&self, symbol: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .entries
            .keys()
            .filter(|(s, _)| *s == symbol)
            .map(|(_, lookahead)| *lookahead)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Atoms: 0 ε, 1 a, 2 b, 3 START, 4 List, 5 $
    //
    //   START -> List
    //   List  -> a List | ε
    fn list_grammar() -> Grammar {
        let mut productions = BTreeMap::new();
        productions.insert(3, vec![vec![4]]);
        productions.insert(4, vec![vec![1, 4], vec![EPSILON]]);
        Grammar::new(
            vec!["a".into(), "b".into()],
            vec!["START".into(), "List".into(), "$".into()],
            productions,
        )
        .unwrap()
    }

    #[test]
    fn test_first_sets() {
        let grammar = list_grammar();
        let first = first_sets(&grammar);
        assert_eq!(first[1], AtomSet::from([1]));
        assert_eq!(first[4], AtomSet::from([1, EPSILON]));
        assert_eq!(first[3], AtomSet::from([1, EPSILON]));
        assert_eq!(first_of(&first, &[4, 2]), AtomSet::from([1, 2]));
        assert_eq!(first_of(&first, &[]), AtomSet::from([EPSILON]));
    }

    #[test]
    fn test_follow_sets() {
        let grammar = list_grammar();
        let first = first_sets(&grammar);
        let follow = follow_sets(&grammar, &first);
        assert_eq!(follow[&3], AtomSet::from([5]));
        assert_eq!(follow[&4], AtomSet::from([5]));
    }

    #[test]
    fn test_table_uses_follow_for_epsilon() {
        let grammar = list_grammar();
        let table = ParseTable::build(&grammar);
        assert_eq!(table.production(&grammar, 4, 1), Some(&[1usize, 4][..]));
        assert_eq!(table.production(&grammar, 4, 5), Some(&[EPSILON][..]));
        assert_eq!(table.production(&grammar, 4, 2), None);
        assert_eq!(table.expected(3), vec![1, 5]);
    }
}
