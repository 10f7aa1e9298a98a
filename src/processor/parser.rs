//! Table-driven LL(1) parser.
//!
//! Produces a flat derivation stream instead of a tree: every symbol
//! expansion is bracketed by `Enter` / `Exit` and matched terminals appear as
//! `Token` in between. The tree builder folds the stream afterwards.

use crate::error::{Error, Result};
use crate::grammar::{Atom, Grammar, ParseTable};
use crate::model::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    Enter(String),
    Token(Token),
    Exit(String),
}

enum Frame {
    Atom(usize),
    Exit(usize),
}

pub fn derive(grammar: &Grammar, table: &ParseTable, tokens: &[Token]) -> Result<Vec<Derivation>> {
    let mut out = Vec::new();
    let mut stack = vec![Frame::Atom(grammar.end()), Frame::Atom(grammar.start())];
    let mut at = 0;
    let end_offset = tokens.last().map(|t| t.offset + t.lexeme.len()).unwrap_or(0);

    while let Some(frame) = stack.pop() {
        let atom = match frame {
            Frame::Exit(symbol) => {
                out.push(Derivation::Exit(grammar.atom_name(symbol).to_string()));
                continue;
            }
            Frame::Atom(atom) => atom,
        };
        let next = tokens.get(at);

        match grammar.atom(atom) {
            Atom::Epsilon => {}
            Atom::Symbol(name) => {
                out.push(Derivation::Enter(name.clone()));
                let lookahead = match next {
                    Some(token) => grammar.terminal_atom(&token.kind),
                    None => Some(grammar.end()),
                };
                let production = lookahead.and_then(|la| table.production(grammar, atom, la));
                let Some(production) = production else {
                    let expected = table
                        .expected(atom)
                        .into_iter()
                        .map(|la| grammar.atom_name(la).to_string())
                        .collect::<Vec<_>>()
                        .join(" | ");
                    return Err(syntax_error(next, end_offset, expected));
                };
                stack.push(Frame::Exit(atom));
                stack.extend(production.iter().rev().map(|&a| Frame::Atom(a)));
            }
            Atom::Terminal(name) => match next {
                Some(token) if token.kind == *name => {
                    out.push(Derivation::Token(token.clone()));
                    at += 1;
                }
                _ => return Err(syntax_error(next, end_offset, name.clone())),
            },
            Atom::End => {
                if next.is_some() {
                    return Err(syntax_error(next, end_offset, "end of input".into()));
                }
            }
        }
    }
    Ok(out)
}

fn syntax_error(found: Option<&Token>, end_offset: usize, expected: String) -> Error {
    match found {
        Some(token) => Error::Syntax {
            offset: token.offset,
            expected,
            found: format!("{} `{}`", token.kind, token.lexeme.escape_debug()),
        },
        None => Error::Syntax {
            offset: end_offset,
            expected,
            found: "end of input".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{EPSILON, Tables};
    use crate::processor::lexer::tokenize;
    use std::collections::BTreeMap;

    // Atoms: 0 ε, 1 a, 2 b, 3 START, 4 List, 5 $
    fn list_grammar() -> Grammar {
        let mut productions = BTreeMap::new();
        productions.insert(3, vec![vec![4, 2]]);
        productions.insert(4, vec![vec![1, 4], vec![EPSILON]]);
        Grammar::new(
            vec!["a".into(), "b".into()],
            vec!["START".into(), "List".into(), "$".into()],
            productions,
        )
        .unwrap()
    }

    fn tok(kind: &str, offset: usize) -> Token {
        Token::new(kind, kind, offset)
    }

    #[test]
    fn test_derivation_stream() {
        let grammar = list_grammar();
        let table = ParseTable::build(&grammar);
        let stream = derive(&grammar, &table, &[tok("a", 0), tok("b", 1)]).unwrap();

        let enter = |s: &str| Derivation::Enter(s.into());
        let exit = |s: &str| Derivation::Exit(s.into());
        assert_eq!(
            stream,
            vec![
                enter("START"),
                enter("List"),
                Derivation::Token(tok("a", 0)),
                enter("List"),
                exit("List"),
                exit("List"),
                Derivation::Token(tok("b", 1)),
                exit("START"),
            ]
        );
    }

    #[test]
    fn test_syntax_errors() {
        let grammar = list_grammar();
        let table = ParseTable::build(&grammar);
        let test_cases = vec![
            // input ends inside the list
            (vec![tok("a", 0)], 1, "a | b", "end of input"),
            // token after the end
            (vec![tok("b", 0), tok("b", 1)], 1, "end of input", "b `b`"),
            // unknown token kind
            (vec![tok("c", 0)], 0, "a | b", "c `c`"),
        ];
        for (tokens, offset, expected, found) in test_cases {
            let err = derive(&grammar, &table, &tokens).unwrap_err();
            assert_eq!(
                err,
                Error::Syntax {
                    offset,
                    expected: expected.into(),
                    found: found.into()
                }
            );
        }
    }

    #[test]
    fn test_moon_line_derives() {
        let tables = Tables::moon().unwrap();
        let table = ParseTable::build(&tables.grammar);
        let tokens = tokenize("loop add r1, r2, r3\n", &tables.automaton).unwrap();
        let stream = derive(&tables.grammar, &table, &tokens).unwrap();

        let matched: Vec<&str> = stream
            .iter()
            .filter_map(|d| match d {
                Derivation::Token(t) => Some(t.lexeme.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(matched, vec!["loop", "add", "r1", ",", "r2", ",", "r3", "\n"]);
        assert!(stream.contains(&Derivation::Exit("InstrRRR_s1".into())));
        assert_eq!(stream.last(), Some(&Derivation::Exit("START".into())));
    }

    #[test]
    fn test_moon_rejects_missing_operand() {
        let tables = Tables::moon().unwrap();
        let table = ParseTable::build(&tables.grammar);
        let tokens = tokenize("add r1, r2\n", &tables.automaton).unwrap();
        let err = derive(&tables.grammar, &table, &tokens).unwrap_err();
        assert!(matches!(err, Error::Syntax { offset: 10, .. }), "{err:?}");
    }
}
