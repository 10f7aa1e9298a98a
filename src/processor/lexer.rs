//! Automaton-driven tokenizer.
//!
//! From each token start the automaton is walked from node 0, remembering the
//! last accepting node seen. The walk stops on a dead transition, at end of
//! input, or as soon as a lazy node is reached; the longest accepted prefix
//! becomes the token and scanning resumes right after it.
//
//  The `Lexer` iterator yields skipped lexemes (blanks, comments) too, so
//  joining every lexeme it produces gives back the source text.

use crate::error::{Error, Result};
use crate::grammar::Automaton;
use crate::model::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub token: Token,
    /// Matched by a skip node; never reaches the parser.
    pub skip: bool,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    automaton: &'a Automaton,
    at: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, automaton: &'a Automaton) -> Self {
        Self {
            source,
            automaton,
            at: 0,
        }
    }

    /// Longest accepted match from `start`: `(accepting node, end offset)`.
    ///
    /// The automaton sees one symbol per character. Edge ranges are single
    /// bytes, so a character above U+00FF has no transition.
    fn longest_match(&self, start: usize) -> Option<(usize, usize)> {
        let mut node = 0;
        let mut last = None;
        let mut chars = self.source[start..].char_indices();
        loop {
            let pos = chars.offset() + start;
            if let Some(state) = self.automaton.node(node) {
                if state.is_accepting() && pos > start {
                    last = Some((node, pos));
                    if state.lazy {
                        break;
                    }
                }
            }
            let Some((_, ch)) = chars.next() else { break };
            let Ok(symbol) = u8::try_from(u32::from(ch)) else { break };
            match self.automaton.next(node, symbol) {
                Some(next) => node = next,
                None => break,
            }
        }
        last
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Lexeme>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.at;
        if start >= self.source.len() {
            return None;
        }

        let Some((node, end)) = self.longest_match(start) else {
            self.at = self.source.len();
            let found = self.source[start..].chars().next().map(String::from).unwrap_or_default();
            return Some(Err(Error::Lexical {
                offset: start,
                found,
            }));
        };

        self.at = end;
        let state = self.automaton.node(node).copied().unwrap_or_default();
        let kind = self.automaton.terminal_name(node).unwrap_or_default();
        Some(Ok(Lexeme {
            token: Token::new(&self.source[start..end], kind, start),
            skip: state.skip,
        }))
    }
}

/// Every non-skipped token of `source`, or the first lexical error.
pub fn tokenize(source: &str, automaton: &Automaton) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for lexeme in Lexer::new(source, automaton) {
        let lexeme = lexeme?;
        if !lexeme.skip {
            tokens.push(lexeme.token);
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Automaton, AutomatonNode, Tables};

    fn kinds(source: &str) -> Vec<(String, String)> {
        let tables = Tables::moon().unwrap();
        tokenize(source, &tables.automaton)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, l)| (k.to_string(), l.to_string())).collect()
    }

    #[test]
    fn test_tokenisation() {
        let test_cases = vec![
            (
                "addi r1, r0, 5\n",
                pairs(&[
                    ("oprrc", "addi"),
                    ("reg", "r1"),
                    ("comma", ","),
                    ("reg", "r0"),
                    ("comma", ","),
                    ("num", "5"),
                    ("nl", "\n"),
                ]),
            ),
            (
                "loop lw r2, -4(r14) % load\n",
                pairs(&[
                    ("id", "loop"),
                    ("opro", "lw"),
                    ("reg", "r2"),
                    ("comma", ","),
                    ("num", "-4"),
                    ("lp", "("),
                    ("reg", "r14"),
                    ("rp", ")"),
                    ("nl", "\n"),
                ]),
            ),
            (
                "msg db \"a, b\", 0",
                pairs(&[("id", "msg"), ("opl", "db"), ("str", "\"a, b\""), ("comma", ","), ("num", "0")]),
            ),
        ];

        for (src, expected) in test_cases {
            assert_eq!(kinds(src), expected, "{src:?}");
        }
    }

    #[test]
    fn test_offsets_are_byte_positions() {
        let tables = Tables::moon().unwrap();
        let tokens = tokenize("  j end", &tables.automaton).unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![2, 4]);
    }

    #[test]
    fn test_lexemes_rebuild_source() {
        let tables = Tables::moon().unwrap();
        let source = "start\taddi r1,r0,1 % one\n  hlt\n";
        let joined: String = Lexer::new(source, &tables.automaton)
            .map(|l| l.unwrap().token.lexeme)
            .collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_lexical_error_reports_offset() {
        let tables = Tables::moon().unwrap();
        let test_cases = vec![("hlt #", 4, "#"), ("dw \"open\n", 3, "\""), ("-", 0, "-")];
        for (src, offset, found) in test_cases {
            let err = tokenize(src, &tables.automaton).unwrap_err();
            assert_eq!(
                err,
                Error::Lexical {
                    offset,
                    found: found.into()
                },
                "{src:?}"
            );
        }
    }

    fn latin_words() -> Automaton {
        let nodes = vec![
            AutomatonNode::default(),
            AutomatonNode {
                terminal: Some(0),
                ..Default::default()
            },
            AutomatonNode {
                terminal: Some(1),
                skip: true,
                ..Default::default()
            },
        ];
        let mut automaton = Automaton::new(nodes, vec!["word".into(), "ws".into()]);
        for node in [0, 1] {
            automaton.add_edge(node, 1, b'a', b'z');
            automaton.add_edge(node, 1, 0x80, 0xFF);
        }
        automaton.add_edge(0, 2, b' ', b' ');
        automaton
    }

    #[test]
    fn test_non_ascii_characters() {
        let automaton = latin_words();
        let source = "café ça";
        let joined: String = Lexer::new(source, &automaton)
            .map(|l| l.unwrap().token.lexeme)
            .collect();
        assert_eq!(joined, source);

        let tokens = tokenize(source, &automaton).unwrap();
        let words: Vec<(&str, usize)> = tokens.iter().map(|t| (t.lexeme.as_str(), t.offset)).collect();
        assert_eq!(words, vec![("café", 0), ("ça", 6)]);

        let test_cases = vec![("a€", 1, "€"), ("€", 0, "€"), ("é€", 2, "€")];
        for (src, offset, found) in test_cases {
            let err = tokenize(src, &automaton).unwrap_err();
            assert_eq!(
                err,
                Error::Lexical {
                    offset,
                    found: found.into()
                },
                "{src:?}"
            );
        }
    }

    #[test]
    fn test_edge_on_utf8_lead_byte_does_not_split_characters() {
        let nodes = vec![
            AutomatonNode::default(),
            AutomatonNode {
                terminal: Some(0),
                ..Default::default()
            },
        ];
        let mut automaton = Automaton::new(nodes, vec!["lead".into()]);
        automaton.add_edge(0, 1, 0xC3, 0xC3);
        let err = tokenize("é", &automaton).unwrap_err();
        assert_eq!(
            err,
            Error::Lexical {
                offset: 0,
                found: "é".into()
            }
        );
    }
}
