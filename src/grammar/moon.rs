//! Built-in tables for Moon assembly.
//!
//! The automaton is a keyword trie over the mnemonics and register names,
//! falling back to a generic identifier node, plus hand-wired nodes for
//! numbers, strings, punctuation, blanks and `%` comments.
//!
//! The grammar uses the helper-symbol conventions the tree builder folds:
//! `X_r` flushes the tokens it matched as leaves and `X_sN` files everything
//! collected so far under slot `N` of the enclosing `X`.

use std::collections::BTreeMap;

use super::{ArtifactError, Automaton, AutomatonNode, END, EPSILON, Grammar, START, Tables};

pub const TERMINALS: &[&str] = &[
    "id", "reg", "num", "str", "comma", "lp", "rp", "nl", "opz", "opr", "oprr", "oprrr", "oprrc",
    "oprc", "opro", "opor", "opc", "opl", "ws", "comment",
];

/// Mnemonic classes; the class decides the operand shape.
const MNEMONICS: &[(&str, &[&str])] = &[
    ("opz", &["entry", "align", "nop", "hlt"]),
    ("opr", &["jr", "gtc", "ptc", "getc", "putc"]),
    ("oprr", &["not", "jlr"]),
    (
        "oprrr",
        &[
            "add", "sub", "mul", "div", "mod", "and", "or", "ceq", "cne", "clt", "cle", "cgt", "cge",
        ],
    ),
    (
        "oprrc",
        &[
            "addi", "subi", "muli", "divi", "modi", "andi", "ori", "ceqi", "cnei", "clti", "clei",
            "cgti", "cgei", "sl", "sr",
        ],
    ),
    ("oprc", &["bz", "bnz", "jl"]),
    ("opro", &["lw", "lb"]),
    ("opor", &["sw", "sb"]),
    ("opc", &["j", "org", "res"]),
    ("opl", &["dw", "db"]),
];

/// `(shape suffix, mnemonic class, operand atoms between the slots)`.
const INSTRUCTIONS: &[(&str, &str, &str)] = &[
    ("Z", "opz", ""),
    ("R", "opr", "Register"),
    ("RR", "oprr", "Register comma Register"),
    ("RRR", "oprrr", "Register comma Register comma Register"),
    ("RRC", "oprrc", "Register comma Register comma Const"),
    ("RC", "oprc", "Register comma Const"),
    ("RO", "opro", "Register comma Const lp Register rp"),
    ("OR", "opor", "Const lp Register rp comma Register"),
    ("C", "opc", "Const"),
    ("L", "opl", "Datum Data"),
];

/// Rules whose whole match is a single leaf: `(rule, terminal alternatives)`.
const LEAVES: &[(&str, &[&str])] = &[
    ("Label", &["id"]),
    ("Register", &["reg", "id"]),
    ("Number", &["num"]),
    ("Reference", &["id"]),
    ("Text", &["str"]),
];

pub fn tables() -> Result<Tables, ArtifactError> {
    Ok(Tables {
        automaton: automaton(),
        grammar: grammar()?,
    })
}

// ── Automaton ────────────────────────────────────────────────────────

fn terminal(name: &str) -> Option<usize> {
    TERMINALS.iter().position(|t| *t == name)
}

fn accepting(name: &str, lazy: bool, skip: bool) -> AutomatonNode {
    AutomatonNode {
        terminal: terminal(name),
        lazy,
        skip,
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Collapses the bytes matching `keep` into inclusive ranges.
fn ranges(keep: impl Fn(u8) -> bool) -> Vec<(u8, u8)> {
    let mut out: Vec<(u8, u8)> = Vec::new();
    for b in 0..=u8::MAX {
        if !keep(b) {
            continue;
        }
        match out.last_mut() {
            Some((_, hi)) if *hi as u16 + 1 == b as u16 => *hi = b,
            _ => out.push((b, b)),
        }
    }
    out
}

fn connect(automaton: &mut Automaton, from: usize, to: usize, keep: impl Fn(u8) -> bool) {
    for (lo, hi) in ranges(keep) {
        automaton.add_edge(from, to, lo, hi);
    }
}

fn automaton() -> Automaton {
    let terminals = TERMINALS.iter().map(|t| t.to_string()).collect();
    let mut dfa = Automaton::new(vec![AutomatonNode::default()], terminals);
    let root = 0;

    // keyword trie: (node, byte) -> child
    let mut trie: BTreeMap<(usize, u8), usize> = BTreeMap::new();
    let registers: Vec<String> = (0..crate::config::REGISTER_COUNT).map(|i| format!("r{i}")).collect();
    let mut keywords: Vec<(&str, &str)> = MNEMONICS
        .iter()
        .flat_map(|(class, words)| words.iter().map(move |w| (*w, *class)))
        .collect();
    keywords.extend(registers.iter().map(|r| (r.as_str(), "reg")));
    for (word, class) in keywords {
        let mut node = root;
        for &b in word.as_bytes() {
            node = match trie.get(&(node, b)) {
                Some(&child) => child,
                None => {
                    let child = dfa.add_node(accepting("id", false, false));
                    dfa.add_edge(node, child, b, b);
                    trie.insert((node, b), child);
                    child
                }
            };
        }
        dfa.set_node(node, accepting(class, false, false));
    }

    let ident = dfa.add_node(accepting("id", false, false));
    connect(&mut dfa, ident, ident, is_ident_continue);
    connect(&mut dfa, root, ident, |b| is_ident_start(b) && !trie.contains_key(&(root, b)));
    let trie_nodes: Vec<usize> = {
        let mut nodes: Vec<usize> = trie.values().copied().collect();
        nodes.sort_unstable();
        nodes
    };
    for node in trie_nodes {
        connect(&mut dfa, node, ident, |b| {
            is_ident_continue(b) && !trie.contains_key(&(node, b))
        });
    }

    // -?[0-9]+
    let minus = dfa.add_node(AutomatonNode::default());
    let number = dfa.add_node(accepting("num", false, false));
    dfa.add_edge(root, minus, b'-', b'-');
    for from in [root, minus, number] {
        dfa.add_edge(from, number, b'0', b'9');
    }

    // "[^"\n]*"
    let open = dfa.add_node(AutomatonNode::default());
    let close = dfa.add_node(accepting("str", true, false));
    dfa.add_edge(root, open, b'"', b'"');
    connect(&mut dfa, open, open, |b| b != b'"' && b != b'\n');
    dfa.add_edge(open, close, b'"', b'"');

    for (byte, name) in [(b',', "comma"), (b'(', "lp"), (b')', "rp"), (b'\n', "nl")] {
        let node = dfa.add_node(accepting(name, true, false));
        dfa.add_edge(root, node, byte, byte);
    }

    let blank = dfa.add_node(accepting("ws", false, true));
    for from in [root, blank] {
        connect(&mut dfa, from, blank, |b| matches!(b, b' ' | b'\t' | b'\r'));
    }

    let comment = dfa.add_node(accepting("comment", false, true));
    dfa.add_edge(root, comment, b'%', b'%');
    connect(&mut dfa, comment, comment, |b| b != b'\n');

    dfa
}

// ── Grammar ──────────────────────────────────────────────────────────

struct GrammarBuilder {
    symbols: Vec<String>,
    productions: BTreeMap<usize, Vec<Vec<usize>>>,
}

impl GrammarBuilder {
    fn new() -> Self {
        Self {
            symbols: vec![START.to_string()],
            productions: BTreeMap::new(),
        }
    }

    fn atom(&mut self, name: &str) -> usize {
        if let Some(index) = terminal(name) {
            return index + 1;
        }
        let position = match self.symbols.iter().position(|s| s == name) {
            Some(position) => position,
            None => {
                self.symbols.push(name.to_string());
                self.symbols.len() - 1
            }
        };
        TERMINALS.len() + 1 + position
    }

    /// Adds one production per alternative; an empty alternative is epsilon.
    fn rule(&mut self, symbol: &str, alternatives: &[&str]) {
        let symbol = self.atom(symbol);
        for alternative in alternatives {
            let mut atoms: Vec<usize> = alternative.split_whitespace().map(|n| self.atom(n)).collect();
            if atoms.is_empty() {
                atoms.push(EPSILON);
            }
            self.productions.entry(symbol).or_default().push(atoms);
        }
    }

    fn build(mut self) -> Result<Grammar, ArtifactError> {
        self.symbols.push(END.to_string());
        let terminals = TERMINALS.iter().map(|t| t.to_string()).collect();
        Grammar::new(terminals, self.symbols, self.productions)
    }
}

fn grammar() -> Result<Grammar, ArtifactError> {
    let mut g = GrammarBuilder::new();

    g.rule(START, &["Lines"]);
    g.rule("Lines", &["Line Lines", ""]);
    g.rule("Line", &["Label Tail", "Tail"]);
    g.rule("Tail", &["Instr nl", "nl"]);

    let shapes: Vec<String> = INSTRUCTIONS.iter().map(|(shape, _, _)| format!("Instr{shape}")).collect();
    let shapes: Vec<&str> = shapes.iter().map(String::as_str).collect();
    g.rule("Instr", &shapes);

    for (shape, class, body) in INSTRUCTIONS {
        let name = format!("Instr{shape}");
        let production = if body.is_empty() {
            format!("{name}_r {name}_s0")
        } else {
            format!("{name}_r {name}_s0 {body} {name}_s1")
        };
        g.rule(&name, &[production.as_str()]);
        g.rule(&format!("{name}_r"), &[*class]);
        g.rule(&format!("{name}_s0"), &[""]);
        if !body.is_empty() {
            g.rule(&format!("{name}_s1"), &[""]);
        }
    }

    g.rule("Const", &["Number", "Reference"]);
    g.rule("Datum", &["Const", "Text"]);
    g.rule("Data", &["comma Datum Data", ""]);

    for (name, alternatives) in LEAVES {
        g.rule(name, &[format!("{name}_r {name}_s0").as_str()]);
        g.rule(&format!("{name}_r"), alternatives);
        g.rule(&format!("{name}_s0"), &[""]);
    }

    g.build()
}
