//! Deterministic finite automaton used by the tokenizer.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutomatonNode {
    /// Index into the terminal list; `Some` marks an accepting node.
    pub terminal: Option<usize>,
    /// Accept as soon as this node is reached, without looking further.
    pub lazy: bool,
    /// Accept but emit no token (whitespace, comments).
    pub skip: bool,
}

impl AutomatonNode {
    pub fn is_accepting(&self) -> bool {
        self.terminal.is_some()
    }
}

/// Arena of nodes; node 0 is the start state.
///
/// Edges are stored per `(from, to)` pair as inclusive byte ranges, the same
/// shape they have in the artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Automaton {
    nodes: Vec<AutomatonNode>,
    edges: Vec<Vec<(usize, Vec<(u8, u8)>)>>,
    terminals: Vec<String>,
}

impl Automaton {
    pub fn new(nodes: Vec<AutomatonNode>, terminals: Vec<String>) -> Self {
        let edges = vec![Vec::new(); nodes.len()];
        Self {
            nodes,
            edges,
            terminals,
        }
    }

    /// Appends a node with no outgoing edges and returns its index.
    pub fn add_node(&mut self, node: AutomatonNode) -> usize {
        self.nodes.push(node);
        self.edges.push(Vec::new());
        self.nodes.len() - 1
    }

    /// Replaces the flags of an existing node, keeping its edges.
    pub fn set_node(&mut self, index: usize, node: AutomatonNode) {
        self.nodes[index] = node;
    }

    /// Adds the range `lo..=hi` to the `from -> to` edge.
    pub fn add_edge(&mut self, from: usize, to: usize, lo: u8, hi: u8) {
        let targets = &mut self.edges[from];
        match targets.iter_mut().find(|(target, _)| *target == to) {
            Some((_, ranges)) => ranges.push((lo, hi)),
            None => targets.push((to, vec![(lo, hi)])),
        }
    }

    pub fn node(&self, index: usize) -> Option<&AutomatonNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[AutomatonNode] {
        &self.nodes
    }

    /// Outgoing `(to, ranges)` pairs of `from`.
    pub fn edges(&self, from: usize) -> &[(usize, Vec<(u8, u8)>)] {
        self.edges.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    /// Terminal name accepted at `node`, if any.
    pub fn terminal_name(&self, node: usize) -> Option<&str> {
        let index = self.nodes.get(node)?.terminal?;
        self.terminals.get(index).map(String::as_str)
    }

    /// Edge function: the node reached from `node` on `symbol`.
    pub fn next(&self, node: usize, symbol: u8) -> Option<usize> {
        self.edges(node)
            .iter()
            .find(|(_, ranges)| ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&symbol)))
            .map(|(to, _)| *to)
    }

    /// True when no node has two targets for the same byte.
    pub fn is_deterministic(&self) -> bool {
        self.ambiguous_node().is_none()
    }

    /// First node with two outgoing edges sharing a byte.
    pub fn ambiguous_node(&self) -> Option<usize> {
        (0..self.nodes.len()).find(|&node| {
            let mut seen = [false; 256];
            for (_, ranges) in self.edges(node) {
                for &(lo, hi) in ranges {
                    for symbol in lo..=hi {
                        if seen[symbol as usize] {
                            return true;
                        }
                        seen[symbol as usize] = true;
                    }
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> Automaton {
        let nodes = vec![
            AutomatonNode::default(),
            AutomatonNode {
                terminal: Some(0),
                ..Default::default()
            },
        ];
        let mut automaton = Automaton::new(nodes, vec!["num".into()]);
        automaton.add_edge(0, 1, b'0', b'9');
        automaton.add_edge(1, 1, b'0', b'9');
        automaton
    }

    #[test]
    fn test_edge_function() {
        let automaton = digits();
        let test_cases = vec![(0, b'5', Some(1)), (1, b'0', Some(1)), (0, b'a', None), (1, b' ', None)];
        for (node, symbol, expected) in test_cases {
            assert_eq!(automaton.next(node, symbol), expected);
        }
        assert_eq!(automaton.terminal_name(1), Some("num"));
        assert_eq!(automaton.terminal_name(0), None);
    }

    #[test]
    fn test_overlap_breaks_determinism() {
        let mut automaton = digits();
        assert!(automaton.is_deterministic());
        automaton.add_edge(0, 0, b'9', b'9');
        assert!(!automaton.is_deterministic());
        assert_eq!(automaton.ambiguous_node(), Some(0));
    }
}
