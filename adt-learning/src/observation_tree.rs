use std::collections::VecDeque;

use automata_core::{
    math::{HashMap, Map},
    prelude::*,
};
use tracing::trace;

use crate::{
    adt::{Adt, NodeId},
    hypothesis::StateId,
    LearningError, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ObservationNode<S: Symbol, O: Color> {
    parent: Option<(usize, S)>,
    children: Map<S, (O, usize)>,
}

impl<S: Symbol, O: Color> ObservationNode<S, O> {
    fn new(parent: Option<(usize, S)>) -> Self {
        Self {
            parent,
            children: Map::default(),
        }
    }
}

/// A prefix tree that stores every output the system has been observed to produce. Every
/// hypothesis state is associated with the node that its access sequence leads to, which
/// allows to look up the known behaviour of a state and to search for separating words.
///
/// The tree is a function: it never stores two different outputs for the same input word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationTree<S: Symbol, O: Color> {
    nodes: Vec<ObservationNode<S, O>>,
    states: HashMap<StateId, usize>,
    symbols: Vec<S>,
}

impl<S: Symbol, O: Color> ObservationTree<S, O> {
    /// Creates an empty tree over the given symbols.
    pub fn new<I: IntoIterator<Item = S>>(symbols: I) -> Self {
        Self {
            nodes: vec![ObservationNode::new(None)],
            states: HashMap::default(),
            symbols: symbols.into_iter().collect(),
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    /// Number of nodes, the root included.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Forgets all observations and all states.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(ObservationNode::new(None));
        self.states.clear();
    }

    /// Associates the initial state with the root.
    pub fn initialize(&mut self, initial: StateId) {
        self.states.insert(initial, self.root());
    }

    pub fn node_of(&self, state: StateId) -> Option<usize> {
        self.states.get(&state).copied()
    }

    fn try_node_of(&self, state: StateId) -> Result<usize> {
        self.node_of(state).ok_or_else(|| {
            LearningError::illegal(format!("state {state} is not part of the observation tree"))
        })
    }

    /// The recorded output and successor when reading `symbol` in `node`.
    pub fn successor(&self, node: usize, symbol: S) -> Option<(&O, usize)> {
        self.nodes
            .get(node)?
            .children
            .get(&symbol)
            .map(|(output, target)| (output, *target))
    }

    /// The input word that leads from the root to `node`.
    pub fn input_to(&self, node: usize) -> Word<S> {
        let mut symbols = vec![];
        let mut current = node;
        while let Some((parent, symbol)) = self.nodes.get(current).and_then(|n| n.parent) {
            symbols.push(symbol);
            current = parent;
        }
        symbols.reverse();
        Word::from(symbols)
    }

    /// Records that reading `symbol` in `node` produces `output` and returns the successor.
    /// Recording an output that contradicts an earlier observation is an error.
    pub fn insert_step(&mut self, node: usize, symbol: S, output: O) -> Result<usize> {
        if let Some((known, target)) = self.successor(node, symbol) {
            if known != &output {
                return Err(LearningError::NonDeterministicSul {
                    input: self.input_to(node).append(symbol).show(),
                    expected: format!("{known:?}"),
                    observed: format!("{output:?}"),
                });
            }
            return Ok(target);
        }
        let target = self.nodes.len();
        self.nodes.push(ObservationNode::new(Some((node, symbol))));
        self.nodes
            .get_mut(node)
            .ok_or_else(|| LearningError::illegal(format!("node {node} does not exist")))?
            .children
            .insert(symbol, (output, target));
        Ok(target)
    }

    fn walk(&self, from: usize, input: &Word<S>) -> Option<usize> {
        input
            .iter()
            .try_fold(from, |node, &symbol| Some(self.successor(node, symbol)?.1))
    }

    /// Adds `state`, which is reached by `access_sequence`. Everything but the last symbol of the
    /// access sequence has to be present already, `last_output` is the output of the last symbol.
    pub fn add_state(
        &mut self,
        state: StateId,
        access_sequence: &Word<S>,
        last_output: O,
    ) -> Result<()> {
        let Some(last) = access_sequence.last() else {
            self.states.insert(state, self.root());
            return Ok(());
        };
        let prefix = access_sequence.prefix(access_sequence.len() - 1);
        let node = self.walk(self.root(), &prefix).ok_or_else(|| {
            LearningError::illegal(format!("prefix {prefix} of state {state} is unknown"))
        })?;
        let target = self.insert_step(node, last, last_output)?;
        trace!("state {state} is observed at node {target}");
        self.states.insert(state, target);
        Ok(())
    }

    /// Records the outputs of `input` when read from `state`.
    pub fn add_trace(&mut self, state: StateId, input: &Word<S>, output: &Word<O>) -> Result<()> {
        if input.len() != output.len() {
            return Err(LearningError::illegal(
                "trace input and output have different lengths",
            ));
        }
        let mut node = self.try_node_of(state)?;
        for (&symbol, out) in input.iter().zip(output.iter()) {
            node = self.insert_step(node, symbol, out.clone())?;
        }
        Ok(())
    }

    /// Records all traces that lead to `node` in the given tree as observations of `state`.
    pub fn add_trace_for_node(&mut self, state: StateId, adt: &Adt<S, O>, node: NodeId) -> Result<()> {
        for (input, output) in adt.reset_separated_traces(node) {
            self.add_trace(state, &input, &output)?;
        }
        Ok(())
    }

    /// The recorded output of `input` when read from `state`, if it is known.
    pub fn trace(&self, state: StateId, input: &Word<S>) -> Option<Word<O>> {
        let mut node = self.node_of(state)?;
        let mut outputs = Vec::with_capacity(input.len());
        for &symbol in input {
            let (output, target) = self.successor(node, symbol)?;
            outputs.push(output.clone());
            node = target;
        }
        Some(Word::from(outputs))
    }

    fn separate(&self, first: usize, second: usize) -> Option<Word<S>> {
        let mut queue = VecDeque::from([(first, second, Word::epsilon())]);
        while let Some((left, right, word)) = queue.pop_front() {
            for &symbol in &self.symbols {
                let (Some((left_out, left_next)), Some((right_out, right_next))) =
                    (self.successor(left, symbol), self.successor(right, symbol))
                else {
                    continue;
                };
                let extended = word.append(symbol);
                if left_out != right_out {
                    return Some(extended);
                }
                queue.push_back((left_next, right_next, extended));
            }
        }
        None
    }

    /// Searches for a shortest word on which the recorded behaviour of both states differs.
    pub fn find_separating_word(&self, first: StateId, second: StateId) -> Option<Word<S>> {
        self.separate(self.node_of(first)?, self.node_of(second)?)
    }

    /// Searches for a shortest word that separates the states that are reached from `first` and
    /// `second` by `prefix`, provided both states produce the same output on `prefix`.
    pub fn find_separating_word_after(
        &self,
        first: StateId,
        second: StateId,
        prefix: &Word<S>,
    ) -> Option<Word<S>> {
        let (mut left, mut right) = (self.node_of(first)?, self.node_of(second)?);
        for &symbol in prefix {
            let (left_out, left_next) = self.successor(left, symbol)?;
            let (right_out, right_next) = self.successor(right, symbol)?;
            if left_out != right_out {
                return None;
            }
            left = left_next;
            right = right_next;
        }
        self.separate(left, right)
    }

    /// Makes `symbol` available for separating words.
    pub fn add_alphabet_symbol(&mut self, symbol: S) {
        if !self.symbols.contains(&symbol) {
            self.symbols.push(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ObservationTree<char, u8> {
        let mut tree = ObservationTree::new(['a', 'b']);
        tree.initialize(0);
        tree.add_state(1, &Word::from("a"), 0).unwrap();
        tree.add_state(2, &Word::from("b"), 1).unwrap();
        tree.add_trace(0, &Word::from("ab"), &Word::from(vec![0, 0]))
            .unwrap();
        tree.add_trace(1, &Word::from("ba"), &Word::from(vec![0, 1]))
            .unwrap();
        tree.add_trace(2, &Word::from("ba"), &Word::from(vec![0, 0]))
            .unwrap();
        tree
    }

    #[test_log::test]
    fn traces_are_recorded_per_state() {
        let tree = tree();
        assert_eq!(tree.trace(0, &Word::from("aba")), Some(Word::from(vec![0, 0, 1])));
        assert_eq!(tree.trace(2, &Word::from("b")), Some(Word::singleton(0)));
        assert_eq!(tree.trace(2, &Word::from("a")), None);
        assert_eq!(tree.input_to(tree.node_of(1).unwrap()), Word::from("a"));
    }

    #[test_log::test]
    fn contradicting_outputs_are_rejected() {
        let mut tree = tree();
        assert!(matches!(
            tree.add_trace(0, &Word::from("a"), &Word::singleton(1)),
            Err(LearningError::NonDeterministicSul { .. })
        ));
        assert!(tree.add_state(3, &Word::from("aab"), 0).is_err());
    }

    #[test_log::test]
    fn separating_words() {
        let tree = tree();
        assert_eq!(tree.find_separating_word(0, 2), Some(Word::from("b")));
        assert_eq!(tree.find_separating_word(1, 2), Some(Word::from("ba")));
        assert_eq!(
            tree.find_separating_word_after(1, 2, &Word::from("b")),
            Some(Word::from("a"))
        );
        assert_eq!(tree.find_separating_word_after(0, 1, &Word::from("a")), None);
    }
}
