use std::fmt::Debug;

use automata_core::{
    math::{Map, Set},
    mealy::transition_table,
    prelude::*,
};
use tracing::trace;

use crate::{adt::NodeId, LearningError, Result};

/// Index of a state in an [`AdtHypothesis`].
pub type StateId = DefaultIdType;

/// Index of a transition in an [`AdtHypothesis`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(usize);

impl Debug for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A state of the hypothesis. Every state knows the word that reaches it from the initial state
/// along spanning tree edges and the transitions that currently point to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtState<S> {
    access_sequence: Word<S>,
    transitions: Vec<Option<TransitionId>>,
    incoming: Set<TransitionId>,
}

impl<S: Symbol> AdtState<S> {
    pub fn access_sequence(&self) -> &Word<S> {
        &self.access_sequence
    }

    pub fn incoming(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.incoming.iter().copied()
    }
}

/// A transition of the hypothesis. Transitions whose target is not yet known are called open,
/// they remember the node of the ADT from which sifting continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtTransition<S, O> {
    source: StateId,
    input: S,
    output: Option<O>,
    target: Option<StateId>,
    sift_node: Option<NodeId>,
    spanning_tree_edge: bool,
}

impl<S: Symbol, O: Color> AdtTransition<S, O> {
    pub fn source(&self) -> StateId {
        self.source
    }

    pub fn input(&self) -> S {
        self.input
    }

    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub fn sift_node(&self) -> Option<NodeId> {
        self.sift_node
    }

    pub fn is_spanning_tree_edge(&self) -> bool {
        self.spanning_tree_edge
    }

    /// A transition needs sifting exactly if its target is unknown.
    pub fn needs_sifting(&self) -> bool {
        self.target.is_none()
    }
}

/// The hypothesis that is maintained by the [`crate::AdtLearner`]. It is a Mealy machine whose
/// transitions may be open, i.e. their target is still to be determined by sifting.
#[derive(Clone, PartialEq)]
pub struct AdtHypothesis<A: Alphabet, O> {
    alphabet: A,
    states: Vec<AdtState<A::Symbol>>,
    transitions: Vec<AdtTransition<A::Symbol, O>>,
    initial: Option<StateId>,
}

impl<A: Alphabet, O: Color> AdtHypothesis<A, O> {
    /// Creates an empty hypothesis over the given alphabet.
    pub fn new(alphabet: A) -> Self {
        Self {
            alphabet,
            states: vec![],
            transitions: vec![],
            initial: None,
        }
    }

    fn push_state(&mut self, access_sequence: Word<A::Symbol>) -> StateId {
        self.states.push(AdtState {
            access_sequence,
            transitions: vec![None; self.alphabet.size()],
            incoming: Set::default(),
        });
        (self.states.len() - 1) as StateId
    }

    /// Adds the initial state, whose access sequence is empty.
    pub fn add_initial_state(&mut self) -> StateId {
        let state = self.push_state(Word::epsilon());
        self.initial = Some(state);
        state
    }

    /// Adds a new state that is reached by `access_sequence`.
    pub fn add_state(&mut self, access_sequence: Word<A::Symbol>) -> StateId {
        let state = self.push_state(access_sequence);
        trace!("added state {state}");
        state
    }

    pub fn state(&self, state: StateId) -> Option<&AdtState<A::Symbol>> {
        self.states.get(state as usize)
    }

    pub fn access_sequence(&self, state: StateId) -> Option<&Word<A::Symbol>> {
        self.state(state).map(|state| state.access_sequence())
    }

    fn try_state(&self, state: StateId) -> Result<&AdtState<A::Symbol>> {
        self.state(state)
            .ok_or_else(|| LearningError::illegal(format!("state {state} does not exist")))
    }

    pub fn get_transition(&self, id: TransitionId) -> Option<&AdtTransition<A::Symbol, O>> {
        self.transitions.get(id.0)
    }

    pub(crate) fn try_transition(&self, id: TransitionId) -> Result<&AdtTransition<A::Symbol, O>> {
        self.get_transition(id)
            .ok_or_else(|| LearningError::illegal(format!("transition {id:?} does not exist")))
    }

    fn transition_mut(&mut self, id: TransitionId) -> Result<&mut AdtTransition<A::Symbol, O>> {
        self.transitions
            .get_mut(id.0)
            .ok_or_else(|| LearningError::illegal(format!("transition {id:?} does not exist")))
    }

    /// Looks up the transition leaving `state` on `symbol`.
    pub fn transition_id(&self, state: StateId, symbol: A::Symbol) -> Option<TransitionId> {
        let position = self.alphabet.position(symbol)?;
        *self.state(state)?.transitions.get(position)?
    }

    pub(crate) fn try_transition_id(&self, state: StateId, symbol: A::Symbol) -> Result<TransitionId> {
        self.transition_id(state, symbol).ok_or_else(|| {
            LearningError::illegal(format!(
                "state {state} has no transition on {}",
                symbol.show()
            ))
        })
    }

    /// Creates a transition from `source` on `input` whose target is unknown. Sifting it will
    /// start in `sift_node`.
    pub fn create_open_transition(
        &mut self,
        source: StateId,
        input: A::Symbol,
        sift_node: NodeId,
    ) -> Result<TransitionId> {
        let position = self
            .alphabet
            .position(input)
            .ok_or_else(|| LearningError::invalid(format!("{} is unknown", input.show())))?;
        let id = TransitionId(self.transitions.len());
        let previous = {
            let state = self
                .states
                .get_mut(source as usize)
                .ok_or_else(|| LearningError::illegal(format!("state {source} does not exist")))?;
            if state.transitions.len() <= position {
                state.transitions.resize(position + 1, None);
            }
            state.transitions[position].replace(id)
        };
        if let Some(previous) = previous {
            self.set_target(previous, None)?;
        }
        self.transitions.push(AdtTransition {
            source,
            input,
            output: None,
            target: None,
            sift_node: Some(sift_node),
            spanning_tree_edge: false,
        });
        Ok(id)
    }

    pub fn set_output(&mut self, id: TransitionId, output: O) -> Result<()> {
        self.transition_mut(id)?.output = Some(output);
        Ok(())
    }

    /// Points the transition to `target`. The output of the transition is retained, even if the
    /// target is cleared.
    pub fn set_target(&mut self, id: TransitionId, target: Option<StateId>) -> Result<()> {
        let old = std::mem::replace(&mut self.transition_mut(id)?.target, target);
        if let Some(old) = old.and_then(|old| self.states.get_mut(old as usize)) {
            old.incoming.shift_remove(&id);
        }
        if let Some(new) = target {
            self.states
                .get_mut(new as usize)
                .ok_or_else(|| LearningError::illegal(format!("state {new} does not exist")))?
                .incoming
                .insert(id);
        }
        Ok(())
    }

    pub fn set_sift_node(&mut self, id: TransitionId, node: NodeId) -> Result<()> {
        self.transition_mut(id)?.sift_node = Some(node);
        Ok(())
    }

    /// Moves every sift node to its index in `moved`. Sift nodes without a new index are
    /// forgotten, sifting then starts at the root.
    pub(crate) fn relocate_sift_nodes(&mut self, moved: &Map<NodeId, NodeId>) {
        for transition in &mut self.transitions {
            transition.sift_node = transition
                .sift_node
                .and_then(|node| moved.get(&node).copied());
        }
    }

    pub fn set_spanning_tree_edge(&mut self, id: TransitionId, spanning: bool) -> Result<()> {
        self.transition_mut(id)?.spanning_tree_edge = spanning;
        Ok(())
    }

    /// The transitions pointing to `state` that are not part of the spanning tree.
    pub fn incoming_non_tree(&self, state: StateId) -> Result<Vec<TransitionId>> {
        Ok(self
            .try_state(state)?
            .incoming()
            .filter(|id| {
                self.get_transition(*id)
                    .is_some_and(|t| !t.is_spanning_tree_edge())
            })
            .collect())
    }

    /// All transitions in the order in which they were created.
    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &AdtTransition<A::Symbol, O>)> {
        self.transitions
            .iter()
            .enumerate()
            .map(|(i, t)| (TransitionId(i), t))
    }
}

impl<A: GrowingAlphabet, O: Color> AdtHypothesis<A, O> {
    /// Adds `symbol` to the alphabet. If the hypothesis already has states, an open transition
    /// on the new symbol is created for each of them, sifting starts at `sift_root`. Adding a
    /// symbol that is already known does nothing.
    pub fn add_alphabet_symbol(
        &mut self,
        symbol: A::Symbol,
        sift_root: Option<NodeId>,
    ) -> Result<Vec<TransitionId>> {
        if !self.alphabet.add_symbol(symbol) {
            return Ok(vec![]);
        }
        for state in &mut self.states {
            state.transitions.push(None);
        }
        let Some(root) = sift_root else {
            return Ok(vec![]);
        };
        (0..self.states.len())
            .map(|state| self.create_open_transition(state as StateId, symbol, root))
            .collect()
    }
}

impl<A: Alphabet, O: Color> Mealy for AdtHypothesis<A, O> {
    type Alphabet = A;
    type Output = O;
    type StateIndex = StateId;
    type StateIndices<'this> = std::ops::Range<StateId> where Self: 'this;

    fn alphabet(&self) -> &Self::Alphabet {
        &self.alphabet
    }

    fn initial(&self) -> Option<Self::StateIndex> {
        self.initial
    }

    fn state_indices(&self) -> Self::StateIndices<'_> {
        0..(self.states.len() as StateId)
    }

    fn successor(&self, state: StateId, symbol: SymbolOf<Self>) -> Option<StateId> {
        self.get_transition(self.transition_id(state, symbol)?)?
            .target()
    }

    fn transition_output(&self, state: StateId, symbol: SymbolOf<Self>) -> Option<O> {
        self.get_transition(self.transition_id(state, symbol)?)?
            .output()
            .cloned()
    }

    fn size(&self) -> usize {
        self.states.len()
    }
}

impl<A: Alphabet, O: Color> Debug for AdtHypothesis<A, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", transition_table(self))
    }
}
