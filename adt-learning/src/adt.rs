use automata_core::{math::Map, prelude::*};
use tracing::{debug, trace};

use crate::{
    config::LeafSplitters, hypothesis::StateId, oracle::SymbolQueryOracle, LearningError, Result,
};

mod node;
pub use node::{AdtNode, NodeId};

mod util;
pub use util::LcaInfo;

/// An adaptive distinguishing tree. It consists of symbol nodes, which read an input and branch on
/// the output, reset nodes, which reset the system and replay the access sequence, and leaves,
/// which identify hypothesis states.
///
/// Nodes are stored in an arena and refer to each other by [`NodeId`]. Removing a subtree leaves a
/// hole in the arena, indices of removed nodes are never handed out again. Equality compares the
/// arenas, use [`Adt::compacted`] to compare trees that went through different replacements.
#[derive(Clone, PartialEq, Eq)]
pub struct Adt<S: Symbol, O: Color> {
    nodes: Vec<Option<AdtNode<S, O>>>,
    root: Option<NodeId>,
}

impl<S: Symbol, O: Color> Default for Adt<S, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Symbol, O: Color> Adt<S, O> {
    /// Creates an empty tree without any nodes.
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            root: None,
        }
    }

    /// Creates a tree that consists of a single leaf identifying `state`.
    pub fn single_leaf(state: StateId) -> Self {
        let mut adt = Self::new();
        adt.initialize(state);
        adt
    }

    /// Clears the tree and installs a single leaf identifying `state` as root.
    pub fn initialize(&mut self, state: StateId) {
        self.nodes.clear();
        let root = self.push(AdtNode::Leaf {
            parent: None,
            state: Some(state),
        });
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn try_root(&self) -> Result<NodeId> {
        self.root
            .ok_or_else(|| LearningError::illegal("adaptive distinguishing tree is empty"))
    }

    /// Returns `true` if `id` refers to a node that has not been removed.
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Gives a reference to the node with the given index.
    pub fn get(&self, id: NodeId) -> Option<&AdtNode<S, O>> {
        self.nodes.get(id.0).and_then(|node| node.as_ref())
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&AdtNode<S, O>> {
        self.get(id)
            .ok_or_else(|| LearningError::illegal(format!("node {id:?} does not exist")))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut AdtNode<S, O>> {
        self.nodes
            .get_mut(id.0)
            .and_then(|node| node.as_mut())
            .ok_or_else(|| LearningError::illegal(format!("node {id:?} does not exist")))
    }

    fn push(&mut self, node: AdtNode<S, O>) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    /// Number of slots in the arena, including the holes of removed nodes.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Copies the tree into a fresh arena without holes. Nodes keep their relative order, the
    /// returned map gives the new index of every node that is present.
    pub fn compacted(&self) -> Result<(Self, Map<NodeId, NodeId>)> {
        let moved: Map<NodeId, NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_some())
            .enumerate()
            .map(|(new, (old, _))| (NodeId(old), NodeId(new)))
            .collect();
        let mut nodes = Vec::with_capacity(moved.len());
        for (old, node) in self.nodes.iter().enumerate() {
            let Some(node) = node else { continue };
            let mut node = node.clone();
            if !node.relabel(&moved) {
                return Err(LearningError::illegal(format!(
                    "{:?} refers to a removed node",
                    NodeId(old)
                )));
            }
            nodes.push(Some(node));
        }
        let root = self
            .root
            .map(|root| {
                moved
                    .get(&root)
                    .copied()
                    .ok_or_else(|| LearningError::illegal("root has been removed"))
            })
            .transpose()?;
        trace!("compacted {} slots into {}", self.capacity(), nodes.len());
        Ok((Self { nodes, root }, moved))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent())
    }

    /// The state that is identified by the leaf `id`.
    pub fn state(&self, id: NodeId) -> Option<StateId> {
        self.get(id).and_then(|node| node.state())
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| node.is_leaf())
    }

    pub fn is_reset(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| node.is_reset())
    }

    /// Attaches `state` to the leaf `id`.
    pub fn set_state(&mut self, id: NodeId, state: StateId) -> Result<()> {
        match self.node_mut(id)? {
            AdtNode::Leaf { state: current, .. } => {
                *current = Some(state);
                Ok(())
            }
            _ => Err(LearningError::illegal(format!("{id:?} is not a leaf"))),
        }
    }

    /// Adds a leaf below the symbol node `parent` on the edge labelled with `output`.
    pub(crate) fn add_leaf(
        &mut self,
        parent: NodeId,
        output: O,
        state: Option<StateId>,
    ) -> Result<NodeId> {
        let leaf = self.push(AdtNode::Leaf {
            parent: Some(parent),
            state,
        });
        match self.node_mut(parent)? {
            AdtNode::Symbol { children, .. } => {
                if children.insert(output, leaf).is_some() {
                    return Err(LearningError::illegal("output is already present"));
                }
                Ok(leaf)
            }
            _ => Err(LearningError::illegal(format!(
                "can not add a leaf below {parent:?}"
            ))),
        }
    }

    /// Makes `new` take the place of `old`, which is the child of `parent` (or the root).
    fn relink(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) -> Result<()> {
        match parent {
            None => self.root = Some(new),
            Some(parent) => {
                if !self.node_mut(parent)?.replace_child(old, new) {
                    return Err(LearningError::illegal(format!(
                        "{old:?} is not a child of {parent:?}"
                    )));
                }
            }
        }
        self.node_mut(new)?.set_parent(parent);
        Ok(())
    }

    /// Removes the subtree rooted in `id`.
    fn discard(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(|node| node.take()) {
                stack.extend(node.children());
            }
        }
    }

    /// Sifts through the tree starting at `from`. The oracle is expected to have just read
    /// `long_prefix` after a reset, every reset node resets it and replays `long_prefix`. If an
    /// output is observed that has never been seen at a symbol node, a new leaf without state is
    /// created. Returns the leaf at which sifting ends.
    pub fn sift<Q>(&mut self, oracle: &mut Q, long_prefix: &Word<S>, from: NodeId) -> Result<NodeId>
    where
        Q: SymbolQueryOracle<Input = S, Output = O>,
    {
        let mut current = from;
        loop {
            let (input, next) = match self.node(current)? {
                AdtNode::Leaf { .. } => return Ok(current),
                AdtNode::Reset { child, .. } => {
                    let child = *child;
                    oracle.reset();
                    for &symbol in long_prefix {
                        oracle.query(symbol)?;
                    }
                    current = child;
                    continue;
                }
                AdtNode::Symbol {
                    input, children, ..
                } => {
                    let output = oracle.query(*input)?;
                    (*input, children.get(&output).copied().ok_or(output))
                }
            };
            match next {
                Ok(child) => {
                    trace!("sifting {} via {} to {child:?}", long_prefix, input.show());
                    current = child;
                }
                Err(output) => {
                    let leaf = self.add_leaf(current, output, None)?;
                    trace!("sifting {} created new leaf {leaf:?}", long_prefix);
                    return Ok(leaf);
                }
            }
        }
    }

    /// Builds the symbol chain that distinguishes the old from the new state, starting at position
    /// `start` of `splitter`. The old leaf is moved to the end of the chain, the returned pair
    /// consists of the top of the chain and the new leaf.
    fn chain(
        &mut self,
        start: usize,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
        old_leaf: NodeId,
    ) -> Result<(NodeId, NodeId)> {
        if splitter.len() != old_output.len() || splitter.len() != new_output.len() {
            return Err(LearningError::illegal(
                "splitter and outputs have different lengths",
            ));
        }
        let divergence = (0..splitter.len())
            .find(|&i| old_output[i] != new_output[i])
            .ok_or_else(|| LearningError::NonDeterministicSul {
                input: splitter.show(),
                expected: format!("{old_output:?}"),
                observed: format!("{new_output:?}"),
            })?;
        if divergence < start {
            return Err(LearningError::illegal(format!(
                "outputs on {splitter} diverge within the first {start} symbols"
            )));
        }

        let mut top = None;
        let mut previous: Option<(NodeId, O)> = None;
        for i in start..=divergence {
            let id = self.push(AdtNode::Symbol {
                parent: previous.as_ref().map(|(p, _)| *p),
                input: splitter[i],
                children: Map::default(),
            });
            match &previous {
                Some((p, output)) => {
                    if let AdtNode::Symbol { children, .. } = self.node_mut(*p)? {
                        children.insert(output.clone(), id);
                    }
                }
                None => top = Some(id),
            }
            previous = Some((id, old_output[i].clone()));
        }
        let (last, top) = match (previous, top) {
            (Some((last, _)), Some(top)) => (last, top),
            _ => return Err(LearningError::illegal("empty splitter")),
        };

        let new_leaf = self.push(AdtNode::Leaf {
            parent: Some(last),
            state: None,
        });
        if let AdtNode::Symbol { children, .. } = self.node_mut(last)? {
            children.insert(old_output[divergence].clone(), old_leaf);
            children.insert(new_output[divergence].clone(), new_leaf);
        }
        self.node_mut(old_leaf)?.set_parent(Some(last));
        Ok((top, new_leaf))
    }

    /// Replaces `leaf` by a reset node followed by a symbol chain for `splitter`. Returns the new
    /// leaf, the old leaf is kept at the end of the old output branch.
    pub(crate) fn split_with_reset(
        &mut self,
        leaf: NodeId,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
    ) -> Result<NodeId> {
        let parent = self.parent(leaf);
        let (top, new_leaf) = self.chain(0, splitter, old_output, new_output, leaf)?;
        if parent.is_none() {
            self.relink(None, leaf, top)?;
        } else {
            let reset = self.push(AdtNode::Reset {
                parent: None,
                child: top,
            });
            self.node_mut(top)?.set_parent(Some(reset));
            self.relink(parent, leaf, reset)?;
        }
        debug!("split {leaf:?} with {splitter}, new leaf is {new_leaf:?}");
        Ok(new_leaf)
    }

    /// Replaces `leaf` by a symbol chain for the part of `splitter` that follows the trace of the
    /// leaf. No reset is inserted.
    pub(crate) fn extend_in_place(
        &mut self,
        leaf: NodeId,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
    ) -> Result<NodeId> {
        let (trace, _) = self.build_trace_for_node(leaf);
        if !splitter.starts_with(&trace) {
            return Err(LearningError::invalid(format!(
                "{splitter} does not extend the trace {trace} of {leaf:?}"
            )));
        }
        let parent = self.parent(leaf);
        let (top, new_leaf) = self.chain(trace.len(), splitter, old_output, new_output, leaf)?;
        self.relink(parent, leaf, top)?;
        debug!("extended {leaf:?} with {splitter}, new leaf is {new_leaf:?}");
        Ok(new_leaf)
    }

    /// Splits `leaf` such that the old state stays in `leaf` and the returned new leaf is reached
    /// by the state that produces `new_output` on `splitter`. A leaf that is the root is turned
    /// into a symbol chain directly, otherwise the `leaf_splitter` decides how the tree changes.
    pub fn split_leaf(
        &mut self,
        leaf: NodeId,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
        leaf_splitter: LeafSplitters,
    ) -> Result<NodeId> {
        if !self.is_leaf(leaf) {
            return Err(LearningError::invalid(format!("{leaf:?} is not a leaf")));
        }
        if Some(leaf) == self.root {
            return self.split_with_reset(leaf, splitter, old_output, new_output);
        }
        leaf_splitter.split(self, leaf, splitter, old_output, new_output)
    }

    /// Like [`Adt::split_leaf`], but `splitter` starts with the trace that leads to `leaf` inside
    /// its ADS, so the ADS can simply be extended. Falls back to splitting if this is not the case.
    pub fn extend_leaf(
        &mut self,
        leaf: NodeId,
        splitter: &Word<S>,
        old_output: &Word<O>,
        new_output: &Word<O>,
        leaf_splitter: LeafSplitters,
    ) -> Result<NodeId> {
        if !self.is_leaf(leaf) {
            return Err(LearningError::invalid(format!("{leaf:?} is not a leaf")));
        }
        let (trace, _) = self.build_trace_for_node(leaf);
        if splitter.starts_with(&trace) {
            self.extend_in_place(leaf, splitter, old_output, new_output)
        } else {
            self.split_leaf(leaf, splitter, old_output, new_output, leaf_splitter)
        }
    }

    /// Copies the subtree of `other` rooted in `at` into `self`. The copy has no parent, its root
    /// is returned.
    pub(crate) fn graft(&mut self, other: &Adt<S, O>, at: NodeId) -> Result<NodeId> {
        let copy = match other.node(at)? {
            AdtNode::Leaf { state, .. } => self.push(AdtNode::Leaf {
                parent: None,
                state: *state,
            }),
            AdtNode::Reset { child, .. } => {
                let child = self.graft(other, *child)?;
                let reset = self.push(AdtNode::Reset {
                    parent: None,
                    child,
                });
                self.node_mut(child)?.set_parent(Some(reset));
                reset
            }
            AdtNode::Symbol {
                input, children, ..
            } => {
                let mut copied = Map::default();
                for (output, child) in children {
                    copied.insert(output.clone(), self.graft(other, *child)?);
                }
                let targets: Vec<_> = copied.values().copied().collect();
                let symbol = self.push(AdtNode::Symbol {
                    parent: None,
                    input: *input,
                    children: copied,
                });
                for target in targets {
                    self.node_mut(target)?.set_parent(Some(symbol));
                }
                symbol
            }
        };
        Ok(copy)
    }

    /// Replaces the subtree rooted in `old` by a copy of `replacement`. The old subtree is
    /// removed, the root of the copy is returned.
    pub fn replace_node(&mut self, old: NodeId, replacement: &Adt<S, O>) -> Result<NodeId> {
        if !self.contains(old) {
            return Err(LearningError::illegal(format!(
                "node to replace {old:?} is not part of the tree"
            )));
        }
        let parent = self.parent(old);
        let new = self.graft(replacement, replacement.try_root()?)?;
        self.relink(parent, old, new)?;
        self.discard(old);
        debug!("replaced {old:?} by {new:?}");
        Ok(new)
    }

    /// Replaces the leaf `leaf` by a reset node that is followed by a copy of `sub`.
    pub(crate) fn insert_reset(&mut self, leaf: NodeId, sub: &Adt<S, O>) -> Result<()> {
        let parent = self
            .parent(leaf)
            .ok_or_else(|| LearningError::illegal("a reset node can not be the root"))?;
        let child = self.graft(sub, sub.try_root()?)?;
        let reset = self.push(AdtNode::Reset {
            parent: None,
            child,
        });
        self.node_mut(child)?.set_parent(Some(reset));
        self.relink(Some(parent), leaf, reset)?;
        self.discard(leaf);
        Ok(())
    }

    /// Builds a tree that consists of a single path which reads `input`, follows `output` and
    /// ends in a leaf identifying `state`.
    pub fn from_trace(input: &Word<S>, output: &Word<O>, state: StateId) -> Result<Self> {
        if input.len() != output.len() {
            return Err(LearningError::illegal(
                "trace input and output have different lengths",
            ));
        }
        let mut adt = Self::new();
        let mut previous: Option<(NodeId, O)> = None;
        for (&symbol, out) in input.iter().zip(output.iter()) {
            let id = adt.push(AdtNode::Symbol {
                parent: previous.as_ref().map(|(p, _)| *p),
                input: symbol,
                children: Map::default(),
            });
            adt.attach(&previous, id)?;
            previous = Some((id, out.clone()));
        }
        let leaf = adt.push(AdtNode::Leaf {
            parent: previous.as_ref().map(|(p, _)| *p),
            state: Some(state),
        });
        adt.attach(&previous, leaf)?;
        Ok(adt)
    }

    fn attach(&mut self, previous: &Option<(NodeId, O)>, id: NodeId) -> Result<()> {
        match previous {
            None => self.root = Some(id),
            Some((parent, output)) => {
                if let AdtNode::Symbol { children, .. } = self.node_mut(*parent)? {
                    children.insert(output.clone(), id);
                }
            }
        }
        Ok(())
    }

    /// Merges the trace given by `input` and `output` that identifies `state` into `self`.
    /// Returns `false` if this is not possible, which is the case if the trace leaves the tree
    /// at a node whose input differs, or if it ends in a leaf or a reset node.
    pub fn merge_trace(&mut self, input: &Word<S>, output: &Word<O>, state: StateId) -> Result<bool> {
        let mut current = self.try_root()?;
        for i in 0..input.len() {
            let next = match self.node(current)? {
                AdtNode::Symbol {
                    input: symbol,
                    children,
                    ..
                } if *symbol == input[i] => children.get(&output[i]).copied(),
                _ => return Ok(false),
            };
            match next {
                Some(child) => current = child,
                None => {
                    let rest =
                        Self::from_trace(&input.skip(i + 1), &output.skip(i + 1), state)?;
                    let copy = self.graft(&rest, rest.try_root()?)?;
                    if let AdtNode::Symbol { children, .. } = self.node_mut(current)? {
                        children.insert(output[i].clone(), copy);
                    }
                    self.node_mut(copy)?.set_parent(Some(current));
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests;
