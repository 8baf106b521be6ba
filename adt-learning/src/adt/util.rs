use std::fmt::Debug;

use automata_core::{math::Bijection, prelude::*};

use crate::{hypothesis::StateId, LearningError, Result};

use super::{Adt, AdtNode, NodeId};

/// The lowest common ancestor of two nodes together with the outputs that lead towards the
/// first and the second node respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcaInfo<O> {
    pub node: NodeId,
    pub first_output: O,
    pub second_output: O,
}

impl<S: Symbol, O: Color> Adt<S, O> {
    /// The output on the edge from `parent` to `child`.
    pub fn output_towards(&self, parent: NodeId, child: NodeId) -> Option<O> {
        match self.get(parent)? {
            AdtNode::Symbol { children, .. } => children
                .iter()
                .find(|(_, target)| **target == child)
                .map(|(output, _)| output.clone()),
            _ => None,
        }
    }

    /// The child of the symbol node `id` on the edge labelled with `output`.
    pub fn child_on(&self, id: NodeId, output: &O) -> Option<NodeId> {
        match self.get(id)? {
            AdtNode::Symbol { children, .. } => children.get(output).copied(),
            _ => None,
        }
    }

    /// Collects the inputs and outputs on the path from the closest reset node (or the root)
    /// down to `id`.
    pub fn build_trace_for_node(&self, id: NodeId) -> (Word<S>, Word<O>) {
        let mut inputs = vec![];
        let mut outputs = vec![];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            let (Some(input), Some(output)) = (
                self.get(parent).and_then(|node| node.input()),
                self.output_towards(parent, current),
            ) else {
                break;
            };
            inputs.push(input);
            outputs.push(output);
            current = parent;
        }
        inputs.reverse();
        outputs.reverse();
        (Word::from(inputs), Word::from(outputs))
    }

    /// The traces of all ADSs that lie on the path from the root to `id`, starting with the one
    /// that contains `id`. Each trace is read after a reset and the access sequence.
    pub fn reset_separated_traces(&self, id: NodeId) -> Vec<(Word<S>, Word<O>)> {
        let mut traces = vec![];
        let mut current = Some(id);
        while let Some(node) = current {
            traces.push(self.build_trace_for_node(node));
            current = self.parent(self.start_of_ads(node));
        }
        traces
    }

    /// Walks up from `id` to the first node of its ADS, i.e. the topmost node that is not
    /// separated from `id` by a reset node.
    pub fn start_of_ads(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if self.is_reset(parent) {
                break;
            }
            current = parent;
        }
        current
    }

    /// All nodes of the subtree rooted in `from` in preorder.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children().into_iter().rev());
            }
        }
        out
    }

    pub fn collect_leaves(&self, from: NodeId) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| self.is_leaf(*id))
            .collect()
    }

    pub fn collect_reset_nodes(&self, from: NodeId) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| self.is_reset(*id))
            .collect()
    }

    /// The starting nodes of all ADSs in the subtree of `from`, which are `from` itself and the
    /// children of all reset nodes below it.
    pub fn collect_ads_nodes(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = vec![from];
        for reset in self.collect_reset_nodes(from) {
            if let Some(AdtNode::Reset { child, .. }) = self.get(reset) {
                out.push(*child);
            }
        }
        out
    }

    /// The states identified by the leaves below `from`.
    pub fn collect_states(&self, from: NodeId) -> Vec<StateId> {
        self.collect_leaves(from)
            .into_iter()
            .filter_map(|leaf| self.state(leaf))
            .collect()
    }

    /// Number of reset nodes on a longest path from `from` to one of the leaves below it,
    /// counting `from` itself.
    pub fn effective_resets(&self, from: NodeId) -> usize {
        match self.get(from) {
            None | Some(AdtNode::Leaf { .. }) => 0,
            Some(AdtNode::Reset { child, .. }) => 1 + self.effective_resets(*child),
            Some(AdtNode::Symbol { children, .. }) => children
                .values()
                .map(|child| self.effective_resets(*child))
                .max()
                .unwrap_or(0),
        }
    }

    /// Number of reset nodes that are strict ancestors of `id`.
    pub fn reset_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if self.is_reset(parent) {
                depth += 1;
            }
            current = parent;
        }
        depth
    }

    /// Returns `true` if `ancestor` lies on the path from the root to `id` (or is `id`).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Finds the leaf identifying `state`.
    pub fn leaf_of(&self, state: StateId) -> Option<NodeId> {
        let root = self.root()?;
        self.collect_leaves(root)
            .into_iter()
            .find(|leaf| self.state(*leaf) == Some(state))
    }

    /// Computes the lowest common ancestor of `first` and `second`. Both nodes have to be part of
    /// the tree and must be different from each other.
    pub fn find_lca(&self, first: NodeId, second: NodeId) -> Result<LcaInfo<O>> {
        if first == second {
            return Err(LearningError::illegal(format!(
                "can not compute the lca of {first:?} with itself"
            )));
        }
        let mut path = vec![];
        let mut current = first;
        while let Some(parent) = self.parent(current) {
            path.push((parent, current));
            current = parent;
        }

        let mut previous = second;
        let mut current = self.parent(second);
        while let Some(node) = current {
            if node == first {
                break;
            }
            if let Some((_, towards_first)) = path.iter().find(|(ancestor, _)| *ancestor == node) {
                let first_output = self.output_towards(node, *towards_first);
                let second_output = self.output_towards(node, previous);
                return match (first_output, second_output) {
                    (Some(first_output), Some(second_output)) => Ok(LcaInfo {
                        node,
                        first_output,
                        second_output,
                    }),
                    _ => Err(LearningError::illegal(format!(
                        "lca {node:?} of {first:?} and {second:?} is not a symbol node"
                    ))),
                };
            }
            previous = node;
            current = self.parent(node);
        }
        Err(LearningError::illegal(format!(
            "{first:?} and {second:?} have no separating common ancestor"
        )))
    }

    /// Checks that every leaf identifies exactly one state and that no state is identified by
    /// two leaves. Returns the corresponding bijection.
    pub fn leaf_bijection(&self) -> Result<Bijection<NodeId, StateId>> {
        let mut bijection = Bijection::new();
        let Some(root) = self.root() else {
            return Ok(bijection);
        };
        for leaf in self.collect_leaves(root) {
            let state = self
                .state(leaf)
                .ok_or_else(|| LearningError::illegal(format!("{leaf:?} has no state")))?;
            if bijection.insert_no_overwrite(leaf, state).is_err() {
                return Err(LearningError::illegal(format!(
                    "state {state} is identified by more than one leaf"
                )));
            }
        }
        Ok(bijection)
    }

    fn render(&self, id: NodeId, indent: usize, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        let pad = "  ".repeat(indent);
        match node {
            AdtNode::Leaf { state, .. } => out.push_str(&format!("{pad}{}\n", state.show())),
            AdtNode::Reset { child, .. } => {
                out.push_str(&format!("{pad}reset\n"));
                self.render(*child, indent + 1, out);
            }
            AdtNode::Symbol {
                input, children, ..
            } => {
                out.push_str(&format!("{pad}{}\n", input.show()));
                for (output, child) in children {
                    out.push_str(&format!("{pad}  / {output:?}\n"));
                    self.render(*child, indent + 2, out);
                }
            }
        }
    }
}

impl<S: Symbol, O: Color> Debug for Adt<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        if let Some(root) = self.root() {
            self.render(root, 0, &mut out);
        }
        write!(f, "{out}")
    }
}
