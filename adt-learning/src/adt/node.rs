use std::fmt::Debug;

use automata_core::{math::Map, prelude::*};

use crate::hypothesis::StateId;

/// Index of a node in an [`super::Adt`]. Indices are never reused, so an index that refers to a
/// removed node stays invalid. Only [`super::Adt::compacted`] hands out new indices.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N({})", self.0)
    }
}

impl Show for NodeId {
    fn show(&self) -> String {
        format!("{:?}", self)
    }
}

/// A node of an adaptive distinguishing tree.
#[derive(Clone, PartialEq, Eq)]
pub enum AdtNode<S: Symbol, O: Color> {
    /// Reads `input` and branches on the output that is produced.
    Symbol {
        parent: Option<NodeId>,
        input: S,
        children: Map<O, NodeId>,
    },
    /// Resets the system and replays the access sequence before continuing with `child`.
    Reset {
        parent: Option<NodeId>,
        child: NodeId,
    },
    /// Identifies a hypothesis state. Freshly discovered leaves have no state yet.
    Leaf {
        parent: Option<NodeId>,
        state: Option<StateId>,
    },
}

impl<S: Symbol, O: Color> AdtNode<S, O> {
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            AdtNode::Symbol { parent, .. }
            | AdtNode::Reset { parent, .. }
            | AdtNode::Leaf { parent, .. } => *parent,
        }
    }

    pub(crate) fn set_parent(&mut self, new_parent: Option<NodeId>) {
        match self {
            AdtNode::Symbol { parent, .. }
            | AdtNode::Reset { parent, .. }
            | AdtNode::Leaf { parent, .. } => *parent = new_parent,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, AdtNode::Leaf { .. })
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, AdtNode::Reset { .. })
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, AdtNode::Symbol { .. })
    }

    /// The input symbol of a symbol node.
    pub fn input(&self) -> Option<S> {
        match self {
            AdtNode::Symbol { input, .. } => Some(*input),
            _ => None,
        }
    }

    /// The state of a leaf.
    pub fn state(&self) -> Option<StateId> {
        match self {
            AdtNode::Leaf { state, .. } => *state,
            _ => None,
        }
    }

    /// All children in order, for reset nodes this is the single child.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            AdtNode::Symbol { children, .. } => children.values().copied().collect(),
            AdtNode::Reset { child, .. } => vec![*child],
            AdtNode::Leaf { .. } => vec![],
        }
    }

    /// Redirects the edge pointing to `old` so that it points to `new`. Returns `false` if
    /// no such edge exists.
    pub(crate) fn replace_child(&mut self, old: NodeId, new: NodeId) -> bool {
        match self {
            AdtNode::Symbol { children, .. } => {
                for target in children.values_mut() {
                    if *target == old {
                        *target = new;
                        return true;
                    }
                }
                false
            }
            AdtNode::Reset { child, .. } if *child == old => {
                *child = new;
                true
            }
            _ => false,
        }
    }

    /// Rewrites the parent and all children to their index in `moved`. Returns `false` if one
    /// of them is missing from `moved`.
    pub(crate) fn relabel(&mut self, moved: &Map<NodeId, NodeId>) -> bool {
        let relabel_parent =
            |parent: &mut Option<NodeId>| parent.as_mut().map_or(true, |id| relocate(id, moved));
        match self {
            AdtNode::Symbol {
                parent, children, ..
            } => {
                relabel_parent(parent) && children.values_mut().all(|child| relocate(child, moved))
            }
            AdtNode::Reset { parent, child } => relabel_parent(parent) && relocate(child, moved),
            AdtNode::Leaf { parent, .. } => relabel_parent(parent),
        }
    }
}

fn relocate(id: &mut NodeId, moved: &Map<NodeId, NodeId>) -> bool {
    match moved.get(id) {
        Some(&new) => {
            *id = new;
            true
        }
        None => false,
    }
}

impl<S: Symbol, O: Color> Debug for AdtNode<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdtNode::Symbol { input, children, .. } => {
                write!(f, "{}", input.show())?;
                f.debug_map().entries(children.iter()).finish()
            }
            AdtNode::Reset { child, .. } => write!(f, "Reset → {child:?}"),
            AdtNode::Leaf { state, .. } => write!(f, "Leaf({})", state.show()),
        }
    }
}
