use automata_core::prelude::*;
use tracing::debug;

use crate::{
    adt::{Adt, NodeId},
    hypothesis::{AdtHypothesis, StateId},
    LearningError, Result,
};

use super::compute_best_effort_ads;

/// A proposal to replace the subtree rooted in `node_to_replace`. The states in `cutout` are
/// not covered by the replacement and have to be separated in some other way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementResult<S: Symbol, O: Color> {
    pub node_to_replace: NodeId,
    pub replacement: Adt<S, O>,
    pub cutout: Vec<StateId>,
}

/// Decides which subtrees of the ADT are considered for replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubtreeReplacers {
    NeverReplace,
    /// The root forms level zero, the reset nodes with `k - 1` reset nodes above them form
    /// level `k`. Proposals are collected level by level, the first level that yields any wins.
    #[default]
    LeveledBestEffort,
    /// Only the root is considered.
    SingleBestEffort,
    /// The root and all reset nodes are considered in preorder, nodes below an accepted
    /// proposal are skipped.
    ExhaustiveBestEffort,
}

impl SubtreeReplacers {
    /// Computes replacement proposals for the given tree.
    pub fn compute_replacements<A: Alphabet, O: Color>(
        self,
        hypothesis: &AdtHypothesis<A, O>,
        alphabet: &A,
        adt: &Adt<A::Symbol, O>,
    ) -> Result<Vec<ReplacementResult<A::Symbol, O>>> {
        let Some(root) = adt.root() else {
            return Ok(vec![]);
        };
        let symbols: Vec<_> = alphabet.universe().collect();
        let proposal_for = |node| propose(hypothesis, &symbols, adt, node);

        let proposals = match self {
            SubtreeReplacers::NeverReplace => vec![],
            SubtreeReplacers::SingleBestEffort => proposal_for(root)?.into_iter().collect(),
            SubtreeReplacers::LeveledBestEffort => {
                let resets = adt.collect_reset_nodes(root);
                let levels = resets
                    .iter()
                    .map(|reset| adt.reset_depth(*reset) + 1)
                    .max()
                    .unwrap_or(0);
                let mut proposals = vec![];
                for level in 0..=levels {
                    let candidates = if level == 0 {
                        vec![root]
                    } else {
                        resets
                            .iter()
                            .copied()
                            .filter(|reset| adt.reset_depth(*reset) + 1 == level)
                            .collect()
                    };
                    for candidate in candidates {
                        proposals.extend(proposal_for(candidate)?);
                    }
                    if !proposals.is_empty() {
                        break;
                    }
                }
                proposals
            }
            SubtreeReplacers::ExhaustiveBestEffort => {
                let candidates = std::iter::once(root).chain(adt.collect_reset_nodes(root));
                let mut accepted: Vec<NodeId> = vec![];
                let mut proposals = vec![];
                for candidate in candidates {
                    if accepted.iter().any(|a| adt.is_ancestor(*a, candidate)) {
                        continue;
                    }
                    if let Some(proposal) = proposal_for(candidate)? {
                        accepted.push(candidate);
                        proposals.push(proposal);
                    }
                }
                proposals
            }
        };
        debug!("{self:?} proposes {} replacements", proposals.len());
        Ok(proposals)
    }
}

fn propose<A: Alphabet, O: Color>(
    hypothesis: &AdtHypothesis<A, O>,
    symbols: &[A::Symbol],
    adt: &Adt<A::Symbol, O>,
    node: NodeId,
) -> Result<Option<ReplacementResult<A::Symbol, O>>> {
    if adt.effective_resets(node) == 0 {
        return Ok(None);
    }
    let (parent_input, parent_output) = adt.build_trace_for_node(node);
    let mut targets = vec![];
    let mut cutout = vec![];
    for state in adt.collect_states(node) {
        if hypothesis.compute_state_output(state, &parent_input).as_ref() != Some(&parent_output)
        {
            return Ok(None);
        }
        let Some(successor) = hypothesis.reached_state_from(state, &parent_input) else {
            return Ok(None);
        };
        if targets.iter().any(|(other, _)| *other == successor) {
            cutout.push(state);
        } else {
            targets.push((successor, state));
        }
    }
    if targets.len() < 2 {
        return Ok(None);
    }

    let step = |state: StateId, symbol: A::Symbol| {
        hypothesis.transition(state, symbol).ok_or_else(|| {
            LearningError::illegal(format!(
                "transition of {state} on {} is open",
                symbol.show()
            ))
        })
    };
    Ok(
        compute_best_effort_ads(symbols, &targets, step)?.map(|(replacement, skipped)| {
            cutout.extend(skipped);
            debug!(
                "replacement for {node:?} with {} resets and cutout {cutout:?}",
                replacement.root().map_or(0, |r| replacement.effective_resets(r))
            );
            ReplacementResult {
                node_to_replace: node,
                replacement,
                cutout,
            }
        }),
    )
}
