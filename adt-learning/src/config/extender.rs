use automata_core::prelude::*;
use tracing::debug;

use crate::{
    adt::{Adt, NodeId},
    hypothesis::StateId,
    query::Query,
    LearningError, Result,
};

use super::{compute_ads, PartialTransitionAnalyzer};

/// The outcome of trying to extend a temporary ADS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionResult<S: Symbol, O: Color> {
    /// No extension was found.
    Empty,
    /// The hypothesis contradicts an observation that is stored in the tree.
    Counterexample(Query<S, O>),
    /// A subtree without reset nodes that can replace the reset node above the temporary ADS.
    Replacement(Adt<S, O>),
}

/// Decides whether and how a freshly created temporary ADS is improved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdtExtenders {
    /// Keeps every temporary ADS as it is.
    Nop,
    /// Tries to find an ADS for the states of the temporary ADS that continues the ADS above
    /// the reset node, so that the reset node can be removed.
    #[default]
    ExtendBestEffort,
}

type SymbolOf<P> = <<P as PartialTransitionAnalyzer>::Alphabet as Alphabet>::Symbol;

impl AdtExtenders {
    /// Computes an extension for the temporary ADS that starts in `ads`. Transitions of the
    /// hypothesis are closed on demand, if that discovers a new state no extension is returned.
    pub fn compute_extension<P: PartialTransitionAnalyzer>(
        self,
        analyzer: &mut P,
        ads: NodeId,
    ) -> Result<ExtensionResult<SymbolOf<P>, P::Output>> {
        match self {
            AdtExtenders::Nop => Ok(ExtensionResult::Empty),
            AdtExtenders::ExtendBestEffort => match extend_best_effort(analyzer, ads) {
                Err(LearningError::HypothesisModified) => {
                    debug!("hypothesis was modified, dropping extension of {ads:?}");
                    Ok(ExtensionResult::Empty)
                }
                other => other,
            },
        }
    }
}

fn step<P: PartialTransitionAnalyzer>(
    analyzer: &mut P,
    state: StateId,
    symbol: SymbolOf<P>,
) -> Result<(StateId, P::Output)> {
    if !analyzer.is_transition_defined(state, symbol)? {
        analyzer.close_transition(state, symbol)?;
    }
    analyzer
        .hypothesis()
        .transition(state, symbol)
        .ok_or_else(|| {
            LearningError::illegal(format!(
                "transition of {state} on {} is still open",
                symbol.show()
            ))
        })
}

fn extend_best_effort<P: PartialTransitionAnalyzer>(
    analyzer: &mut P,
    ads: NodeId,
) -> Result<ExtensionResult<SymbolOf<P>, P::Output>> {
    let adt = analyzer.adt();
    let parent = match adt.parent(ads) {
        Some(parent) if adt.is_reset(parent) => parent,
        _ => return Ok(ExtensionResult::Empty),
    };
    let (parent_input, parent_output) = adt.build_trace_for_node(parent);
    let states = adt.collect_states(ads);
    if states.len() < 2 {
        return Ok(ExtensionResult::Empty);
    }
    let symbols: Vec<_> = analyzer.hypothesis().alphabet().universe().collect();

    let mut targets = Vec::with_capacity(states.len());
    for state in states {
        let mut current = state;
        let mut outputs = Vec::with_capacity(parent_input.len());
        for &symbol in &parent_input {
            let (successor, output) = step(analyzer, current, symbol)?;
            outputs.push(output);
            current = successor;
        }
        if Word::from(outputs) != parent_output {
            let hypothesis = analyzer.hypothesis();
            let access = hypothesis
                .access_sequence(state)
                .cloned()
                .ok_or_else(|| LearningError::illegal(format!("state {state} does not exist")))?;
            let access_output = hypothesis.compute_output(&access).ok_or_else(|| {
                LearningError::illegal(format!("access sequence {access} is not defined"))
            })?;
            return Ok(ExtensionResult::Counterexample(Query::counterexample(
                access.concat(&parent_input),
                access_output.concat(&parent_output),
            )));
        }
        if targets.iter().any(|(other, _)| *other == current) {
            return Ok(ExtensionResult::Empty);
        }
        targets.push((current, state));
    }

    match compute_ads(&symbols, &targets, |state, symbol| step(analyzer, state, symbol))? {
        Some(replacement) => Ok(ExtensionResult::Replacement(replacement)),
        None => Ok(ExtensionResult::Empty),
    }
}
