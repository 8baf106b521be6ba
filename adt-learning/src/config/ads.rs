use automata_core::{
    math::{HashSet, Map},
    prelude::*,
};
use tracing::trace;

use crate::{adt::Adt, hypothesis::StateId, LearningError, Result};

/// An adaptive distinguishing sequence as it is found by the search, before it is turned into
/// an [`Adt`].
enum Ads<S, O> {
    Leaf(StateId),
    Symbol(S, Vec<(O, Ads<S, O>)>),
}

impl<S: Symbol, O: Color> Ads<S, O> {
    fn traces(&self, inputs: &mut Vec<S>, outputs: &mut Vec<O>, out: &mut Vec<(Word<S>, Word<O>, StateId)>) {
        match self {
            Ads::Leaf(state) => out.push((
                Word::from(inputs.clone()),
                Word::from(outputs.clone()),
                *state,
            )),
            Ads::Symbol(symbol, children) => {
                for (output, child) in children {
                    inputs.push(*symbol);
                    outputs.push(output.clone());
                    child.traces(inputs, outputs, out);
                    inputs.pop();
                    outputs.pop();
                }
            }
        }
    }

    fn into_adt(self) -> Result<Adt<S, O>> {
        let mut traces = vec![];
        self.traces(&mut vec![], &mut vec![], &mut traces);
        let mut traces = traces.into_iter();
        let (input, output, state) = traces
            .next()
            .ok_or_else(|| LearningError::illegal("distinguishing sequence without leaves"))?;
        let mut adt = Adt::from_trace(&input, &output, state)?;
        for (input, output, state) in traces {
            if !adt.merge_trace(&input, &output, state)? {
                return Err(LearningError::illegal(
                    "distinguishing sequence has conflicting traces",
                ));
            }
        }
        Ok(adt)
    }
}

struct Search<'a, S, F> {
    symbols: &'a [S],
    step: F,
    failed: HashSet<Vec<StateId>>,
    path: Vec<Vec<StateId>>,
}

impl<'a, S, O, F> Search<'a, S, F>
where
    S: Symbol,
    O: Color,
    F: FnMut(StateId, S) -> Result<(StateId, O)>,
{
    /// Each entry pairs the state the system is currently in with the state it started from.
    fn search(&mut self, current: &[(StateId, StateId)]) -> Result<Option<Ads<S, O>>> {
        if let [(_, label)] = current {
            return Ok(Some(Ads::Leaf(*label)));
        }
        let mut key: Vec<_> = current.iter().map(|(state, _)| *state).collect();
        key.sort_unstable();
        if self.failed.contains(&key) || self.path.contains(&key) {
            return Ok(None);
        }

        self.path.push(key.clone());
        let mut found = None;
        'symbols: for &symbol in self.symbols {
            let mut blocks: Map<O, Vec<(StateId, StateId)>> = Map::default();
            for &(state, label) in current {
                let (successor, output) = (self.step)(state, symbol)?;
                let block = blocks.entry(output).or_default();
                if block.iter().any(|(other, _)| *other == successor) {
                    continue 'symbols;
                }
                block.push((successor, label));
            }

            let mut children = Vec::with_capacity(blocks.len());
            for (output, block) in blocks {
                match self.search(&block)? {
                    Some(child) => children.push((output, child)),
                    None => continue 'symbols,
                }
            }
            found = Some(Ads::Symbol(symbol, children));
            break;
        }
        self.path.pop();

        if found.is_none() {
            trace!("no distinguishing sequence for {key:?}");
            self.failed.insert(key);
        }
        Ok(found)
    }
}

/// Searches an adaptive distinguishing sequence for `targets`. Each target pairs the state in
/// which the sequence starts with the state that the resulting leaf identifies. The function
/// `step` computes successor and output of a transition.
pub fn compute_ads<S, O, F>(
    symbols: &[S],
    targets: &[(StateId, StateId)],
    step: F,
) -> Result<Option<Adt<S, O>>>
where
    S: Symbol,
    O: Color,
    F: FnMut(StateId, S) -> Result<(StateId, O)>,
{
    if targets.is_empty() {
        return Ok(None);
    }
    let mut search = Search {
        symbols,
        step,
        failed: HashSet::default(),
        path: vec![],
    };
    match search.search(targets)? {
        Some(ads) => Ok(Some(ads.into_adt()?)),
        None => Ok(None),
    }
}

/// Like [`compute_ads`], but if no sequence exists for all targets, each target is left out in
/// turn. Returns the sequence together with the state of the target that was left out.
pub fn compute_best_effort_ads<S, O, F>(
    symbols: &[S],
    targets: &[(StateId, StateId)],
    mut step: F,
) -> Result<Option<(Adt<S, O>, Vec<StateId>)>>
where
    S: Symbol,
    O: Color,
    F: FnMut(StateId, S) -> Result<(StateId, O)>,
{
    if let Some(adt) = compute_ads(symbols, targets, &mut step)? {
        return Ok(Some((adt, vec![])));
    }
    if targets.len() <= 2 {
        return Ok(None);
    }
    for skipped in 0..targets.len() {
        let remaining: Vec<_> = targets
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skipped)
            .map(|(_, target)| *target)
            .collect();
        if let Some(adt) = compute_ads(symbols, &remaining, &mut step)? {
            return Ok(Some((adt, vec![targets[skipped].1])));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(mm: &MealyMachine<CharAlphabet, u8>) -> impl FnMut(StateId, char) -> Result<(StateId, u8)> + '_ {
        |state, symbol| {
            mm.transition(state, symbol)
                .ok_or_else(|| LearningError::illegal("undefined"))
        }
    }

    #[test_log::test]
    fn distinguishing_sequences() {
        // counter modulo three on a, b reveals whether the counter is zero
        let mm = MealyBuilder::default()
            .with_transitions([
                (0, 'a', 0, 1),
                (1, 'a', 0, 2),
                (2, 'a', 0, 0),
                (0, 'b', 1, 0),
                (1, 'b', 0, 1),
                (2, 'b', 0, 2),
            ])
            .into_mealy(0);
        let symbols = ['a', 'b'];
        let targets = [(0, 0), (1, 1), (2, 2)];
        let adt = compute_ads(&symbols, &targets, step(&mm)).unwrap().unwrap();
        let root = adt.root().unwrap();
        assert_eq!(adt.collect_leaves(root).len(), 3);
        assert_eq!(adt.effective_resets(root), 0);
        let mut states = adt.collect_states(root);
        states.sort();
        assert_eq!(states, vec![0, 1, 2]);
    }

    #[test_log::test]
    fn best_effort_leaves_out_a_state() {
        // q1 and q2 only differ in their successors, which are merged by every symbol
        let mm = MealyBuilder::default()
            .with_transitions([
                (0, 'a', 1, 0),
                (1, 'a', 0, 0),
                (2, 'a', 0, 0),
            ])
            .into_mealy(0);
        let symbols = ['a'];
        let targets = [(0, 0), (1, 1), (2, 2)];
        assert!(compute_ads(&symbols, &targets, step(&mm)).unwrap().is_none());
        let (adt, cutout) = compute_best_effort_ads(&symbols, &targets, step(&mm))
            .unwrap()
            .unwrap();
        assert_eq!(cutout, vec![1]);
        assert_eq!(adt.collect_states(adt.root().unwrap()), vec![0, 2]);
    }
}
