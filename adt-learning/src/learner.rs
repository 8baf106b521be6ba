use std::collections::VecDeque;

use automata_core::{
    math::{HashSet, Set},
    prelude::*,
};
use tracing::{debug, trace, warn};

use crate::{
    adt::{Adt, AdtNode, NodeId},
    bridge::ObservationTreeBridge,
    config::{
        AdtExtenders, ExtensionResult, LeafSplitters, PartialTransitionAnalyzer,
        ReplacementResult, SubtreeReplacers,
    },
    counterexample::find_suffix_index,
    hypothesis::{AdtHypothesis, StateId, TransitionId},
    oracle::{MembershipOracle, SymbolQueryOracle},
    query::Query,
    sul::Sul,
    LearningError, Result,
};

type QueryFor<A, T> = Query<<A as Alphabet>::Symbol, <T as Sul>::Output>;
type AdtFor<A, T> = Adt<<A as Alphabet>::Symbol, <T as Sul>::Output>;

/// A snapshot of an [`AdtLearner`], consisting of the hypothesis, the tree and the
/// counterexamples seen so far. It can be used to continue learning later on with
/// [`AdtLearner::resume`].
#[derive(Clone, PartialEq)]
pub struct AdtLearnerState<A: Alphabet, O: Color> {
    hypothesis: AdtHypothesis<A, O>,
    adt: Adt<A::Symbol, O>,
    counterexamples: Set<Query<A::Symbol, O>>,
}

impl<A: Alphabet, O: Color> AdtLearnerState<A, O> {
    pub fn hypothesis(&self) -> &AdtHypothesis<A, O> {
        &self.hypothesis
    }

    pub fn adt(&self) -> &Adt<A::Symbol, O> {
        &self.adt
    }

    /// Counterexamples that are checked again after every refinement.
    pub fn counterexamples(&self) -> impl Iterator<Item = &Query<A::Symbol, O>> {
        self.counterexamples.iter()
    }
}

/// Configures and creates an [`AdtLearner`]. Every strategy that is not set explicitly takes
/// its default value.
pub struct AdtLearnerBuilder<A, T> {
    alphabet: A,
    sul: T,
    leaf_splitter: LeafSplitters,
    adt_extender: AdtExtenders,
    subtree_replacer: SubtreeReplacers,
    use_observation_tree: bool,
}

impl<A: Alphabet, T: Sul<Input = A::Symbol>> AdtLearnerBuilder<A, T> {
    pub fn new(alphabet: A, sul: T) -> Self {
        Self {
            alphabet,
            sul,
            leaf_splitter: LeafSplitters::default(),
            adt_extender: AdtExtenders::default(),
            subtree_replacer: SubtreeReplacers::default(),
            use_observation_tree: true,
        }
    }

    pub fn with_leaf_splitter(mut self, leaf_splitter: LeafSplitters) -> Self {
        self.leaf_splitter = leaf_splitter;
        self
    }

    pub fn with_adt_extender(mut self, adt_extender: AdtExtenders) -> Self {
        self.adt_extender = adt_extender;
        self
    }

    pub fn with_subtree_replacer(mut self, subtree_replacer: SubtreeReplacers) -> Self {
        self.subtree_replacer = subtree_replacer;
        self
    }

    /// If enabled, queries whose answer is already recorded in the observation tree do not
    /// reach the system under learning.
    pub fn use_observation_tree(mut self, use_observation_tree: bool) -> Self {
        self.use_observation_tree = use_observation_tree;
        self
    }

    pub fn build(self) -> AdtLearner<A, T> {
        let symbols: Vec<_> = self.alphabet.universe().collect();
        AdtLearner {
            oracle: ObservationTreeBridge::new(self.sul, symbols, self.use_observation_tree),
            hypothesis: AdtHypothesis::new(self.alphabet.clone()),
            adt: Adt::new(),
            alphabet: self.alphabet,
            open_transitions: VecDeque::new(),
            open_counterexamples: VecDeque::new(),
            all_counterexamples: Set::default(),
            leaf_splitter: self.leaf_splitter,
            adt_extender: self.adt_extender,
            subtree_replacer: self.subtree_replacer,
        }
    }
}

/// Learns a Mealy machine by organizing the separating information in an adaptive
/// distinguishing tree (ADT). Each leaf of the tree identifies one state of the hypothesis,
/// the transitions of the hypothesis are determined by sifting their access sequence through
/// the tree.
///
/// Whenever a counterexample is processed, the learner tries to keep the number of resets in
/// the tree low. Temporary splitters that were introduced for a new state may be replaced by
/// an adaptive distinguishing sequence ([`AdtExtenders`]) and whole subtrees may be replaced by
/// cheaper ones ([`SubtreeReplacers`]). Every replacement is verified against the system before
/// it is installed.
pub struct AdtLearner<A: Alphabet, T: Sul<Input = A::Symbol>> {
    alphabet: A,
    oracle: ObservationTreeBridge<T>,
    hypothesis: AdtHypothesis<A, T::Output>,
    adt: AdtFor<A, T>,
    open_transitions: VecDeque<TransitionId>,
    open_counterexamples: VecDeque<QueryFor<A, T>>,
    all_counterexamples: Set<QueryFor<A, T>>,
    leaf_splitter: LeafSplitters,
    adt_extender: AdtExtenders,
    subtree_replacer: SubtreeReplacers,
}

impl<A: Alphabet, T: Sul<Input = A::Symbol>> AdtLearner<A, T> {
    /// Creates a learner with the default strategies.
    pub fn new(alphabet: A, sul: T) -> Self {
        AdtLearnerBuilder::new(alphabet, sul).build()
    }

    pub fn alphabet(&self) -> &A {
        &self.alphabet
    }

    /// The current hypothesis. Between two calls to the public interface all of its transitions
    /// are closed.
    pub fn hypothesis(&self) -> &AdtHypothesis<A, T::Output> {
        &self.hypothesis
    }

    /// Collects the current hypothesis into a [`MealyMachine`].
    pub fn get_hypothesis_model(&self) -> MealyMachine<A, T::Output> {
        self.hypothesis.collect_mealy()
    }

    pub fn adt(&self) -> &AdtFor<A, T> {
        &self.adt
    }

    /// The bridge through which all queries are posed.
    pub fn oracle(&self) -> &ObservationTreeBridge<T> {
        &self.oracle
    }

    /// Creates the initial state and closes all of its transitions.
    pub fn start_learning(&mut self) -> Result<()> {
        if self.hypothesis.initial().is_some() {
            return Err(LearningError::illegal("learning has already been started"));
        }
        let initial = self.hypothesis.add_initial_state();
        self.oracle.tree_mut().initialize(initial);
        self.oracle.initialize();
        self.adt.initialize(initial);

        let opened = self.create_open_transitions(initial)?;
        self.open_transitions.extend(opened);
        self.close_transitions()
    }

    /// Refines the hypothesis with the given counterexample. Returns `false` if the query does
    /// not contradict the hypothesis, in which case nothing is changed.
    pub fn refine_hypothesis(&mut self, query: &QueryFor<A, T>) -> Result<bool> {
        self.check_counterexample(query)?;
        if !query.is_counterexample(&self.hypothesis) {
            return Ok(false);
        }
        debug!("refining hypothesis with {query:?}");

        self.evaluate_subtree_replacement()?;
        self.open_counterexamples.push_back(query.clone());

        while !self.open_counterexamples.is_empty() {
            while let Some(current) = self.open_counterexamples.pop_front() {
                self.all_counterexamples.insert(current.clone());
                while self.refine_hypothesis_internal(&current)? {}
            }

            // replacements may turn earlier counterexamples into counterexamples again
            for old in &self.all_counterexamples {
                if old.is_counterexample(&self.hypothesis) {
                    self.open_counterexamples.push_back(old.clone());
                }
            }

            let root = self.adt.try_root()?;
            for leaf in self.adt.collect_leaves(root) {
                self.ensure_consistency(leaf)?;
            }
        }
        Ok(true)
    }

    /// Takes a snapshot of the hypothesis, the tree and the counterexamples. The tree of the
    /// snapshot is compacted, so two learners that hold the same tree produce equal snapshots no
    /// matter which subtrees they have replaced on the way.
    pub fn suspend(&self) -> Result<AdtLearnerState<A, T::Output>> {
        let (adt, moved) = self.adt.compacted()?;
        let mut hypothesis = self.hypothesis.clone();
        hypothesis.relocate_sift_nodes(&moved);
        Ok(AdtLearnerState {
            hypothesis,
            adt,
            counterexamples: self.all_counterexamples.clone(),
        })
    }

    /// Continues learning from a snapshot. The observation tree is rebuilt by posing the access
    /// sequence of every state to the system, followed by the traces that lead from every state
    /// and every transition to its leaf.
    pub fn resume(&mut self, state: AdtLearnerState<A, T::Output>) -> Result<()> {
        let resumed = state.hypothesis.alphabet();
        if let Some(unknown) = resumed.universe().find(|s| !self.alphabet.contains(*s)) {
            return Err(LearningError::invalid(format!(
                "resumed alphabet contains {} which is unknown to the learner",
                unknown.show()
            )));
        }
        if resumed != &self.alphabet {
            warn!(
                "current alphabet {:?} differs from resumed alphabet {:?}, add the missing symbols to continue consistently",
                self.alphabet, resumed
            );
        }
        self.hypothesis = state.hypothesis;
        self.adt = state.adt;
        self.all_counterexamples = state.counterexamples;
        self.open_transitions.clear();
        self.open_counterexamples.clear();

        if self.hypothesis.size() > 0 {
            self.rebuild_observations()?;
        }
        Ok(())
    }

    fn rebuild_observations(&mut self) -> Result<()> {
        let initial = self
            .hypothesis
            .initial()
            .ok_or_else(|| LearningError::illegal("resumed hypothesis has no initial state"))?;
        self.oracle.tree_mut().clear();
        self.oracle.tree_mut().initialize(initial);
        self.oracle.initialize();

        let states: Vec<_> = self.hypothesis.state_indices().collect();
        for &state in &states {
            let access = self.access(state)?;
            if access.is_empty() {
                continue;
            }
            let outputs = self.oracle.answer_suffix(&Word::epsilon(), &access)?;
            let last = outputs.last().ok_or_else(|| {
                LearningError::illegal(format!("no output for access sequence {access}"))
            })?;
            self.oracle.tree_mut().add_state(state, &access, last)?;
        }

        let symbols: Vec<_> = self.hypothesis.alphabet().universe().collect();
        for &state in &states {
            let access = self.access(state)?;
            let mut prefixes = vec![(access.clone(), state)];
            for &symbol in &symbols {
                if let Some(target) = self.hypothesis.successor(state, symbol) {
                    prefixes.push((access.append(symbol), target));
                }
            }
            for (prefix, target) in prefixes {
                let Some(leaf) = self.adt.leaf_of(target) else {
                    continue;
                };
                for (input, _) in self.adt.reset_separated_traces(leaf) {
                    if !input.is_empty() {
                        self.oracle.answer_suffix(&prefix, &input)?;
                    }
                }
            }
        }
        self.oracle.initialize();
        debug!(
            "rebuilt observation tree with {} nodes for {} states",
            self.oracle.tree().size(),
            self.hypothesis.size()
        );
        Ok(())
    }

    fn access(&self, state: StateId) -> Result<Word<A::Symbol>> {
        self.hypothesis
            .access_sequence(state)
            .cloned()
            .ok_or_else(|| LearningError::illegal(format!("state {state} does not exist")))
    }

    fn check_counterexample(&self, query: &QueryFor<A, T>) -> Result<()> {
        if self.hypothesis.initial().is_none() {
            return Err(LearningError::illegal("learning has not been started"));
        }
        let input = query.input();
        if input.is_empty() {
            return Err(LearningError::invalid(
                "a counterexample needs at least one symbol",
            ));
        }
        if let Some(unknown) = input
            .iter()
            .find(|symbol| !self.hypothesis.alphabet().contains(**symbol))
        {
            return Err(LearningError::invalid(format!(
                "{} is not part of the alphabet",
                unknown.show()
            )));
        }
        match query.output() {
            Some(output) if output.len() == query.suffix().len() => Ok(()),
            _ => Err(LearningError::invalid(format!(
                "{query:?} is not answered or its output has the wrong length"
            ))),
        }
    }

    /// Creates an open transition for every symbol, sifting starts at the root. The transitions
    /// are not enqueued.
    fn create_open_transitions(&mut self, state: StateId) -> Result<Vec<TransitionId>> {
        let root = self.adt.try_root()?;
        let symbols: Vec<_> = self.hypothesis.alphabet().universe().collect();
        symbols
            .into_iter()
            .map(|symbol| self.hypothesis.create_open_transition(state, symbol, root))
            .collect()
    }

    fn close_transitions(&mut self) -> Result<()> {
        while let Some(id) = self.open_transitions.pop_front() {
            self.close_transition_by_id(id)?;
        }
        Ok(())
    }

    /// The node at which sifting of `id` starts. Sift nodes that have been removed from the tree
    /// in the meantime are replaced by the root.
    fn sift_start(&self, id: TransitionId) -> Result<NodeId> {
        match self.hypothesis.try_transition(id)?.sift_node() {
            Some(node) if self.adt.contains(node) => Ok(node),
            _ => self.adt.try_root(),
        }
    }

    fn close_transition_by_id(&mut self, id: TransitionId) -> Result<()> {
        let transition = self.hypothesis.try_transition(id)?;
        if !transition.needs_sifting() {
            return Ok(());
        }
        let (source, input) = (transition.source(), transition.input());
        let access = self.access(source)?;
        let long_prefix = access.append(input);

        self.oracle.reset();
        for &symbol in &access {
            self.oracle.query(symbol)?;
        }
        let output = self.oracle.query(input)?;
        self.hypothesis.set_output(id, output.clone())?;

        let start = self.sift_start(id)?;
        let leaf = self.adt.sift(&mut self.oracle, &long_prefix, start)?;
        let target = match self.adt.state(leaf) {
            Some(target) => target,
            None => {
                let state = self.hypothesis.add_state(long_prefix.clone());
                self.adt.set_state(leaf, state)?;
                self.hypothesis.set_spanning_tree_edge(id, true)?;
                self.oracle
                    .tree_mut()
                    .add_state(state, &long_prefix, output)?;
                debug!("discovered state {state} with access sequence {long_prefix}");
                let opened = self.create_open_transitions(state)?;
                self.open_transitions.extend(opened);
                state
            }
        };
        self.hypothesis.set_target(id, Some(target))?;
        trace!("closed {id:?} from {source} on {} to {target}", input.show());
        Ok(())
    }

    fn refine_hypothesis_internal(&mut self, query: &QueryFor<A, T>) -> Result<bool> {
        let Some(index) = find_suffix_index(query, &self.hypothesis, &mut self.oracle)? else {
            return Ok(false);
        };
        if index < 1 {
            return Err(LearningError::illegal(format!(
                "decomposition of {query:?} yields an empty prefix"
            )));
        }
        let input = query.input();
        let u = input.prefix(index - 1);
        let ua = input.prefix(index);
        let a = input[index - 1];
        let v = input.skip(index);

        let reached = |word: &Word<A::Symbol>| {
            self.hypothesis
                .reached_state(word)
                .ok_or_else(|| LearningError::illegal(format!("{word} reaches no state")))
        };
        let (u_state, ua_state) = (reached(&u)?, reached(&ua)?);
        let ua_access = self.access(ua_state)?;
        let new_access = self.access(u_state)?.append(a);

        let new_state = self.hypothesis.add_state(new_access.clone());
        let old_transition = self.hypothesis.try_transition_id(u_state, a)?;
        self.hypothesis.set_target(old_transition, Some(new_state))?;
        self.hypothesis
            .set_spanning_tree_edge(old_transition, true)?;
        let old_output = self
            .hypothesis
            .try_transition(old_transition)?
            .output()
            .cloned()
            .ok_or_else(|| LearningError::illegal(format!("{old_transition:?} has no output")))?;
        debug!(
            "decomposed {input} at {index}, new state {new_state} splits off from {ua_state}"
        );

        let node_to_split = self
            .adt
            .leaf_of(ua_state)
            .ok_or_else(|| LearningError::illegal(format!("state {ua_state} has no leaf")))?;

        // the new state was sifted into the leaf of the old one, so it shares all of its traces
        self.oracle
            .tree_mut()
            .add_state(new_state, &new_access, old_output)?;
        self.oracle
            .tree_mut()
            .add_trace_for_node(new_state, &self.adt, node_to_split)?;

        let (previous_trace, _) = self.adt.build_trace_for_node(node_to_split);
        let extension =
            self.oracle
                .tree()
                .find_separating_word_after(ua_state, new_state, &previous_trace);
        let new_leaf = match extension {
            Some(extension) => {
                let splitter = previous_trace.concat(&extension);
                let (old_output, new_output) =
                    self.recorded_outputs(ua_state, new_state, &splitter)?;
                self.adt.extend_leaf(
                    node_to_split,
                    &splitter,
                    &old_output,
                    &new_output,
                    self.leaf_splitter,
                )?
            }
            None => {
                let ua_output = self.oracle.answer_query(&ua_access, &v)?;
                self.oracle.tree_mut().add_trace(ua_state, &v, &ua_output)?;
                let new_output = self.oracle.answer_query(&new_access, &v)?;
                self.oracle
                    .tree_mut()
                    .add_trace(new_state, &v, &new_output)?;

                let splitter = match self.oracle.tree().find_separating_word(ua_state, new_state) {
                    Some(separator) if separator.len() <= v.len() => separator,
                    _ => v,
                };
                let (old_output, new_output) =
                    self.recorded_outputs(ua_state, new_state, &splitter)?;
                self.adt.split_leaf(
                    node_to_split,
                    &splitter,
                    &old_output,
                    &new_output,
                    self.leaf_splitter,
                )?
            }
        };
        self.adt.set_state(new_leaf, new_state)?;

        let temporary_splitter = self.adt.start_of_ads(node_to_split);
        let new_transitions = self.create_open_transitions(new_state)?;
        let to_refine = self.hypothesis.incoming_non_tree(ua_state)?;
        for &id in &to_refine {
            self.hypothesis.set_target(id, None)?;
            self.hypothesis.set_sift_node(id, temporary_splitter)?;
        }

        let finalized = self.evaluate_adt_extension(temporary_splitter)?;

        for id in to_refine {
            if self.hypothesis.try_transition(id)?.needs_sifting() {
                self.hypothesis.set_sift_node(id, finalized)?;
                self.open_transitions.push_back(id);
            }
        }
        for id in new_transitions {
            if self.hypothesis.try_transition(id)?.needs_sifting() {
                self.open_transitions.push_back(id);
            }
        }
        self.close_transitions()?;
        Ok(true)
    }

    fn recorded_outputs(
        &self,
        first: StateId,
        second: StateId,
        word: &Word<A::Symbol>,
    ) -> Result<(Word<T::Output>, Word<T::Output>)> {
        let tree = self.oracle.tree();
        match (tree.trace(first, word), tree.trace(second, word)) {
            (Some(old), Some(new)) => Ok((old, new)),
            _ => Err(LearningError::illegal(format!(
                "outputs of {first} and {second} on {word} are not recorded"
            ))),
        }
    }

    /// Asks the extender for a replacement of the temporary ADS starting in `ads`. Returns the
    /// start of the ADS through which the affected transitions are sifted.
    fn evaluate_adt_extension(&mut self, ads: NodeId) -> Result<NodeId> {
        let extender = self.adt_extender;
        let extension = match extender.compute_extension(self, ads)? {
            ExtensionResult::Empty => return Ok(ads),
            ExtensionResult::Counterexample(query) => {
                debug!("extension of {ads:?} witnessed {query:?}");
                self.open_counterexamples.push_back(query);
                return Ok(ads);
            }
            ExtensionResult::Replacement(extension) => extension,
        };
        let node_to_replace = match self.adt.parent(ads) {
            Some(parent) if self.adt.is_reset(parent) => parent,
            _ => return Ok(ads),
        };

        if let Err(error) = self.validate_ads(node_to_replace, &extension, &[]) {
            return match error {
                LearningError::InvalidArgument(reason) => {
                    warn!("skipping extension of {ads:?}: {reason}");
                    Ok(ads)
                }
                other => Err(other),
            };
        }
        let replacement = self.verify_ads(node_to_replace, &extension, &[])?;

        // verification may have introduced reset nodes
        let old_costs = self.adt.effective_resets(node_to_replace);
        let new_costs = replacement.effective_resets(replacement.try_root()?);
        debug!("extension of {ads:?} costs {new_costs} resets instead of {old_costs}");
        if new_costs >= old_costs {
            return Ok(ads);
        }

        let installed = self.adt.replace_node(node_to_replace, &replacement)?;
        let finalized = self.adt.start_of_ads(installed);
        let states = extension.collect_states(extension.try_root()?);
        self.resift_affected_transitions(&states, finalized)?;
        Ok(finalized)
    }

    /// Asks the replacer for cheaper subtrees and installs all that survive validation and
    /// verification.
    fn evaluate_subtree_replacement(&mut self) -> Result<()> {
        if self.hypothesis.size() == 1 {
            return Ok(());
        }
        let proposals = self.subtree_replacer.compute_replacements(
            &self.hypothesis,
            self.hypothesis.alphabet(),
            &self.adt,
        )?;

        let mut accepted = vec![];
        for ReplacementResult {
            node_to_replace,
            replacement,
            cutout,
        } in proposals
        {
            if let Err(error) = self.validate_ads(node_to_replace, &replacement, &cutout) {
                match error {
                    LearningError::InvalidArgument(reason) => {
                        warn!("skipping replacement of {node_to_replace:?}: {reason}");
                        continue;
                    }
                    other => return Err(other),
                }
            }
            let verified = self.verify_ads(node_to_replace, &replacement, &cutout)?;

            // verification may have introduced reset nodes
            let old_costs = self.adt.effective_resets(node_to_replace);
            let new_costs = verified.effective_resets(verified.try_root()?);
            debug!("replacement of {node_to_replace:?} costs {new_costs} resets instead of {old_costs}");
            if new_costs < old_costs {
                accepted.push((node_to_replace, verified));
            }
        }

        for (node_to_replace, replacement) in accepted {
            if !self.adt.contains(node_to_replace) {
                continue;
            }
            let installed = self.adt.replace_node(node_to_replace, &replacement)?;
            let start = self.adt.start_of_ads(installed);
            let states = self.adt.collect_states(installed);
            self.resift_affected_transitions(&states, start)?;
        }
        self.close_transitions()
    }

    /// Checks that `new` covers exactly the states of `old` (up to the `cutout`) and that its
    /// traces agree with the hypothesis. Violations are reported as invalid arguments.
    fn validate_ads(&self, old: NodeId, new: &AdtFor<A, T>, cutout: &[StateId]) -> Result<()> {
        let root = self.adt.try_root()?;
        let candidates = if self.adt.is_reset(old) {
            self.adt.collect_reset_nodes(root)
        } else {
            self.adt.collect_ads_nodes(root)
        };
        if !candidates.contains(&old) {
            return Err(LearningError::invalid(format!(
                "subtree {old:?} to replace does not exist"
            )));
        }

        let new_leaves = new.collect_leaves(new.try_root()?);
        let old_states: HashSet<_> = self.adt.collect_states(old).into_iter().collect();
        let mut new_states: HashSet<_> = new_leaves.iter().filter_map(|l| new.state(*l)).collect();
        new_states.extend(cutout.iter().copied());
        if old_states != new_states {
            return Err(LearningError::invalid(format!(
                "replacement of {old:?} does not cover the same states"
            )));
        }

        let (parent_input, _) = self.adt.build_trace_for_node(old);
        for leaf in new_leaves {
            let state = new
                .state(leaf)
                .ok_or_else(|| LearningError::invalid(format!("{leaf:?} has no state")))?;
            let (input, output) = new.build_trace_for_node(leaf);
            let prefix = self.access(state)?.concat(&parent_input);
            if self.hypothesis.compute_suffix_output(&prefix, &input).as_ref() != Some(&output) {
                return Err(LearningError::invalid(format!(
                    "trace {input} of state {state} does not match the hypothesis"
                )));
            }
        }
        Ok(())
    }

    /// Runs the replacement on the system. Diverging outputs are enqueued as counterexamples
    /// and the replacement is rebuilt from the outputs that were actually observed. States
    /// that can not be told apart this way are separated by [`Self::resolve_ambiguities`].
    fn verify_ads(
        &mut self,
        node_to_replace: NodeId,
        replacement: &AdtFor<A, T>,
        cutout: &[StateId],
    ) -> Result<AdtFor<A, T>> {
        let (parent_input, parent_output) = self.adt.build_trace_for_node(node_to_replace);
        let mut result: Option<AdtFor<A, T>> = None;

        for leaf in replacement.collect_leaves(replacement.try_root()?) {
            let state = replacement
                .state(leaf)
                .ok_or_else(|| LearningError::illegal(format!("{leaf:?} has no state")))?;
            let (ads_input, ads_output) = replacement.build_trace_for_node(leaf);
            let access = self.access(state)?;

            self.oracle.reset();
            for &symbol in access.iter().chain(parent_input.iter()) {
                self.oracle.query(symbol)?;
            }
            let mut inputs = Vec::with_capacity(ads_input.len());
            let mut outputs = Vec::with_capacity(ads_input.len());
            let mut equal = true;
            for (&symbol, expected) in ads_input.iter().zip(ads_output.iter()) {
                let observed = self.oracle.query(symbol)?;
                inputs.push(symbol);
                equal = &observed == expected;
                outputs.push(observed);
                if !equal {
                    break;
                }
            }
            let (trace_input, trace_output) = (Word::from(inputs), Word::from(outputs));

            if !equal {
                let access_output = self.hypothesis.compute_output(&access).ok_or_else(|| {
                    LearningError::illegal(format!("access sequence {access} is not defined"))
                })?;
                let counterexample = Query::counterexample(
                    access.concat(&parent_input).concat(&trace_input),
                    access_output.concat(&parent_output).concat(&trace_output),
                );
                debug!("verification witnessed {counterexample:?}");
                self.open_counterexamples.push_back(counterexample);
            }

            if result.is_none() {
                result = Some(Adt::from_trace(&trace_input, &trace_output, state)?);
            } else if let Some(adt) = result.as_mut() {
                if !adt.merge_trace(&trace_input, &trace_output, state)? {
                    self.resolve_ambiguities(node_to_replace, adt, state)?;
                }
            }
        }

        let mut result =
            result.ok_or_else(|| LearningError::illegal("replacement has no leaves"))?;
        for &state in cutout {
            self.resolve_ambiguities(node_to_replace, &mut result, state)?;
        }
        Ok(result)
    }

    /// Sifts `state` through `ads`. If it ends up in the leaf of another state, that leaf is
    /// replaced by a reset node followed by the separating trace of both states in the current
    /// tree.
    fn resolve_ambiguities(
        &mut self,
        node_to_replace: NodeId,
        ads: &mut AdtFor<A, T>,
        state: StateId,
    ) -> Result<()> {
        let (parent_input, _) = self.adt.build_trace_for_node(node_to_replace);
        let access = self.access(state)?;
        self.oracle.reset();
        for &symbol in access.iter().chain(parent_input.iter()) {
            self.oracle.query(symbol)?;
        }

        let mut current = ads.try_root()?;
        loop {
            let input = match ads.node(current)? {
                AdtNode::Leaf { .. } => break,
                AdtNode::Reset { child, .. } => {
                    current = *child;
                    self.oracle.reset();
                    for &symbol in &access {
                        self.oracle.query(symbol)?;
                    }
                    continue;
                }
                AdtNode::Symbol { input, .. } => *input,
            };
            let output = self.oracle.query(input)?;
            match ads.child_on(current, &output) {
                Some(child) => current = child,
                None => {
                    ads.add_leaf(current, output, Some(state))?;
                    return Ok(());
                }
            }
        }

        let other = ads
            .state(current)
            .ok_or_else(|| LearningError::illegal(format!("{current:?} has no state")))?;
        if other == state {
            return Ok(());
        }
        let leaf_of = |state: StateId| {
            self.adt
                .leaf_of(state)
                .ok_or_else(|| LearningError::illegal(format!("state {state} has no leaf")))
        };
        let lca = self.adt.find_lca(leaf_of(other)?, leaf_of(state)?)?;
        let symbol = self
            .adt
            .node(lca.node)?
            .input()
            .ok_or_else(|| LearningError::illegal(format!("{:?} reads no symbol", lca.node)))?;
        let (lca_input, lca_output) = self.adt.build_trace_for_node(lca.node);
        let separator = lca_input.append(symbol);

        let mut separating = Adt::from_trace(&separator, &lca_output.append(lca.first_output), other)?;
        if !separating.merge_trace(&separator, &lca_output.append(lca.second_output), state)? {
            return Err(LearningError::illegal(format!(
                "{separator} does not separate {other} and {state}"
            )));
        }
        ads.insert_reset(current, &separating)?;
        debug!("separated {state} from {other} with {separator} after a reset");
        Ok(())
    }

    /// Opens all non spanning tree transitions that point to one of `states` and lets them be
    /// sifted from `start`.
    fn resift_affected_transitions(&mut self, states: &[StateId], start: NodeId) -> Result<()> {
        for &state in states {
            for id in self.hypothesis.incoming_non_tree(state)? {
                self.hypothesis.set_target(id, None)?;
                self.hypothesis.set_sift_node(id, start)?;
                self.open_transitions.push_back(id);
            }
        }
        Ok(())
    }

    /// Compares the traces stored in the tree for the state of `leaf` with the hypothesis and
    /// enqueues a counterexample for every disagreement.
    fn ensure_consistency(&mut self, leaf: NodeId) -> Result<()> {
        let state = self
            .adt
            .state(leaf)
            .ok_or_else(|| LearningError::illegal(format!("{leaf:?} has no state")))?;
        let access = self.access(state)?;
        let access_output = self.hypothesis.compute_output(&access).ok_or_else(|| {
            LearningError::illegal(format!("access sequence {access} is not defined"))
        })?;

        for (input, output) in self.adt.reset_separated_traces(leaf) {
            if self.hypothesis.compute_state_output(state, &input).as_ref() != Some(&output) {
                let counterexample =
                    Query::counterexample(access.concat(&input), access_output.concat(&output));
                debug!("tree contradicts hypothesis, enqueueing {counterexample:?}");
                self.open_counterexamples.push_back(counterexample);
            }
        }
        Ok(())
    }
}

impl<A: GrowingAlphabet, T: Sul<Input = A::Symbol>> AdtLearner<A, T> {
    /// Adds a symbol to the alphabet of the learner. If learning has already started, the
    /// transitions on the new symbol are closed right away.
    pub fn add_alphabet_symbol(&mut self, symbol: A::Symbol) -> Result<()> {
        self.alphabet.add_symbol(symbol);
        let sift_root = self.hypothesis.initial().and(self.adt.root());
        let opened = self.hypothesis.add_alphabet_symbol(symbol, sift_root)?;
        self.oracle.tree_mut().add_alphabet_symbol(symbol);
        if !opened.is_empty() {
            debug!("opened {} transitions on {}", opened.len(), symbol.show());
            self.open_transitions.extend(opened);
            self.close_transitions()?;
        }
        Ok(())
    }
}

impl<A: Alphabet, T: Sul<Input = A::Symbol>> PartialTransitionAnalyzer for AdtLearner<A, T> {
    type Alphabet = A;
    type Output = T::Output;

    fn hypothesis(&self) -> &AdtHypothesis<A, T::Output> {
        &self.hypothesis
    }

    fn adt(&self) -> &AdtFor<A, T> {
        &self.adt
    }

    fn is_transition_defined(&self, state: StateId, input: A::Symbol) -> Result<bool> {
        let id = self.hypothesis.try_transition_id(state, input)?;
        Ok(!self.hypothesis.try_transition(id)?.needs_sifting())
    }

    fn close_transition(&mut self, state: StateId, input: A::Symbol) -> Result<()> {
        let id = self.hypothesis.try_transition_id(state, input)?;
        if !self.hypothesis.try_transition(id)?.needs_sifting() {
            return Ok(());
        }
        let start = self.sift_start(id)?;
        let before = self.adt.collect_leaves(start).len();
        self.close_transition_by_id(id)?;
        if self.adt.collect_leaves(start).len() > before {
            return Err(LearningError::HypothesisModified);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
