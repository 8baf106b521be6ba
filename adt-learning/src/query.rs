use std::fmt::Debug;

use automata_core::{mealy::SymbolOf, prelude::*};

/// A query consists of a prefix and a suffix, its output (once answered) is the output that
/// the system produces on the suffix after having read the prefix.
///
/// Counterexamples are queries with an empty prefix whose output covers the whole input.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Query<S, O> {
    prefix: Word<S>,
    suffix: Word<S>,
    output: Option<Word<O>>,
}

impl<S: Symbol, O: Color> Query<S, O> {
    /// Creates a new query that has not been answered yet.
    pub fn new(prefix: Word<S>, suffix: Word<S>) -> Self {
        Self {
            prefix,
            suffix,
            output: None,
        }
    }

    /// Creates a query that is answered with `output` on `suffix`.
    pub fn answered(prefix: Word<S>, suffix: Word<S>, output: Word<O>) -> Self {
        Self {
            prefix,
            suffix,
            output: Some(output),
        }
    }

    /// Creates a query with empty prefix, as is usual for counterexamples.
    pub fn counterexample(input: Word<S>, output: Word<O>) -> Self {
        Self::answered(Word::epsilon(), input, output)
    }

    pub fn prefix(&self) -> &Word<S> {
        &self.prefix
    }

    pub fn suffix(&self) -> &Word<S> {
        &self.suffix
    }

    /// The complete input, i.e. the concatenation of prefix and suffix.
    pub fn input(&self) -> Word<S> {
        self.prefix.concat(&self.suffix)
    }

    /// The output on the suffix, if the query has been answered.
    pub fn output(&self) -> Option<&Word<O>> {
        self.output.as_ref()
    }

    /// Answers the query.
    pub fn answer(&mut self, output: Word<O>) {
        self.output = Some(output);
    }

    /// Returns `true` if the query is answered and `hypothesis` disagrees with its output. A
    /// hypothesis that can not produce an output for the query disagrees as well.
    pub fn is_counterexample<M>(&self, hypothesis: &M) -> bool
    where
        M: Mealy<Output = O>,
        M::Alphabet: Alphabet<Symbol = S>,
    {
        match &self.output {
            None => false,
            Some(output) => {
                hypothesis.compute_suffix_output(&self.prefix, &self.suffix) != Some(output.clone())
            }
        }
    }
}

impl<S: Symbol, O: Color> Debug for Query<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Query[{}|{} / {:?}]",
            self.prefix, self.suffix, self.output
        )
    }
}

/// Type alias for the queries that are posed to learn a [`Mealy`] machine `M`.
pub type QueryOf<M> = Query<SymbolOf<M>, <M as Mealy>::Output>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterexample_detection() {
        let mm = MealyBuilder::default()
            .with_transitions([(0, 'a', 0, 0)])
            .into_mealy(0);
        let query = Query::counterexample(Word::from("aa"), Word::from(vec![0, 0]));
        assert!(!query.is_counterexample(&mm));
        let query = Query::answered(Word::from("a"), Word::from("a"), Word::from(vec![1]));
        assert_eq!(query.input(), Word::from("aa"));
        assert!(query.is_counterexample(&mm));
        assert!(!Query::<char, i32>::new(Word::epsilon(), Word::from("a")).is_counterexample(&mm));
    }
}
