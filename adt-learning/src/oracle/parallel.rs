use automata_core::prelude::*;
use crossbeam_channel::unbounded;
use tracing::{debug, trace};

use crate::{
    query::Query,
    sul::ForkableSul,
    LearningError, Result,
};

use super::MembershipOracle;

/// Answers batches of queries with a fixed number of forked [`crate::sul::Sul`]s, each of which lives on its
/// own worker thread for the duration of a batch. Jobs are handed out through a channel, so
/// workers that finish early pick up more work. Answers are written back in the order in which
/// the queries were given.
///
/// Batches that are smaller than `min_batch_size` are answered on the calling thread.
pub struct StaticParallelOracle<T: ForkableSul> {
    suls: Vec<T>,
    min_batch_size: usize,
}

impl<T> StaticParallelOracle<T>
where
    T: ForkableSul,
    T::Input: Send + Sync,
    T::Output: Send,
{
    /// Creates a new oracle with `workers` forks of `sul`.
    pub fn new(sul: T, workers: usize, min_batch_size: usize) -> Self {
        let workers = workers.max(1);
        let mut suls = Vec::with_capacity(workers);
        for _ in 1..workers {
            suls.push(sul.fork());
        }
        suls.push(sul);
        Self {
            suls,
            min_batch_size,
        }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.suls.len()
    }

    fn answer_with(sul: &mut T, prefix: &Word<T::Input>, suffix: &Word<T::Input>) -> Word<T::Output> {
        sul.reset();
        for &symbol in prefix {
            sul.step(symbol);
        }
        suffix.iter().map(|&symbol| sul.step(symbol)).collect()
    }
}

impl<T> MembershipOracle for StaticParallelOracle<T>
where
    T: ForkableSul,
    T::Input: Send + Sync,
    T::Output: Send,
{
    type Input = T::Input;
    type Output = T::Output;

    fn answer_query(
        &mut self,
        prefix: &Word<Self::Input>,
        suffix: &Word<Self::Input>,
    ) -> Result<Word<Self::Output>> {
        let sul = self
            .suls
            .last_mut()
            .ok_or_else(|| LearningError::illegal("parallel oracle without workers"))?;
        Ok(Self::answer_with(sul, prefix, suffix))
    }

    fn process_queries(&mut self, queries: &mut [Query<Self::Input, Self::Output>]) -> Result<()> {
        if queries.len() < self.min_batch_size || self.suls.len() == 1 {
            for query in queries.iter_mut() {
                let output = self.answer_query(query.prefix(), query.suffix())?;
                query.answer(output);
            }
            return Ok(());
        }
        debug!(
            "distributing {} queries over {} workers",
            queries.len(),
            self.suls.len()
        );

        let (job_sender, job_receiver) = unbounded::<(usize, &Word<T::Input>, &Word<T::Input>)>();
        let (answer_sender, answer_receiver) = unbounded();
        for (index, query) in queries.iter().enumerate() {
            job_sender
                .send((index, query.prefix(), query.suffix()))
                .map_err(|_| LearningError::illegal("job channel closed"))?;
        }
        drop(job_sender);

        std::thread::scope(|scope| {
            for (worker, sul) in self.suls.iter_mut().enumerate() {
                let jobs = job_receiver.clone();
                let answers = answer_sender.clone();
                scope.spawn(move || {
                    for (index, prefix, suffix) in jobs.iter() {
                        trace!("worker {worker} answers query {index}");
                        if answers
                            .send((index, Self::answer_with(sul, prefix, suffix)))
                            .is_err()
                        {
                            break;
                        }
                    }
                });
            }
        });
        drop(job_receiver);
        drop(answer_sender);

        let mut answers: Vec<_> = answer_receiver.iter().collect();
        if answers.len() != queries.len() {
            return Err(LearningError::illegal(format!(
                "expected {} answers but got {}",
                queries.len(),
                answers.len()
            )));
        }
        answers.sort_by_key(|(index, _)| *index);
        for (query, (_, output)) in queries.iter_mut().zip(answers) {
            query.answer(output);
        }
        Ok(())
    }
}
