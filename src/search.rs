use crate::error::{Error, Result};
use crate::indices::CellIndex;
use crate::matrix::Matrix;
use crate::observer::Observer;
use crate::stats::Profile;
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Where and how wide to fork the search tree.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Forking {
    /// The level of the search tree whose branches become separate tasks;
    /// level 0 is the root.
    pub(crate) level: usize,
    /// The size of the thread pool, always greater than 1.
    pub(crate) threads: usize,
}

/// The policy for storing and counting solutions, and for reporting progress.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Policy {
    /// How many solutions are materialized at most.
    pub(crate) max_solutions: usize,
    /// Whether to keep searching after `max_solutions` have been found.
    pub(crate) count_all: bool,
    /// How often to notify the observer, in solutions.
    pub(crate) status_interval: Option<NonZeroUsize>,
}

impl Policy {
    /// The number of solutions after which a search stops, unless all
    /// solutions are counted. A search that stores nothing still stops at
    /// its first solution.
    fn limit(&self) -> usize {
        self.max_solutions.max(1)
    }

    /// Returns whether a search that found `found` solutions is over.
    fn stops_at(&self, found: usize) -> bool {
        !self.count_all && found >= self.limit()
    }
}

/// The running number of solutions found by a search and all of its forks,
/// kept only to notify the observer.
///
/// Unless all solutions are counted, the count saturates at the limit of
/// the policy: forks explore their subtrees independently and may find more
/// solutions than a single-threaded search would, but those are never
/// reported.
pub(crate) struct Progress {
    found: AtomicUsize,
    policy: Policy,
    observer: Arc<dyn Observer>,
}

impl Progress {
    pub(crate) fn new(policy: Policy, observer: Arc<dyn Observer>) -> Self {
        Self {
            found: AtomicUsize::new(0),
            policy,
            observer,
        }
    }

    /// Counts a new solution, notifying the observer at every status interval.
    fn record(&self) {
        let Some(interval) = self.policy.status_interval else {
            return;
        };
        let count = if self.policy.count_all {
            self.found.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            let limit = self.policy.limit();
            match self
                .found
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                    (n < limit).then_some(n + 1)
                }) {
                Ok(n) => n + 1,
                Err(_) => return,
            }
        };
        if count % interval == 0 {
            self.observer.solutions_found(count);
        }
    }
}

/// What a search, or one of its parts, hands back once it is done.
#[derive(Debug)]
pub(crate) struct Findings<T> {
    /// The stored solutions, in depth-first order.
    pub(crate) solutions: Vec<Vec<T>>,
    /// The number of solutions found, which is at least the number stored.
    pub(crate) found: usize,
    pub(crate) profile: Profile,
}

/// A finished fork, or the message of the panic that killed it.
type Outcome<T> = std::result::Result<Findings<T>, String>;

/// The parent's side of forking: the pool that runs the forked sub-searches,
/// the channel through which they report back, and the solutions that the
/// parent found by itself in between.
pub(crate) struct Forker<T> {
    level: usize,
    pool: rayon::ThreadPool,
    sender: Sender<(usize, Outcome<T>)>,
    receiver: Receiver<(usize, Outcome<T>)>,
    /// The next ticket. Tickets follow the depth-first order of the search.
    tickets: usize,
    /// The number of forks handed to the pool.
    spawned: usize,
    /// The parent's own solutions, each under its ticket.
    kept: Vec<(usize, Outcome<T>)>,
}

impl<T> Forker<T> {
    pub(crate) fn new(forking: Forking) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(forking.threads)
            .thread_name(|ix| format!("dlx-fork-{ix}"))
            .build()?;
        let (sender, receiver) = crossbeam_channel::unbounded();
        Ok(Self {
            level: forking.level,
            pool,
            sender,
            receiver,
            tickets: 0,
            spawned: 0,
            kept: Vec::new(),
        })
    }

    fn next_ticket(&mut self) -> usize {
        let ticket = self.tickets;
        self.tickets += 1;
        ticket
    }

    /// Files a solution found by the parent itself, in its place among the
    /// forks.
    fn keep(&mut self, solution: Option<Vec<T>>) {
        let ticket = self.next_ticket();
        let findings = Findings {
            solutions: solution.into_iter().collect(),
            found: 1,
            profile: Profile::default(),
        };
        self.kept.push((ticket, Ok(findings)));
    }
}

/// A depth-first search for exact covers over a [`Matrix`], implementing
/// Knuth's Algorithm X by means of dancing links.
pub(crate) struct Search<T> {
    matrix: Matrix,
    /// The labels of the choices, indexed by row.
    labels: Arc<[T]>,
    /// The cells of the choices made so far, one per level of recursion.
    stack: Vec<CellIndex>,
    /// The solutions materialized by this search (not by its forks).
    solutions: Vec<Vec<T>>,
    /// The number of solutions found by this search (not by its forks).
    found: usize,
    profile: Profile,
    policy: Policy,
    progress: Arc<Progress>,
    /// Present only in the top-level search, and only when forking is on.
    forker: Option<Forker<T>>,
}

impl<T> Search<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        matrix: Matrix,
        labels: Arc<[T]>,
        policy: Policy,
        progress: Arc<Progress>,
        forker: Option<Forker<T>>,
    ) -> Self {
        Self {
            matrix,
            labels,
            stack: Vec::new(),
            solutions: Vec::new(),
            found: 0,
            profile: Profile::default(),
            policy,
            progress,
            forker,
        }
    }

    /// Explores the whole search tree, waits for every fork and merges their
    /// results.
    ///
    /// The stored solutions and the number of solutions found are those of a
    /// single-threaded search with the same policy. If any fork failed,
    /// nothing is returned but the error.
    pub(crate) fn run(mut self) -> Result<Findings<T>> {
        self.search(0);
        self.join()?;
        Ok(Findings {
            solutions: self.solutions,
            found: self.found,
            profile: self.profile,
        })
    }

    /// Visits the subtree below the current partial solution, at level
    /// `depth` of the search tree.
    ///
    /// Returns `true` if the search must stop. The matrix is restored to its
    /// previous state in either case.
    fn search(&mut self, depth: usize) -> bool {
        let Some(column) = self.matrix.select_column() else {
            // Every primary column is covered.
            return self.record_solution();
        };
        self.profile.reach(depth);

        let updates = self.matrix.cover_column(column);
        self.profile.add_updates(depth, updates);
        let fork_here = self.forker.as_ref().is_some_and(|f| f.level == depth);
        let mut stop = false;
        let mut row = self.matrix.down(column);
        while row != column {
            self.profile.add_visit(depth);
            self.stack.push(row);
            // Cover the other columns of the row, from left to right.
            let mut j = self.matrix.right(row);
            while j != row {
                let updates = self.matrix.cover_column(j);
                self.profile.add_updates(depth, updates);
                j = self.matrix.right(j);
            }

            if fork_here {
                self.fork(depth + 1);
            } else {
                stop = self.search(depth + 1);
            }

            // Uncover them from right to left.
            self.stack.pop();
            let mut j = self.matrix.left(row);
            while j != row {
                self.matrix.uncover_column(j);
                j = self.matrix.left(j);
            }
            if stop {
                break;
            }
            row = self.matrix.down(row);
        }
        self.matrix.uncover_column(column);
        stop
    }

    /// Runs a forked sub-search to completion.
    fn explore(mut self, depth: usize) -> Findings<T> {
        self.search(depth);
        Findings {
            solutions: self.solutions,
            found: self.found,
            profile: self.profile,
        }
    }

    /// Counts the solution given by the current partial solution, stores it
    /// if the policy says so, and returns whether the search must stop.
    ///
    /// Each search counts on its own, so a fork stores and stops exactly as
    /// a single-threaded search of its subtree would.
    fn record_solution(&mut self) -> bool {
        self.progress.record();
        let ordinal = self.found;
        self.found += 1;
        let solution = (ordinal < self.policy.max_solutions).then(|| {
            self.stack
                .iter()
                .map(|&ix| self.labels[self.matrix.row_of(ix).get()].clone())
                .collect()
        });
        match self.forker.as_mut() {
            Some(forker) => forker.keep(solution),
            None => self.solutions.extend(solution),
        }
        self.policy.stops_at(self.found)
    }

    /// Hands the subtree below the current partial solution, which starts
    /// at level `depth`, to the thread pool.
    fn fork(&mut self, depth: usize) {
        let Some(forker) = self.forker.as_mut() else {
            return;
        };
        let (matrix, stack) = self.matrix.fork(&self.stack);
        let child = Search {
            matrix,
            labels: Arc::clone(&self.labels),
            stack,
            solutions: Vec::new(),
            found: 0,
            profile: Profile::default(),
            policy: self.policy,
            progress: Arc::clone(&self.progress),
            forker: None,
        };
        let ticket = forker.next_ticket();
        forker.spawned += 1;
        log::debug!("forking branch {ticket} at level {}", depth - 1);
        let sender = forker.sender.clone();
        forker.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || child.explore(depth)))
                .map_err(panic_message);
            // The receiver outlives every task, unless the parent itself
            // panicked; then nobody is waiting for the outcome anyway.
            let _ = sender.send((ticket, outcome));
        });
    }

    /// Waits for all forks and merges their findings with the parent's own
    /// solutions, in depth-first order.
    ///
    /// The concatenation is cut at the storage limit, which leaves the first
    /// solutions of the whole tree; without count-all, the total is clamped
    /// at the point where a single-threaded search would have stopped.
    fn join(&mut self) -> Result<()> {
        let Some(forker) = self.forker.take() else {
            return Ok(());
        };
        let Forker {
            pool,
            sender,
            receiver,
            spawned,
            kept,
            ..
        } = forker;
        // Once the tasks drop their clones, the channel disconnects.
        drop(sender);
        let mut outcomes: Vec<_> = receiver.iter().collect();
        drop(pool);
        if outcomes.len() != spawned {
            return Err(Error::ForkFailed(format!(
                "{} of {spawned} forks did not report back",
                spawned - outcomes.len()
            )));
        }
        outcomes.extend(kept);
        outcomes.sort_unstable_by_key(|(ticket, _)| *ticket);

        let mut found = 0;
        for (ticket, outcome) in outcomes {
            let findings = outcome.map_err(Error::ForkFailed)?;
            log::debug!(
                "joining branch {ticket} with {} of {} solutions stored",
                findings.solutions.len(),
                findings.found
            );
            found += findings.found;
            self.profile.absorb(&findings.profile);
            let room = self.policy.max_solutions.saturating_sub(self.solutions.len());
            self.solutions.extend(findings.solutions.into_iter().take(room));
        }
        self.found = if self.policy.count_all {
            found
        } else {
            found.min(self.policy.limit())
        };
        Ok(())
    }
}

/// Extracts a readable message from the payload of a panic.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LogObserver;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn policy(max_solutions: usize, count_all: bool) -> Policy {
        Policy {
            max_solutions,
            count_all,
            status_interval: None,
        }
    }

    fn search<L>(
        columns: usize,
        secondary: &BTreeSet<usize>,
        choices: Vec<(L, Vec<usize>)>,
        policy: Policy,
        forking: Option<Forking>,
    ) -> Search<L>
    where
        L: Clone + Send + Sync + 'static,
    {
        let mut matrix = Matrix::new(columns, secondary);
        let mut labels = Vec::new();
        for (label, indices) in choices {
            matrix.add_choice(&indices).unwrap();
            labels.push(label);
        }
        let progress = Arc::new(Progress::new(policy, Arc::new(LogObserver)));
        let forker = forking.map(|f| Forker::new(f).unwrap());
        Search::new(matrix, labels.into(), policy, progress, forker)
    }

    /// Builds a search for the $n$ queens problem, with ranks and files as
    /// primary columns and diagonals as secondary ones.
    fn queens(n: usize, policy: Policy, forking: Option<Forking>) -> Search<(usize, usize)> {
        let diagonals = 2 * n - 1;
        let secondary: BTreeSet<usize> = (2 * n..2 * n + 2 * diagonals).collect();
        let mut choices = Vec::new();
        for rank in 0..n {
            for file in 0..n {
                let a = rank + file;
                let b = rank + n - 1 - file;
                let indices = vec![rank, n + file, 2 * n + a, 2 * n + diagonals + b];
                choices.push(((rank, file), indices));
            }
        }
        search(2 * n + 2 * diagonals, &secondary, choices, policy, forking)
    }

    /// Builds a search for the ways to cover four constraints by singletons
    /// and pairs. Its solutions lie at levels 2, 3 and 4 of the search tree.
    fn pairs(policy: Policy, forking: Option<Forking>) -> Search<String> {
        let mut choices = Vec::new();
        for a in 0..4 {
            choices.push((a.to_string(), vec![a]));
            for b in a + 1..4 {
                choices.push((format!("{a}{b}"), vec![a, b]));
            }
        }
        search(4, &BTreeSet::new(), choices, policy, forking)
    }

    fn normalized(mut solutions: Vec<Vec<(usize, usize)>>) -> Vec<Vec<(usize, usize)>> {
        for solution in &mut solutions {
            solution.sort_unstable();
        }
        solutions.sort_unstable();
        solutions
    }

    #[test]
    fn finds_all_eight_queens_solutions() {
        let findings = queens(8, policy(100, false), None).run().unwrap();
        assert_eq!(findings.solutions.len(), 92);
        assert_eq!(findings.found, 92);
        assert!(findings.solutions.iter().all(|s| s.len() == 8));
        // The solution is found at level 8, which has no column to branch on.
        assert_eq!(findings.profile.visited_nodes.len(), 8);
    }

    #[test]
    fn search_restores_the_matrix() {
        let mut search = queens(5, policy(3, false), None);
        let before = format!("{:?}", search.matrix);
        assert!(search.search(0));
        assert_eq!(format!("{:?}", search.matrix), before);
        assert!(search.stack.is_empty());
        assert_eq!(search.solutions.len(), 3);
    }

    #[test]
    fn stores_up_to_the_cap_but_counts_everything() {
        let findings = queens(6, policy(1, true), None).run().unwrap();
        assert_eq!(findings.solutions.len(), 1);
        assert_eq!(findings.found, 4);
    }

    #[test]
    fn zero_cap_stops_at_the_first_solution() {
        let findings = queens(6, policy(0, false), None).run().unwrap();
        assert!(findings.solutions.is_empty());
        assert_eq!(findings.found, 1);
    }

    #[test]
    fn no_solution_for_three_queens() {
        let findings = queens(3, policy(10, true), None).run().unwrap();
        assert!(findings.solutions.is_empty());
        assert_eq!(findings.found, 0);
        assert!(findings.profile.visited_nodes[0] > 0);
    }

    #[test]
    fn forked_search_matches_single_threaded_search() {
        let expected = queens(8, policy(1000, false), None).run().unwrap();
        for level in 0..4 {
            let forking = Forking { level, threads: 3 };
            let findings = queens(8, policy(1000, false), Some(forking)).run().unwrap();
            assert_eq!(findings.found, expected.found, "level {level}");
            assert_eq!(findings.solutions, expected.solutions, "level {level}");
            assert_eq!(findings.profile, expected.profile, "level {level}");
        }
    }

    #[test]
    fn forked_search_stores_the_first_solutions() {
        for count_all in [false, true] {
            let expected = queens(8, policy(5, count_all), None).run().unwrap();
            assert_eq!(expected.found, if count_all { 92 } else { 5 });
            for level in 0..3 {
                let forking = Forking { level, threads: 4 };
                for _ in 0..10 {
                    let findings = queens(8, policy(5, count_all), Some(forking))
                        .run()
                        .unwrap();
                    assert_eq!(findings.solutions, expected.solutions, "level {level}");
                    assert_eq!(findings.found, expected.found, "level {level}");
                }
            }
        }

        let all = normalized(queens(8, policy(100, false), None).run().unwrap().solutions);
        let forking = Forking { level: 1, threads: 4 };
        let findings = queens(8, policy(5, true), Some(forking)).run().unwrap();
        for solution in normalized(findings.solutions) {
            assert!(all.contains(&solution));
        }
    }

    #[test]
    fn parent_solutions_keep_their_place_among_forks() {
        for (cap, count_all) in [(100, false), (3, false), (3, true), (0, false)] {
            let expected = pairs(policy(cap, count_all), None).run().unwrap();
            for level in 0..4 {
                let forking = Forking { level, threads: 2 };
                let findings = pairs(policy(cap, count_all), Some(forking)).run().unwrap();
                assert_eq!(findings.solutions, expected.solutions, "cap {cap}, level {level}");
                assert_eq!(findings.found, expected.found, "cap {cap}, level {level}");
            }
        }
        assert_eq!(pairs(policy(100, false), None).run().unwrap().found, 10);
    }

    #[test]
    fn observer_is_notified_at_every_interval() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let seen = Arc::clone(&seen);
            move |count: usize| seen.lock().unwrap().push(count)
        };
        let policy = Policy {
            max_solutions: 0,
            count_all: true,
            status_interval: NonZeroUsize::new(30),
        };
        let progress = Progress::new(policy, Arc::new(observer));
        for _ in 0..92 {
            progress.record();
        }
        assert_eq!(*seen.lock().unwrap(), [30, 60, 90]);
    }

    #[test]
    fn observer_is_not_notified_past_the_limit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let seen = Arc::clone(&seen);
            move |count: usize| seen.lock().unwrap().push(count)
        };
        let policy = Policy {
            max_solutions: 50,
            count_all: false,
            status_interval: NonZeroUsize::new(25),
        };
        let progress = Progress::new(policy, Arc::new(observer));
        for _ in 0..92 {
            progress.record();
        }
        assert_eq!(*seen.lock().unwrap(), [25, 50]);
    }

    #[test]
    fn panic_messages_are_extracted() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
