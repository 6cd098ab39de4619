use crate::builder::Config;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::observer::Observer;
use crate::search::{Forker, Forking, Policy, Progress, Search};
use crate::stats::Stats;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// The solutions returned by [`Dlx::solve`]: each one lists the labels of
/// the choices it consists of, in the order they were chosen.
pub type Solutions<T> = Arc<[Vec<T>]>;

/// The fixed parameters of a [`Dlx`] instance, taken from its [`Config`].
pub(crate) struct Settings {
    pub(crate) primary_constraints: usize,
    pub(crate) secondary_constraints: usize,
    pub(crate) forking: Option<Forking>,
    pub(crate) policy: Policy,
    pub(crate) observer: Arc<dyn Observer>,
}

/// The choices registered so far.
struct Problem<T> {
    matrix: Matrix,
    labels: Vec<T>,
}

/// The cached result of a successful run.
struct Solved<T> {
    solutions: Solutions<T>,
    stats: Stats,
}

/// The lifecycle of a [`Dlx`] instance. Choices can only be added while
/// initializing; `Solving` is entered exactly once.
enum State<T> {
    Initializing(Problem<T>),
    Solving,
    Solved(Solved<T>),
    Broken,
}

/// An exact cover problem solved by Knuth's Algorithm DLX.
///
/// Choices are registered with [`Self::add_choice`], then [`Self::solve`]
/// runs the search once and caches its result. Both take `&self`, so an
/// instance can be shared between threads: late callers of `solve` block
/// until the first one has finished and then receive the same solutions.
///
/// Any protocol violation, like adding a choice after solving has started,
/// marks the instance as broken; from then on every operation fails with
/// [`Error::Broken`].
///
/// # Examples
///
/// The following program solves the toy problem from Figure 3 of Knuth's
/// paper "Dancing links", [arXiv:cs/0011047][dl] [cs.DS] (2000), whose
/// unique solution is $\\{AD,\\,BG,\\,CEF\\}$:
///
/// ```
/// use forking_dlx::Config;
///
/// let dlx = Config::new().constraints(7)?.into_dlx()?;
/// dlx.add_choice("C E F", [2, 4, 5])?;
/// dlx.add_choice("A D G", [0, 3, 6])?;
/// dlx.add_choice("B C F", [1, 2, 5])?;
/// dlx.add_choice("A D", [0, 3])?;
/// dlx.add_choice("B G", [1, 6])?;
/// dlx.add_choice("D E G", [3, 4, 6])?;
///
/// let solutions = dlx.solve()?;
/// assert_eq!(solutions.len(), 1);
/// let mut solution = solutions[0].clone();
/// solution.sort_unstable();
/// assert_eq!(solution, ["A D", "B G", "C E F"]);
/// assert_eq!(dlx.stats()?.solutions_found(), 1);
/// # Ok::<(), forking_dlx::Error>(())
/// ```
///
/// [dl]: https://arxiv.org/pdf/cs/0011047.pdf
pub struct Dlx<T> {
    state: Mutex<State<T>>,
    /// Signalled when the state leaves `Solving`.
    solved: Condvar,
    settings: Settings,
}

impl<T> Dlx<T> {
    /// Creates a solver with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ConstraintsNotSet`] if the configuration does not
    /// declare any constraint.
    pub fn new(config: Config) -> Result<Self> {
        let (matrix, settings) = config.into_parts()?;
        Ok(Self {
            state: Mutex::new(State::Initializing(Problem {
                matrix,
                labels: Vec::new(),
            })),
            solved: Condvar::new(),
            settings,
        })
    }

    /// Adds a new choice (row) to the matrix.
    ///
    /// `label` identifies the choice in the solutions returned by
    /// [`Self::solve`]. `indices` lists the constraints (columns) satisfied
    /// by the choice, in strictly increasing order: a row `1 0 0 1 0` is
    /// described by `[0, 3]`. Use a [`ChoiceBuilder`] to add choices whose
    /// indices are not sorted yet.
    ///
    /// # Errors
    ///
    /// A malformed choice is rejected with [`Error::EmptyChoice`],
    /// [`Error::UnorderedIndices`], [`Error::DuplicateIndex`] or
    /// [`Error::IndexOutOfRange`], leaving the matrix untouched. Adding a
    /// choice once solving has started fails with [`Error::AlreadySolving`]
    /// and breaks the instance.
    ///
    /// [`ChoiceBuilder`]: `crate::ChoiceBuilder`
    pub fn add_choice<I>(&self, label: T, indices: I) -> Result<()>
    where
        I: AsRef<[usize]>,
    {
        let mut state = self.lock();
        match &mut *state {
            State::Initializing(problem) => {
                problem.matrix.add_choice(indices.as_ref())?;
                problem.labels.push(label);
                Ok(())
            }
            State::Broken => Err(Error::Broken),
            State::Solving | State::Solved(_) => {
                log::error!("choice added after solving started; the solver is now broken");
                *state = State::Broken;
                self.solved.notify_all();
                Err(Error::AlreadySolving)
            }
        }
    }

    /// Retrieves statistics about the problem, the search tree and the
    /// solutions that have been found. If the problem is being solved by
    /// another thread, waits for it to finish.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotSolved`] before [`Self::solve`] has been called,
    /// and with [`Error::Broken`] if the instance is broken.
    pub fn stats(&self) -> Result<Stats> {
        let state = self.wait_while_solving(self.lock());
        match &*state {
            State::Initializing(_) => Err(Error::NotSolved),
            State::Solved(solved) => Ok(solved.stats.clone()),
            State::Solving | State::Broken => Err(Error::Broken),
        }
    }

    /// Locks the state, recovering it if another thread panicked while
    /// holding the lock. The state is never left half-updated.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while_solving<'a>(
        &'a self,
        mut state: MutexGuard<'a, State<T>>,
    ) -> MutexGuard<'a, State<T>> {
        while matches!(*state, State::Solving) {
            state = self
                .solved
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state
    }
}

impl<T> Dlx<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Solves the exact cover problem by executing Knuth's Algorithm DLX.
    /// The search runs only once; later calls return the cached result,
    /// waiting for the first call to finish if necessary.
    ///
    /// Returns the first solutions found, up to the configured maximum
    /// number of solutions to store.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Broken`] if the instance is broken. If a forked
    /// sub-search fails or the thread pool cannot be created, the first
    /// caller receives that error and the instance becomes broken.
    pub fn solve(&self) -> Result<Solutions<T>> {
        let problem = {
            let mut state = self.lock();
            match mem::replace(&mut *state, State::Solving) {
                State::Initializing(problem) => problem,
                other => {
                    *state = other;
                    let state = self.wait_while_solving(state);
                    return match &*state {
                        State::Solved(solved) => Ok(Arc::clone(&solved.solutions)),
                        _ => Err(Error::Broken),
                    };
                }
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(problem)));
        let mut state = self.lock();
        let result = match outcome {
            Ok(Ok(solved)) if matches!(*state, State::Solving) => {
                let solutions = Arc::clone(&solved.solutions);
                *state = State::Solved(solved);
                Ok(solutions)
            }
            Ok(Ok(_)) => Err(Error::Broken),
            Ok(Err(err)) => {
                *state = State::Broken;
                Err(err)
            }
            Err(payload) => {
                *state = State::Broken;
                self.solved.notify_all();
                drop(state);
                panic::resume_unwind(payload);
            }
        };
        self.solved.notify_all();
        result
    }

    /// Searches for solutions and assembles the statistics.
    fn run(&self, problem: Problem<T>) -> Result<Solved<T>> {
        let Problem { matrix, labels } = problem;
        let (choices, elements) = (matrix.rows(), matrix.elements());
        log::info!(
            "solving with dancing links: {choices} choices, {} constraints, {elements} elements",
            matrix.columns()
        );
        let start = Instant::now();

        let progress = Arc::new(Progress::new(
            self.settings.policy,
            Arc::clone(&self.settings.observer),
        ));
        let forker = self.settings.forking.map(Forker::new).transpose()?;
        let search = Search::new(
            matrix,
            labels.into(),
            self.settings.policy,
            progress,
            forker,
        );
        let findings = search.run()?;

        let stats = Stats::new(
            choices,
            self.settings.primary_constraints,
            self.settings.secondary_constraints,
            elements,
            findings.found,
            findings.profile,
        );
        log::info!(
            "found {} solutions in {:.3?}",
            stats.solutions_found(),
            start.elapsed()
        );
        Ok(Solved {
            solutions: findings.solutions.into(),
            stats,
        })
    }
}
