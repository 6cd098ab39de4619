use crate::dlx::{Dlx, Settings};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::observer::{LogObserver, Observer};
use crate::search::{Forking, Policy};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// The shape of the matrix: how many columns, and which are secondary.
#[derive(Debug, Clone, Eq, PartialEq)]
struct Constraints {
    total: usize,
    secondary: BTreeSet<usize>,
}

/// The configuration of an exact cover problem.
///
/// Every setting is validated as soon as it is made. Once done, call
/// [`Self::choice_builder`] to add choices with unsorted constraint indices,
/// or [`Self::into_dlx`] to add strictly increasing ones directly.
///
/// # Examples
///
/// ```
/// use forking_dlx::Config;
///
/// let mut builder = Config::new()
///     .constraints_with_secondary(2, 1)?
///     .max_solutions(10)
///     .choice_builder()?;
/// builder.add_choice('a', [2, 0])?.add_choice('b', [1])?;
/// builder.add_choice('c', [1, 2])?.add_choice('d', [0])?;
/// let dlx = builder.build();
/// // {a, b}, {d, b} and {d, c}; the secondary constraint 2 is optional.
/// assert_eq!(dlx.solve()?.len(), 3);
/// # Ok::<(), forking_dlx::Error>(())
/// ```
#[derive(Clone)]
pub struct Config {
    constraints: Option<Constraints>,
    forking: Option<Forking>,
    max_solutions: usize,
    count_all: bool,
    status_interval: Option<NonZeroUsize>,
    observer: Arc<dyn Observer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            constraints: None,
            forking: None,
            max_solutions: 1,
            count_all: false,
            status_interval: None,
            observer: Arc::new(LogObserver),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("constraints", &self.constraints)
            .field("forking", &self.forking)
            .field("max_solutions", &self.max_solutions)
            .field("count_all", &self.count_all)
            .field("status_interval", &self.status_interval)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Starts a configuration with the defaults: no constraints, a single
    /// thread, one stored solution and no progress reports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares an exact cover problem without optional constraints.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoConstraints`] if `primary` is zero.
    pub fn constraints(self, primary: usize) -> Result<Self> {
        self.constraints_with_secondary(primary, 0)
    }

    /// Prepares a generalized exact cover problem whose first `primary`
    /// constraints must be satisfied exactly once, and whose last `secondary`
    /// constraints must be satisfied at most once.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoConstraints`] if there is no constraint at all.
    pub fn constraints_with_secondary(self, primary: usize, secondary: usize) -> Result<Self> {
        let total = primary + secondary;
        self.constraints_with_secondary_indices(total, primary..total)
    }

    /// Prepares a generalized exact cover problem with `total` constraints,
    /// where the ones listed in `secondary` must be satisfied at most once
    /// and all others exactly once.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoConstraints`] if `total` is zero, and with
    /// [`Error::SecondaryIndexOutOfRange`] if a secondary index is not less
    /// than `total`.
    pub fn constraints_with_secondary_indices<I>(mut self, total: usize, secondary: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        if total == 0 {
            return Err(Error::NoConstraints);
        }
        let secondary: BTreeSet<usize> = secondary.into_iter().collect();
        if let Some(&index) = secondary.last() {
            if index >= total {
                return Err(Error::SecondaryIndexOutOfRange {
                    index,
                    constraints: total,
                });
            }
        }
        self.constraints = Some(Constraints { total, secondary });
        Ok(self)
    }

    /// Enables multithreading with as many threads as there are logical
    /// CPUs. See [`Self::multithreading_with_threads`].
    pub fn multithreading(self, forking_level: usize) -> Self {
        let threads = NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN);
        self.forking(forking_level, threads)
    }

    /// Enables multithreading: the branches of the search tree at level
    /// `forking_level` (0 is the root) are explored by a pool of `threads`
    /// threads. A lower level reduces the overhead of forking but may leave
    /// threads idle. With a single thread, forking stays disabled.
    ///
    /// Multithreading is disabled by default.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoThreads`] if `threads` is zero.
    pub fn multithreading_with_threads(self, forking_level: usize, threads: usize) -> Result<Self> {
        let threads = NonZeroUsize::new(threads).ok_or(Error::NoThreads)?;
        Ok(self.forking(forking_level, threads))
    }

    fn forking(mut self, level: usize, threads: NonZeroUsize) -> Self {
        self.forking = (threads.get() > 1).then_some(Forking {
            level,
            threads: threads.get(),
        });
        self
    }

    /// Disables multithreading, which avoids the overhead of forking on small
    /// problems. This is the default.
    pub fn disable_multithreading(mut self) -> Self {
        self.forking = None;
        self
    }

    /// Sets how many solutions [`Dlx::solve`] stores and returns at most.
    /// Unless [all solutions are counted](Self::count_all_solutions), the
    /// search stops once this many solutions are found, or at the first one
    /// if the limit is zero.
    ///
    /// Defaults to 1.
    pub fn max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    /// Makes the search continue after [`Self::max_solutions`] solutions have
    /// been found, so that [`Stats::solutions_found`] reports the total.
    ///
    /// Defaults to `false`.
    ///
    /// [`Stats::solutions_found`]: `crate::Stats::solutions_found`
    pub fn count_all_solutions(mut self, count_all: bool) -> Self {
        self.count_all = count_all;
        self
    }

    /// Reports progress to the [observer](Self::observer) every `interval`
    /// solutions. An interval of zero disables reporting.
    pub fn status_interval(mut self, interval: usize) -> Self {
        self.status_interval = NonZeroUsize::new(interval);
        self
    }

    /// Disables progress reports. This is the default.
    pub fn disable_status_log(mut self) -> Self {
        self.status_interval = None;
        self
    }

    /// Replaces the default [`LogObserver`] that receives progress reports.
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: Observer + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    /// Finishes the configuration and returns a builder for the choices.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ConstraintsNotSet`] if no constraint count was set.
    pub fn choice_builder<T>(self) -> Result<ChoiceBuilder<T>> {
        Ok(ChoiceBuilder {
            dlx: self.into_dlx()?,
            indices: Vec::new(),
        })
    }

    /// Finishes the configuration and returns the solver itself.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ConstraintsNotSet`] if no constraint count was set.
    pub fn into_dlx<T>(self) -> Result<Dlx<T>> {
        Dlx::new(self)
    }

    /// Builds the empty matrix and the settings of a [`Dlx`] instance.
    pub(crate) fn into_parts(self) -> Result<(Matrix, Settings)> {
        let Constraints { total, secondary } = self.constraints.ok_or(Error::ConstraintsNotSet)?;
        let matrix = Matrix::new(total, &secondary);
        let settings = Settings {
            primary_constraints: total - secondary.len(),
            secondary_constraints: secondary.len(),
            forking: self.forking,
            policy: Policy {
                max_solutions: self.max_solutions,
                count_all: self.count_all,
                status_interval: self.status_interval,
            },
            observer: self.observer,
        };
        Ok((matrix, settings))
    }
}

/// Adds choices to a [`Dlx`] instance, normalizing their constraint indices.
///
/// Unlike [`Dlx::add_choice`], the indices of a choice can be given in any
/// order; they are sorted before being handed to the solver. Duplicate,
/// out-of-range and empty index lists are still rejected.
///
/// [`Self::build`] consumes the builder, so no choice can be added through
/// it afterwards. The [`Dlx`] instance itself keeps accepting choices until
/// it is solved.
pub struct ChoiceBuilder<T> {
    dlx: Dlx<T>,
    /// Scratch space for normalizing indices.
    indices: Vec<usize>,
}

impl<T> ChoiceBuilder<T> {
    /// Adds a new choice (row) to the matrix; see [`Dlx::add_choice`].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::EmptyChoice`], [`Error::DuplicateIndex`] or
    /// [`Error::IndexOutOfRange`] if the indices are malformed.
    pub fn add_choice<I>(&mut self, label: T, indices: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = usize>,
    {
        self.indices.clear();
        self.indices.extend(indices);
        if self.indices.is_empty() {
            return Err(Error::EmptyChoice);
        }
        if self.indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            self.indices.sort_unstable();
        }
        // The solver reports duplicates too, but only after its own checks.
        if let Some(pair) = self.indices.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::DuplicateIndex { index: pair[0] });
        }
        self.dlx.add_choice(label, &self.indices)?;
        Ok(self)
    }

    /// Finishes adding choices and returns the solver.
    pub fn build(self) -> Dlx<T> {
        self.dlx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_counts_are_validated() {
        assert_eq!(
            Config::new().constraints(0).map(|_| ()),
            Err(Error::NoConstraints)
        );
        assert_eq!(
            Config::new().constraints_with_secondary(0, 0).map(|_| ()),
            Err(Error::NoConstraints)
        );
        assert!(Config::new().constraints_with_secondary(0, 3).is_ok());
        assert_eq!(
            Config::new()
                .constraints_with_secondary_indices(4, [1, 4])
                .map(|_| ()),
            Err(Error::SecondaryIndexOutOfRange {
                index: 4,
                constraints: 4
            })
        );
        assert_eq!(
            Config::new().into_dlx::<u8>().map(|_| ()),
            Err(Error::ConstraintsNotSet)
        );
    }

    #[test]
    fn secondary_counts_are_derived() {
        let config = Config::new().constraints_with_secondary(5, 2).unwrap();
        let (matrix, settings) = config.into_parts().unwrap();
        assert_eq!(matrix.columns(), 7);
        assert_eq!(settings.primary_constraints, 5);
        assert_eq!(settings.secondary_constraints, 2);

        let config = Config::new()
            .constraints_with_secondary_indices(6, [0, 3, 3])
            .unwrap();
        let (_, settings) = config.into_parts().unwrap();
        assert_eq!(settings.primary_constraints, 4);
        assert_eq!(settings.secondary_constraints, 2);
    }

    #[test]
    fn single_thread_disables_forking() {
        let config = Config::new().multithreading_with_threads(2, 1).unwrap();
        assert_eq!(config.forking, None);
        let config = config.multithreading_with_threads(2, 4).unwrap();
        assert_eq!(
            config.forking,
            Some(Forking {
                level: 2,
                threads: 4
            })
        );
        assert_eq!(config.disable_multithreading().forking, None);
        assert_eq!(
            Config::new()
                .multithreading_with_threads(0, 0)
                .map(|_| ()),
            Err(Error::NoThreads)
        );
    }

    #[test]
    fn defaults_store_one_solution_without_status_log() {
        let config = Config::new();
        assert_eq!(config.max_solutions, 1);
        assert!(!config.count_all);
        assert_eq!(config.status_interval, None);
        assert_eq!(config.status_interval(0).status_interval, None);
    }

    #[test]
    fn choice_builder_sorts_indices() {
        let mut builder = Config::new()
            .constraints(4)
            .unwrap()
            .max_solutions(5)
            .choice_builder()
            .unwrap();
        builder.add_choice("a", [3, 0, 2]).unwrap();
        builder.add_choice("b", [1]).unwrap();
        builder.add_choice("c", vec![1, 3]).unwrap();
        builder.add_choice("d", [2, 0]).unwrap();
        let dlx = builder.build();
        let solutions = dlx.solve().unwrap();
        assert_eq!(solutions.len(), 2);
        let stats = dlx.stats().unwrap();
        assert_eq!(stats.choices(), 4);
        assert_eq!(stats.elements(), 8);
    }

    #[test]
    fn choice_builder_rejects_malformed_indices() {
        let mut builder = Config::new()
            .constraints(4)
            .unwrap()
            .choice_builder::<&str>()
            .unwrap();
        assert_eq!(
            builder.add_choice("x", Vec::new()).map(|_| ()),
            Err(Error::EmptyChoice)
        );
        assert_eq!(
            builder.add_choice("x", [2, 1, 2]).map(|_| ()),
            Err(Error::DuplicateIndex { index: 2 })
        );
        assert_eq!(
            builder.add_choice("x", [4, 0]).map(|_| ()),
            Err(Error::IndexOutOfRange {
                index: 4,
                constraints: 4
            })
        );
        let dlx = builder.build();
        assert!(dlx.solve().unwrap().is_empty());
        assert_eq!(dlx.stats().unwrap().choices(), 0);
    }

    #[test]
    fn built_solver_still_accepts_choices() {
        let mut builder = Config::new()
            .constraints(2)
            .unwrap()
            .choice_builder()
            .unwrap();
        builder.add_choice(0, [0]).unwrap();
        let dlx = builder.build();
        dlx.add_choice(1, [1]).unwrap();
        assert_eq!(dlx.solve().unwrap().to_vec(), vec![vec![0, 1]]);
    }
}
