use std::fmt;

/// Search effort accumulated per level of the search tree.
///
/// Both tables grow on demand as the search reaches deeper levels. Forked
/// sub-searches keep their own profile, which is [absorbed] into the parent's
/// once the fork has finished.
///
/// [absorbed]: Self::absorb
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Profile {
    /// The number of links updated by covering operations at each level.
    pub(crate) updates: Vec<u64>,
    /// The number of rows tried as candidates at each level.
    pub(crate) visited_nodes: Vec<u64>,
}

impl Profile {
    /// Makes sure that both tables have an entry for level `depth`.
    pub(crate) fn reach(&mut self, depth: usize) {
        if self.updates.len() <= depth {
            self.updates.resize(depth + 1, 0);
            self.visited_nodes.resize(depth + 1, 0);
        }
    }

    /// Records `count` link updates at the given level, which must have been
    /// [reached](Self::reach).
    pub(crate) fn add_updates(&mut self, depth: usize, count: u64) {
        self.updates[depth] += count;
    }

    /// Records a visited row at the given level, which must have been
    /// [reached](Self::reach).
    pub(crate) fn add_visit(&mut self, depth: usize) {
        self.visited_nodes[depth] += 1;
    }

    /// Adds the counters of `other` to this profile element-wise, extending
    /// the tables if `other` went deeper.
    pub(crate) fn absorb(&mut self, other: &Profile) {
        if let Some(depth) = other.updates.len().checked_sub(1) {
            self.reach(depth);
        }
        for (mine, theirs) in self.updates.iter_mut().zip(&other.updates) {
            *mine += theirs;
        }
        for (mine, theirs) in self.visited_nodes.iter_mut().zip(&other.visited_nodes) {
            *mine += theirs;
        }
    }
}

/// Statistics about a problem, its search tree and the solutions found.
///
/// A `Stats` value is a snapshot: it never changes after [`Dlx::stats`]
/// hands it out.
///
/// [`Dlx::stats`]: `crate::Dlx::stats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    choices: usize,
    primary_constraints: usize,
    secondary_constraints: usize,
    elements: usize,
    solutions_found: usize,
    profile: Profile,
}

impl Stats {
    pub(crate) fn new(
        choices: usize,
        primary_constraints: usize,
        secondary_constraints: usize,
        elements: usize,
        solutions_found: usize,
        profile: Profile,
    ) -> Self {
        Self {
            choices,
            primary_constraints,
            secondary_constraints,
            elements,
            solutions_found,
            profile,
        }
    }

    /// Returns the number of choices (rows) of the problem.
    pub fn choices(&self) -> usize {
        self.choices
    }

    /// Returns the number of constraints that must be satisfied exactly once.
    pub fn primary_constraints(&self) -> usize {
        self.primary_constraints
    }

    /// Returns the number of constraints that may be satisfied at most once.
    pub fn secondary_constraints(&self) -> usize {
        self.secondary_constraints
    }

    /// Returns the total number of constraints (columns) of the problem.
    pub fn constraints(&self) -> usize {
        self.primary_constraints + self.secondary_constraints
    }

    /// Returns the number of 1s in the matrix, that is, the sum of the
    /// lengths of all choices.
    pub fn elements(&self) -> usize {
        self.elements
    }

    /// Returns the number of solutions found, which can exceed the number of
    /// solutions stored when counting all solutions.
    pub fn solutions_found(&self) -> usize {
        self.solutions_found
    }

    /// Returns the number of link updates performed by covering operations,
    /// indexed by the level of the search tree.
    pub fn updates(&self) -> &[u64] {
        &self.profile.updates
    }

    /// Returns the number of rows tried at each level of the search tree.
    pub fn visited_nodes(&self) -> &[u64] {
        &self.profile.visited_nodes
    }

    /// Returns the number of link updates over all levels of the search tree.
    pub fn total_updates(&self) -> u64 {
        self.profile.updates.iter().sum()
    }

    /// Returns the number of rows tried over all levels of the search tree.
    pub fn total_visited_nodes(&self) -> u64 {
        self.profile.visited_nodes.iter().sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} choices, {} constraints ({} secondary), {} elements, {} solutions, \
             updates {:?}, visited nodes {:?}",
            self.choices,
            self.constraints(),
            self.secondary_constraints,
            self.elements,
            self.solutions_found,
            self.profile.updates,
            self.profile.visited_nodes,
        )
    }
}
