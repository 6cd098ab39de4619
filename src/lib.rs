// The following doc comment is kept in sync with the README.md file. Please
// run the `cargo sync-readme` command after modifying the comment contents.
//! This crate provides an implementation of D. E. Knuth's Algorithm DLX for
//! solving generalized exact cover problems, with the option of exploring
//! the search tree on several threads.
//!
//! Suppose we're given a 0/1 matrix whose rows are _choices_ and whose
//! columns are _constraints_; the _exact cover_ problem is to find a set of
//! rows that contains exactly one 1 in every column. Knuth proposed a method
//! that achieves this goal in the paper "Dancing Links", [arXiv:cs/0011047][dl]
//! [cs.DS] (2000), whose title refers to a clever yet simple technique for
//! deleting and restoring the nodes of a doubly linked list. His backtracking
//! scheme, called _Algorithm X_, employs this "waltzing" of links to visit all
//! exact covers in a recursive, depth-first manner, always branching on a
//! column with the fewest remaining rows.
//!
//! A slight modification of Algorithm X solves the more general problem in
//! which columns fall into one of two categories: _primary_ and _secondary_.
//! Now the task is to find a set of rows that covers every primary column
//! _exactly_ once, while covering every secondary column _at most_ once.
//! [For further information, see Section 7.2.2.1 of [_The Art of Computer
//! Programming_ **4B** (2022)][taocp4b], Part 2, 65–70.]
//!
//! The following structures are the most important pieces of this crate:
//! - [`Config`] declares the constraints of a problem and how to solve it:
//!   how many solutions to store, whether to count all of them, and how
//!   many threads to use.
//! - [`ChoiceBuilder`] validates and normalizes the choices of a problem.
//! - [`Dlx`] owns the matrix, runs the search exactly once and caches the
//!   solutions and the [`Stats`] of the search.
//!
//! When multithreading is enabled, every branch of the search tree at a
//! given _forking level_ is handed to a thread pool together with a private
//! copy of the matrix. The forks never share cells, and their results are
//! merged once all of them have finished; the number of solutions found is
//! the same as in a single-threaded run.
//!
//! Also, the `demos` directory contains programs that apply the solver to
//! a couple of classic problems:
//! - `langford_pairs.rs` finds all [Langford pairings] of $2n$ numbers.
//! - `domino_chessboard.rs` counts all ways to pack 32 dominoes into a chessboard.
//!
//! [dl]: https://arxiv.org/pdf/cs/0011047.pdf
//! [taocp4b]: https://www-cs-faculty.stanford.edu/~knuth/taocp.html#vol4
//! [Langford pairings]: https://en.wikipedia.org/wiki/Langford_pairing

mod builder;
mod dlx;
mod error;
mod indices;
mod matrix;
mod observer;
mod search;
mod stats;

pub use builder::{ChoiceBuilder, Config};
pub use dlx::{Dlx, Solutions};
pub use error::{Error, Result};
pub use observer::{LogObserver, Observer};
pub use stats::Stats;
