//! The following program counts the ways to pack 32 dominoes into a
//! chessboard. There is one constraint per square of the board and one
//! choice per pair of adjacent squares; a perfect packing covers each square
//! exactly once.
//!
//! The search takes a while, so its branches are spread over all available
//! CPUs and the running count is printed now and then.

use forking_dlx::{Config, Result};

/// The number $m$ of rows of the board, also known as _ranks_.
const ROWS: usize = 8;

/// The number $n$ of columns of the board, also known as _files_.
const COLUMNS: usize = 8;

/// A domino covering two adjacent squares, given as `(rank, file)` pairs.
type Domino = [(usize, usize); 2];

fn square(x: usize, y: usize) -> usize {
    x * COLUMNS + y
}

fn main() -> Result<()> {
    let dlx = Config::new()
        .constraints(ROWS * COLUMNS)?
        .max_solutions(1)
        .count_all_solutions(true)
        .multithreading(3)
        .status_interval(1_000_000)
        .observer(|count: usize| println!("{count} packings so far"))
        .into_dlx()?;

    // There's a choice for each pair of adjacent squares. We start with the
    // $m(n-1)$ horizontal placements,
    for x0 in 0..ROWS {
        for y0 in 0..COLUMNS - 1 {
            let domino: Domino = [(x0, y0), (x0, y0 + 1)];
            dlx.add_choice(domino, [square(x0, y0), square(x0, y0 + 1)])?;
        }
    }
    // and continue with the $n(m-1)$ vertical ones. To reduce symmetry, insist
    // that the domino occupying the upper left square is laid out horizontally.
    for y0 in 0..COLUMNS {
        for x0 in usize::from(y0 == 0)..ROWS - 1 {
            let domino: Domino = [(x0, y0), (x0 + 1, y0)];
            dlx.add_choice(domino, [square(x0, y0), square(x0 + 1, y0)])?;
        }
    }

    let solutions = dlx.solve()?;
    println!("first packing: {:?}", solutions[0]);

    // Count the number of solutions, taking symmetry into account.
    let stats = dlx.stats()?;
    println!("{stats}");
    assert_eq!(2 * stats.solutions_found(), 12_988_816);
    Ok(())
}
