//! The following program finds all ways to put $2n$ numbers $\\{1,1,2,2,\dots,n,n\\}$
//! into $2n$ slots $s_1,\dots,s_{2n}$ so that there are exactly $i$ numbers
//! between the two appearances of $i$, for all $1\leq i\leq n$. This task is
//! known as _Langford's problem_, since it was first described by C. D. Langford
//! [[_The Mathematical Gazette_ 42 (October 1958), 228][mathgaz]]. Its encoding
//! as an exact cover problem is explained in D. E. Knuth's book
//! [_The Art of Computer Programming_ 4B (2022)][taocp4b], Part 2, page 70:
//!
//! Regard the $n$ values of $i$ and the $2n$ slots as the constraints. Then the
//! legal choices are $`i\;s_j\;s_k'$ for $1\leq i\leq n$, $1\leq j<k\leq 2n$,
//! and $k=i+j+1$, so that the two copies of $i$ are $i+1$ slots apart.
//!
//! Every Langford sequence is found together with its reverse, and the search
//! tree is forked at its second level.
//!
//! [mathgaz]: https://www.cambridge.org/core/journals/mathematical-gazette/article/abs/problem/557F7BBB739F5B3E0D152C270642B102
//! [taocp4b]: https://www-cs-faculty.stanford.edu/~knuth/taocp.html#vol4

use forking_dlx::{Config, Result};

/// A Langford pairing exists only when $n$ is congruent to 0 or 3 modulo 4.
const N: usize = 7;

/// The number of Langford pairings for $n=7$, up to reversal.
const PAIRINGS: usize = 26;

/// A number $i$ placed in slots $j$ and $k$, all 1-based.
#[derive(Debug, Copy, Clone)]
struct Placement {
    number: usize,
    first: usize,
    second: usize,
}

fn main() -> Result<()> {
    // Constraints $0,\dots,n-1$ stand for the numbers and $n,\dots,3n-1$ for
    // the slots.
    let dlx = Config::new()
        .constraints(3 * N)?
        .max_solutions(4)
        .count_all_solutions(true)
        .multithreading(1)
        .into_dlx()?;
    for number in 1..=N {
        for first in 1..2 * N - number {
            let second = number + first + 1;
            let placement = Placement {
                number,
                first,
                second,
            };
            dlx.add_choice(placement, [number - 1, N + first - 1, N + second - 1])?;
        }
    }

    for solution in dlx.solve()?.iter() {
        let mut slots = [0; 2 * N];
        for placement in solution {
            slots[placement.first - 1] = placement.number;
            slots[placement.second - 1] = placement.number;
        }
        println!("{slots:?}");
    }

    let stats = dlx.stats()?;
    println!("{stats}");
    assert_eq!(stats.solutions_found(), 2 * PAIRINGS);
    Ok(())
}
