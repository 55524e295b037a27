//! Local partial products
//!
//! A [`Worker`] is the per-rank execution unit. It owns exactly three things:
//! its [`Partition`], its [`ValueSource`] and its running product. Nothing is
//! shared with other workers until the product is handed to the reduce
//! collective.
//!
//! # Example
//!
//! ```
//! use geomean::partition::partition;
//! use geomean::source::UniformSource;
//! use geomean::worker::Worker;
//!
//! let part = partition(8, 4, 1);
//! let mut worker = Worker::new(1, part, Box::new(UniformSource::with_seed(3, 10)));
//! let local = worker.run();
//!
//! assert_eq!(local.values, 2);
//! assert!(local.product >= 0.0);
//! ```

use crate::group::Rank;
use crate::partition::Partition;
use crate::reduce::combine;
use crate::source::ValueSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Result of one worker's local computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalProduct {
    pub rank: Rank,
    pub partition: Partition,
    /// Product of every value drawn for the partition (1.0 when empty)
    pub product: f64,
    /// Number of values multiplied in
    pub values: u64,
}

/// Computes the partial product of one partition
pub struct Worker {
    rank: Rank,
    partition: Partition,
    source: Box<dyn ValueSource>,
    /// Print every drawn value on stdout
    echo: bool,
}

impl Worker {
    pub fn new(rank: Rank, partition: Partition, source: Box<dyn ValueSource>) -> Self {
        Self {
            rank,
            partition,
            source,
            echo: false,
        }
    }

    /// Print `vector[<index>] = <value>` for every drawn value
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Draw one value per owned index, in increasing index order, and multiply
    /// them together
    pub fn run(&mut self) -> LocalProduct {
        let mut product = 1.0;

        for index in self.partition.indices() {
            let value = self.source.next_value();
            trace!(rank = self.rank, index, value, "drew value");
            if self.echo {
                println!("vector[{}] = {}", index, value);
            }
            product = combine(product, value);
        }

        debug!(
            rank = self.rank,
            partition = %self.partition,
            product,
            "local product computed"
        );

        LocalProduct {
            rank: self.rank,
            partition: self.partition,
            product,
            values: self.partition.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{partition, partition_all};
    use crate::reduce::product_of;
    use crate::source::UniformSource;

    /// Returns 1, 2, 3, ... so products are predictable
    struct Counting(f64);

    impl ValueSource for Counting {
        fn next_value(&mut self) -> f64 {
            self.0 += 1.0;
            self.0
        }
    }

    #[test]
    fn test_local_product_of_known_values() {
        let mut worker = Worker::new(1, partition(5, 2, 1), Box::new(Counting(0.0)));
        let local = worker.run();

        // rank 1 owns [2,4]: three draws 1*2*3
        assert_eq!(local.product, 6.0);
        assert_eq!(local.values, 3);
        assert_eq!(local.partition.bounds(), Some((2, 4)));
    }

    #[test]
    fn test_empty_partition_is_identity() {
        let part = partition(1, 2, 0);
        assert!(part.is_empty());

        let local = Worker::new(0, part, Box::new(Counting(0.0))).run();
        assert_eq!(local.product, 1.0);
        assert_eq!(local.values, 0);
    }

    #[test]
    fn test_single_worker_product_matches_draws() {
        let mut reference = UniformSource::with_seed(99, 1000);
        let expected = product_of(&(0..8).map(|_| reference.next_value()).collect::<Vec<_>>());

        let local = Worker::new(0, partition(8, 1, 0), Box::new(UniformSource::with_seed(99, 1000))).run();
        assert_eq!(local.product, expected);
        assert_eq!(local.values, 8);
    }

    #[test]
    fn test_workers_cover_every_index_once() {
        let total: u64 = partition_all(7, 3)
            .into_iter()
            .map(|p| Worker::new(p.rank, p, Box::new(Counting(0.0))).run().values)
            .sum();
        assert_eq!(total, 7);
    }
}
