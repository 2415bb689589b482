//! Difficulty retargeting.

use crate::block::Block;
use crate::constants::{DIFFICULTY_ADJUSTMENT_INTERVAL, EXPECTED_BLOCK_INTERVAL};

/// Computes the difficulty the next block must satisfy.
///
/// Retargeting only happens when the latest block's own index is a
/// nonzero multiple of [`DIFFICULTY_ADJUSTMENT_INTERVAL`]; every other
/// block keeps the latest block's difficulty. When a retarget is due,
/// `actual` is the elapsed time between the latest block and the block
/// `DIFFICULTY_ADJUSTMENT_INTERVAL` blocks before it: difficulty rises
/// by one if blocks came in at under half the expected pace, falls by
/// one (never below zero) if they came in at over double, and is
/// otherwise left unchanged.
#[must_use]
pub fn next_difficulty(chain: &[Block]) -> u32 {
    let interval = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    let latest = chain.last().expect("chain always has at least genesis");
    let latest_index = latest.info.index as usize;

    if latest_index == 0 || latest_index % interval != 0 || chain.len() < interval {
        return latest.info.difficulty;
    }

    let reference = &chain[chain.len() - 1 - interval];
    let actual = latest
        .info
        .timestamp
        .saturating_sub(reference.info.timestamp);

    if actual * 2 < EXPECTED_BLOCK_INTERVAL {
        latest.info.difficulty + 1
    } else if actual > EXPECTED_BLOCK_INTERVAL * 2 {
        latest.info.difficulty.saturating_sub(1)
    } else {
        latest.info.difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockData;

    fn chain_with_timestamps(timestamps: &[u64], difficulty: u32) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        for &ts in timestamps {
            let prev = chain.last().unwrap();
            let next = Block::create(prev, BlockData::new(vec![]).unwrap(), None, difficulty, ts);
            chain.push(next);
        }
        chain
    }

    #[test]
    fn stays_unchanged_off_the_adjustment_boundary() {
        // Tail block index 3 is not a multiple of the interval (5).
        let chain = chain_with_timestamps(&[1, 2, 3], 4);
        assert_eq!(next_difficulty(&chain), 4);
    }

    #[test]
    fn rises_when_blocks_arrive_faster_than_expected() {
        // Ten blocks after genesis land the tail on index 10, a nonzero
        // multiple of the interval (5); the reference block is index 5
        // (a real mined block, not genesis), and the window from index 5
        // to index 10 elapses just 1 second, far under EXPECTED (5).
        let chain = chain_with_timestamps(&[10, 11, 12, 13, 14, 14, 14, 14, 14, 15], 4);
        assert_eq!(next_difficulty(&chain), 5);
    }

    #[test]
    fn falls_when_blocks_arrive_slower_than_expected_and_never_below_zero() {
        let timestamps = [0, 5, 10, 20, 30, 40, 50, 60, 70, 80];
        let chain = chain_with_timestamps(&timestamps, 0);
        assert_eq!(next_difficulty(&chain), 0);

        let chain_nonzero = chain_with_timestamps(&timestamps, 3);
        assert_eq!(next_difficulty(&chain_nonzero), 2);
    }
}
