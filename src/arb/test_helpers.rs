use alloy::primitives::U256;

use super::balance::Balance;
use super::cycle::Cycle;
use super::reducer::ElementaryArbitrage;
use super::swap::SwapEvent;
use super::types::TokenAmount;

/// Sender used by [`swap`]
pub const BOT: &str = "0xbot";

/// Block number used by the fixtures
pub const BLOCK: u64 = 14_035_430;

#[allow(dead_code)]
pub fn swap(
    transaction_index: u64,
    log_index: u64,
    from: (u64, &str),
    to: (u64, &str),
) -> SwapEvent {
    swap_by(transaction_index, log_index, from, to, BOT)
}

#[allow(dead_code)]
pub fn swap_by(
    transaction_index: u64,
    log_index: u64,
    (from_quantity, from_token): (u64, &str),
    (to_quantity, to_token): (u64, &str),
    sender: &str,
) -> SwapEvent {
    SwapEvent {
        block_number: BLOCK,
        transaction_index,
        log_index,
        transaction_hash: Some(format!("0xtx{transaction_index}")),
        from_amount: TokenAmount::new(U256::from(from_quantity), from_token),
        to_amount: TokenAmount::new(U256::from(to_quantity), to_token),
        sender: sender.to_string(),
        recipient: sender.to_string(),
        pool_address: format!("0xpool-{from_token}-{to_token}"),
        dex: "uniswapv2".to_string(),
    }
}

#[allow(dead_code)]
pub fn cycle(swaps: &[&SwapEvent]) -> Cycle {
    Cycle::new(swaps.iter().map(|s| (*s).clone()).collect()).unwrap()
}

#[allow(dead_code)]
pub fn elementary(swaps: &[&SwapEvent]) -> ElementaryArbitrage {
    let cycle = cycle(swaps);
    let balance = Balance::of(&cycle).unwrap();
    ElementaryArbitrage { cycle, balance }
}

/// A random block of swaps over a handful of tokens, all sent by a couple of accounts
#[allow(dead_code)]
pub fn random_block(seed: u64, swap_count: u64) -> Vec<SwapEvent> {
    const TOKENS: [&str; 4] = ["A", "B", "C", "D"];
    const SENDERS: [&str; 2] = [BOT, "0xother"];

    let mut rng = fastrand::Rng::with_seed(seed);
    let mut transaction_index = 0;
    let mut log_index = 0;
    (0..swap_count)
        .map(|_| {
            if rng.u8(..4) == 0 {
                transaction_index += 1;
                log_index = 0;
            }
            log_index += 1;
            let from = TOKENS[rng.usize(..TOKENS.len())];
            let mut to = TOKENS[rng.usize(..TOKENS.len())];
            while to == from {
                to = TOKENS[rng.usize(..TOKENS.len())];
            }
            swap_by(
                transaction_index,
                log_index,
                (rng.u64(90..110), from),
                (rng.u64(90..110), to),
                SENDERS[rng.usize(..SENDERS.len())],
            )
        })
        .collect()
}
