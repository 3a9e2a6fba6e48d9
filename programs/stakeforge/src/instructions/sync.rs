//! Advance a pool's yield accumulator (permissionless crank)

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::events;

/// Sync the pool to the current time
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
pub fn process_sync(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;

    events::emit_synced(&events::Synced {
        pool: *pool_info.key,
        yield_rewards_per_weight: pool.yield_rewards_per_weight,
        last_yield_distribution: pool.last_yield_distribution,
    });
    msg!(
        "Synced pool to {} (rpw {})",
        pool.last_yield_distribution,
        pool.yield_rewards_per_weight
    );

    Ok(())
}
