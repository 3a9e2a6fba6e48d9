//! Extend the lock of an existing stake

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::events;

/// Extend a stake's lock, growing its weight
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable, signer]` User/owner
/// 4. `[]` System program
pub fn process_update_stake_lock(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    stake_id: u64,
    locked_until: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;
    let mut user = super::load_user_record(
        user_record_info,
        pool_info.key,
        user_info.key,
        program_id,
    )?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    pool.process_rewards(&mut user)?;
    pool.extend_stake_lock(&mut user, stake_id as usize, locked_until, now)?;
    pool.refresh_reward_checkpoints(&mut user)?;

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    events::emit_lock_extended(&events::LockExtended {
        pool: *pool_info.key,
        user: *user_info.key,
        stake_id,
        locked_until,
    });
    msg!("Stake {} lock extended to {}", stake_id, locked_until);

    Ok(())
}
