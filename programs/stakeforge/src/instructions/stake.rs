//! Stake tokens into a pool

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events, math::MAX_LOCK};

/// Stake tokens with no lock
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record (PDA: ["user", pool, owner])
/// 3. `[writable]` Token vault
/// 4. `[writable]` User token account
/// 5. `[]` Pool token mint
/// 6. `[writable, signer]` User/owner
/// 7. `[]` System program
/// 8. `[]` Token 2022 program
pub fn process_stake_flexible(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    value: u64,
) -> ProgramResult {
    process_stake(program_id, accounts, value, 0)
}

/// Stake tokens under a lock ending at `locked_until`; a zero lock is a
/// flexible stake
///
/// Accounts: as for `process_stake_flexible`
pub fn process_stake_and_lock(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    value: u64,
    locked_until: u64,
) -> ProgramResult {
    process_stake(program_id, accounts, value, locked_until)
}

fn process_stake(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    value: u64,
    locked_until: u64,
) -> ProgramResult {
    if value == 0 {
        return Err(StakingError::ZeroValue.into());
    }

    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let token_vault_info = next_account_info(account_info_iter)?;
    let user_token_info = next_account_info(account_info_iter)?;
    let mint_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;
    super::expect_token_program(token_program_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;

    if pool.pool_token != *mint_info.key {
        return Err(StakingError::InvalidPoolMint.into());
    }
    if pool.token_vault != *token_vault_info.key {
        return Err(StakingError::InvalidTokenVault.into());
    }

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    // Reject a bad lock before moving any tokens
    if locked_until != 0 && (locked_until <= now || locked_until - now > MAX_LOCK) {
        return Err(StakingError::InvalidLock.into());
    }

    let mut user = super::load_or_create_user_record(
        user_record_info,
        pool_info.key,
        user_info.key,
        user_info,
        system_program_info,
        program_id,
    )?;

    pool.sync(&mut factory, now)?;
    let (pending_yield, pending_revenue) = pool.process_rewards(&mut user)?;
    if pending_yield > 0 || pending_revenue > 0 {
        events::emit_rewards_processed(&events::RewardsProcessed {
            pool: *pool_info.key,
            user: *user_info.key,
            pending_yield,
            pending_revenue,
        });
    }

    // Guard and synced state persisted before the token CPI; a transfer
    // hook re-entering this pool observes Entered and fails
    super::enter_guard(&mut pool, pool_info)?;
    super::store_factory(factory_info, &factory)?;

    let added_value = super::transfer_in_measured(
        user_token_info,
        mint_info,
        token_vault_info,
        user_info,
        token_program_info,
        value,
    )?;
    if added_value == 0 {
        return Err(StakingError::ZeroValue.into());
    }

    if locked_until == 0 {
        pool.deposit_flexible(&mut user, added_value)?;
        events::emit_staked_flexible(&events::StakedFlexible {
            pool: *pool_info.key,
            user: *user_info.key,
            value: added_value,
        });
        msg!("Staked {} flexible", added_value);
    } else {
        let stake_id = pool.deposit_locked(&mut user, added_value, locked_until, now)?;
        events::emit_staked_locked(&events::StakedLocked {
            pool: *pool_info.key,
            user: *user_info.key,
            stake_id: stake_id as u64,
            value: added_value,
            locked_until,
        });
        msg!("Staked {} locked until {}", added_value, locked_until);
    }

    pool.refresh_reward_checkpoints(&mut user)?;

    super::exit_guard(&mut pool);
    super::store_pool(pool_info, &pool)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    Ok(())
}
