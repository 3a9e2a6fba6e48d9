//! Legacy v1 stake ingestion
//!
//! V1 deposits stay in the v1 pool. Ingesting one records its weight as a
//! reward bonus; once matured it can be filled into a real stake, and v1
//! yield deposits can be minted out directly.

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events, v1::V1Deposit};

/// Ingest locked v1 stakes by id, crediting their translated weight as a
/// reward bonus
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable, signer]` User/owner
/// 4. `[]` System program
/// 5... `[]` One v1 deposit account per id, in order
pub fn process_migrate_v1_stakes(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    ids: Vec<u64>,
) -> ProgramResult {
    if ids.is_empty() {
        return Err(StakingError::EmptyBatch.into());
    }

    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;
    if pool.v1_pool == Pubkey::default() {
        return Err(StakingError::V1StakeRejected.into());
    }
    let mut user = super::load_or_create_user_record(
        user_record_info,
        pool_info.key,
        user_info.key,
        user_info,
        system_program_info,
        program_id,
    )?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    // The bonus must only affect emissions from here on: rewards are
    // processed against the pre-ingestion weight first
    pool.sync(&mut factory, now)?;
    pool.process_rewards(&mut user)?;

    for id in &ids {
        let deposit_info = next_account_info(account_info_iter)?;
        let deposit = V1Deposit::load_checked(
            deposit_info,
            &pool.v1_program,
            &pool.v1_pool,
            user_info.key,
            *id,
        )?;
        pool.ingest_v1_stake(
            &mut user,
            *id,
            deposit.weight,
            deposit.locked_from,
            deposit.is_yield,
        )?;
    }

    pool.refresh_reward_checkpoints(&mut user)?;

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    events::emit_v1_stakes_migrated(&events::V1StakesMigrated {
        pool: *pool_info.key,
        user: *user_info.key,
        ids: ids.clone(),
    });
    msg!("Migrated {} v1 stakes", ids.len());

    Ok(())
}

/// Materialise a matured v1 stake into a real stake
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable, signer]` User/owner
/// 4. `[]` System program
/// 5. `[]` V1 deposit account
pub fn process_fill_v1_stake(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    position: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let deposit_info = next_account_info(account_info_iter)?;

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

    let id = user
        .get_v1_stake_id(position as usize)
        .ok_or(StakingError::StakeNotFound)?;
    let deposit = V1Deposit::load_checked(
        deposit_info,
        &pool.v1_program,
        &pool.v1_pool,
        user_info.key,
        id,
    )?;

    let stake_id = pool.fill_v1_stake(
        &mut user,
        position as usize,
        deposit.value,
        deposit.locked_from,
        deposit.locked_until,
        now,
    )?;

    pool.refresh_reward_checkpoints(&mut user)?;

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    events::emit_v1_stake_filled(&events::V1StakeFilled {
        pool: *pool_info.key,
        user: *user_info.key,
        position,
        stake_id: stake_id as u64,
    });
    msg!("Filled v1 stake at position {} as stake {}", position, stake_id);

    Ok(())
}

/// Mint the reward token for matured v1 yield deposits, one mint for the
/// folded total
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable]` Reward mint
/// 4. `[writable]` User reward token account
/// 5. `[writable, signer]` User/owner
/// 6. `[]` System program
/// 7. `[]` Token 2022 program
/// 8... `[]` One v1 deposit account per id, in order
pub fn process_mint_v1_yield(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    ids: Vec<u64>,
) -> ProgramResult {
    if ids.is_empty() {
        return Err(StakingError::EmptyBatch.into());
    }

    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let reward_mint_info = next_account_info(account_info_iter)?;
    let user_token_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;
    super::expect_token_program(token_program_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;
    if pool.v1_pool == Pubkey::default() {
        return Err(StakingError::V1StakeRejected.into());
    }
    if factory.reward_mint != *reward_mint_info.key {
        return Err(StakingError::InvalidPoolMint.into());
    }
    let mut user = super::load_or_create_user_record(
        user_record_info,
        pool_info.key,
        user_info.key,
        user_info,
        system_program_info,
        program_id,
    )?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;

    let mut total: u64 = 0;
    for id in &ids {
        let deposit_info = next_account_info(account_info_iter)?;
        let deposit = V1Deposit::load_checked(
            deposit_info,
            &pool.v1_program,
            &pool.v1_pool,
            user_info.key,
            *id,
        )?;
        pool.record_v1_yield_minted(&mut user, *id, deposit.locked_until, deposit.is_yield, now)?;
        total = total
            .checked_add(deposit.value)
            .ok_or(StakingError::MathOverflow)?;
    }

    super::enter_guard(&mut pool, pool_info)?;
    super::store_factory(factory_info, &factory)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    super::mint_as_factory(
        &factory,
        factory_info,
        reward_mint_info,
        user_token_info,
        token_program_info,
        total,
    )?;

    super::exit_guard(&mut pool);
    super::store_pool(pool_info, &pool)?;

    events::emit_v1_yield_minted(&events::V1YieldMinted {
        pool: *pool_info.key,
        user: *user_info.key,
        ids: ids.clone(),
        value: total,
    });
    msg!("Minted {} v1 yield across {} deposits", total, ids.len());

    Ok(())
}
