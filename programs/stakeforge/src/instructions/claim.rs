//! Claim accrued rewards
//!
//! Yield claims either mint the escrow token immediately or compound into
//! a max-lock yield stake of the reward-token pool. For a pool whose
//! staked token is not the reward token, the compounding leg runs against
//! the reward-token pool supplied in the same transaction.

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events};

/// Claim accrued yield
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable, signer]` User/owner
/// 4. `[]` System program
/// 5. `[]` Token 2022 program
/// With `use_escrow`:
/// 6. `[writable]` Escrow mint
/// 7. `[writable]` User escrow token account
/// Compounding on a non-reward pool:
/// 6. `[writable]` Reward-token pool account
/// 7. `[writable]` User record on the reward-token pool
pub fn process_claim_rewards(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    use_escrow: bool,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;
    super::expect_token_program(token_program_info)?;

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
    let (pending_yield, pending_revenue) = pool.process_rewards(&mut user)?;
    if pending_yield > 0 || pending_revenue > 0 {
        events::emit_rewards_processed(&events::RewardsProcessed {
            pool: *pool_info.key,
            user: *user_info.key,
            pending_yield,
            pending_revenue,
        });
    }

    let amount = user.pending_yield;
    user.pending_yield = 0;

    if amount == 0 {
        pool.refresh_reward_checkpoints(&mut user)?;
        super::store_factory(factory_info, &factory)?;
        super::store_pool(pool_info, &pool)?;
        super::store_user_record(user_record_info, &user, user_info, system_program_info)?;
        msg!("No rewards to claim");
        return Ok(());
    }

    if use_escrow {
        let escrow_mint_info = next_account_info(account_info_iter)?;
        let user_escrow_info = next_account_info(account_info_iter)?;
        if factory.escrow_mint != *escrow_mint_info.key {
            return Err(StakingError::InvalidPoolMint.into());
        }

        pool.refresh_reward_checkpoints(&mut user)?;

        super::enter_guard(&mut pool, pool_info)?;
        super::store_factory(factory_info, &factory)?;
        super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

        super::mint_as_factory(
            &factory,
            factory_info,
            escrow_mint_info,
            user_escrow_info,
            token_program_info,
            amount,
        )?;

        super::exit_guard(&mut pool);
        super::store_pool(pool_info, &pool)?;
    } else if pool.is_reward_pool(&factory) {
        // Compound in place: the claimed value is owed, not transferred
        let stake_id = pool.stake_claimed_yield(&mut user, amount, now)?;
        pool.refresh_reward_checkpoints(&mut user)?;

        super::store_factory(factory_info, &factory)?;
        super::store_pool(pool_info, &pool)?;
        super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

        events::emit_staked_locked(&events::StakedLocked {
            pool: *pool_info.key,
            user: *user_info.key,
            stake_id: stake_id as u64,
            value: amount,
            locked_until: now + crate::math::MAX_LOCK,
        });
    } else {
        // Route to the reward-token pool and open the yield stake there
        let reward_pool_info = next_account_info(account_info_iter)?;
        let reward_user_record_info = next_account_info(account_info_iter)?;

        let mut reward_pool = super::load_pool(reward_pool_info, factory_info, program_id)?;
        if !reward_pool.is_reward_pool(&factory) {
            return Err(StakingError::NotRouter.into());
        }

        let mut reward_user = super::load_or_create_user_record(
            reward_user_record_info,
            reward_pool_info.key,
            user_info.key,
            user_info,
            system_program_info,
            program_id,
        )?;

        reward_pool.sync(&mut factory, now)?;
        reward_pool.process_rewards(&mut reward_user)?;
        let stake_id = reward_pool.stake_claimed_yield(&mut reward_user, amount, now)?;
        reward_pool.refresh_reward_checkpoints(&mut reward_user)?;

        pool.refresh_reward_checkpoints(&mut user)?;

        super::store_factory(factory_info, &factory)?;
        super::store_pool(pool_info, &pool)?;
        super::store_pool(reward_pool_info, &reward_pool)?;
        super::store_user_record(user_record_info, &user, user_info, system_program_info)?;
        super::store_user_record(
            reward_user_record_info,
            &reward_user,
            user_info,
            system_program_info,
        )?;

        events::emit_staked_locked(&events::StakedLocked {
            pool: *reward_pool_info.key,
            user: *user_info.key,
            stake_id: stake_id as u64,
            value: amount,
            locked_until: now + crate::math::MAX_LOCK,
        });
    }

    events::emit_rewards_claimed(&events::RewardsClaimed {
        pool: *pool_info.key,
        user: *user_info.key,
        value: amount,
        use_escrow,
    });
    msg!("Claimed {} yield (escrow: {})", amount, use_escrow);

    Ok(())
}

/// Claim accrued vault revenue out of the pool's reward vault
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable]` Pool reward vault
/// 4. `[writable]` User reward token account
/// 5. `[]` Reward mint
/// 6. `[writable, signer]` User/owner
/// 7. `[]` System program
/// 8. `[]` Token 2022 program
pub fn process_claim_vault_rewards(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let user_record_info = next_account_info(account_info_iter)?;
    let reward_vault_info = next_account_info(account_info_iter)?;
    let user_token_info = next_account_info(account_info_iter)?;
    let reward_mint_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;
    super::expect_token_program(token_program_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;
    if pool.reward_vault != *reward_vault_info.key {
        return Err(StakingError::InvalidTokenVault.into());
    }
    if factory.reward_mint != *reward_mint_info.key {
        return Err(StakingError::InvalidPoolMint.into());
    }
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

    let amount = user.pending_revenue;
    user.pending_revenue = 0;
    pool.refresh_reward_checkpoints(&mut user)?;

    if amount == 0 {
        super::store_factory(factory_info, &factory)?;
        super::store_pool(pool_info, &pool)?;
        super::store_user_record(user_record_info, &user, user_info, system_program_info)?;
        msg!("No vault rewards to claim");
        return Ok(());
    }

    super::enter_guard(&mut pool, pool_info)?;
    super::store_factory(factory_info, &factory)?;
    super::store_user_record(user_record_info, &user, user_info, system_program_info)?;

    super::transfer_from_vault(
        &pool,
        pool_info,
        reward_vault_info,
        reward_mint_info,
        user_token_info,
        token_program_info,
        amount,
    )?;

    super::exit_guard(&mut pool);
    super::store_pool(pool_info, &pool)?;

    events::emit_vault_rewards_claimed(&events::VaultRewardsClaimed {
        pool: *pool_info.key,
        user: *user_info.key,
        value: amount,
    });
    msg!("Claimed {} vault rewards", amount);

    Ok(())
}
