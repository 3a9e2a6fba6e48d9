//! Unstake tokens from a pool

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events, UnstakeItem};

/// Withdraw from the flexible balance
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` User record
/// 3. `[writable]` Token vault
/// 4. `[writable]` User token account
/// 5. `[writable]` Pool token mint
/// 6. `[writable, signer]` User/owner
/// 7. `[]` System program
/// 8. `[]` Token 2022 program
pub fn process_unstake_flexible(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    value: u64,
) -> ProgramResult {
    let ctx = UnstakeContext::load(accounts)?;
    let (mut factory, mut pool, mut user) = ctx.read_state(program_id)?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    pool.process_rewards(&mut user)?;
    pool.withdraw_flexible(&mut user, value)?;
    pool.refresh_reward_checkpoints(&mut user)?;

    super::enter_guard(&mut pool, ctx.pool_info)?;
    super::store_factory(ctx.factory_info, &factory)?;
    super::store_user_record(ctx.user_record_info, &user, ctx.user_info, ctx.system_program_info)?;

    super::transfer_from_vault(
        &pool,
        ctx.pool_info,
        ctx.token_vault_info,
        ctx.mint_info,
        ctx.user_token_info,
        ctx.token_program_info,
        value,
    )?;

    super::exit_guard(&mut pool);
    super::store_pool(ctx.pool_info, &pool)?;

    events::emit_unstaked_flexible(&events::UnstakedFlexible {
        pool: *ctx.pool_info.key,
        user: *ctx.user_info.key,
        value,
    });
    msg!("Unstaked {} flexible", value);

    Ok(())
}

/// Unstake part or all of a locked stake after its lock expires
///
/// Accounts: as for `process_unstake_flexible`
pub fn process_unstake_locked(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    stake_id: u64,
    value: u64,
) -> ProgramResult {
    let ctx = UnstakeContext::load(accounts)?;
    let (mut factory, mut pool, mut user) = ctx.read_state(program_id)?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    pool.process_rewards(&mut user)?;
    let minted = pool.unstake_locked(&mut user, stake_id as usize, value, now)?;
    pool.refresh_reward_checkpoints(&mut user)?;

    super::enter_guard(&mut pool, ctx.pool_info)?;
    super::store_factory(ctx.factory_info, &factory)?;
    super::store_user_record(ctx.user_record_info, &user, ctx.user_info, ctx.system_program_info)?;

    ctx.pay_out(&factory, &pool, value, minted)?;

    super::exit_guard(&mut pool);
    super::store_pool(ctx.pool_info, &pool)?;

    events::emit_unstaked_locked(&events::UnstakedLocked {
        pool: *ctx.pool_info.key,
        user: *ctx.user_info.key,
        stake_id,
        value,
        minted,
    });
    msg!("Unstaked {} from stake {}", value, stake_id);

    Ok(())
}

/// Unstake from several stakes of the same kind in one operation, paying
/// out the folded total in a single transfer or mint
///
/// Accounts: as for `process_unstake_flexible`
pub fn process_unstake_locked_multiple(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    items: Vec<UnstakeItem>,
    is_yield: bool,
) -> ProgramResult {
    if items.is_empty() {
        return Err(StakingError::EmptyBatch.into());
    }

    let ctx = UnstakeContext::load(accounts)?;
    let (mut factory, mut pool, mut user) = ctx.read_state(program_id)?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    pool.process_rewards(&mut user)?;

    let mut total: u64 = 0;
    for item in &items {
        let stake = *user.get_stake(item.stake_id as usize)?;
        if stake.is_yield != is_yield {
            return Err(StakingError::YieldFlagMismatch.into());
        }
        pool.unstake_locked(&mut user, item.stake_id as usize, item.value, now)?;
        total = total
            .checked_add(item.value)
            .ok_or(StakingError::MathOverflow)?;
    }
    pool.refresh_reward_checkpoints(&mut user)?;

    super::enter_guard(&mut pool, ctx.pool_info)?;
    super::store_factory(ctx.factory_info, &factory)?;
    super::store_user_record(ctx.user_record_info, &user, ctx.user_info, ctx.system_program_info)?;

    ctx.pay_out(&factory, &pool, total, is_yield)?;

    super::exit_guard(&mut pool);
    super::store_pool(ctx.pool_info, &pool)?;

    for item in &items {
        events::emit_unstaked_locked(&events::UnstakedLocked {
            pool: *ctx.pool_info.key,
            user: *ctx.user_info.key,
            stake_id: item.stake_id,
            value: item.value,
            minted: is_yield,
        });
    }
    msg!("Unstaked {} across {} stakes", total, items.len());

    Ok(())
}

/// Shared account plumbing for the unstake family.
struct UnstakeContext<'a, 'b> {
    factory_info: &'b AccountInfo<'a>,
    pool_info: &'b AccountInfo<'a>,
    user_record_info: &'b AccountInfo<'a>,
    token_vault_info: &'b AccountInfo<'a>,
    user_token_info: &'b AccountInfo<'a>,
    mint_info: &'b AccountInfo<'a>,
    user_info: &'b AccountInfo<'a>,
    system_program_info: &'b AccountInfo<'a>,
    token_program_info: &'b AccountInfo<'a>,
}

impl<'a, 'b> UnstakeContext<'a, 'b> {
    fn load(
        accounts: &'b [AccountInfo<'a>],
    ) -> Result<Self, solana_program::program_error::ProgramError> {
        let account_info_iter = &mut accounts.iter();
        let ctx = Self {
            factory_info: next_account_info(account_info_iter)?,
            pool_info: next_account_info(account_info_iter)?,
            user_record_info: next_account_info(account_info_iter)?,
            token_vault_info: next_account_info(account_info_iter)?,
            user_token_info: next_account_info(account_info_iter)?,
            mint_info: next_account_info(account_info_iter)?,
            user_info: next_account_info(account_info_iter)?,
            system_program_info: next_account_info(account_info_iter)?,
            token_program_info: next_account_info(account_info_iter)?,
        };
        super::expect_signer(ctx.user_info)?;
        super::expect_token_program(ctx.token_program_info)?;
        Ok(ctx)
    }

    fn read_state(
        &self,
        program_id: &Pubkey,
    ) -> Result<
        (
            crate::state::Factory,
            crate::state::Pool,
            crate::state::UserRecord,
        ),
        solana_program::program_error::ProgramError,
    > {
        let factory = super::load_factory(self.factory_info, program_id)?;
        let pool = super::load_pool(self.pool_info, self.factory_info, program_id)?;
        if pool.pool_token != *self.mint_info.key {
            return Err(StakingError::InvalidPoolMint.into());
        }
        if pool.token_vault != *self.token_vault_info.key {
            return Err(StakingError::InvalidTokenVault.into());
        }
        let user = super::load_user_record(
            self.user_record_info,
            self.pool_info.key,
            self.user_info.key,
            program_id,
        )?;
        Ok((factory, pool, user))
    }

    /// Yield value is owed, not held: it leaves by mint. Everything else
    /// leaves the deposit vault.
    fn pay_out(
        &self,
        factory: &crate::state::Factory,
        pool: &crate::state::Pool,
        value: u64,
        minted: bool,
    ) -> ProgramResult {
        if minted {
            super::mint_as_factory(
                factory,
                self.factory_info,
                self.mint_info,
                self.user_token_info,
                self.token_program_info,
                value,
            )
        } else {
            super::transfer_from_vault(
                pool,
                self.pool_info,
                self.token_vault_info,
                self.mint_info,
                self.user_token_info,
                self.token_program_info,
                value,
            )
        }
    }
}
