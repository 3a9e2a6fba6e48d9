//! Externally-funded revenue distribution

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events};

/// Receive reward tokens from the configured vault and fold them into the
/// vault accumulator at the current global weight
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` Pool reward vault
/// 3. `[writable]` Vault's reward token account
/// 4. `[]` Reward mint
/// 5. `[writable, signer]` Vault authority
/// 6. `[]` Token 2022 program
pub fn process_receive_vault_rewards(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(StakingError::ZeroValue.into());
    }

    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let reward_vault_info = next_account_info(account_info_iter)?;
    let vault_token_info = next_account_info(account_info_iter)?;
    let reward_mint_info = next_account_info(account_info_iter)?;
    let vault_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(vault_info)?;
    super::expect_token_program(token_program_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;

    if factory.vault != *vault_info.key {
        return Err(StakingError::NotVault.into());
    }
    if pool.reward_vault != *reward_vault_info.key {
        return Err(StakingError::InvalidTokenVault.into());
    }
    if factory.reward_mint != *reward_mint_info.key {
        return Err(StakingError::InvalidPoolMint.into());
    }

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    if pool.global_weight == 0 {
        return Err(StakingError::NoStakedWeight.into());
    }

    super::enter_guard(&mut pool, pool_info)?;
    super::store_factory(factory_info, &factory)?;

    let received = super::transfer_in_measured(
        vault_token_info,
        reward_mint_info,
        reward_vault_info,
        vault_info,
        token_program_info,
        amount,
    )?;
    if received == 0 {
        return Err(StakingError::ZeroValue.into());
    }

    pool.receive_vault_rewards(received)?;

    super::exit_guard(&mut pool);
    super::store_pool(pool_info, &pool)?;

    events::emit_vault_rewards_received(&events::VaultRewardsReceived {
        pool: *pool_info.key,
        amount: received,
    });
    msg!("Received {} vault rewards", received);

    Ok(())
}
