//! Register a staking pool with the factory

use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    error::StakingError,
    events,
    state::{Pool, POOL_SEED, REWARD_VAULT_SEED, TOKEN_VAULT_SEED},
};

/// Register a pool for a pool-token mint and add its weight to the
/// factory's emission split
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account (PDA: ["pool", factory, pool_token_mint])
/// 2. `[]` Pool token mint (Token 2022)
/// 3. `[]` Reward token mint
/// 4. `[writable]` Token vault (PDA: ["token_vault", pool])
/// 5. `[writable]` Reward vault (PDA: ["reward_vault", pool])
/// 6. `[writable, signer]` Factory authority/payer
/// 7. `[]` System program
/// 8. `[]` Token 2022 program
#[allow(clippy::too_many_arguments)]
pub fn process_register_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    weight: u32,
    is_flash_pool: bool,
    v1_program: Pubkey,
    v1_pool: Pubkey,
    v1_stake_max_period: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let pool_token_mint_info = next_account_info(account_info_iter)?;
    let reward_mint_info = next_account_info(account_info_iter)?;
    let token_vault_info = next_account_info(account_info_iter)?;
    let reward_vault_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(authority_info)?;
    super::expect_token_program(token_program_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    if factory.authority != *authority_info.key {
        return Err(StakingError::AccessDenied.into());
    }
    if factory.reward_mint != *reward_mint_info.key {
        return Err(StakingError::InvalidPoolMint.into());
    }
    if *pool_token_mint_info.owner != spl_token_2022::id() {
        return Err(StakingError::InvalidTokenProgram.into());
    }

    let (expected_pool, pool_bump) =
        Pool::derive_pda(factory_info.key, pool_token_mint_info.key, program_id);
    if *pool_info.key != expected_pool {
        return Err(StakingError::InvalidPda.into());
    }
    if !pool_info.data_is_empty() {
        return Err(StakingError::AlreadyInitialized.into());
    }

    let (expected_token_vault, token_vault_bump) =
        Pool::derive_token_vault_pda(pool_info.key, program_id);
    if *token_vault_info.key != expected_token_vault {
        return Err(StakingError::InvalidPda.into());
    }
    let (expected_reward_vault, reward_vault_bump) =
        Pool::derive_reward_vault_pda(pool_info.key, program_id);
    if *reward_vault_info.key != expected_reward_vault {
        return Err(StakingError::InvalidPda.into());
    }

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;
    let rent = Rent::get()?;

    // Create pool account
    let pool_seeds = &[
        POOL_SEED,
        factory_info.key.as_ref(),
        pool_token_mint_info.key.as_ref(),
        &[pool_bump],
    ];
    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            pool_info.key,
            rent.minimum_balance(Pool::LEN),
            Pool::LEN as u64,
            program_id,
        ),
        &[
            authority_info.clone(),
            pool_info.clone(),
            system_program_info.clone(),
        ],
        &[pool_seeds],
    )?;

    // Create the two vault token accounts, both owned by the pool PDA
    let vault_size = spl_token_2022::extension::ExtensionType::try_calculate_account_len::<
        spl_token_2022::state::Account,
    >(&[])?;
    let vault_rent = rent.minimum_balance(vault_size);

    let token_vault_seeds = &[
        TOKEN_VAULT_SEED,
        pool_info.key.as_ref(),
        &[token_vault_bump],
    ];
    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            token_vault_info.key,
            vault_rent,
            vault_size as u64,
            &spl_token_2022::id(),
        ),
        &[
            authority_info.clone(),
            token_vault_info.clone(),
            system_program_info.clone(),
        ],
        &[token_vault_seeds],
    )?;
    invoke_signed(
        &spl_token_2022::instruction::initialize_account3(
            &spl_token_2022::id(),
            token_vault_info.key,
            pool_token_mint_info.key,
            pool_info.key,
        )?,
        &[token_vault_info.clone(), pool_token_mint_info.clone()],
        &[token_vault_seeds],
    )?;

    let reward_vault_seeds = &[
        REWARD_VAULT_SEED,
        pool_info.key.as_ref(),
        &[reward_vault_bump],
    ];
    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            reward_vault_info.key,
            vault_rent,
            vault_size as u64,
            &spl_token_2022::id(),
        ),
        &[
            authority_info.clone(),
            reward_vault_info.clone(),
            system_program_info.clone(),
        ],
        &[reward_vault_seeds],
    )?;
    invoke_signed(
        &spl_token_2022::instruction::initialize_account3(
            &spl_token_2022::id(),
            reward_vault_info.key,
            reward_mint_info.key,
            pool_info.key,
        )?,
        &[reward_vault_info.clone(), reward_mint_info.clone()],
        &[reward_vault_seeds],
    )?;

    // Fold the pool weight into the emission split
    factory.total_weight = factory
        .total_weight
        .checked_add(weight)
        .ok_or(StakingError::MathOverflow)?;
    super::store_factory(factory_info, &factory)?;

    let pool = Pool::new(
        *factory_info.key,
        *pool_token_mint_info.key,
        *token_vault_info.key,
        *reward_vault_info.key,
        weight,
        is_flash_pool,
        now,
        v1_program,
        v1_pool,
        v1_stake_max_period,
        pool_bump,
    );
    let mut pool_data = pool_info.try_borrow_mut_data()?;
    pool.serialize(&mut &mut pool_data[..])?;
    drop(pool_data);

    events::emit_pool_registered(&events::PoolRegistered {
        factory: *factory_info.key,
        pool: *pool_info.key,
        pool_token: *pool_token_mint_info.key,
        weight,
    });
    msg!(
        "Registered pool for mint {} with weight {}",
        pool_token_mint_info.key,
        weight
    );

    Ok(())
}
