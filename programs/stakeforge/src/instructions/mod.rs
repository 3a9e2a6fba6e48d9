//! Instruction handlers for the staking engine

pub mod claim;
pub mod emission;
pub mod initialize_factory;
pub mod migrate_user;
pub mod migrate_v1;
pub mod pool_weight;
pub mod register_pool;
pub mod set_vault;
pub mod stake;
pub mod sync;
pub mod unstake;
pub mod update_stake_lock;
pub mod vault_rewards;

pub use claim::*;
pub use emission::*;
pub use initialize_factory::*;
pub use migrate_user::*;
pub use migrate_v1::*;
pub use pool_weight::*;
pub use register_pool::*;
pub use set_vault::*;
pub use stake::*;
pub use sync::*;
pub use unstake::*;
pub use update_stake_lock::*;
pub use vault_rewards::*;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as TokenAccount, Mint},
};

use crate::{
    error::StakingError,
    state::{Factory, Pool, UserRecord, FACTORY_SEED, GUARD_ENTERED, GUARD_IDLE, POOL_SEED, USER_SEED},
};

/// Load and validate the factory account.
pub(crate) fn load_factory(
    factory_info: &AccountInfo,
    program_id: &Pubkey,
) -> Result<Factory, ProgramError> {
    if factory_info.owner != program_id {
        return Err(StakingError::InvalidAccountOwner.into());
    }
    let factory = Factory::try_from_slice(&factory_info.try_borrow_data()?)?;
    if !factory.is_initialized() {
        return Err(StakingError::NotInitialized.into());
    }
    let (expected, _) = Factory::derive_pda(&factory.reward_mint, program_id);
    if *factory_info.key != expected {
        return Err(StakingError::InvalidPda.into());
    }
    Ok(factory)
}

/// Load and validate a pool account registered with `factory_info`.
pub(crate) fn load_pool(
    pool_info: &AccountInfo,
    factory_info: &AccountInfo,
    program_id: &Pubkey,
) -> Result<Pool, ProgramError> {
    if pool_info.owner != program_id {
        return Err(StakingError::InvalidAccountOwner.into());
    }
    let pool = Pool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(StakingError::NotInitialized.into());
    }
    if pool.factory != *factory_info.key {
        return Err(StakingError::UnknownPool.into());
    }
    let (expected, _) = Pool::derive_pda(&pool.factory, &pool.pool_token, program_id);
    if *pool_info.key != expected {
        return Err(StakingError::InvalidPda.into());
    }
    Ok(pool)
}

/// Load and validate a user record for `(pool, owner)`.
pub(crate) fn load_user_record(
    record_info: &AccountInfo,
    pool: &Pubkey,
    owner: &Pubkey,
    program_id: &Pubkey,
) -> Result<UserRecord, ProgramError> {
    if record_info.owner != program_id {
        return Err(StakingError::InvalidAccountOwner.into());
    }
    let data = record_info.try_borrow_data()?;
    let record = UserRecord::deserialize(&mut &data[..])?;
    drop(data);
    if !record.is_initialized() {
        return Err(StakingError::NotInitialized.into());
    }
    if record.owner != *owner || record.pool != *pool {
        return Err(StakingError::InvalidPda.into());
    }
    let (expected, _) = UserRecord::derive_pda(pool, owner, program_id);
    if *record_info.key != expected {
        return Err(StakingError::InvalidPda.into());
    }
    Ok(record)
}

/// Load a user record, creating an empty one on first interaction.
pub(crate) fn load_or_create_user_record<'a>(
    record_info: &AccountInfo<'a>,
    pool: &Pubkey,
    owner: &Pubkey,
    payer_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    program_id: &Pubkey,
) -> Result<UserRecord, ProgramError> {
    let (expected, bump) = UserRecord::derive_pda(pool, owner, program_id);
    if *record_info.key != expected {
        return Err(StakingError::InvalidPda.into());
    }
    if !record_info.data_is_empty() {
        return load_user_record(record_info, pool, owner, program_id);
    }

    if !payer_info.is_signer {
        return Err(StakingError::MissingRequiredSigner.into());
    }
    let record = UserRecord::new(*owner, *pool, bump);
    let space = record.serialized_size();
    let rent = Rent::get()?;
    let seeds = &[USER_SEED, pool.as_ref(), owner.as_ref(), &[bump]];
    invoke_signed(
        &system_instruction::create_account(
            payer_info.key,
            record_info.key,
            rent.minimum_balance(space),
            space as u64,
            program_id,
        ),
        &[
            payer_info.clone(),
            record_info.clone(),
            system_program_info.clone(),
        ],
        &[seeds],
    )?;
    let mut data = record_info.try_borrow_mut_data()?;
    record.serialize(&mut &mut data[..])?;
    Ok(record)
}

pub(crate) fn store_factory(factory_info: &AccountInfo, factory: &Factory) -> ProgramResult {
    let mut data = factory_info.try_borrow_mut_data()?;
    factory.serialize(&mut &mut data[..])?;
    Ok(())
}

pub(crate) fn store_pool(pool_info: &AccountInfo, pool: &Pool) -> ProgramResult {
    let mut data = pool_info.try_borrow_mut_data()?;
    pool.serialize(&mut &mut data[..])?;
    Ok(())
}

/// Persist a user record, resizing the account to the exact serialized
/// size. Growth is rent-topped-up from `payer_info`.
pub(crate) fn store_user_record<'a>(
    record_info: &AccountInfo<'a>,
    record: &UserRecord,
    payer_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
) -> ProgramResult {
    let needed = record.serialized_size();
    if record_info.data_len() != needed {
        let rent = Rent::get()?;
        let minimum = rent.minimum_balance(needed);
        if record_info.lamports() < minimum {
            invoke(
                &system_instruction::transfer(
                    payer_info.key,
                    record_info.key,
                    minimum - record_info.lamports(),
                ),
                &[
                    payer_info.clone(),
                    record_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        record_info.realloc(needed, false)?;
    }
    let mut data = record_info.try_borrow_mut_data()?;
    record.serialize(&mut &mut data[..])?;
    Ok(())
}

/// Enter the pool's re-entry guard and persist it before any external CPI.
pub(crate) fn enter_guard(pool: &mut Pool, pool_info: &AccountInfo) -> ProgramResult {
    if pool.guard != GUARD_IDLE {
        return Err(StakingError::Reentrancy.into());
    }
    pool.guard = GUARD_ENTERED;
    store_pool(pool_info, pool)
}

pub(crate) fn exit_guard(pool: &mut Pool) {
    pool.guard = GUARD_IDLE;
}

pub(crate) fn token_account_balance(info: &AccountInfo) -> Result<u64, ProgramError> {
    let data = info.try_borrow_data()?;
    let account = StateWithExtensions::<TokenAccount>::unpack(&data)?;
    Ok(account.base.amount)
}

pub(crate) fn mint_decimals(info: &AccountInfo) -> Result<u8, ProgramError> {
    let data = info.try_borrow_data()?;
    let mint = StateWithExtensions::<Mint>::unpack(&data)?;
    Ok(mint.base.decimals)
}

/// Transfer tokens into the vault and return the measured balance delta.
/// The delta, not the requested amount, is what gets credited: the pool
/// token may take a transfer fee.
pub(crate) fn transfer_in_measured<'a>(
    source_info: &AccountInfo<'a>,
    mint_info: &AccountInfo<'a>,
    vault_info: &AccountInfo<'a>,
    authority_info: &AccountInfo<'a>,
    token_program_info: &AccountInfo<'a>,
    amount: u64,
) -> Result<u64, ProgramError> {
    let decimals = mint_decimals(mint_info)?;
    let balance_before = token_account_balance(vault_info)?;
    invoke(
        &spl_token_2022::instruction::transfer_checked(
            token_program_info.key,
            source_info.key,
            mint_info.key,
            vault_info.key,
            authority_info.key,
            &[],
            amount,
            decimals,
        )?,
        &[
            source_info.clone(),
            mint_info.clone(),
            vault_info.clone(),
            authority_info.clone(),
        ],
    )?;
    let balance_after = token_account_balance(vault_info)?;
    balance_after
        .checked_sub(balance_before)
        .ok_or_else(|| StakingError::MathOverflow.into())
}

/// Transfer tokens out of a pool-owned vault, signed with the pool seeds.
pub(crate) fn transfer_from_vault<'a>(
    pool: &Pool,
    pool_info: &AccountInfo<'a>,
    vault_info: &AccountInfo<'a>,
    mint_info: &AccountInfo<'a>,
    destination_info: &AccountInfo<'a>,
    token_program_info: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    let decimals = mint_decimals(mint_info)?;
    let bump = [pool.bump];
    let seeds: &[&[u8]] = &[
        POOL_SEED,
        pool.factory.as_ref(),
        pool.pool_token.as_ref(),
        &bump,
    ];
    invoke_signed(
        &spl_token_2022::instruction::transfer_checked(
            token_program_info.key,
            vault_info.key,
            mint_info.key,
            destination_info.key,
            pool_info.key,
            &[],
            amount,
            decimals,
        )?,
        &[
            vault_info.clone(),
            mint_info.clone(),
            destination_info.clone(),
            pool_info.clone(),
        ],
        &[seeds],
    )
}

/// Mint reward or escrow tokens, signed with the factory seeds. The
/// factory PDA is the mint authority of both mints.
pub(crate) fn mint_as_factory<'a>(
    factory: &Factory,
    factory_info: &AccountInfo<'a>,
    mint_info: &AccountInfo<'a>,
    destination_info: &AccountInfo<'a>,
    token_program_info: &AccountInfo<'a>,
    amount: u64,
) -> ProgramResult {
    let bump = [factory.bump];
    let seeds: &[&[u8]] = &[FACTORY_SEED, factory.reward_mint.as_ref(), &bump];
    invoke_signed(
        &spl_token_2022::instruction::mint_to(
            token_program_info.key,
            mint_info.key,
            destination_info.key,
            factory_info.key,
            &[],
            amount,
        )?,
        &[
            mint_info.clone(),
            destination_info.clone(),
            factory_info.clone(),
        ],
        &[seeds],
    )
}

pub(crate) fn expect_signer(info: &AccountInfo) -> ProgramResult {
    if !info.is_signer {
        return Err(StakingError::MissingRequiredSigner.into());
    }
    Ok(())
}

pub(crate) fn expect_token_program(info: &AccountInfo) -> ProgramResult {
    if *info.key != spl_token_2022::id() {
        return Err(StakingError::InvalidTokenProgram.into());
    }
    Ok(())
}
