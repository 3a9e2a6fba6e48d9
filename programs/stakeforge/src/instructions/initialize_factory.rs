//! Initialize the emission factory

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
    state::{Factory, FACTORY_SEED},
};

/// Initialize the factory holding the global emission schedule
///
/// Accounts:
/// 0. `[writable]` Factory account (PDA: ["factory", reward_mint])
/// 1. `[]` Reward token mint (Token 2022, factory PDA as mint authority)
/// 2. `[]` Escrow token mint (Token 2022, factory PDA as mint authority)
/// 3. `[writable, signer]` Authority/payer
/// 4. `[]` System program
pub fn process_initialize_factory(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    reward_per_second: u64,
    seconds_per_update: u32,
    end_time: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let reward_mint_info = next_account_info(account_info_iter)?;
    let escrow_mint_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(authority_info)?;

    if reward_per_second == 0 {
        return Err(StakingError::ZeroValue.into());
    }

    // Both mints must be Token 2022 mints
    if *reward_mint_info.owner != spl_token_2022::id()
        || *escrow_mint_info.owner != spl_token_2022::id()
    {
        return Err(StakingError::InvalidTokenProgram.into());
    }

    let (expected_factory, factory_bump) =
        Factory::derive_pda(reward_mint_info.key, program_id);
    if *factory_info.key != expected_factory {
        return Err(StakingError::InvalidPda.into());
    }
    if !factory_info.data_is_empty() {
        return Err(StakingError::AlreadyInitialized.into());
    }

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    if end_time <= now {
        return Err(StakingError::InvalidEndTime.into());
    }

    let rent = Rent::get()?;
    let factory_seeds = &[
        FACTORY_SEED,
        reward_mint_info.key.as_ref(),
        &[factory_bump],
    ];

    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            factory_info.key,
            rent.minimum_balance(Factory::LEN),
            Factory::LEN as u64,
            program_id,
        ),
        &[
            authority_info.clone(),
            factory_info.clone(),
            system_program_info.clone(),
        ],
        &[factory_seeds],
    )?;

    let factory = Factory::new(
        *authority_info.key,
        *reward_mint_info.key,
        *escrow_mint_info.key,
        reward_per_second,
        seconds_per_update,
        now,
        end_time,
        factory_bump,
    );

    let mut factory_data = factory_info.try_borrow_mut_data()?;
    factory.serialize(&mut &mut factory_data[..])?;

    msg!(
        "Initialized factory: {} reward tokens/s, decay every {}s, end {}",
        reward_per_second,
        seconds_per_update,
        end_time
    );

    Ok(())
}
