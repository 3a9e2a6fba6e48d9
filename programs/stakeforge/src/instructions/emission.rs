//! Emission schedule maintenance

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events};

/// Apply the periodic 3% decay to the emission rate (permissionless crank)
///
/// Accounts:
/// 0. `[writable]` Factory account
pub fn process_update_reward_per_second(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;

    let mut factory = super::load_factory(factory_info, program_id)?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    factory.update_reward_per_second(now)?;
    super::store_factory(factory_info, &factory)?;

    events::emit_reward_per_second_updated(&events::RewardPerSecondUpdated {
        factory: *factory_info.key,
        reward_per_second: factory.reward_per_second,
    });
    msg!("Emission decayed to {}/s", factory.reward_per_second);

    Ok(())
}

/// Move the emission end time (authority only)
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[signer]` Factory authority
pub fn process_set_end_time(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    end_time: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;

    super::expect_signer(authority_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    if factory.authority != *authority_info.key {
        return Err(StakingError::AccessDenied.into());
    }
    if end_time <= factory.last_ratio_update {
        return Err(StakingError::InvalidEndTime.into());
    }

    factory.end_time = end_time;
    super::store_factory(factory_info, &factory)?;

    events::emit_end_time_updated(&events::EndTimeUpdated {
        factory: *factory_info.key,
        end_time,
    });
    msg!("Emission end time set to {}", end_time);

    Ok(())
}
