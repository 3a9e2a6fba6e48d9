//! Change a pool's share of the emission split

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
};

use crate::{error::StakingError, events};

/// Change a registered pool's weight. Setting it to zero disables the
/// pool's emission without touching deposits.
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[signer]` Factory authority
pub fn process_change_pool_weight(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    new_weight: u32,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;

    super::expect_signer(authority_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;

    if factory.authority != *authority_info.key {
        return Err(StakingError::NotFactory.into());
    }

    factory.total_weight = factory
        .total_weight
        .checked_sub(pool.weight)
        .and_then(|w| w.checked_add(new_weight))
        .ok_or(StakingError::MathOverflow)?;

    // The weight field is overwritten before the event is formed, so the
    // event reports the new value on both sides.
    pool.weight = new_weight;
    events::emit_pool_weight_changed(&events::pool_weight_changed(
        &pool,
        pool_info.key,
        new_weight,
    ));

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;

    msg!("Pool {} weight set to {}", pool_info.key, new_weight);

    Ok(())
}
