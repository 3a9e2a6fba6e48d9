//! Configure the privileged revenue vault

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
};

use crate::{error::StakingError, events};

/// Set the vault allowed to inject external revenue (authority only)
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[signer]` Factory authority
pub fn process_set_vault(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    vault: Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;

    super::expect_signer(authority_info)?;

    let mut factory = super::load_factory(factory_info, program_id)?;
    if factory.authority != *authority_info.key {
        return Err(StakingError::AccessDenied.into());
    }

    factory.vault = vault;
    super::store_factory(factory_info, &factory)?;

    events::emit_vault_set(&events::VaultSet {
        factory: *factory_info.key,
        vault,
    });
    msg!("Vault set to {}", vault);

    Ok(())
}
