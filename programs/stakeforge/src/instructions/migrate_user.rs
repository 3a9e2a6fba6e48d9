//! Move a user's aggregates to a fresh record

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    sysvar::Sysvar,
};

use crate::{error::StakingError, events};

/// Migrate all aggregates of the signer's record to `to`, tombstoning the
/// source stakes. Ingested v1 ids are cleared without travelling, so a v1
/// bonus does not survive migration.
///
/// Accounts:
/// 0. `[writable]` Factory account
/// 1. `[writable]` Pool account
/// 2. `[writable]` Source user record
/// 3. `[writable]` Destination user record (PDA: ["user", pool, to])
/// 4. `[writable, signer]` User/owner (payer for the destination)
/// 5. `[]` System program
pub fn process_migrate_user(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    to: Pubkey,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let factory_info = next_account_info(account_info_iter)?;
    let pool_info = next_account_info(account_info_iter)?;
    let source_record_info = next_account_info(account_info_iter)?;
    let destination_record_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program_info = next_account_info(account_info_iter)?;

    super::expect_signer(user_info)?;

    if to == Pubkey::default() {
        return Err(StakingError::ZeroValue.into());
    }
    if to == *user_info.key {
        return Err(StakingError::DestinationNotEmpty.into());
    }

    let mut factory = super::load_factory(factory_info, program_id)?;
    let mut pool = super::load_pool(pool_info, factory_info, program_id)?;
    let mut source = super::load_user_record(
        source_record_info,
        pool_info.key,
        user_info.key,
        program_id,
    )?;
    let mut destination = super::load_or_create_user_record(
        destination_record_info,
        pool_info.key,
        &to,
        user_info,
        system_program_info,
        program_id,
    )?;

    let clock = Clock::get()?;
    let now = clock.unix_timestamp as u64;

    pool.sync(&mut factory, now)?;
    pool.migrate_user(&mut source, &mut destination)?;

    super::store_factory(factory_info, &factory)?;
    super::store_pool(pool_info, &pool)?;
    super::store_user_record(source_record_info, &source, user_info, system_program_info)?;
    super::store_user_record(
        destination_record_info,
        &destination,
        user_info,
        system_program_info,
    )?;

    events::emit_user_migrated(&events::UserMigrated {
        pool: *pool_info.key,
        from: *user_info.key,
        to,
    });
    msg!("Migrated user {} to {}", user_info.key, to);

    Ok(())
}
