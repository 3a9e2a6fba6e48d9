use solana_program::program_error::ProgramError;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakingError {
    #[error("Invalid instruction data")]
    InvalidInstruction,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Account not initialized")]
    NotInitialized,

    #[error("Invalid account owner")]
    InvalidAccountOwner,

    #[error("Invalid PDA")]
    InvalidPda,

    #[error("Missing required signer")]
    MissingRequiredSigner,

    #[error("Invalid token program")]
    InvalidTokenProgram,

    #[error("Invalid pool mint")]
    InvalidPoolMint,

    #[error("Invalid token vault")]
    InvalidTokenVault,

    #[error("Math overflow")]
    MathOverflow,

    #[error("Zero amount not allowed")]
    ZeroValue,

    #[error("Lock period must end in (now, now + max lock]")]
    InvalidLock,

    #[error("Lock extension must grow and stay within the max lock period")]
    InvalidLockExtension,

    #[error("Stake is still locked")]
    StillLocked,

    #[error("Amount exceeds stake value")]
    ValueExceedsStake,

    #[error("Insufficient flexible balance")]
    InsufficientBalance,

    #[error("Stake does not exist")]
    StakeNotFound,

    #[error("Empty batch")]
    EmptyBatch,

    #[error("Batch yield flag disagrees with stake")]
    YieldFlagMismatch,

    #[error("Migration destination is not empty")]
    DestinationNotEmpty,

    #[error("Caller is not the factory")]
    NotFactory,

    #[error("Supplied pool is not the reward-token pool")]
    NotRouter,

    #[error("Caller is not the configured vault")]
    NotVault,

    #[error("Access denied")]
    AccessDenied,

    #[error("Operation re-entered")]
    Reentrancy,

    #[error("Ratio update interval has not elapsed")]
    TooSoon,

    #[error("Pool is not registered with the factory")]
    UnknownPool,

    #[error("V1 stake already migrated")]
    AlreadyMigrated,

    #[error("V1 stake not eligible for migration")]
    V1StakeRejected,

    #[error("No staked weight to distribute over")]
    NoStakedWeight,

    #[error("End time must exceed the last ratio update")]
    InvalidEndTime,
}

impl From<StakingError> for ProgramError {
    fn from(e: StakingError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
