//! Operation return codes (spec §7).

/// Errors surfaced to the caller of a top-level [`crate::driver::NandController`]
/// operation, or by [`crate::chain::Chain`] while assembling one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The chain builder rejected a command/data-size combination. Reported
    /// synchronously; the chain is left untouched.
    InvalidArgument,
    /// The on-chip `wait-for-ready` timed out; the per-step failure
    /// terminator fired with this driver-chosen code.
    NandTimeout,
    /// `read_status`'s low two bits were nonzero after program or erase; the
    /// `readcompare` sense branch fired.
    StatusMismatch,
    /// An ECC read reported at least one uncorrectable sub-block.
    Uncorrectable,
    /// The chain's terminator fired with an unrecognized driver-private code.
    /// Carries the raw code for diagnostics.
    Unexpected(i32),
}

/// The driver-private code carried by a chain's terminator descriptor. `Ok`
/// maps to a successful completion; every `Error` variant maps to a distinct
/// negative code, mirroring the original C driver's plain `int` returns.
impl Error {
    pub const CODE_NAND_TIMEOUT: i32 = -2;
    pub const CODE_STATUS_MISMATCH: i32 = -1;

    /// The raw terminator/return code this error corresponds to, for callers
    /// that need to match against the wire-level i32 protocol from spec §6/§7.
    pub fn code(self) -> i32 {
        match self {
            Error::InvalidArgument => -22, // EINVAL, matching the original's -EINVAL
            Error::NandTimeout => Self::CODE_NAND_TIMEOUT,
            Error::StatusMismatch => Self::CODE_STATUS_MISMATCH,
            Error::Uncorrectable => -255,
            Error::Unexpected(code) => code,
        }
    }

    /// Reconstruct an `Error` from a terminator's raw return code. `0` is not
    /// representable here (it means success) and will panic; callers should
    /// check for the `Ok` case before calling this.
    pub fn from_code(code: i32) -> Error {
        match code {
            0 => panic!("Error::from_code called with the success code"),
            Self::CODE_NAND_TIMEOUT => Error::NandTimeout,
            Self::CODE_STATUS_MISMATCH => Error::StatusMismatch,
            -22 => Error::InvalidArgument,
            other => Error::Unexpected(other),
        }
    }
}
