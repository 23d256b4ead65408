//! The NAND command table (spec §3/§0.6), taken verbatim (cmd bytes, address
//! size, data policy, second command byte) from
//! `original_source/storage/imx6ull-flash/flashdrv.c`'s `commands[]` array.

/// How a command's optional embedded data-write phase is constrained.
/// Mirrors the original's `signed char data` column: `0` = no data, a
/// positive count = an exact size, `-1` = any non-zero size, `-2` = no
/// constraint at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPolicy {
    /// The command never carries an embedded data-write phase.
    None,
    /// The data-write phase must be exactly this many bytes.
    Exact(u16),
    /// The data-write phase may be any non-zero size.
    NonZero,
    /// No constraint is applied at all (the original table's `-2` rows: the
    /// C driver's validation simply does not cover this case, so neither
    /// does this one — preserved verbatim, not rationalized).
    Free,
}

impl DataPolicy {
    /// Mirrors `flashdrv_issue`'s three `if` checks exactly, including the
    /// fact that `Free` is checked by none of them.
    fn rejects(self, data_size: u16) -> bool {
        match self {
            DataPolicy::Exact(n) => data_size != n,
            DataPolicy::NonZero => data_size == 0,
            DataPolicy::None => data_size != 0,
            DataPolicy::Free => false,
        }
    }
}

/// One row of the NAND command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd1: u8,
    pub addr_size: u8,
    pub data_policy: DataPolicy,
    /// Second command byte, emitted as its own cmd+addr descriptor after the
    /// data phase; `0x00` means "no second command byte".
    pub cmd2: u8,
}

impl CommandSpec {
    /// `Ok(())` iff `data_size` satisfies this command's [`DataPolicy`];
    /// matches `flashdrv_issue`'s validation, which runs before any
    /// descriptor is written.
    pub fn validate(&self, data_size: u16) -> Result<(), crate::Error> {
        if self.data_policy.rejects(data_size) { Err(crate::Error::InvalidArgument) } else { Ok(()) }
    }
}

macro_rules! commands {
    ($($variant:ident = { $cmd1:expr, $addrsz:expr, $policy:expr, $cmd2:expr $(,)? }),+ $(,)?) => {
        /// Abstract NAND command identifier, indexing [`CommandSpec`] rows.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum Command { $($variant),+ }

        impl Command {
            /// This command's `(cmd1, addr_size, data_policy, cmd2)` row.
            pub const fn spec(self) -> CommandSpec {
                match self {
                    $(Command::$variant => CommandSpec {
                        cmd1: $cmd1,
                        addr_size: $addrsz,
                        data_policy: $policy,
                        cmd2: $cmd2,
                    }),+
                }
            }
        }
    };
}

commands! {
    Reset = { 0xff, 0, DataPolicy::None, 0x00 },
    ReadId = { 0x90, 1, DataPolicy::None, 0x00 },
    ReadParameterPage = { 0xec, 1, DataPolicy::None, 0x00 },
    ReadUniqueId = { 0xed, 1, DataPolicy::None, 0x00 },
    GetFeatures = { 0xee, 1, DataPolicy::None, 0x00 },
    SetFeatures = { 0xef, 1, DataPolicy::Exact(4), 0x00 },
    ReadStatus = { 0x70, 0, DataPolicy::None, 0x00 },
    ReadStatusEnhanced = { 0x78, 3, DataPolicy::None, 0x00 },
    RandomDataRead = { 0x05, 2, DataPolicy::None, 0xe0 },
    RandomDataReadTwoPlane = { 0x06, 5, DataPolicy::None, 0xe0 },
    RandomDataInput = { 0x85, 2, DataPolicy::Free, 0x00 },
    ProgramForInternalDataMoveColumn = { 0x85, 5, DataPolicy::Free, 0x00 },
    ReadMode = { 0x00, 0, DataPolicy::None, 0x00 },
    ReadPage = { 0x00, 5, DataPolicy::None, 0x30 },
    ReadPageCacheSequential = { 0x31, 0, DataPolicy::None, 0x00 },
    ReadPageCacheRandom = { 0x00, 5, DataPolicy::None, 0x31 },
    ReadPageCacheLast = { 0x3f, 0, DataPolicy::None, 0x00 },
    ProgramPage = { 0x80, 5, DataPolicy::NonZero, 0x10 },
    ProgramPageCache = { 0x80, 5, DataPolicy::NonZero, 0x15 },
    EraseBlock = { 0x60, 3, DataPolicy::None, 0xd0 },
    ReadForInternalDataMove = { 0x00, 5, DataPolicy::None, 0x35 },
    ProgramForInternalDataMove = { 0x85, 5, DataPolicy::Free, 0x10 },
    BlockUnlockLow = { 0x23, 3, DataPolicy::None, 0x00 },
    BlockUnlockHigh = { 0x24, 3, DataPolicy::None, 0x00 },
    BlockLock = { 0x2a, 0, DataPolicy::None, 0x00 },
    BlockLockTight = { 0x2c, 0, DataPolicy::None, 0x00 },
    BlockLockReadStatus = { 0x7a, 3, DataPolicy::None, 0x00 },
    OtpDataLockByBlock = { 0x80, 5, DataPolicy::None, 0x10 },
    OtpDataProgram = { 0x80, 5, DataPolicy::NonZero, 0x10 },
    OtpDataRead = { 0x00, 5, DataPolicy::None, 0x30 },
}
