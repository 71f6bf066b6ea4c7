//! Persistence of the sticky translation flags.
//!
//! Only the flags are serialized. Compiled blocks are a derivable cache:
//! on restore the block cache is cleared unconditionally and repopulates
//! lazily, so stale translations can never survive a state reload.

use thiserror::Error;

use crate::jit::{IrJit, StickyFlag, StickyFlags};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"AJSF";
pub const SNAPSHOT_MAJOR: u16 = 1;
pub const SNAPSHOT_MINOR: u16 = 0;

const FLAG_BYTES: usize = 6;
const SNAPSHOT_LEN: usize = 4 + 4 + 2 * FLAG_BYTES;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("bad snapshot magic")]
    BadMagic,
    #[error("unsupported snapshot version {major}.{minor} (supported major: {SNAPSHOT_MAJOR})")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("snapshot truncated: {len} bytes, expected {SNAPSHOT_LEN}")]
    Truncated { len: usize },
}

fn push_flag(out: &mut Vec<u8>, flag: &StickyFlag) {
    out.push(flag.observed() as u8);
    out.push(flag.acknowledged() as u8);
    out.extend_from_slice(&flag.epoch().to_le_bytes());
}

fn parse_flag(bytes: &[u8]) -> StickyFlag {
    let epoch = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    StickyFlag::restore(bytes[0] != 0, bytes[1] != 0, epoch)
}

impl IrJit {
    /// Serialize the sticky flags. Block cache contents are never persisted.
    pub fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_LEN);
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_MAJOR.to_le_bytes());
        out.extend_from_slice(&SNAPSHOT_MINOR.to_le_bytes());
        push_flag(&mut out, &self.flags().rounding);
        push_flag(&mut out, &self.flags().default_prefix);
        out
    }

    /// Restore the sticky flags and clear the cache for lazy repopulation.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        if bytes.len() < SNAPSHOT_LEN {
            return Err(SnapshotError::Truncated { len: bytes.len() });
        }
        if bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let major = u16::from_le_bytes([bytes[4], bytes[5]]);
        let minor = u16::from_le_bytes([bytes[6], bytes[7]]);
        if major != SNAPSHOT_MAJOR {
            return Err(SnapshotError::UnsupportedVersion { major, minor });
        }

        let flags = StickyFlags {
            rounding: parse_flag(&bytes[8..8 + FLAG_BYTES]),
            default_prefix: parse_flag(&bytes[8 + FLAG_BYTES..8 + 2 * FLAG_BYTES]),
        };
        *self.flags_mut() = flags;

        // Everything compiled before the reload is suspect; drop it all and
        // let the compile path rebuild under the restored assumptions.
        self.clear();
        Ok(())
    }
}
