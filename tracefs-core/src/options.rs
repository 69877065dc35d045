//! Option bitmasks attached to an instance

use crate::error::{Result, TracefsError};

/// Width of an options mask in bits
pub const OPTIONS_MASK_BITS: u32 = u64::BITS;

/// A 64-bit set of tracing options, addressed by bit position.
///
/// Bit positions are option identifiers from the option catalog; this type does
/// not interpret them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OptionsMask {
    mask: u64,
}

impl OptionsMask {
    pub const fn empty() -> Self {
        Self { mask: 0 }
    }

    pub const fn from_bits(mask: u64) -> Self {
        Self { mask }
    }

    pub const fn bits(&self) -> u64 {
        self.mask
    }

    fn bit(id: u32) -> Result<u64> {
        if id >= OPTIONS_MASK_BITS {
            return Err(TracefsError::InvalidOptionBit(id));
        }
        Ok(1u64 << id)
    }

    pub fn set(&mut self, id: u32) -> Result<()> {
        self.mask |= Self::bit(id)?;
        Ok(())
    }

    pub fn clear(&mut self, id: u32) -> Result<()> {
        self.mask &= !Self::bit(id)?;
        Ok(())
    }

    /// Out-of-range identifiers are never set.
    pub fn is_set(&self, id: u32) -> bool {
        Self::bit(id).map(|b| self.mask & b != 0).unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.mask = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Bit positions that are set, lowest first
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..OPTIONS_MASK_BITS).filter(move |id| self.mask & (1u64 << id) != 0)
    }
}

/// Cached supported/enabled masks of one instance.
///
/// Both start unpopulated and are filled on first query. Only reachable through
/// an instance lock guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionsState {
    pub(crate) supported: Option<OptionsMask>,
    pub(crate) enabled: Option<OptionsMask>,
}

impl OptionsState {
    pub(crate) const fn new() -> Self {
        Self {
            supported: None,
            enabled: None,
        }
    }
}
