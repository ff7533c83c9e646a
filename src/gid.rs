/// A single 32-bit tile reference from a layer's data stream.
///
/// The top three bits carry the flip flags and the rest is a 1-based
/// index into the tileset grid, with 0 meaning "no tile here". An empty
/// reference never carries flip semantics: its flags always read as unset,
/// and composing any flags onto index 0 yields a plain 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Gid(pub u32);

impl Gid {
    /// Bit flag for a horizontal flip.
    pub const FLIP_H: u32 = 0x8000_0000;
    /// Bit flag for a vertical flip.
    pub const FLIP_V: u32 = 0x4000_0000;
    /// Bit flag for a diagonal (anti-diagonal axis) flip.
    pub const FLIP_D: u32 = 0x2000_0000;
    /// Mask selecting the tile index bits.
    pub const INDEX_MASK: u32 = 0x1FFF_FFFF;
    /// The empty reference.
    pub const EMPTY: Self = Self(0);

    /// Returns the raw tile index, with the flip bits stripped.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    /// Returns whether this reference points at no tile.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.index() == 0
    }

    /// Returns whether the tile is flipped horizontally.
    #[inline]
    #[must_use]
    pub const fn flip_h(self) -> bool {
        !self.is_empty() && self.0 & Self::FLIP_H != 0
    }

    /// Returns whether the tile is flipped vertically.
    #[inline]
    #[must_use]
    pub const fn flip_v(self) -> bool {
        !self.is_empty() && self.0 & Self::FLIP_V != 0
    }

    /// Returns whether the tile is flipped diagonally.
    #[inline]
    #[must_use]
    pub const fn flip_d(self) -> bool {
        !self.is_empty() && self.0 & Self::FLIP_D != 0
    }

    /// Splits the reference into its flip flags and raw index.
    #[must_use]
    pub const fn split(self) -> (bool, bool, bool, u32) {
        (self.flip_h(), self.flip_v(), self.flip_d(), self.index())
    }

    /// Builds a reference from flip flags and a raw index.
    ///
    /// Indices wider than [`Self::INDEX_MASK`] are truncated to it.
    #[must_use]
    pub const fn compose(flip_h: bool, flip_v: bool, flip_d: bool, index: u32) -> Self {
        if index & Self::INDEX_MASK == 0 {
            return Self::EMPTY;
        }
        let mut bits = index & Self::INDEX_MASK;
        if flip_h {
            bits |= Self::FLIP_H;
        }
        if flip_v {
            bits |= Self::FLIP_V;
        }
        if flip_d {
            bits |= Self::FLIP_D;
        }
        Self(bits)
    }
}
