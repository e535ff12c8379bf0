//! Byte-level write protection ("poke filters").

use crate::addr::{mask_addr, Size};

/// Number of protect-entry slots.
pub const COUNT: usize = 64;

/// How a [`Protect`] entry treats a matching write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Restore the prior value, discarding the incoming write (when the
    /// prior value is known; otherwise the write passes through).
    Block,
    /// Force every matching byte to the entry's configured value.
    Set,
}

/// A single protect-entry slot.
#[derive(Clone, Debug)]
pub struct Protect {
    /// Canonical (mirror-folded) base address.
    addr: u32,
    /// Address mask used for matching, widened for mirrored regions.
    addr_mask: u32,
    /// Protected region size.
    size: Size,
    /// Block or force-value behavior.
    mode: Mode,
    /// Force value for [`Mode::Set`], truncated to `size`.
    value: u32,
    /// Per-byte addresses and values, precomputed on construction.
    bytes: Vec<ProtectByte>,
}

#[derive(Clone, Copy, Debug)]
struct ProtectByte {
    addr: u32,
    value: u8,
}

impl Protect {
    fn new(addr: u32, size: Size, mode: Mode, value: u32, mirrors: &dyn MirrorMap) -> Self {
        let value = size.truncate(value);
        let addr = mirrors.canonicalize(mask_addr(addr));
        let addr_mask = mirrors.mask_for(addr);
        let size_bytes = size.bytes();
        let bytes = (0..size_bytes)
            .map(|i| {
                let shift = (size_bytes - 1 - i) * 8;
                ProtectByte {
                    addr: mask_addr(addr + i),
                    value: ((value >> shift) & 0xff) as u8,
                }
            })
            .collect();
        Self {
            addr,
            addr_mask,
            size,
            mode,
            value,
            bytes,
        }
    }

    /// Canonical base address.
    #[must_use]
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Matching address mask.
    #[must_use]
    pub fn addr_mask(&self) -> u32 {
        self.addr_mask
    }

    /// Protected region size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Block or force-value behavior.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Force value (meaningless for [`Mode::Block`]).
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Folds an address in a mirrored memory region to its canonical alias
/// and supplies the widened mask used to match any alias.
///
/// Grounded in `geo_protect_canonicalAddr`/`geo_protect_maskForAddr`; kept
/// pluggable rather than hard-coded to one machine's memory map, since
/// the physical memory map itself is out of scope for this core.
pub trait MirrorMap {
    /// Folds `addr24` (already masked to 24 bits) to its canonical alias.
    fn canonicalize(&self, addr24: u32) -> u32;
    /// Returns the address mask that matches every alias of `addr24`.
    fn mask_for(&self, addr24: u32) -> u32;
}

/// A [`MirrorMap`] with no mirrored regions: every address is its own
/// canonical alias and matches exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMirrors;

impl MirrorMap for NoMirrors {
    fn canonicalize(&self, addr24: u32) -> u32 {
        addr24
    }

    fn mask_for(&self, _addr24: u32) -> u32 {
        crate::addr::ADDR_MASK
    }
}

/// Page-presence bitmap over the 24-bit address space (4096 pages of
/// 4 KiB each), used to skip the filter's inner loop on cold pages.
#[derive(Debug)]
struct PageMask([u64; 64]);

impl Default for PageMask {
    fn default() -> Self {
        Self([0; 64])
    }
}

impl PageMask {
    fn clear(&mut self) {
        self.0 = [0; 64];
    }

    fn set(&mut self, addr24: u32) {
        let page = addr24 >> 12;
        self.0[(page >> 6) as usize] |= 1u64 << (page & 63);
    }

    fn test(&self, addr24: u32) -> bool {
        let page = addr24 >> 12;
        (self.0[(page >> 6) as usize] >> (page & 63)) & 1 != 0
    }
}

/// Byte-level write protection table.
pub struct Protects {
    slots: Vec<Option<Protect>>,
    enabled_mask: u64,
    page_mask: PageMask,
    mirrors: Box<dyn MirrorMap>,
}

impl std::fmt::Debug for Protects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protects")
            .field("slots", &self.slots)
            .field("enabled_mask", &self.enabled_mask)
            .finish_non_exhaustive()
    }
}

impl Default for Protects {
    fn default() -> Self {
        Self::with_mirrors(Box::new(NoMirrors))
    }
}

impl Protects {
    /// Constructs an empty protect table using the default (no mirroring)
    /// memory map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs an empty protect table using a custom [`MirrorMap`].
    #[must_use]
    pub fn with_mirrors(mirrors: Box<dyn MirrorMap>) -> Self {
        Self {
            slots: vec![None; COUNT],
            enabled_mask: 0,
            page_mask: PageMask::default(),
            mirrors,
        }
    }

    /// Clears every entry.
    pub fn reset(&mut self) {
        self.slots = vec![None; COUNT];
        self.enabled_mask = 0;
        self.page_mask.clear();
    }

    /// Installs a protect entry.
    ///
    /// Deduplicates against an existing entry with identical canonical
    /// parameters (grounded in `geo_protect_add`), returning its index
    /// instead of allocating a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidSize`] or
    /// [`crate::Error::InvalidProtectMode`] for malformed parameters, not
    /// a capacity failure — capacity exhaustion returns `Ok(None)`.
    pub fn add(
        &mut self,
        addr: u32,
        size_bits: u32,
        mode: Mode,
        value: u32,
    ) -> Result<Option<usize>, crate::Error> {
        let size = Size::from_bits(size_bits)?;
        let entry = Protect::new(addr, size, mode, value, self.mirrors.as_ref());

        if let Some(index) = self.slots.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref().filter(|e| {
                e.addr == entry.addr
                    && e.addr_mask == entry.addr_mask
                    && e.size == entry.size
                    && e.mode == entry.mode
                    && e.value == entry.value
            })?;
            Some(i)
        }) {
            return Ok(Some(index));
        }

        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Ok(None);
        };
        self.slots[index] = Some(entry);
        self.enabled_mask |= 1 << index;
        self.rebuild_page_mask();
        Ok(Some(index))
    }

    /// Removes the entry at `index`. A silent no-op if out of range or
    /// already empty.
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
            self.enabled_mask &= !(1 << index);
            self.rebuild_page_mask();
        }
    }

    /// Returns up to `cap` `(index, entry)` pairs for installed slots, in
    /// slot order.
    #[must_use]
    pub fn snapshot(&self, cap: usize) -> Vec<(usize, &Protect)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e)))
            .take(cap)
            .collect()
    }

    /// Current enabled-slot bitmask.
    #[must_use]
    pub fn enabled_mask(&self) -> u64 {
        self.enabled_mask
    }

    /// Overwrites the enabled-slot bitmask directly.
    pub fn set_enabled_mask(&mut self, mask: u64) {
        self.enabled_mask = mask;
        self.rebuild_page_mask();
    }

    fn rebuild_page_mask(&mut self) {
        self.page_mask.clear();
        if self.enabled_mask == 0 {
            return;
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if self.enabled_mask & (1 << i) == 0 {
                continue;
            }
            let Some(entry) = slot else { continue };
            for byte in &entry.bytes {
                self.page_mask.set(byte.addr);
            }
        }
    }

    /// Filters an outgoing write, per the §4.4 algorithm.
    ///
    /// `old_value`/`old_valid` describe the value currently at `addr`
    /// (truncated to `size`), if known. Mutates `value` in place.
    pub fn filter_write(
        &self,
        addr: u32,
        size: Size,
        old_value: u32,
        old_valid: bool,
        value: &mut u32,
    ) {
        if self.enabled_mask == 0 {
            return;
        }
        let addr = mask_addr(addr);
        let size_bytes = size.bytes();

        let touches_protected_page = (0..size_bytes)
            .map(|i| mask_addr(addr + i))
            .any(|a| self.page_mask.test(a));
        if !touches_protected_page {
            return;
        }

        let v = size.truncate(*value);
        let ov = size.truncate(old_value);
        let mut bytes: Vec<u8> = (0..size_bytes)
            .map(|i| ((v >> ((size_bytes - 1 - i) * 8)) & 0xff) as u8)
            .collect();
        let old_bytes: Vec<u8> = (0..size_bytes)
            .map(|i| ((ov >> ((size_bytes - 1 - i) * 8)) & 0xff) as u8)
            .collect();

        for write_index in 0..size_bytes as usize {
            let write_addr = mask_addr(addr + write_index as u32);
            if !self.page_mask.test(write_addr) {
                continue;
            }
            'entries: for (i, slot) in self.slots.iter().enumerate() {
                if self.enabled_mask & (1 << i) == 0 {
                    continue;
                }
                let Some(entry) = slot else { continue };
                for byte in &entry.bytes {
                    if (write_addr & entry.addr_mask) != (byte.addr & entry.addr_mask) {
                        continue;
                    }
                    // Intentionally indexes the *outer* write_index, not
                    // this byte's own position in the entry: the
                    // reference implementation does the same, which only
                    // behaves sensibly when the entry is aligned with the
                    // write (§ DESIGN.md Open Question).
                    match entry.mode {
                        Mode::Set => bytes[write_index] = byte.value,
                        Mode::Block if old_valid => bytes[write_index] = old_bytes[write_index],
                        Mode::Block => {}
                    }
                    break 'entries;
                }
            }
        }

        *value = bytes
            .into_iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(b));
    }
}
