//! Page directory and page table entries.
//!
//! Two-level 32-bit paging: a 1024-entry directory whose entries either map
//! a 4 MB page directly (`LARGE`) or point at a 1024-entry table of 4 KB
//! pages. Only the entry format is modelled here; the tables themselves
//! belong to the platform.

use bitflags::bitflags;

bitflags! {
    /// Page directory / page table entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Page is present in memory.
        const PRESENT = 1 << 0;
        /// Page is writable.
        const WRITABLE = 1 << 1;
        /// Page is accessible from user mode.
        const USER = 1 << 2;
        /// Write-through caching.
        const WRITE_THROUGH = 1 << 3;
        /// Disable caching.
        const NO_CACHE = 1 << 4;
        /// Page has been accessed.
        const ACCESSED = 1 << 5;
        /// Page has been written to.
        const DIRTY = 1 << 6;
        /// Directory entry maps a 4 MB page.
        const LARGE = 1 << 7;
        /// Page is global (not flushed on context switch).
        const GLOBAL = 1 << 8;
    }
}

impl PageFlags {
    /// Flags for every user-visible mapping the kernel installs.
    pub const USER_RW: PageFlags = PageFlags::PRESENT
        .union(PageFlags::WRITABLE)
        .union(PageFlags::USER);
}

/// A single directory or table entry.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PageEntry(u32);

impl PageEntry {
    /// Create an empty (not present) entry.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Entry pointing at a 4 KB-aligned physical address.
    pub const fn new(addr: u32, flags: PageFlags) -> Self {
        Self((addr & 0xFFFF_F000) | flags.bits())
    }

    /// Directory entry mapping a 4 MB page.
    pub const fn large(addr: u32, flags: PageFlags) -> Self {
        Self::new(addr, flags.union(PageFlags::LARGE))
    }

    /// Raw entry bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Get the flags of this entry.
    pub fn flags(&self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }

    /// Check if the entry is present.
    pub fn is_present(&self) -> bool {
        self.flags().contains(PageFlags::PRESENT)
    }

    /// Get the physical address this entry points to.
    pub fn addr(&self) -> Option<u32> {
        if self.is_present() {
            Some(self.0 & 0xFFFF_F000)
        } else {
            None
        }
    }
}

impl core::fmt::Debug for PageEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageEntry")
            .field("addr", &format_args!("{:#x}", self.0 & 0xFFFF_F000))
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_entry_layout() {
        let entry = PageEntry::large(0x0080_0000, PageFlags::USER_RW);
        assert_eq!(entry.bits(), 0x0080_0000 | 0x87);
        assert_eq!(entry.addr(), Some(0x0080_0000));
        assert!(entry.flags().contains(PageFlags::LARGE));
    }

    #[test]
    fn test_empty_entry_has_no_addr() {
        assert_eq!(PageEntry::empty().addr(), None);
        assert!(!PageEntry::empty().is_present());
    }

    #[test]
    fn test_low_bits_masked_from_addr() {
        let entry = PageEntry::new(0xB8FFF, PageFlags::PRESENT);
        assert_eq!(entry.addr(), Some(0xB8000));
    }
}
