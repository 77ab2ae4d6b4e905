//! Read-only file system interface.
//!
//! The kernel only needs name resolution, directory enumeration and
//! positional reads. [`image::ImageFs`] implements them over the boot
//! module; anything else implementing [`FileSystem`] can stand in.

pub mod image;
pub mod ops;

pub use image::ImageFs;
pub use ops::{FileKind, FileOps, IoContext};

use crate::config::MAX_NAME_LEN;
use crate::error::{KResult, KernelError};

/// Inode number inside the file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeId(pub u32);

/// File type tag stored in each directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    /// Real-time clock device
    Rtc = 0,
    /// The (single) directory
    Directory = 1,
    /// Regular file
    Regular = 2,
}

impl TryFrom<u32> for FileType {
    type Error = KernelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FileType::Rtc),
            1 => Ok(FileType::Directory),
            2 => Ok(FileType::Regular),
            _ => Err(KernelError::CorruptImage),
        }
    }
}

/// One directory entry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; MAX_NAME_LEN],
    name_len: usize,
    /// Type tag.
    pub file_type: FileType,
    /// Inode holding the file's data (meaningless for devices).
    pub inode: InodeId,
}

impl DirEntry {
    /// Build an entry from a raw 32-byte name field; the name ends at the
    /// first NUL or fills the whole field.
    pub fn new(raw_name: &[u8], file_type: FileType, inode: InodeId) -> Self {
        let mut name = [0u8; MAX_NAME_LEN];
        let len = raw_name
            .iter()
            .take(MAX_NAME_LEN)
            .position(|b| *b == 0)
            .unwrap_or(raw_name.len().min(MAX_NAME_LEN));
        name[..len].copy_from_slice(&raw_name[..len]);
        Self {
            name,
            name_len: len,
            file_type,
            inode,
        }
    }

    /// Entry name without padding.
    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len]
    }
}

impl core::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirEntry")
            .field("name", &core::str::from_utf8(self.name()).unwrap_or("?"))
            .field("file_type", &self.file_type)
            .field("inode", &self.inode.0)
            .finish()
    }
}

/// Read-only file system collaborator.
pub trait FileSystem {
    /// Resolve a name to its directory entry.
    fn lookup(&self, name: &[u8]) -> KResult<DirEntry>;

    /// Directory entry at `index`, in directory order.
    fn entry_at(&self, index: usize) -> Option<DirEntry>;

    /// Read from `inode` starting at `offset`. Returns the number of bytes
    /// copied, 0 at or past the end of the file.
    fn read(&self, inode: InodeId, offset: u32, buf: &mut [u8]) -> KResult<usize>;

    /// Length of the file in bytes.
    fn file_len(&self, inode: InodeId) -> KResult<u32>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn lookup(&self, name: &[u8]) -> KResult<DirEntry> {
        (**self).lookup(name)
    }

    fn entry_at(&self, index: usize) -> Option<DirEntry> {
        (**self).entry_at(index)
    }

    fn read(&self, inode: InodeId, offset: u32, buf: &mut [u8]) -> KResult<usize> {
        (**self).read(inode, offset, buf)
    }

    fn file_len(&self, inode: InodeId) -> KResult<u32> {
        (**self).file_len(inode)
    }
}

/// Iterate over every entry of a file system.
pub fn entries<F: FileSystem + ?Sized>(fs: &F) -> impl Iterator<Item = DirEntry> + '_ {
    (0..).map_while(move |index| fs.entry_at(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_entry_trims_nul_padding() {
        let mut raw = [0u8; MAX_NAME_LEN];
        raw[..5].copy_from_slice(b"shell");
        let entry = DirEntry::new(&raw, FileType::Regular, InodeId(3));
        assert_eq!(entry.name(), b"shell");
    }

    #[test]
    fn test_dir_entry_full_width_name() {
        let raw = [b'x'; MAX_NAME_LEN];
        let entry = DirEntry::new(&raw, FileType::Regular, InodeId(0));
        assert_eq!(entry.name().len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_file_type_tags() {
        assert_eq!(FileType::try_from(0), Ok(FileType::Rtc));
        assert_eq!(FileType::try_from(1), Ok(FileType::Directory));
        assert_eq!(FileType::try_from(2), Ok(FileType::Regular));
        assert_eq!(FileType::try_from(7), Err(KernelError::CorruptImage));
    }
}
