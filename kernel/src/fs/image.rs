//! Boot-module file system.
//!
//! Layout, all little-endian and in 4 KB blocks:
//!
//! ```text
//! block 0            boot block: dentry count, inode count, data block count,
//!                    52 reserved bytes, then up to 63 64-byte directory entries
//!                    (32-byte name, u32 type, u32 inode, 24 reserved bytes)
//! blocks 1..=N       inodes: u32 length followed by u32 data block indices
//! blocks N+1..       data blocks
//! ```

use crate::error::{KResult, KernelError};

use super::{DirEntry, FileSystem, FileType, InodeId};

const BLOCK_SIZE: usize = 4096;
const DENTRY_OFFSET: usize = 64;
const DENTRY_SIZE: usize = 64;
pub const MAX_DENTRIES: usize = 63;
const NAME_FIELD: usize = 32;
const MAX_BLOCKS_PER_INODE: usize = BLOCK_SIZE / 4 - 1;

/// Read-only view over a boot-module image.
#[derive(Debug, Clone, Copy)]
pub struct ImageFs<'a> {
    image: &'a [u8],
    dentry_count: usize,
    inode_count: usize,
    block_count: usize,
}

impl<'a> ImageFs<'a> {
    /// Validate the boot block and wrap the image.
    pub fn new(image: &'a [u8]) -> KResult<Self> {
        if image.len() < BLOCK_SIZE {
            return Err(KernelError::CorruptImage);
        }
        let dentry_count = read_u32(image, 0)? as usize;
        let inode_count = read_u32(image, 4)? as usize;
        let block_count = read_u32(image, 8)? as usize;

        if dentry_count > MAX_DENTRIES {
            return Err(KernelError::CorruptImage);
        }
        let needed = (1 + inode_count + block_count)
            .checked_mul(BLOCK_SIZE)
            .ok_or(KernelError::CorruptImage)?;
        if image.len() < needed {
            return Err(KernelError::CorruptImage);
        }

        let fs = Self {
            image,
            dentry_count,
            inode_count,
            block_count,
        };
        log::info!(
            "[FS] image: {} entries, {} inodes, {} data blocks",
            dentry_count,
            inode_count,
            block_count
        );
        Ok(fs)
    }

    fn dentry(&self, index: usize) -> KResult<DirEntry> {
        let base = DENTRY_OFFSET + index * DENTRY_SIZE;
        let name = self
            .image
            .get(base..base + NAME_FIELD)
            .ok_or(KernelError::CorruptImage)?;
        let file_type = FileType::try_from(read_u32(self.image, base + NAME_FIELD)?)?;
        let inode = InodeId(read_u32(self.image, base + NAME_FIELD + 4)?);
        Ok(DirEntry::new(name, file_type, inode))
    }

    fn inode_base(&self, inode: InodeId) -> KResult<usize> {
        let index = inode.0 as usize;
        if index >= self.inode_count {
            return Err(KernelError::InvalidArgument);
        }
        Ok((1 + index) * BLOCK_SIZE)
    }

    fn data_block(&self, block: usize) -> KResult<&'a [u8]> {
        if block >= self.block_count {
            return Err(KernelError::CorruptImage);
        }
        let base = (1 + self.inode_count + block) * BLOCK_SIZE;
        self.image
            .get(base..base + BLOCK_SIZE)
            .ok_or(KernelError::CorruptImage)
    }
}

impl FileSystem for ImageFs<'_> {
    fn lookup(&self, name: &[u8]) -> KResult<DirEntry> {
        if name.is_empty() || name.len() > NAME_FIELD {
            return Err(KernelError::FileNotFound);
        }
        (0..self.dentry_count)
            .filter_map(|i| self.dentry(i).ok())
            .find(|entry| entry.name() == name)
            .ok_or(KernelError::FileNotFound)
    }

    fn entry_at(&self, index: usize) -> Option<DirEntry> {
        if index >= self.dentry_count {
            return None;
        }
        self.dentry(index).ok()
    }

    fn read(&self, inode: InodeId, offset: u32, buf: &mut [u8]) -> KResult<usize> {
        let base = self.inode_base(inode)?;
        let len = read_u32(self.image, base)? as usize;
        let mut offset = offset as usize;
        if offset >= len || buf.is_empty() {
            return Ok(0);
        }

        let total = buf.len().min(len - offset);
        let mut copied = 0;
        while copied < total {
            let slot = offset / BLOCK_SIZE;
            if slot >= MAX_BLOCKS_PER_INODE {
                return Err(KernelError::CorruptImage);
            }
            let block = read_u32(self.image, base + 4 + slot * 4)? as usize;
            let data = self.data_block(block)?;
            let within = offset % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - within).min(total - copied);
            buf[copied..copied + chunk].copy_from_slice(&data[within..within + chunk]);
            copied += chunk;
            offset += chunk;
        }
        Ok(copied)
    }

    fn file_len(&self, inode: InodeId) -> KResult<u32> {
        let base = self.inode_base(inode)?;
        read_u32(self.image, base)
    }
}

fn read_u32(image: &[u8], at: usize) -> KResult<u32> {
    let bytes = image.get(at..at + 4).ok_or(KernelError::CorruptImage)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
