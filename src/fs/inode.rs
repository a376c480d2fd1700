use crate::disk::BLOCK_SIZE;
use crate::fs::config::{DIRECT_PTRS, INODE_PTRS, INODE_SIZE};
use crate::fs::{read_u32, write_u32};

/// 文件类型编码，直接落盘为 u32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    None = 0,
    Regular = 1,   // 普通文件
    Directory = 2, // 目录
    Symlink = 3,   // 符号链接（保留编码，未实现任何操作）
}

impl FileType {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => FileType::Regular,
            2 => FileType::Directory,
            3 => FileType::Symlink,
            _ => FileType::None,
        }
    }
}

/// 盘上 inode 记录（128 字节定长）：
/// mode/size/links_count 各 4 字节，13 个块指针共 52 字节，
/// 余下 64 字节保留为零。links_count 为 0 即视为空闲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub mode: FileType,
    pub size: u32,        // 文件大小（字节）
    pub links_count: u32, // 硬链接数（有多少目录项指向该 inode）
    pub blocks: [u32; INODE_PTRS],
}

impl Inode {
    pub fn new(mode: FileType) -> Self {
        Self {
            mode,
            size: 0,
            links_count: 1,
            blocks: [0; INODE_PTRS],
        }
    }

    /// 全零记录，释放 inode 时写回
    pub fn empty() -> Self {
        Self {
            mode: FileType::None,
            size: 0,
            links_count: 0,
            blocks: [0; INODE_PTRS],
        }
    }

    pub fn is_free(&self) -> bool {
        self.links_count == 0
    }

    pub fn is_dir(&self) -> bool {
        self.mode == FileType::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.mode == FileType::Regular
    }

    /// 当前占用的数据块数（不含间接块本身）
    pub fn block_count(&self) -> u32 {
        (self.size as u64).div_ceil(BLOCK_SIZE as u64) as u32
    }

    pub fn to_bytes(&self) -> [u8; INODE_SIZE] {
        let mut buf = [0u8; INODE_SIZE];
        write_u32(&mut buf, 0, self.mode as u32);
        write_u32(&mut buf, 4, self.size);
        write_u32(&mut buf, 8, self.links_count);
        for (i, ptr) in self.blocks.iter().enumerate() {
            write_u32(&mut buf, 12 + i * 4, *ptr);
        }
        buf
    }

    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut blocks = [0u32; INODE_PTRS];
        for (i, ptr) in blocks.iter_mut().enumerate() {
            *ptr = read_u32(raw, 12 + i * 4);
        }
        Self {
            mode: FileType::from_u32(read_u32(raw, 0)),
            size: read_u32(raw, 4),
            links_count: read_u32(raw, 8),
            blocks,
        }
    }

    /// 间接块指针槽
    pub fn indirect(&self) -> u32 {
        self.blocks[DIRECT_PTRS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut inode = Inode::new(FileType::Regular);
        inode.size = 8192 + 17;
        inode.links_count = 2;
        inode.blocks[0] = 42;
        inode.blocks[11] = 99;
        inode.blocks[DIRECT_PTRS] = 100;

        let raw = inode.to_bytes();
        assert_eq!(raw.len(), 128);
        // 保留区必须为零
        assert!(raw[12 + 52..].iter().all(|&b| b == 0));

        assert_eq!(Inode::from_bytes(&raw), inode);
    }

    #[test]
    fn test_free_means_zero_links() {
        let empty = Inode::empty();
        assert!(empty.is_free());
        assert!(empty.to_bytes().iter().all(|&b| b == 0));

        let inode = Inode::new(FileType::Directory);
        assert!(!inode.is_free());
        assert!(inode.is_dir());
    }

    #[test]
    fn test_block_count_rounds_up() {
        let mut inode = Inode::new(FileType::Regular);
        assert_eq!(inode.block_count(), 0);
        inode.size = 1;
        assert_eq!(inode.block_count(), 1);
        inode.size = 4096;
        assert_eq!(inode.block_count(), 1);
        inode.size = 4097;
        assert_eq!(inode.block_count(), 2);
    }

    #[test]
    fn test_unknown_mode_maps_to_none() {
        let mut raw = [0u8; INODE_SIZE];
        raw[0] = 0x7F;
        assert_eq!(Inode::from_bytes(&raw).mode, FileType::None);
    }
}
