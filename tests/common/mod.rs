//! 直接解析镜像文件字节的测试工具。
//! 盘上格式是对外契约，这里故意不经过库内的类型，
//! 用独立实现来核对字节布局和结构不变量。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const BLOCK_SIZE: usize = 4096;
pub const INODE_SIZE: usize = 128;
pub const DIR_ENTRY_SIZE: usize = 264;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const DIRECT_PTRS: usize = 12;
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4;
pub const ROOT_INODE: u32 = 1;

/// 测试镜像路径，析构时清理
pub struct TempPath(PathBuf);

impl TempPath {
    pub fn new(tag: &str) -> Self {
        Self(std::env::temp_dir().join(format!("msfs-{}-{}.img", tag, Uuid::new_v4())))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

pub fn read_u32(bytes: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

pub fn read_u16(bytes: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([bytes[off], bytes[off + 1]])
}

#[derive(Debug, Clone)]
pub struct RawInode {
    pub mode: u32,
    pub size: u32,
    pub links: u32,
    pub blocks: [u32; 13],
}

#[derive(Debug, Clone)]
pub struct RawEntry {
    pub inode: u32,
    pub name: Vec<u8>,
}

/// 整个镜像的一次性快照
pub struct RawImage {
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn load(path: &Path) -> Self {
        Self {
            bytes: fs::read(path).expect("read image"),
        }
    }

    pub fn magic(&self) -> u32 {
        read_u32(&self.bytes, 0)
    }

    pub fn blocks_count(&self) -> u32 {
        read_u32(&self.bytes, 8)
    }

    pub fn free_blocks(&self) -> u32 {
        read_u32(&self.bytes, 12)
    }

    pub fn inodes_count(&self) -> u32 {
        read_u32(&self.bytes, 16)
    }

    pub fn free_inodes(&self) -> u32 {
        read_u32(&self.bytes, 20)
    }

    pub fn first_data_block(&self) -> u32 {
        read_u32(&self.bytes, 24)
    }

    pub fn first_inode_block(&self) -> u32 {
        read_u32(&self.bytes, 28)
    }

    pub fn block(&self, block_no: u32) -> &[u8] {
        let base = block_no as usize * BLOCK_SIZE;
        &self.bytes[base..base + BLOCK_SIZE]
    }

    pub fn bitmap_bit(&self, block_no: u32) -> bool {
        let bitmap = self.block(1);
        bitmap[(block_no / 8) as usize] & (1 << (block_no % 8)) != 0
    }

    pub fn bitmap_popcount(&self) -> u32 {
        let bitmap = self.block(1);
        (0..self.blocks_count())
            .filter(|&b| bitmap[(b / 8) as usize] & (1 << (b % 8)) != 0)
            .count() as u32
    }

    pub fn inode(&self, inode_no: u32) -> RawInode {
        assert!(inode_no >= 1 && inode_no <= self.inodes_count());
        let index = (inode_no - 1) as usize;
        let base = self.first_inode_block() as usize * BLOCK_SIZE + index * INODE_SIZE;
        let raw = &self.bytes[base..base + INODE_SIZE];

        let mut blocks = [0u32; 13];
        for (i, ptr) in blocks.iter_mut().enumerate() {
            *ptr = read_u32(raw, 12 + i * 4);
        }
        RawInode {
            mode: read_u32(raw, 0),
            size: read_u32(raw, 4),
            links: read_u32(raw, 8),
            blocks,
        }
    }

    /// 目录的有效条目（含 `.`/`..`）：rec_len 为 0 终止一块，inode 为 0 跳过
    pub fn dir_entries(&self, dir: &RawInode) -> Vec<RawEntry> {
        let mut entries = Vec::new();
        for &block_no in dir.blocks[..DIRECT_PTRS].iter() {
            if block_no == 0 {
                break;
            }
            let block = self.block(block_no);
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let raw = &block[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE];
                let inode = read_u32(raw, 0);
                let rec_len = read_u16(raw, 4);
                if rec_len == 0 {
                    break;
                }
                if inode == 0 {
                    continue;
                }
                let name_len = raw[6] as usize;
                entries.push(RawEntry {
                    inode,
                    name: raw[8..8 + name_len].to_vec(),
                });
            }
        }
        entries
    }

    /// 镜像里所有 links_count > 0 的 inode 编号
    pub fn live_inodes(&self) -> Vec<u32> {
        (1..=self.inodes_count())
            .filter(|&n| self.inode(n).links > 0)
            .collect()
    }
}

/// 核对成功操作之后必须保持的结构不变量
pub fn check_invariants(path: &Path) {
    let img = RawImage::load(path);

    // 记账：空闲块数 = 总块数 - 位图置位数
    assert_eq!(
        img.free_blocks(),
        img.blocks_count() - img.bitmap_popcount(),
        "free_blocks_count disagrees with the bitmap"
    );

    // 记账：空闲 inode 数 = links_count 为 0 的记录数
    let live = img.live_inodes();
    assert_eq!(
        img.free_inodes(),
        img.inodes_count() - live.len() as u32,
        "free_inodes_count disagrees with the inode table"
    );

    // 元数据块永远置位
    assert!(img.bitmap_bit(0), "superblock bit clear");
    assert!(img.bitmap_bit(1), "bitmap bit clear");
    for b in img.first_inode_block()..img.first_data_block() {
        assert!(img.bitmap_bit(b), "inode table block {} bit clear", b);
    }

    // 每个可达指针都已置位，且没有两个 inode 共享数据块
    let mut owners: HashMap<u32, u32> = HashMap::new();
    let mut claim = |block_no: u32, owner: u32| {
        assert!(img.bitmap_bit(block_no), "block {} in use but bit clear", block_no);
        if let Some(prev) = owners.insert(block_no, owner) {
            panic!("block {} shared by inodes {} and {}", block_no, prev, owner);
        }
    };
    for &n in &live {
        let inode = img.inode(n);
        for &ptr in inode.blocks[..DIRECT_PTRS].iter() {
            if ptr != 0 {
                claim(ptr, n);
            }
        }
        let indirect = inode.blocks[DIRECT_PTRS];
        if indirect != 0 {
            claim(indirect, n);
            let block = img.block(indirect);
            for i in 0..PTRS_PER_BLOCK {
                let ptr = read_u32(block, i * 4);
                if ptr != 0 {
                    claim(ptr, n);
                }
            }
        }
    }

    // 每个目录的首块都以 . 和 .. 开头
    for &n in &live {
        let inode = img.inode(n);
        if inode.mode != 2 {
            continue;
        }
        assert_ne!(inode.blocks[0], 0, "directory {} has no first block", n);
        let block = img.block(inode.blocks[0]);
        assert_eq!(read_u32(block, 0), n, "`.` of dir {} is wrong", n);
        assert_eq!(&block[8..9], b".");
        let second = &block[DIR_ENTRY_SIZE..];
        assert_ne!(read_u32(second, 0), 0, "`..` of dir {} missing", n);
        assert_eq!(&second[8..10], b"..");
    }

    // 链接数 = 指向该 inode 的目录项数（. 和 .. 不计，根目录自带 1）
    let mut refs: HashMap<u32, u32> = HashMap::new();
    for &n in &live {
        let inode = img.inode(n);
        if inode.mode != 2 {
            continue;
        }
        for entry in img.dir_entries(&inode) {
            if entry.name == b"." || entry.name == b".." {
                continue;
            }
            *refs.entry(entry.inode).or_insert(0) += 1;
        }
    }
    for &n in &live {
        let expected = refs.get(&n).copied().unwrap_or(0) + u32::from(n == ROOT_INODE);
        assert_eq!(
            img.inode(n).links,
            expected,
            "links_count of inode {} disagrees with directory entries",
            n
        );
    }
}
