use crate::disk::BLOCK_SIZE;

/// 魔数，小端写入后镜像开头为 53 46 53 4D
pub const FS_MAGIC: u32 = 0x4D53_4653;

pub const SUPER_BLOCK_ID: u32 = 0;
pub const BITMAP_BLOCK_ID: u32 = 1;
pub const INODE_TABLE_START_BLOCK_ID: u32 = 2;

// 每个 Inode 128 字节，一个 4KB 块可以存 32 个 Inode
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / INODE_SIZE) as u32;

// 按每 4 块配 1 个 inode 的比例格式化
pub const BLOCKS_PER_INODE: u32 = 4;

/// 根目录固定占用 1 号 inode（0 号保留作无效值）
pub const ROOT_INODE: u32 = 1;

// 12 个直接块指针（经典设计）+ 1 个一级间接块指针
pub const DIRECT_PTRS: usize = 12;
pub const INODE_PTRS: usize = DIRECT_PTRS + 1;

// 每个间接块可以指向多少个数据块（每个指针 4 字节）
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// 单个文件的块数上限：12 个直接块 + 一整个间接块
pub const MAX_FILE_BLOCKS: usize = DIRECT_PTRS + PTRS_PER_BLOCK;
pub const MAX_FILE_SIZE: u64 = (MAX_FILE_BLOCKS * BLOCK_SIZE) as u64;

// 目录项为定长槽位，名字区 256 字节（含结尾 NUL 的空间）
pub const NAME_BUF_LEN: usize = 256;
pub const MAX_NAME_LEN: usize = 255;
pub const DIR_ENTRY_SIZE: usize = 4 + 2 + 1 + 1 + NAME_BUF_LEN;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// 位图只占 1 号块一块，因此镜像最多 4096*8 = 32768 块
pub const MAX_BLOCKS_COUNT: u32 = (BLOCK_SIZE * 8) as u32;

// 磁盘格式的定长约定，偏差直接拒绝编译
const _: () = assert!(INODE_SIZE == 4 + 4 + 4 + 4 * INODE_PTRS + 64);
const _: () = assert!(BLOCK_SIZE % INODE_SIZE == 0);
const _: () = assert!(DIR_ENTRY_SIZE == 264);
const _: () = assert!(DIR_ENTRIES_PER_BLOCK == 15);
