use std::path::Path;

use log::debug;

use crate::disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE};
use crate::fs::block_bitmap::BlockBitmap;
use crate::fs::config::{
    BITMAP_BLOCK_ID, BLOCKS_PER_INODE, DIRECT_PTRS, DIR_ENTRIES_PER_BLOCK, INODES_PER_BLOCK,
    INODE_SIZE, INODE_TABLE_START_BLOCK_ID, MAX_BLOCKS_COUNT, PTRS_PER_BLOCK, ROOT_INODE,
    SUPER_BLOCK_ID,
};
use crate::fs::directory::DirEntry;
use crate::fs::super_block::SuperBlock;
use crate::utils::normalize_path;

pub mod block_bitmap;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode;
pub mod ops;
pub mod super_block;

pub use error::{FileSystemError, Result};
pub use inode::{FileType, Inode};

// 盘上整数一律小端定宽
pub(crate) fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn read_u16(buf: &[u8], off: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[off..off + 2]);
    u16::from_le_bytes(raw)
}

pub(crate) fn write_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

/// 目录项在盘上的落点
#[derive(Debug)]
pub(crate) struct EntryLocation {
    pub block_no: u32,
    pub slot: usize,
    pub entry: DirEntry,
}

/// 挂载中的文件系统实例。
/// 位图是盘上状态唯一的内存镜像，采用写穿策略；
/// inode 和目录块每次操作都直接读写镜像文件，不做缓存。
#[derive(Debug)]
pub struct FileSystem {
    disk: FileDisk,               // 底层磁盘抽象层
    super_block: SuperBlock,      // 文件系统总体信息
    block_bitmap: BlockBitmap,    // 数据块分配信息
}

impl FileSystem {
    /// 格式化：新建镜像、写入超级块和位图、建立根目录，返回已挂载的实例。
    /// 镜像大小向上取整到整块；位图只有一块，超出其容量的请求直接拒绝。
    pub fn format(path: &Path, size_bytes: u64) -> Result<Self> {
        let blocks_count = size_bytes.div_ceil(BLOCK_SIZE as u64);
        if blocks_count > MAX_BLOCKS_COUNT as u64 {
            return Err(FileSystemError::OutOfRange(format!(
                "{} blocks exceed the single-block bitmap capacity of {}",
                blocks_count, MAX_BLOCKS_COUNT
            )));
        }
        let blocks_count = blocks_count as u32;

        let inodes_count = (blocks_count / BLOCKS_PER_INODE).max(1);
        let inode_table_blocks = super_block::inode_table_blocks(inodes_count);
        // 元数据之外至少要放得下根目录的数据块
        if INODE_TABLE_START_BLOCK_ID + inode_table_blocks >= blocks_count {
            return Err(FileSystemError::OutOfRange(format!(
                "image of {} blocks is too small to format",
                blocks_count
            )));
        }

        let disk = FileDisk::create(path, blocks_count)?;

        let super_block = SuperBlock::new(blocks_count, inodes_count);
        let mut block_bitmap = BlockBitmap::new(blocks_count);
        block_bitmap.set(SUPER_BLOCK_ID);
        block_bitmap.set(BITMAP_BLOCK_ID);
        for i in 0..inode_table_blocks {
            block_bitmap.set(INODE_TABLE_START_BLOCK_ID + i);
        }
        super_block.sync(&disk)?;
        block_bitmap.sync(&disk)?;

        let mut fs = Self {
            disk,
            super_block,
            block_bitmap,
        };

        // 根目录：第一个数据块 + 固定的 1 号 inode
        let root_block = fs.allocate_block()?;
        let mut block: Block = [0; BLOCK_SIZE];
        directory::init_dir_block(&mut block, ROOT_INODE, ROOT_INODE);
        fs.write_block(root_block, &block)?;

        let mut root = Inode::new(FileType::Directory);
        root.blocks[0] = root_block;
        fs.write_inode(ROOT_INODE, &root)?;

        debug!(
            "formatted image: {} blocks, {} inodes, data from block {}",
            blocks_count, inodes_count, fs.super_block.first_data_block
        );
        Ok(fs)
    }

    /// 挂载已有镜像：校验超级块，从 1 号块重建位图镜像。
    pub fn mount(path: &Path) -> Result<Self> {
        let disk = FileDisk::open(path)?;
        let super_block = SuperBlock::load(&disk)?;

        if super_block.blocks_count > disk.block_count() {
            return Err(FileSystemError::InvalidImage(format!(
                "superblock claims {} blocks but the image holds {}",
                super_block.blocks_count,
                disk.block_count()
            )));
        }

        let block_bitmap = BlockBitmap::load(&disk, super_block.blocks_count)?;

        debug!(
            "mounted image: {}/{} blocks free, {}/{} inodes free",
            super_block.free_blocks_count,
            super_block.blocks_count,
            super_block.free_inodes_count,
            super_block.inodes_count
        );
        Ok(Self {
            disk,
            super_block,
            block_bitmap,
        })
    }

    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    // ---- 块读写（带镜像范围检查） ----

    pub(crate) fn read_block(&self, block_no: u32, buf: &mut Block) -> Result<()> {
        if block_no >= self.super_block.blocks_count {
            return Err(FileSystemError::OutOfRange(format!("block {}", block_no)));
        }
        self.disk.read_block(block_no, buf)?;
        Ok(())
    }

    pub(crate) fn write_block(&self, block_no: u32, buf: &Block) -> Result<()> {
        if block_no >= self.super_block.blocks_count {
            return Err(FileSystemError::OutOfRange(format!("block {}", block_no)));
        }
        self.disk.write_block(block_no, buf)?;
        Ok(())
    }

    // ---- inode 读写 ----

    fn check_inode_no(&self, inode_no: u32) -> Result<()> {
        if inode_no == 0 || inode_no > self.super_block.inodes_count {
            return Err(FileSystemError::InvalidInode(inode_no));
        }
        Ok(())
    }

    /// inode 所在的块号和块内字节偏移（inode 编号从 1 起）
    fn inode_location(&self, inode_no: u32) -> (u32, usize) {
        let index = inode_no - 1;
        (
            self.super_block.first_inode_block + index / INODES_PER_BLOCK,
            (index % INODES_PER_BLOCK) as usize * INODE_SIZE,
        )
    }

    pub(crate) fn read_inode(&self, inode_no: u32) -> Result<Inode> {
        self.check_inode_no(inode_no)?;
        let (block_no, offset) = self.inode_location(inode_no);
        let mut buf: Block = [0; BLOCK_SIZE];
        self.read_block(block_no, &mut buf)?;
        Ok(Inode::from_bytes(&buf[offset..offset + INODE_SIZE]))
    }

    pub(crate) fn write_inode(&mut self, inode_no: u32, inode: &Inode) -> Result<()> {
        self.check_inode_no(inode_no)?;
        let (block_no, offset) = self.inode_location(inode_no);
        let mut buf: Block = [0; BLOCK_SIZE];
        self.read_block(block_no, &mut buf)?;
        buf[offset..offset + INODE_SIZE].copy_from_slice(&inode.to_bytes());
        self.write_block(block_no, &buf)
    }

    // ---- 分配与回收 ----

    /// 从位图低位起首次适配分配一块；位图和超级块先落盘再返回
    pub(crate) fn allocate_block(&mut self) -> Result<u32> {
        let Some(block_no) = self.block_bitmap.alloc() else {
            return Err(FileSystemError::DiskFull);
        };
        self.super_block.free_blocks_count -= 1;
        self.block_bitmap.sync(&self.disk)?;
        self.super_block.sync(&self.disk)?;
        debug!("allocated block {}", block_no);
        Ok(block_no)
    }

    /// 释放一块；越界或本就空闲时静默返回
    pub(crate) fn free_block(&mut self, block_no: u32) -> Result<()> {
        if self.block_bitmap.free(block_no) {
            self.super_block.free_blocks_count += 1;
            self.block_bitmap.sync(&self.disk)?;
            self.super_block.sync(&self.disk)?;
            debug!("freed block {}", block_no);
        }
        Ok(())
    }

    /// 顺序扫描 inode 表，取第一个 links_count 为 0 的槽位。
    /// 盘上的记录不在这里清零，调用方必须在返回前写入完整的新 inode。
    pub(crate) fn allocate_inode(&mut self) -> Result<u32> {
        for inode_no in 1..=self.super_block.inodes_count {
            if self.read_inode(inode_no)?.is_free() {
                self.super_block.free_inodes_count -= 1;
                self.super_block.sync(&self.disk)?;
                debug!("allocated inode {}", inode_no);
                return Ok(inode_no);
            }
        }
        Err(FileSystemError::InodeFull)
    }

    /// 回收 inode 及其引用的全部数据块（含间接块），记录清零写回
    pub(crate) fn free_inode(&mut self, inode_no: u32) -> Result<()> {
        let inode = self.read_inode(inode_no)?;

        for i in 0..DIRECT_PTRS {
            if inode.blocks[i] != 0 {
                self.free_block(inode.blocks[i])?;
            }
        }

        if inode.indirect() != 0 {
            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(inode.indirect(), &mut buf)?;
            for i in 0..PTRS_PER_BLOCK {
                let ptr = read_u32(&buf, i * 4);
                if ptr != 0 {
                    self.free_block(ptr)?;
                }
            }
            self.free_block(inode.indirect())?;
        }

        self.write_inode(inode_no, &Inode::empty())?;
        self.super_block.free_inodes_count += 1;
        self.super_block.sync(&self.disk)?;
        debug!("freed inode {}", inode_no);
        Ok(())
    }

    // ---- 路径解析与目录访问 ----

    /// 解析路径到 inode 编号。空串和 "/" 都是根目录；
    /// `.` 和 `..` 只是恰好存在的普通名字，这里不做语义展开。
    pub fn resolve_path(&self, path: &str) -> Result<u32> {
        let abs = normalize_path(path);
        let mut current = ROOT_INODE;

        for comp in abs.split('/').filter(|c| !c.is_empty()) {
            let inode = self.read_inode(current)?;
            if !inode.is_dir() {
                return Err(FileSystemError::NotADirectory(abs.clone()));
            }
            match self.find_entry(&inode, comp.as_bytes())? {
                Some(found) => current = found.entry.inode,
                None => return Err(FileSystemError::NotFound(abs.clone())),
            }
        }
        Ok(current)
    }

    /// 收集目录的全部有效条目（含 `.` 和 `..`）。
    /// 直接块遇 0 指针即止；块内 rec_len 为 0 的槽终止该块，墓碑跳过。
    pub(crate) fn dir_entries(&self, dir: &Inode) -> Result<Vec<EntryLocation>> {
        let mut entries = Vec::new();
        for i in 0..DIRECT_PTRS {
            let block_no = dir.blocks[i];
            if block_no == 0 {
                break;
            }
            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(block_no, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let entry = DirEntry::read_from(&buf, slot);
                if entry.is_terminator() {
                    break;
                }
                if entry.is_tombstone() {
                    continue;
                }
                entries.push(EntryLocation {
                    block_no,
                    slot,
                    entry,
                });
            }
        }
        Ok(entries)
    }

    /// 按名字逐字节匹配目录项
    pub(crate) fn find_entry(&self, dir: &Inode, name: &[u8]) -> Result<Option<EntryLocation>> {
        Ok(self
            .dir_entries(dir)?
            .into_iter()
            .find(|found| found.entry.matches(name)))
    }

    /// 找第一个可写槽位（墓碑或终结槽均可复用）；
    /// 现有块都满时在父 inode 第一个空直接槽上新开一块，用它的 0 号槽。
    fn find_free_slot(&mut self, dir: &mut Inode, dir_path: &str) -> Result<(u32, usize)> {
        for i in 0..DIRECT_PTRS {
            let block_no = dir.blocks[i];
            if block_no == 0 {
                let new_block = self.allocate_block()?;
                self.write_block(new_block, &[0; BLOCK_SIZE])?;
                dir.blocks[i] = new_block;
                return Ok((new_block, 0));
            }

            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(block_no, &mut buf)?;
            for slot in 0..DIR_ENTRIES_PER_BLOCK {
                let entry = DirEntry::read_from(&buf, slot);
                if entry.is_terminator() || entry.is_tombstone() {
                    return Ok((block_no, slot));
                }
            }
        }
        Err(FileSystemError::DirectoryFull(dir_path.to_string()))
    }

    /// 写入一条目录项，随后落盘父 inode
    pub(crate) fn insert_entry(
        &mut self,
        dir_no: u32,
        dir: &mut Inode,
        entry: &DirEntry,
        dir_path: &str,
    ) -> Result<()> {
        let (block_no, slot) = self.find_free_slot(dir, dir_path)?;
        let mut buf: Block = [0; BLOCK_SIZE];
        self.read_block(block_no, &mut buf)?;
        entry.write_to(&mut buf, slot);
        self.write_block(block_no, &buf)?;
        self.write_inode(dir_no, dir)
    }

    /// 把目录里指向 `name` 的槽位墓碑化（inode 字段清零，不压缩）
    pub(crate) fn remove_entry(&mut self, dir: &Inode, name: &[u8], path: &str) -> Result<u32> {
        let Some(found) = self.find_entry(dir, name)? else {
            return Err(FileSystemError::NotFound(path.to_string()));
        };
        let mut buf: Block = [0; BLOCK_SIZE];
        self.read_block(found.block_no, &mut buf)?;
        directory::clear_slot_inode(&mut buf, found.slot);
        self.write_block(found.block_no, &buf)?;
        Ok(found.entry.inode)
    }
}
