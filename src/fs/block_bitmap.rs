use crate::disk::{Block, BlockDevice, FileDisk, BLOCK_SIZE};
use crate::fs::config::BITMAP_BLOCK_ID;
use crate::fs::error::Result;

/// 块位图的内存镜像：每个 bit 表示一个块是否被占用，
/// 字节内按 LSB-first 编号。位图在盘上恰好占 1 号块一块，
/// 任何修改都必须在返回前通过 [`sync`](Self::sync) 写回。
#[derive(Debug)]
pub struct BlockBitmap {
    bits: Box<Block>,  // 位图数据，恰好一块
    total_blocks: u32, // 镜像总块数
}

impl BlockBitmap {
    // 创建一个新的块位图（所有位清零 = 空闲）
    pub fn new(total_blocks: u32) -> Self {
        Self {
            bits: Box::new([0; BLOCK_SIZE]),
            total_blocks,
        }
    }

    // 分配一个空闲块，返回块号；没有空闲块时返回 None
    pub fn alloc(&mut self) -> Option<u32> {
        for (byte_index, byte) in self.bits.iter_mut().enumerate() {
            if *byte != 0xFF {
                for bit in 0..8 {
                    let index = (byte_index * 8 + bit) as u32;
                    if index >= self.total_blocks {
                        return None;
                    }
                    if *byte & (1 << bit) == 0 {
                        *byte |= 1 << bit;
                        return Some(index);
                    }
                }
            }
        }
        None
    }

    // 释放一个块；越界或本就空闲时静默忽略，返回是否真的释放了
    pub fn free(&mut self, block_index: u32) -> bool {
        if block_index >= self.total_blocks {
            return false;
        }

        let byte_index = (block_index / 8) as usize;
        let bit_index = block_index % 8;

        if self.bits[byte_index] & (1 << bit_index) != 0 {
            self.bits[byte_index] &= !(1 << bit_index);
            return true;
        }
        false
    }

    // 标记一个块为已占用（格式化时保留元数据块用）
    pub fn set(&mut self, block_index: u32) {
        let byte_index = (block_index / 8) as usize;
        let bit_index = block_index % 8;
        self.bits[byte_index] |= 1 << bit_index;
    }

    pub fn is_used(&self, block_index: u32) -> bool {
        let byte_index = (block_index / 8) as usize;
        let bit_index = block_index % 8;
        self.bits[byte_index] & (1 << bit_index) != 0
    }

    // 已占用的块数
    pub fn used_count(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    // 挂载时从 1 号块重建内存镜像
    pub fn load(disk: &FileDisk, total_blocks: u32) -> Result<Self> {
        let mut bits = Box::new([0u8; BLOCK_SIZE]);
        disk.read_block(BITMAP_BLOCK_ID, &mut bits)?;
        Ok(Self { bits, total_blocks })
    }

    // 将位图写回 1 号块
    pub fn sync(&self, disk: &FileDisk) -> Result<()> {
        disk.write_block(BITMAP_BLOCK_ID, &self.bits)?;
        Ok(())
    }
}
