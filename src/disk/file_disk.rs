use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Block, BLOCK_SIZE},
};

/// 镜像文件磁盘：把一个宿主机文件当作定长的块数组来读写。
/// 写入不经过任何用户可见的缓存，直接落到镜像文件。
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
    block_count: u32,
}

impl FileDisk {
    /// 新建一个镜像文件并清零到 `block_count` 块大小。
    /// 已存在的同名文件会被截断重建。
    pub fn create(path: &Path, block_count: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        // set_len 扩展出的区域保证读出全零
        file.set_len(block_count as u64 * BLOCK_SIZE as u64)?;

        Ok(Self {
            file: Mutex::new(file),
            block_count,
        })
    }

    /// 打开已有镜像，容量由文件长度决定。
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("image size {} is not a multiple of block size", len),
            ));
        }

        Ok(Self {
            file: Mutex::new(file),
            block_count: (len / BLOCK_SIZE as u64) as u32,
        })
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    fn check_range(&self, block_id: u32) -> Result<()> {
        if block_id >= self.block_count {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("block {} out of range (capacity {})", block_id, self.block_count),
            ));
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, block_id: u32, buf: &mut Block) -> Result<()> {
        self.check_range(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &Block) -> Result<()> {
        self.check_range(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }
}
