//! 文件操作层：由下层的分配器、inode 与目录访问组合出的复合操作。
//! 每个操作要么完整生效，要么把本次调用分配的资源全部回收后返回失败。

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::warn;

use crate::disk::{Block, BLOCK_SIZE};
use crate::fs::config::{DIRECT_PTRS, MAX_FILE_BLOCKS, MAX_FILE_SIZE, MAX_NAME_LEN, PTRS_PER_BLOCK};
use crate::fs::directory::{self, DirEntry};
use crate::fs::error::{FileSystemError, Result};
use crate::fs::inode::{FileType, Inode};
use crate::fs::{read_u32, write_u32, FileSystem};
use crate::utils::{normalize_path, split_path};

impl FileSystem {
    /// 在 parent_path 下新建一个名为 name 的文件或目录，返回新 inode 编号。
    /// 目录会带着写好 `.`/`..` 的首块诞生。任何一步分配失败都整体回滚。
    pub fn create_file(&mut self, parent_path: &str, name: &str, file_type: FileType) -> Result<u32> {
        validate_name(name)?;
        if !matches!(file_type, FileType::Regular | FileType::Directory) {
            // SYMLINK 只有类型编码，没有任何操作实现，创建时直接拒绝
            return Err(FileSystemError::InvalidName(format!(
                "file type {:?} cannot be created",
                file_type
            )));
        }

        let parent_no = self.resolve_path(parent_path)?;
        let mut parent = self.read_inode(parent_no)?;
        if !parent.is_dir() {
            return Err(FileSystemError::NotADirectory(parent_path.to_string()));
        }
        if self.find_entry(&parent, name.as_bytes())?.is_some() {
            return Err(FileSystemError::AlreadyExists(join_path(parent_path, name)));
        }

        let inode_no = self.allocate_inode()?;
        let mut inode = Inode::new(file_type);

        if file_type == FileType::Directory {
            let dir_block = match self.allocate_block() {
                Ok(b) => b,
                Err(e) => {
                    self.rollback_inode(inode_no);
                    return Err(e);
                }
            };
            let mut block: Block = [0; BLOCK_SIZE];
            directory::init_dir_block(&mut block, inode_no, parent_no);
            if let Err(e) = self.write_block(dir_block, &block) {
                // inode 还没落盘，目录块得手动退回
                if let Err(rb) = self.free_block(dir_block) {
                    warn!("rollback: failed to free block {}: {}", dir_block, rb);
                }
                self.rollback_inode(inode_no);
                return Err(e);
            }
            inode.blocks[0] = dir_block;
        }

        if let Err(e) = self.write_inode(inode_no, &inode) {
            if inode.blocks[0] != 0 {
                if let Err(rb) = self.free_block(inode.blocks[0]) {
                    warn!("rollback: failed to free block {}: {}", inode.blocks[0], rb);
                }
            }
            self.rollback_inode(inode_no);
            return Err(e);
        }

        let entry = DirEntry::new(inode_no, name, file_type);
        if let Err(e) = self.insert_entry(parent_no, &mut parent, &entry, parent_path) {
            // inode 已落盘，free_inode 会连它的目录块一并回收
            self.rollback_inode(inode_no);
            return Err(e);
        }
        Ok(inode_no)
    }

    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        let (parent_path, name) = split_path(path)?;
        self.create_file(&parent_path, &name, FileType::Directory)?;
        Ok(())
    }

    /// 删除空目录。父目录里的槽位只墓碑化，不压缩；
    /// 父目录的 links_count 有意保持不变（`..` 不计入反向引用）。
    pub fn remove_directory(&mut self, path: &str) -> Result<()> {
        let (parent_path, name) = split_path(path)?;
        let dir_no = self.resolve_path(path)?;
        let dir = self.read_inode(dir_no)?;
        if !dir.is_dir() {
            return Err(FileSystemError::NotADirectory(path.to_string()));
        }

        if self
            .dir_entries(&dir)?
            .iter()
            .any(|found| !found.entry.is_dot_or_dotdot())
        {
            return Err(FileSystemError::DirectoryNotEmpty(path.to_string()));
        }

        let parent_no = self.resolve_path(&parent_path)?;
        let parent = self.read_inode(parent_no)?;
        self.remove_entry(&parent, name.as_bytes(), path)?;

        self.free_inode(dir_no)
    }

    /// 删除一条目录项；链接数归零时回收 inode 及其数据块。
    pub fn remove_file(&mut self, path: &str) -> Result<()> {
        let (parent_path, name) = split_path(path)?;
        let file_no = self.resolve_path(path)?;
        let mut inode = self.read_inode(file_no)?;

        let parent_no = self.resolve_path(&parent_path)?;
        let parent = self.read_inode(parent_no)?;
        self.remove_entry(&parent, name.as_bytes(), path)?;

        inode.links_count -= 1;
        if inode.links_count == 0 {
            self.free_inode(file_no)
        } else {
            self.write_inode(file_no, &inode)
        }
    }

    /// 建硬链接：新目录项指向已有 inode，entry 的 file_type 跟随目标的 mode。
    pub fn create_link(&mut self, target: &str, link_path: &str) -> Result<()> {
        let target_no = self.resolve_path(target)?;
        let mut target_inode = self.read_inode(target_no)?;

        let (parent_path, name) = split_path(link_path)?;
        validate_name(&name)?;
        let parent_no = self.resolve_path(&parent_path)?;
        let mut parent = self.read_inode(parent_no)?;
        if !parent.is_dir() {
            return Err(FileSystemError::NotADirectory(parent_path));
        }
        if self.find_entry(&parent, name.as_bytes())?.is_some() {
            return Err(FileSystemError::AlreadyExists(link_path.to_string()));
        }

        let entry = DirEntry::new(target_no, &name, target_inode.mode);
        self.insert_entry(parent_no, &mut parent, &entry, &parent_path)?;

        target_inode.links_count += 1;
        self.write_inode(target_no, &target_inode)
    }

    /// 向普通文件尾部追加 `bytes` 字节的确定性填充（'A' + i % 26）。
    pub fn append_to_file(&mut self, path: &str, bytes: usize) -> Result<()> {
        let file_no = self.resolve_path(path)?;
        let mut inode = self.read_inode(file_no)?;
        if !inode.is_regular() {
            return Err(FileSystemError::NotARegularFile(path.to_string()));
        }
        if bytes == 0 {
            return Ok(());
        }

        let old_size = inode.size as u64;
        let new_size = old_size + bytes as u64;
        if new_size > MAX_FILE_SIZE {
            return Err(FileSystemError::FileTooLarge(path.to_string()));
        }

        // 先填满最后一个未写满的块；size 不变，失败了这些字节也不可见
        let mut written = 0usize;
        let tail = (old_size as usize) % BLOCK_SIZE;
        if tail != 0 {
            let last_index = inode.block_count() as usize - 1;
            let block_no = self.file_block_at(&inode, last_index)?;
            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(block_no, &mut buf)?;
            let take = bytes.min(BLOCK_SIZE - tail);
            fill_pattern(&mut buf[tail..tail + take], 0);
            self.write_block(block_no, &buf)?;
            written = take;
        }

        let mut allocated = Vec::new();
        let mut fresh_indirect = None;
        let mut offset = written;
        let result = self.append_blocks(
            &mut inode,
            bytes - written,
            |chunk| {
                fill_pattern(chunk, offset);
                offset += chunk.len();
                Ok(())
            },
            &mut allocated,
            &mut fresh_indirect,
            path,
        );
        if let Err(e) = result {
            self.rollback_blocks(&allocated, fresh_indirect);
            return Err(e);
        }

        inode.size = new_size as u32;
        if let Err(e) = self.write_inode(file_no, &inode) {
            self.rollback_blocks(&allocated, fresh_indirect);
            return Err(e);
        }
        Ok(())
    }

    /// 从文件尾部截掉 `bytes` 字节并回收不再需要的块。
    /// 截 0 字节按约定视为失败；最后保留块内的残留字节不清零。
    pub fn truncate_file(&mut self, path: &str, bytes: usize) -> Result<()> {
        let file_no = self.resolve_path(path)?;
        let mut inode = self.read_inode(file_no)?;
        if !inode.is_regular() {
            return Err(FileSystemError::NotARegularFile(path.to_string()));
        }
        if bytes == 0 {
            return Err(FileSystemError::OutOfRange(
                "truncate length must be positive".to_string(),
            ));
        }
        if bytes as u64 > inode.size as u64 {
            return Err(FileSystemError::OutOfRange(format!(
                "cannot truncate {} bytes from a {}-byte file",
                bytes, inode.size
            )));
        }

        let old_blocks = inode.block_count() as usize;
        inode.size -= bytes as u32;
        let new_blocks = inode.block_count() as usize;

        // 间接区：回收多余指针，必要时连间接块一起回收
        if old_blocks > DIRECT_PTRS && inode.indirect() != 0 {
            let indirect_no = inode.indirect();
            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(indirect_no, &mut buf)?;

            for i in new_blocks.saturating_sub(DIRECT_PTRS)..(old_blocks - DIRECT_PTRS) {
                let ptr = read_u32(&buf, i * 4);
                if ptr != 0 {
                    self.free_block(ptr)?;
                    write_u32(&mut buf, i * 4, 0);
                }
            }

            if new_blocks <= DIRECT_PTRS {
                self.free_block(indirect_no)?;
                inode.blocks[DIRECT_PTRS] = 0;
            } else {
                self.write_block(indirect_no, &buf)?;
            }
        }

        // 直接区
        for i in new_blocks..old_blocks.min(DIRECT_PTRS) {
            if inode.blocks[i] != 0 {
                self.free_block(inode.blocks[i])?;
                inode.blocks[i] = 0;
            }
        }

        self.write_inode(file_no, &inode)
    }

    /// 把宿主机文件导入成镜像内的普通文件，最终 size 等于宿主文件大小。
    pub fn copy_from_system(&mut self, host_path: &Path, virt_path: &str) -> Result<()> {
        let mut host_file = File::open(host_path)?;
        let host_size = host_file.metadata()?.len();
        if host_size > MAX_FILE_SIZE {
            return Err(FileSystemError::FileTooLarge(virt_path.to_string()));
        }

        let (parent_path, name) = split_path(virt_path)?;
        let file_no = self.create_file(&parent_path, &name, FileType::Regular)?;
        let mut inode = self.read_inode(file_no)?;

        let mut allocated = Vec::new();
        let mut fresh_indirect = None;
        let result = self.append_blocks(
            &mut inode,
            host_size as usize,
            |chunk| host_file.read_exact(chunk).map_err(FileSystemError::from),
            &mut allocated,
            &mut fresh_indirect,
            virt_path,
        );
        if let Err(e) = result {
            self.rollback_blocks(&allocated, fresh_indirect);
            self.rollback_create(file_no, &parent_path, &name);
            return Err(e);
        }

        inode.size = host_size as u32;
        if let Err(e) = self.write_inode(file_no, &inode) {
            self.rollback_blocks(&allocated, fresh_indirect);
            self.rollback_create(file_no, &parent_path, &name);
            return Err(e);
        }
        Ok(())
    }

    /// 把镜像内的普通文件导出到宿主机。
    /// 逐块写出 min(remaining, 4096) 字节，遇到 0 指针或写完即止。
    pub fn copy_to_system(&self, virt_path: &str, host_path: &Path) -> Result<()> {
        let file_no = self.resolve_path(virt_path)?;
        let inode = self.read_inode(file_no)?;
        if !inode.is_regular() {
            return Err(FileSystemError::NotARegularFile(virt_path.to_string()));
        }

        let mut host_file = File::create(host_path)?;
        let mut remaining = inode.size as usize;

        for i in 0..DIRECT_PTRS {
            if remaining == 0 || inode.blocks[i] == 0 {
                break;
            }
            remaining -= self.copy_block_out(inode.blocks[i], remaining, &mut host_file)?;
        }

        if remaining > 0 && inode.indirect() != 0 {
            let mut ptrs: Block = [0; BLOCK_SIZE];
            self.read_block(inode.indirect(), &mut ptrs)?;
            for i in 0..PTRS_PER_BLOCK {
                if remaining == 0 {
                    break;
                }
                let ptr = read_u32(&ptrs, i * 4);
                if ptr == 0 {
                    break;
                }
                remaining -= self.copy_block_out(ptr, remaining, &mut host_file)?;
            }
        }
        Ok(())
    }

    /// 列出目录内容（跳过 `.`、`..` 和墓碑），每项带上子 inode 的 size。
    pub fn list_directory(&self, path: &str) -> Result<Vec<(String, u32)>> {
        let dir_no = self.resolve_path(path)?;
        let dir = self.read_inode(dir_no)?;
        if !dir.is_dir() {
            return Err(FileSystemError::NotADirectory(path.to_string()));
        }

        let mut listing = Vec::new();
        for found in self.dir_entries(&dir)? {
            if found.entry.is_dot_or_dotdot() {
                continue;
            }
            let child = self.read_inode(found.entry.inode)?;
            listing.push((found.entry.name(), child.size));
        }
        Ok(listing)
    }

    /// （已用块数, 总块数）
    pub fn disk_usage(&self) -> (u32, u32) {
        (
            self.super_block().blocks_count - self.super_block().free_blocks_count,
            self.super_block().blocks_count,
        )
    }

    // ---- 内部助手 ----

    /// 文件第 index 个数据块的块号（0 基）
    fn file_block_at(&self, inode: &Inode, index: usize) -> Result<u32> {
        let block_no = if index < DIRECT_PTRS {
            inode.blocks[index]
        } else {
            if inode.indirect() == 0 {
                return Err(FileSystemError::Corrupted(format!(
                    "missing indirect block for data block {}",
                    index
                )));
            }
            let mut buf: Block = [0; BLOCK_SIZE];
            self.read_block(inode.indirect(), &mut buf)?;
            read_u32(&buf, (index - DIRECT_PTRS) * 4)
        };
        if block_no == 0 {
            return Err(FileSystemError::Corrupted(format!(
                "missing data block {}",
                index
            )));
        }
        Ok(block_no)
    }

    /// 逐块分配并写入 `remaining` 字节的新数据，`fill` 负责产出每块的有效字节。
    /// 新块指针写入直接槽或间接块；间接块内容只在内存里累积，成功后一次写盘，
    /// 中途失败不会在盘上留下悬空指针。分配过的块号都记录在 `allocated` /
    /// `fresh_indirect` 里，调用方失败时据此回滚。
    fn append_blocks<F>(
        &mut self,
        inode: &mut Inode,
        mut remaining: usize,
        mut fill: F,
        allocated: &mut Vec<u32>,
        fresh_indirect: &mut Option<u32>,
        path: &str,
    ) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> Result<()>,
    {
        let mut index = inode.block_count() as usize;
        let mut indirect: Option<(u32, Box<Block>)> = None;

        while remaining > 0 {
            if index >= MAX_FILE_BLOCKS {
                return Err(FileSystemError::FileTooLarge(path.to_string()));
            }

            let take = remaining.min(BLOCK_SIZE);
            let block_no = self.allocate_block()?;
            allocated.push(block_no);

            let mut buf: Block = [0; BLOCK_SIZE];
            fill(&mut buf[..take])?;
            self.write_block(block_no, &buf)?;

            if index < DIRECT_PTRS {
                inode.blocks[index] = block_no;
            } else {
                if indirect.is_none() {
                    indirect = Some(if inode.indirect() == 0 {
                        // 首次越过直接区，带一个清零的间接块
                        let indirect_no = self.allocate_block()?;
                        *fresh_indirect = Some(indirect_no);
                        inode.blocks[DIRECT_PTRS] = indirect_no;
                        (indirect_no, Box::new([0u8; BLOCK_SIZE]))
                    } else {
                        let indirect_no = inode.indirect();
                        let mut existing = Box::new([0u8; BLOCK_SIZE]);
                        self.read_block(indirect_no, &mut existing)?;
                        (indirect_no, existing)
                    });
                }
                if let Some((_, buf)) = indirect.as_mut() {
                    write_u32(&mut buf[..], (index - DIRECT_PTRS) * 4, block_no);
                }
            }

            remaining -= take;
            index += 1;
        }

        if let Some((indirect_no, buf)) = indirect {
            self.write_block(indirect_no, &buf)?;
        }
        Ok(())
    }

    /// 回滚本次调用分配的全部块（含新建的间接块）
    fn rollback_blocks(&mut self, allocated: &[u32], fresh_indirect: Option<u32>) {
        warn!(
            "rolling back {} block(s)",
            allocated.len() + usize::from(fresh_indirect.is_some())
        );
        for &block_no in allocated {
            if let Err(e) = self.free_block(block_no) {
                warn!("rollback: failed to free block {}: {}", block_no, e);
            }
        }
        if let Some(block_no) = fresh_indirect {
            if let Err(e) = self.free_block(block_no) {
                warn!("rollback: failed to free block {}: {}", block_no, e);
            }
        }
    }

    /// 退回一个分配后没用上（或已不需要）的 inode
    fn rollback_inode(&mut self, inode_no: u32) {
        if let Err(e) = self.free_inode(inode_no) {
            warn!("rollback: failed to free inode {}: {}", inode_no, e);
        }
    }

    /// 撤销 create_file 的成果：墓碑化父目录里的新条目并退回 inode，
    /// 不给镜像留下指向已回收 inode 的名字。
    fn rollback_create(&mut self, inode_no: u32, parent_path: &str, name: &str) {
        warn!("rolling back creation of '{}'", name);
        match self.resolve_path(parent_path) {
            Ok(parent_no) => match self.read_inode(parent_no) {
                Ok(parent) => {
                    if let Err(e) = self.remove_entry(&parent, name.as_bytes(), name) {
                        warn!("rollback: failed to drop entry '{}': {}", name, e);
                    }
                }
                Err(e) => warn!("rollback: failed to read parent inode: {}", e),
            },
            Err(e) => warn!("rollback: failed to resolve '{}': {}", parent_path, e),
        }
        self.rollback_inode(inode_no);
    }

    fn copy_block_out(&self, block_no: u32, remaining: usize, host_file: &mut File) -> Result<usize> {
        let mut buf: Block = [0; BLOCK_SIZE];
        self.read_block(block_no, &mut buf)?;
        let take = remaining.min(BLOCK_SIZE);
        host_file.write_all(&buf[..take])?;
        Ok(take)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(FileSystemError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn join_path(parent: &str, name: &str) -> String {
    let parent = normalize_path(parent);
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// 追加负载的确定性填充：相对追加起点的第 i 字节为 'A' + i % 26
fn fill_pattern(buf: &mut [u8], start: usize) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = b'A' + ((start + i) % 26) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_pattern_wraps() {
        let mut buf = [0u8; 30];
        fill_pattern(&mut buf, 0);
        assert_eq!(&buf[..4], b"ABCD");
        assert_eq!(buf[25], b'Z');
        assert_eq!(buf[26], b'A');

        // 起点偏移要接得上前一段
        let mut tail = [0u8; 4];
        fill_pattern(&mut tail, 26);
        assert_eq!(&tail, b"ABCD");
    }

    #[test]
    fn test_name_limits() {
        assert!(validate_name("a").is_ok());
        assert!(validate_name(&"x".repeat(255)).is_ok());
        assert!(validate_name(&"x".repeat(256)).is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a/b", "c"), "/a/b/c");
        assert_eq!(join_path("/a/", "c"), "/a/c");
    }
}
