use crate::disk::Block;
use crate::fs::config::{DIR_ENTRY_SIZE, NAME_BUF_LEN};
use crate::fs::inode::FileType;
use crate::fs::{read_u16, read_u32, write_u16, write_u32};

/// 目录项：264 字节定长槽位，一个目录块放 15 个。
/// rec_len 恒写为槽位长度，读到 0 即该块的条目到此为止；
/// inode 为 0 而 rec_len 非 0 的槽位是删除留下的墓碑，遍历时跳过。
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
    pub name: [u8; NAME_BUF_LEN],
}

impl DirEntry {
    pub const SIZE: usize = DIR_ENTRY_SIZE;

    /// 调用方保证 name 非空且不超过 255 字节
    pub fn new(inode: u32, name: &str, file_type: FileType) -> Self {
        let bytes = name.as_bytes();
        let mut buf = [0u8; NAME_BUF_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);

        Self {
            inode,
            rec_len: Self::SIZE as u16,
            name_len: bytes.len() as u8,
            file_type: file_type as u32 as u8,
            name: buf,
        }
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    /// 该槽之后（含该槽）没有条目
    pub fn is_terminator(&self) -> bool {
        self.rec_len == 0
    }

    /// 删除留下的墓碑槽
    pub fn is_tombstone(&self) -> bool {
        self.inode == 0 && self.rec_len != 0
    }

    pub fn is_dot_or_dotdot(&self) -> bool {
        self.name_bytes() == b"." || self.name_bytes() == b".."
    }

    pub fn matches(&self, name: &[u8]) -> bool {
        self.name_len as usize == name.len() && self.name_bytes() == name
    }

    pub fn read_from(block: &Block, slot: usize) -> Self {
        let base = slot * Self::SIZE;
        let raw = &block[base..base + Self::SIZE];

        let mut name = [0u8; NAME_BUF_LEN];
        name.copy_from_slice(&raw[8..8 + NAME_BUF_LEN]);

        Self {
            inode: read_u32(raw, 0),
            rec_len: read_u16(raw, 4),
            name_len: raw[6],
            file_type: raw[7],
            name,
        }
    }

    pub fn write_to(&self, block: &mut Block, slot: usize) {
        let base = slot * Self::SIZE;
        let raw = &mut block[base..base + Self::SIZE];

        write_u32(raw, 0, self.inode);
        write_u16(raw, 4, self.rec_len);
        raw[6] = self.name_len;
        raw[7] = self.file_type;
        raw[8..8 + NAME_BUF_LEN].copy_from_slice(&self.name);
    }
}

/// 把一个清零的数据块初始化为新目录的首块：
/// 槽 0 是 `.`（指向自己），槽 1 是 `..`（指向父目录）。
pub fn init_dir_block(block: &mut Block, self_inode: u32, parent_inode: u32) {
    DirEntry::new(self_inode, ".", FileType::Directory).write_to(block, 0);
    DirEntry::new(parent_inode, "..", FileType::Directory).write_to(block, 1);
}

/// 墓碑化：只清掉槽位的 inode 字段，名字和 rec_len 保持原样
pub fn clear_slot_inode(block: &mut Block, slot: usize) {
    write_u32(&mut block[slot * DirEntry::SIZE..], 0, 0);
}
