use std::fmt;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),        // 底层 I/O 错误
    DiskFull,                  // 磁盘已满
    InodeFull,                 // inode 已满
    DirectoryFull(String),     // 目录槽位用尽，带路径
    FileTooLarge(String),      // 超过单文件容量上限
    NotFound(String),          // 文件或目录不存在，带路径
    AlreadyExists(String),     // 文件或目录已存在，带路径
    NotADirectory(String),     // 期望目录，实际不是
    NotARegularFile(String),   // 期望普通文件，实际不是
    DirectoryNotEmpty(String), // 目录非空
    InvalidName(String),       // 名字或路径非法
    InvalidInode(u32),         // inode 编号越界
    OutOfRange(String),        // 块号或长度越界
    InvalidImage(String),      // 镜像损坏或魔数不符
    Corrupted(String),         // 文件系统结构损坏
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::DiskFull => write!(f, "Disk space is full"),
            Self::InodeFull => write!(f, "No free inode available"),
            Self::DirectoryFull(path) => write!(f, "Directory has no free entry slot: {}", path),
            Self::FileTooLarge(path) => write!(f, "File exceeds maximum size: {}", path),
            Self::NotFound(path) => write!(f, "File or directory not found: {}", path),
            Self::AlreadyExists(path) => write!(f, "File or directory already exists: {}", path),
            Self::NotADirectory(path) => write!(f, "Expected a directory: {}", path),
            Self::NotARegularFile(path) => write!(f, "Expected a regular file: {}", path),
            Self::DirectoryNotEmpty(path) => write!(f, "Directory is not empty: {}", path),
            Self::InvalidName(name) => write!(f, "Invalid name or path: {}", name),
            Self::InvalidInode(inode) => write!(f, "Invalid inode: {}", inode),
            Self::OutOfRange(what) => write!(f, "Out of range: {}", what),
            Self::InvalidImage(desc) => write!(f, "Not a valid file system image: {}", desc),
            Self::Corrupted(desc) => write!(f, "File system corrupted: {}", desc),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
