use crate::fs::error::{FileSystemError, Result};

/// 规整成绝对路径：没有前导 '/' 就补上，
/// 结尾的 '/' 全部去掉（根目录除外）。空串视为根。
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let mut abs = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while abs.len() > 1 && abs.ends_with('/') {
        abs.pop();
    }
    abs
}

/// 把路径拆成（父目录, 末级名字）。根目录没有名字，不能拆。
pub fn split_path(path: &str) -> Result<(String, String)> {
    let abs = normalize_path(path);

    if abs == "/" {
        return Err(FileSystemError::InvalidName(
            "cannot operate on the root directory".into(),
        ));
    }

    // 绝对路径必有 '/'，rfind 不会落空
    match abs.rfind('/') {
        Some(0) => {
            // "/file"
            Ok(("/".to_string(), abs[1..].to_string()))
        }
        Some(pos) => {
            // "/a/b/file"
            Ok((abs[..pos].to_string(), abs[pos + 1..].to_string()))
        }
        None => Err(FileSystemError::InvalidName(abs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("a"), "/a");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("a/b///"), "/a/b");
        assert_eq!(normalize_path("  /x "), "/x");
    }

    #[test]
    fn test_split() {
        assert_eq!(split_path("/file").unwrap(), ("/".into(), "file".into()));
        assert_eq!(split_path("file").unwrap(), ("/".into(), "file".into()));
        assert_eq!(
            split_path("/a/b/file").unwrap(),
            ("/a/b".into(), "file".into())
        );
        assert_eq!(split_path("/a/b/").unwrap(), ("/a".into(), "b".into()));
    }

    #[test]
    fn test_split_rejects_root() {
        assert!(split_path("/").is_err());
        assert!(split_path("").is_err());
        assert!(split_path("///").is_err());
    }
}
