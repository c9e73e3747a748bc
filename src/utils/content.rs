use std::fs;
use std::path::{Path, PathBuf};

use crate::{RavelError, Result};

/// 以此开头的字符串字段从文件读取内容，而不是按字面使用
pub const REDIRECT_PREFIX: char = '@';

/// 返回 `@data/body.json` 这类引用指向的位置
pub fn redirect_target(text: &str) -> Option<&str> {
    text.trim_start()
        .strip_prefix(REDIRECT_PREFIX)
        .map(str::trim)
}

/// 读取 `@` 引用指向的内容
pub trait ContentReader: Send + Sync {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>>;

    fn read_text(&self, location: &str) -> Result<String> {
        let bytes = self.read_bytes(location)?;
        String::from_utf8(bytes).map_err(|e| {
            RavelError::ContentError(format!("{} is not valid UTF-8: {}", location, e))
        })
    }
}

/// 从本地文件系统读取普通路径和 `file:` URL
#[derive(Debug, Clone, Default)]
pub struct FsContentReader {
    base_dir: Option<PathBuf>,
}

impl FsContentReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 相对路径按 `dir` 解析，而不是当前工作目录
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    pub fn resolve(&self, location: &str) -> Result<PathBuf> {
        if location.starts_with("file:") {
            let url = url::Url::parse(location)?;
            return url.to_file_path().map_err(|_| {
                RavelError::ContentError(format!("{} is not a local file URL", location))
            });
        }
        if location.contains("://") {
            return Err(RavelError::ContentError(format!(
                "unsupported content location {}",
                location
            )));
        }

        let path = Path::new(location);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl ContentReader for FsContentReader {
    fn read_bytes(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.resolve(location)?;
        tracing::debug!("Reading content from {}", path.display());
        fs::read(&path)
            .map_err(|e| RavelError::ContentError(format!("{}: {}", path.display(), e)))
    }
}
