//! 单实例标记
//!
//! 启动时在存储目录中打开 `ViBoard.instance`，并在整个运行期间对它持有独占的
//! 建议锁。锁已被其他进程（或同一进程中的另一个守卫）持有时，说明已有实例在运行。
//! 进程崩溃时系统释放锁，残留的标记文件会被下一个实例直接接管。

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::config::ConfigResult;

/// 标记文件名
pub const INSTANCE_FILE: &str = "ViBoard.instance";

/// 获取锁后标记被退出中的实例删除时的重试次数
const ACQUIRE_ATTEMPTS: usize = 3;

/// 运行中实例的标记，丢弃时删除并释放锁
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    file: Option<File>,
}

impl InstanceGuard {
    /// 获取实例标记
    ///
    /// 已有实例在运行时返回 `Ok(None)`，不会改动对方的标记。
    pub fn acquire(dir: &Path) -> ConfigResult<Option<Self>> {
        fs::create_dir_all(dir)?;
        let path = dir.join(INSTANCE_FILE);

        for _ in 0..ACQUIRE_ATTEMPTS {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            match file.try_lock() {
                Ok(()) => {}
                Err(TryLockError::WouldBlock) => {
                    tracing::info!(path = %path.display(), "Instance marker is locked by another instance");
                    return Ok(None);
                }
                Err(TryLockError::Error(e)) => return Err(e.into()),
            }

            // 上一个实例在我们打开文件后、加锁前删除了标记，此时锁住的是已删除的文件
            if !path.exists() {
                tracing::debug!("Instance marker vanished while locking, retrying");
                continue;
            }

            file.set_len(0)?;
            write!(file, "{}", std::process::id())?;
            file.flush()?;

            return Ok(Some(Self {
                path,
                file: Some(file),
            }));
        }

        Err(std::io::Error::other("instance marker keeps disappearing").into())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // 先删除再解锁，等待中的实例加锁后会发现标记已不存在
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::error!(path = %self.path.display(), "Failed to remove instance marker: {}", e);
        }
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                tracing::warn!("Failed to unlock instance marker: {}", e);
            }
        }
    }
}
