//! 实用工具模块
//!
//! - 单调时钟（不受系统时间调整影响）
//! - 版本字符串
//! - 配置文件路径解析与默认配置写入

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use git_version::git_version;
use rustix::time::{clock_gettime, ClockId};

pub mod watcher;

/// 随二进制一起分发的默认配置
pub const DEFAULT_CONFIG: &[u8] = include_bytes!("../../resources/default-config.toml");

/// 版本字符串，如 `0.3.0 (abc1234)`
pub fn version() -> String {
    // 优先使用构建时注入的版本字符串
    if let Some(v) = option_env!("CARET_TRAIL_BUILD_VERSION_STRING") {
        return String::from(v);
    }

    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let commit = option_env!("CARET_TRAIL_BUILD_COMMIT")
        .unwrap_or(git_version!(fallback = "unknown commit"));

    format!("{VERSION} ({commit})")
}

/// 获取单调递增时钟时间
pub fn get_monotonic_time() -> Duration {
    let ts = clock_gettime(ClockId::Monotonic);
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

/// 默认配置文件路径：`$XDG_CONFIG_HOME/caret-trail/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "caret-trail")?;
    Some(dirs.config_dir().join("config.toml"))
}

/// 文件不存在时写入默认配置，返回是否写入了新文件
pub fn write_default_config(path: &Path) -> anyhow::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("error creating config directory {parent:?}"))?;
    }

    let mut file = fs::File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("error creating config file at {path:?}"))?;
    file.write_all(DEFAULT_CONFIG)
        .with_context(|| format!("error writing default config to {path:?}"))?;

    info!("wrote default config to {path:?}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use caret_trail_config::Config;
    use xshell::Shell;

    use super::*;

    #[test]
    fn monotonic_time_advances() {
        let a = get_monotonic_time();
        let b = get_monotonic_time();
        assert!(b >= a);
    }

    #[test]
    fn version_mentions_package_version() {
        assert!(version().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn default_config_is_written_once() {
        let sh = Shell::new().unwrap();
        let temp_dir = sh.create_temp_dir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
    }
}
