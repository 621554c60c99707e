//! # 应用路径管理
//!
//! 统一计算用户配置文件的路径。
//! 配置目录为 `$XDG_CONFIG_HOME/mandelbrot-viewer/`，回退到 `~/.config/mandelbrot-viewer/`。
//!
//! 只做查找，不创建目录：配置文件是可选的。

use std::path::{Path, PathBuf};

const APP_DIR: &str = "mandelbrot-viewer";

/// 用户配置目录
pub fn config_dir() -> PathBuf {
    resolve_config_dir(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        home_dir(),
    )
}

/// viewer.json 的完整路径
pub fn viewer_config_path() -> PathBuf {
    config_dir().join("viewer.json")
}

// ── 内部实现 ────────────────────────────────────────────────

fn resolve_config_dir(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    // 1) 优先使用 $XDG_CONFIG_HOME（必须是绝对路径）
    if let Some(xdg) = xdg.filter(|p| p.is_absolute()) {
        return xdg.join(APP_DIR);
    }
    // 2) 回退 ~/.config
    if let Some(home) = home {
        return home.join(".config").join(APP_DIR);
    }
    // 3) 极端 fallback：可执行文件旁边
    exe_dir().unwrap_or_else(|| Path::new(".").to_path_buf())
}

/// 获取 $HOME
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// 获取可执行文件所在目录
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}
