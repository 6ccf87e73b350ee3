use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, trace};
use nix::unistd::{access, AccessFlags};

use crate::shell::error::ShellError;

/// 把 PATH 按冒号拆开，顺序保留；空项代表当前目录
pub fn search_dirs(path_var: &str) -> Vec<PathBuf> {
    if path_var.is_empty() {
        return Vec::new();
    }
    path_var
        .split(':')
        .map(|dir| {
            if dir.is_empty() {
                PathBuf::from(".")
            } else {
                PathBuf::from(dir)
            }
        })
        .collect()
}

enum Candidate {
    Executable,
    NotExecutable,
    Directory,
    Missing,
}

fn inspect(path: &Path) -> Candidate {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Candidate::Directory,
        Ok(_) => {
            if access(path, AccessFlags::X_OK).is_ok() {
                Candidate::Executable
            } else {
                Candidate::NotExecutable
            }
        }
        Err(_) => Candidate::Missing,
    }
}

/// 按名称定位可执行文件
///
/// 含 `/` 的名称直接检查，不查 PATH；否则依次尝试 `search_dirs`，
/// 第一个存在且可执行的胜出。只找到不可执行的同名文件时报权限错误。
pub fn resolve(command_name: &str, search_dirs: &[PathBuf]) -> Result<PathBuf, ShellError> {
    if command_name.is_empty() {
        return Err(ShellError::CommandNotFound(command_name.to_string()));
    }

    if command_name.contains('/') {
        let path = PathBuf::from(command_name);
        return match inspect(&path) {
            Candidate::Executable => Ok(path),
            Candidate::NotExecutable => Err(ShellError::PermissionDenied(command_name.to_string())),
            Candidate::Directory => Err(ShellError::IsDirectory(command_name.to_string())),
            Candidate::Missing => Err(ShellError::NoSuchFile(command_name.to_string())),
        };
    }

    let mut denied: Option<PathBuf> = None;
    for dir in search_dirs {
        let candidate = dir.join(command_name);
        match inspect(&candidate) {
            Candidate::Executable => {
                trace!("{} 解析为 {}", command_name, candidate.display());
                return Ok(candidate);
            }
            Candidate::NotExecutable => {
                if denied.is_none() {
                    denied = Some(candidate);
                }
            }
            Candidate::Directory | Candidate::Missing => continue,
        }
    }

    match denied {
        Some(path) => Err(ShellError::PermissionDenied(path.to_string_lossy().to_string())),
        None => Err(ShellError::CommandNotFound(command_name.to_string())),
    }
}

pub fn basename(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return path.into();
    }
    let mut pieces = trimmed.rsplit('/');
    match pieces.next() {
        Some(p) => p.into(),
        None => path.into(),
    }
}

pub fn current_dir() -> String {
    match env::current_dir() {
        Ok(dir) => dir.to_string_lossy().to_string(),
        Err(e) => {
            error!("minish: env current_dir error: {}", e);
            String::new()
        }
    }
}
