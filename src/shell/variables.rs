use std::env;
use std::ffi::{CString, NulError};

/// 按插入顺序保存的环境变量表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// 从当前进程环境构建，跳过非 UTF-8 的条目
    pub fn from_process() -> Self {
        let mut environment = Self::new();
        for (name, value) in env::vars_os() {
            if let (Ok(name), Ok(value)) = (name.into_string(), value.into_string()) {
                environment.set(name, value);
            }
        }
        environment
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 已存在则原地覆盖，保持原有位置
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.vars.iter().position(|(key, _)| key == name)?;
        Some(self.vars.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// 供 execve 使用的 `NAME=value` 列表
    pub fn to_envp(&self) -> Result<Vec<CString>, NulError> {
        self.vars
            .iter()
            .map(|(name, value)| CString::new(format!("{}={}", name, value)))
            .collect()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
