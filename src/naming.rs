//! 文件名处理：扩展名白名单、安全化与重名探测。

use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::config::ALLOWED_EXTENSIONS;

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 返回最后一个 `.` 之后的扩展名（小写）。
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// 判断文件扩展名是否在允许列表内（大小写不敏感）。
pub fn is_allowed(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// 将客户端文件名转换为可安全落盘的单级文件名。
///
/// 结果不含路径分隔符、不以 `.` 开头；无法得到有效名称时返回 `None`。
pub fn sanitize(raw: &str) -> Option<String> {
    let ascii: String = raw.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = filtered.trim_matches(['.', '_']);
    if trimmed.is_empty() {
        return None;
    }

    let stem = trimmed.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| device.eq_ignore_ascii_case(stem))
    {
        return Some(format!("_{trimmed}"));
    }
    Some(trimmed.to_string())
}

/// 拆分为 (主名, 扩展名)，扩展名包含前导 `.`；首字符的 `.` 不视为扩展名分隔。
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// 按 `name`, `base_1.ext`, `base_2.ext` … 顺序产生候选文件名。
pub fn candidates(name: &str) -> impl Iterator<Item = String> + '_ {
    let (base, ext) = split_name(name);
    std::iter::once(name.to_string())
        .chain((1u64..).map(move |counter| format!("{base}_{counter}{ext}")))
}

/// 返回不在 `existing` 中的第一个候选文件名。
pub fn resolve(name: &str, existing: &HashSet<String>) -> String {
    candidates(name)
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
