use std::{borrow::Cow, collections::HashMap};

use percent_encoding::percent_decode_str;

/// 对 URL 的一个组成部分做百分号解码。
///
/// `plus_as_space` 为真时先把 `+` 视作空格（查询串与表单的约定，路径不适用）。
/// 解码结果不是合法 UTF-8 时原样返回输入，不让整个请求失败。
pub fn decode_component(raw: &str, plus_as_space: bool) -> String {
    let replaced: Cow<str> = if plus_as_space && raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    match percent_decode_str(&replaced).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

// 按 `&` 切分，再按第一个 `=` 切分；没有 `=` 的键取空值，空片段跳过
fn split_pairs(encoded: &str) -> impl Iterator<Item = (String, String)> + '_ {
    encoded
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key, true), decode_component(value, true)),
            None => (decode_component(pair, true), String::new()),
        })
}

/// 解析查询串，重复的键以最后一次出现为准。
pub fn parse_query(query: &str) -> HashMap<String, String> {
    split_pairs(query).collect()
}

/// 解析 `application/x-www-form-urlencoded` 正文，重复的键按提交顺序累积。
pub fn parse_form(body: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in split_pairs(body) {
        params.entry(key).or_default().push(value);
    }
    params
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}
