// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责把读取模块切出的头部块与正文字节解析为不可变的 `Request`：
//! 1. 请求行（Request-Line）的解析：必须恰好是空格分隔的三段。
//! 2. 请求目标拆分为路径与查询串，两者都做百分号解码。
//! 3. 头部逐行按第一个 `:` 切分，缺少冒号的行直接跳过（宽松解析）。
//! 4. `POST` 且内容类型为 `application/x-www-form-urlencoded` 时解析表单字段。

use crate::{
    exception::Exception,
    param::*,
    reader::RawRequest,
    util::{decode_component, parse_form, parse_query},
};

use bytes::Bytes;
use log::{debug, error};
use std::collections::HashMap;

/// 一个已解析的 HTTP 请求，构造后不再修改。
#[derive(Debug, Clone)]
pub struct Request {
    /// 连接编号，用于日志追踪
    id: u128,
    /// 请求方法，按收到的原样保存
    method: String,
    /// 解码后的路径，不含查询串
    path: String,
    /// 协议版本字符串，例如 `HTTP/1.1`
    version: String,
    /// 查询参数，重复键以最后一次为准
    query_params: HashMap<String, String>,
    /// 头部字段，名称保留线上的大小写
    headers: HashMap<String, String>,
    /// 原始正文
    body: Bytes,
    /// 表单字段，仅在表单 POST 时非空
    form_params: HashMap<String, Vec<String>>,
}

impl Request {
    /// 从读取模块的结果构建 `Request`。
    pub fn try_from(raw: RawRequest, id: u128) -> Result<Self, Exception> {
        let (head, body) = raw.into_parts();
        Self::parse(&head, body, id)
    }

    /// 从头部块文本（不含结束空行）和正文字节构建 `Request`。
    ///
    /// # 错误处理
    /// 请求行缺失、空白，或不是恰好三段时返回 `Exception::MalformedRequest`。
    pub fn parse(head: &str, body: Bytes, id: u128) -> Result<Self, Exception> {
        let mut lines = head.split(CRLF);

        // 1. 解析请求行 (e.g., "GET /index.html?x=1 HTTP/1.1")
        let request_line = lines.next().unwrap_or("");
        if request_line.trim().is_empty() {
            error!("[ID{}]请求行为空", id);
            return Err(Exception::MalformedRequest);
        }
        // 行尾多余的空格不产生空字段，行首和中间的空格仍然算格式错误
        let parts: Vec<&str> = request_line.trim_end_matches(' ').split(' ').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }
        let (method, target, version) = (parts[0], parts[1], parts[2]);

        // 2. 拆分路径与查询串
        let (raw_path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let path = decode_component(raw_path, false);
        if path.contains('?') {
            error!("[ID{}]解码后的路径包含'?'：{}", id, raw_path);
            return Err(Exception::MalformedRequest);
        }
        let query_params = query.map(parse_query).unwrap_or_default();

        // 3. 逐行解析头部
        let mut headers = HashMap::new();
        for line in lines {
            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    headers.insert(name.trim().to_string(), value.trim().to_string());
                }
                _ => {
                    if !line.is_empty() {
                        debug!("[ID{}]跳过无法解析的头部行：{}", id, line);
                    }
                }
            }
        }

        let mut request = Self {
            id,
            method: method.to_string(),
            path,
            version: version.to_string(),
            query_params,
            headers,
            body,
            form_params: HashMap::new(),
        };

        // 4. 表单正文
        if request.method == "POST"
            && request
                .header(CONTENT_TYPE)
                .map_or(false, |ct| ct.starts_with(FORM_URLENCODED))
        {
            request.form_params = parse_form(&request.body_as_string());
            debug!("[ID{}]解析到{}个表单字段", id, request.form_params.len());
        }

        Ok(request)
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    /// 获取请求方法
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 获取解码后的请求路径（不含查询串）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// 按规范名称查找头部，找不到时再做大小写不敏感的匹配。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 以 UTF-8 解读正文，非法字节替换为 U+FFFD。
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 表单字段的第一个值
    pub fn post_param(&self, name: &str) -> Option<&str> {
        self.form_params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// 表单字段的全部值，按提交顺序排列
    pub fn post_params(&self, name: &str) -> &[String] {
        self.form_params
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn form_params(&self) -> &HashMap<String, Vec<String>> {
        &self.form_params
    }
}
