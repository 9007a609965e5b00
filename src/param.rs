// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义报文解析、响应构建和静态资源服务所依赖的常量：
//! - 报文分隔符与固定的头部名称。
//! - HTTP 状态码及其原因短语（Reason Phrase）。
//! - 文件后缀名到 MIME 类型的映射表。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 头部块的结束标记，即一个空行
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 正文长度头部的规范名称
pub const CONTENT_LENGTH: &str = "Content-Length";

/// 内容类型头部的规范名称
pub const CONTENT_TYPE: &str = "Content-Type";

/// 表单提交使用的内容类型前缀
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// 模板文件中会被替换为当前时间的占位符
pub const TIME_PLACEHOLDER: &str = "{time}";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");

        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");

        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(431, "Request Header Fields Too Large");

        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 静态根目录下常见资源的后缀名到 `Content-Type` 的映射，后缀按小写查找。
    /// 表中没有的后缀不发送 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = [
        ("html", "text/html"),
        ("htm", "text/html"),
        ("css", "text/css"),
        ("js", "text/javascript"),
        ("json", "application/json"),
        ("txt", "text/plain"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("svg", "image/svg+xml"),
        ("webp", "image/webp"),
        ("ico", "image/x-icon"),
        ("woff2", "font/woff2"),
        ("pdf", "application/pdf"),
    ]
    .into_iter()
    .collect();
}

/// 查询状态码的原因短语，未知状态码返回 `"Unknown"`。
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("Unknown")
}
