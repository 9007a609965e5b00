// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器在单个连接的生命周期中可能遇到的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：覆盖报文解析、尺寸限制、静态资源查找、套接字 I/O 以及处理器故障。
//! - **语义映射**：每个变体都通过 [`Exception::status_code`] 对应一个 HTTP 状态码，
//!   连接处理器据此决定写出什么响应（或者直接关闭连接）。
//! - **日志友好**：底层 `io::Error` 的细节在出错现场记录，枚举本身只携带分类。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求行缺失、空白、字段数不为 3，头部不是 UTF-8，或者读取请求时套接字出错。
    MalformedRequest,
    /// 在读到 `\r\n\r\n` 之前，头部已经超过了配置的上限。
    HeaderTooLarge,
    /// `Content-Length` 声明的正文长度超过了配置的上限。
    PayloadTooLarge,
    /// 没有匹配的路由，也没有对应的静态文件，或者路径试图越出静态根目录。
    NotFound,
    /// 连接上的读写失败，或静态文件无法读取。
    IOFailure,
    /// 已注册的处理器返回了错误或发生了 panic。
    HandlerFault,
}

use Exception::*;

impl Exception {
    /// 连接处理器对该异常作出响应时使用的状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            MalformedRequest => 400,
            HeaderTooLarge => 431,
            PayloadTooLarge => 413,
            NotFound => 404,
            IOFailure | HandlerFault => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedRequest => write!(f, "Malformed request (400)"),
            HeaderTooLarge => write!(f, "Request header block too large (431)"),
            PayloadTooLarge => write!(f, "Request body too large (413)"),
            NotFound => write!(f, "Not found (404)"),
            IOFailure => write!(f, "I/O failure on connection"),
            HandlerFault => write!(f, "Handler failed while producing a response"),
        }
    }
}

impl std::error::Error for Exception {}
