// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建模块
//!
//! 响应头块固定由以下部分组成：
//! 状态行、可选的 `Content-Type`、必有的 `Content-Length`、必有的 `Connection: close`，以及结束空行。
//!
//! 写出头块之后，调用方必须恰好写出 `Content-Length` 个正文字节。
//! 本模块不强制这一点，只在 [`ResponseWriter`] 中记录声明值与实际值，供连接处理器写日志。

use crate::param::*;

use bytes::Bytes;
use std::io::{self, Write};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// 序列化响应头块。
pub fn response_head(
    status_code: u16,
    status_text: &str,
    content_type: Option<&str>,
    content_length: u64,
) -> Vec<u8> {
    let status_code = status_code.to_string();
    let content_length = content_length.to_string();
    [
        "HTTP/1.1 ",
        status_code.as_str(),
        " ",
        status_text,
        CRLF,
        match content_type {
            Some(t) => [CONTENT_TYPE, ": ", t, CRLF].concat(),
            None => String::new(),
        }
        .as_str(),
        CONTENT_LENGTH,
        ": ",
        content_length.as_str(),
        CRLF,
        "Connection: close",
        CRLF,
        CRLF,
    ]
    .concat()
    .into_bytes()
}

/// 把响应头块写入原始流并刷新，正文由调用方随后写出。
pub async fn write_response<W>(
    sink: &mut W,
    status_code: u16,
    status_text: &str,
    content_type: Option<&str>,
    content_length: u64,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = response_head(status_code, status_text, content_type, content_length);
    sink.write_all(&head).await?;
    sink.flush().await
}

/// 写出一个正文为空的响应，原因短语取自状态码表。
pub async fn write_empty<W>(sink: &mut W, status_code: u16) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(sink, status_code, reason_phrase(status_code), None, 0).await
}

/// 交给处理器的响应缓冲区。
///
/// 处理器先调用 [`ResponseWriter::write_response`] 写出头块，再通过 `io::Write` 写正文。
/// 处理器返回后，连接处理器把缓冲区内容一次性写到套接字上。
#[derive(Debug, Default)]
pub struct ResponseWriter {
    buffer: Vec<u8>,
    status_code: Option<u16>,
    declared_length: u64,
    body_written: u64,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写出状态行与头块。每个响应只能调用一次。
    pub fn write_response(
        &mut self,
        status_code: u16,
        status_text: &str,
        content_type: Option<&str>,
        content_length: u64,
    ) -> io::Result<()> {
        if self.status_code.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "response head already written",
            ));
        }
        self.buffer.extend_from_slice(&response_head(
            status_code,
            status_text,
            content_type,
            content_length,
        ));
        self.status_code = Some(status_code);
        self.declared_length = content_length;
        Ok(())
    }

    /// 写出头块并紧跟完整正文，`Content-Length` 取正文长度。
    pub fn send(
        &mut self,
        status_code: u16,
        status_text: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> io::Result<()> {
        self.write_response(status_code, status_text, content_type, body.len() as u64)?;
        self.write_all(body)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn declared_length(&self) -> u64 {
        self.declared_length
    }

    pub fn body_written(&self) -> u64 {
        self.body_written
    }

    /// 头块已写出，且正文长度与声明一致
    pub fn is_framed(&self) -> bool {
        self.status_code.is_some() && self.declared_length == self.body_written
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}

impl Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status_code.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "body written before response head",
            ));
        }
        self.buffer.extend_from_slice(buf);
        self.body_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
