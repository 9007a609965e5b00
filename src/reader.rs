// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 字节流读取模块
//!
//! 从原始字节流中切出一个完整的请求：
//! 1. 持续读取直到出现 `\r\n\r\n`，终止符可能横跨多次读取。
//! 2. 与终止符同一批到达的正文字节（溢出字节）保留为正文开头。
//! 3. 若存在 `Content-Length`，继续读取直到凑够该长度或对端关闭；
//!    提前关闭时返回已读到的部分正文，而不是报错。
//! 4. 第一次读取即遇到 EOF 表示“没有请求”，调用方应直接关闭连接。

use crate::{exception::Exception, param::*};

use bytes::{Buf, Bytes, BytesMut};
use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// 尚未解析的请求：头部块文本（不含终止符）与正文字节。
#[derive(Debug, Clone)]
pub struct RawRequest {
    head: String,
    body: Bytes,
}

impl RawRequest {
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (String, Bytes) {
        (self.head, self.body)
    }
}

/// 从流中读取一个请求。
///
/// 返回 `Ok(None)` 表示对端在发送任何字节之前就关闭了连接。
pub async fn read_request<R>(
    stream: &mut R,
    id: u128,
    max_header_size: usize,
    max_body_size: usize,
) -> Result<Option<RawRequest>, Exception>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);
    let mut scanned = 0;

    let head_end = loop {
        if let Some(pos) = find_terminator(&buffer, scanned) {
            break Some(pos);
        }
        if buffer.len() > max_header_size + HEADER_TERMINATOR.len() {
            warn!("[ID{}]头部超过{}字节仍未结束", id, max_header_size);
            return Err(Exception::HeaderTooLarge);
        }
        // 终止符可能被上一次读取截断，从末尾回退 3 字节继续扫描
        scanned = buffer.len().saturating_sub(HEADER_TERMINATOR.len() - 1);

        buffer.reserve(READ_CHUNK);
        let n = stream.read_buf(&mut buffer).await.map_err(|e| {
            error!("[ID{}]读取请求头时遇到错误: {}", id, e);
            Exception::MalformedRequest
        })?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            debug!("[ID{}]对端在头部终止符之前关闭，按已读内容处理", id);
            break None;
        }
    };

    let (head_bytes, mut body) = match head_end {
        Some(pos) => {
            if pos > max_header_size {
                warn!("[ID{}]头部长度{}超过上限{}", id, pos, max_header_size);
                return Err(Exception::HeaderTooLarge);
            }
            let head = buffer.split_to(pos);
            buffer.advance(HEADER_TERMINATOR.len());
            (head, buffer)
        }
        None => (buffer, BytesMut::new()),
    };

    let head = String::from_utf8(head_bytes.to_vec()).map_err(|_| {
        error!("[ID{}]请求头不是合法的UTF-8", id);
        Exception::MalformedRequest
    })?;

    match content_length(&head, id)? {
        None => body.clear(),
        Some(length) => {
            if length > max_body_size {
                warn!("[ID{}]声明的正文长度{}超过上限{}", id, length, max_body_size);
                return Err(Exception::PayloadTooLarge);
            }
            while body.len() < length {
                body.reserve((length - body.len()).min(READ_CHUNK));
                let n = stream.read_buf(&mut body).await.map_err(|e| {
                    error!("[ID{}]读取请求正文时遇到错误: {}", id, e);
                    Exception::MalformedRequest
                })?;
                if n == 0 {
                    warn!(
                        "[ID{}]正文提前结束：声明{}字节，实际收到{}字节",
                        id,
                        length,
                        body.len()
                    );
                    break;
                }
            }
            body.truncate(length);
        }
    }

    debug!("[ID{}]读取完毕：头部{}字节，正文{}字节", id, head.len(), body.len());
    Ok(Some(RawRequest {
        head,
        body: body.freeze(),
    }))
}

fn find_terminator(buffer: &[u8], from: usize) -> Option<usize> {
    if buffer.len() < HEADER_TERMINATOR.len() {
        return None;
    }
    let from = from.min(buffer.len());
    buffer[from..]
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + from)
}

// 只在读取阶段使用，完整的头部解析在 request 模块。
// 重复出现且取值不同的 Content-Length 无法确定正文边界，按格式错误处理。
fn content_length(head: &str, id: u128) -> Result<Option<usize>, Exception> {
    let mut found: Option<usize> = None;
    for line in head.split(CRLF).skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            continue;
        }
        let length = value.trim().parse::<usize>().map_err(|_| {
            error!("[ID{}]非法的Content-Length：{}", id, value.trim());
            Exception::MalformedRequest
        })?;
        match found {
            Some(previous) if previous != length => {
                error!("[ID{}]Content-Length重复且不一致：{}与{}", id, previous, length);
                return Err(Exception::MalformedRequest);
            }
            _ => found = Some(length),
        }
    }
    Ok(found)
}
