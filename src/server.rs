// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器与连接处理
//!
//! 每个连接只处理一个请求，随后关闭：
//!
//! ```text
//! Reading ──EOF──────────────────────────────► Closed
//!    │
//!    ├─解析失败─► Malformed ─(4xx, 空正文)────► Closed
//!    │
//!    └─解析成功─► Parsed ─┬─命中路由─► Dispatched ─► Closed
//!                         └─未命中──► 静态文件回退 ─► Closed
//! ```
//!
//! 并发由一个固定大小的信号量限制，超出上限的连接在接受后排队等待许可。

use crate::{
    config::Config,
    exception::Exception,
    reader::read_request,
    request::Request,
    response::{write_empty, ResponseWriter},
    router::{Handler, Router},
    static_files,
};

use log::{debug, error, info, warn};
use std::{
    future::Future,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Semaphore,
    task,
    time::{sleep, timeout},
};

const LINGER: Duration = Duration::from_secs(2);

/// 单个连接的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// 对端没有发送任何字节就关闭了连接，未写出响应
    Closed,
    /// 写出了一个完整的响应
    Responded(u16),
    /// 处理器失败，连接被关闭且未写出任何内容
    HandlerFault,
    /// 向连接写出响应时失败
    IOFailure,
}

/// 处理一个连接上的一个请求。
pub async fn handle_connection<S>(
    stream: &mut S,
    id: u128,
    router: &Router,
    config: &Config,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = match read_request(stream, id, config.max_header_size(), config.max_body_size()).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("[ID{}]客户端未发送请求即关闭连接", id);
            return ConnectionOutcome::Closed;
        }
        Err(e) => return reject(stream, id, e).await,
    };

    let request = match Request::try_from(raw, id) {
        Ok(request) => request,
        Err(e) => return reject(stream, id, e).await,
    };
    let method = request.method().to_string();
    let path = request.path().to_string();
    debug!("[ID{}]成功解析HTTP请求：{} {}", id, method, path);

    let outcome = match router.resolve(&method, &path) {
        Some(handler) => dispatch(stream, handler, request).await,
        None => fallback(stream, &request, config).await,
    };

    match outcome {
        ConnectionOutcome::Responded(status) => {
            info!("[ID{}] {}, {}, {}", id, method, path, status)
        }
        other => warn!("[ID{}] {}, {}, {:?}", id, method, path, other),
    }
    outcome
}

async fn reject<S>(stream: &mut S, id: u128, e: Exception) -> ConnectionOutcome
where
    S: AsyncWrite + Unpin,
{
    warn!("[ID{}]请求被拒绝：{}", id, e);
    respond_empty(stream, id, e.status_code()).await
}

async fn respond_empty<S>(stream: &mut S, id: u128, status: u16) -> ConnectionOutcome
where
    S: AsyncWrite + Unpin,
{
    match write_empty(stream, status).await {
        Ok(()) => ConnectionOutcome::Responded(status),
        Err(e) => {
            error!("[ID{}]发送{}响应失败: {}", id, status, e);
            ConnectionOutcome::IOFailure
        }
    }
}

async fn dispatch<S>(stream: &mut S, handler: Arc<dyn Handler>, request: Request) -> ConnectionOutcome
where
    S: AsyncWrite + Unpin,
{
    let id = request.id();
    // 处理器是同步代码，放到阻塞线程池里执行，panic 也被隔离在 JoinError 中
    let joined = task::spawn_blocking(move || {
        let mut out = ResponseWriter::new();
        let result = handler.handle(&request, &mut out);
        (out, result)
    })
    .await;

    let out = match joined {
        Ok((out, Ok(()))) => out,
        Ok((_, Err(e))) => {
            error!("[ID{}]{}: {}", id, Exception::HandlerFault, e);
            return ConnectionOutcome::HandlerFault;
        }
        Err(e) => {
            error!("[ID{}]{}（panic）: {}", id, Exception::HandlerFault, e);
            return ConnectionOutcome::HandlerFault;
        }
    };

    let Some(status) = out.status_code() else {
        error!("[ID{}]处理器没有写出响应", id);
        return ConnectionOutcome::HandlerFault;
    };
    if !out.is_framed() {
        warn!(
            "[ID{}]处理器声明Content-Length为{}，实际写出{}字节",
            id,
            out.declared_length(),
            out.body_written()
        );
    }

    let sent = async {
        stream.write_all(out.as_bytes()).await?;
        stream.flush().await
    };
    match sent.await {
        Ok(()) => ConnectionOutcome::Responded(status),
        Err(e) => {
            error!("[ID{}]发送处理器响应失败: {}", id, e);
            ConnectionOutcome::IOFailure
        }
    }
}

async fn fallback<S>(stream: &mut S, request: &Request, config: &Config) -> ConnectionOutcome
where
    S: AsyncWrite + Unpin,
{
    let id = request.id();
    match static_files::resolve(config, request.path(), id).await {
        Ok(asset) => match static_files::serve(stream, &asset, id).await {
            Ok(status) => ConnectionOutcome::Responded(status),
            Err(_) => ConnectionOutcome::IOFailure,
        },
        Err(e) => {
            debug!("[ID{}]静态资源{}：{}", id, request.path(), e);
            respond_empty(stream, id, e.status_code()).await
        }
    }
}

/// 当前活跃连接数的只读视图
#[derive(Clone)]
pub struct ConnectionGauge {
    limit: Arc<Semaphore>,
    max: usize,
}

impl ConnectionGauge {
    pub fn active(&self) -> usize {
        self.max - self.limit.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    config: Arc<Config>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// 绑定监听端口。`local` 为真时只监听回环地址。
    pub async fn bind(config: Config, router: Router) -> io::Result<Self> {
        let address = match config.local() {
            true => Ipv4Addr::LOCALHOST,
            false => Ipv4Addr::UNSPECIFIED,
        };
        let socket = SocketAddrV4::new(address, config.port());
        let listener = TcpListener::bind(socket).await.map_err(|e| {
            error!("无法绑定端口：{}，错误：{}", config.port(), e);
            e
        })?;
        info!(
            "服务端已在{}上监听，最大并发连接数{}",
            listener.local_addr()?,
            config.max_connections()
        );

        Ok(Self {
            listener,
            router: Arc::new(router),
            connection_limit: Arc::new(Semaphore::new(config.max_connections())),
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 路由表句柄，服务器运行期间也可以继续注册
    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    pub fn gauge(&self) -> ConnectionGauge {
        ConnectionGauge {
            limit: Arc::clone(&self.connection_limit),
            max: self.config.max_connections(),
        }
    }

    /// 接受连接直到 `shutdown` 完成。
    ///
    /// 停止接受之后，等待进行中的连接处理完毕再返回，最多等待 `connection_timeout` 加上关闭等待期。
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut id: u128 = 0;

        loop {
            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
            };

            // 达到并发上限时在这里排队
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            debug!("[ID{}]新的连接：{}", id, addr);

            let router = Arc::clone(&self.router);
            let config = Arc::clone(&self.config);
            tokio::spawn(async move {
                let _permit = permit;
                serve_connection(stream, id, router, config).await;
            });
            id += 1;
        }
        info!("主循环接收到停机指令，正在退出...");
        drop(self.listener);

        // 所有许可都归还时，进行中的连接都已处理完毕
        let max = self.config.max_connections();
        let in_flight = max - self.connection_limit.available_permits();
        if in_flight > 0 {
            info!("等待{}个进行中的连接完成", in_flight);
        }
        let grace = self.config.connection_timeout() + LINGER;
        let all_permits = u32::try_from(max).unwrap_or(u32::MAX);
        match timeout(grace, self.connection_limit.acquire_many(all_permits)).await {
            Ok(Ok(_)) => debug!("所有连接均已结束"),
            Ok(Err(_)) | Err(_) => warn!(
                "{}秒内仍有连接未结束，放弃等待",
                grace.as_secs()
            ),
        }
    }
}

async fn serve_connection(mut stream: TcpStream, id: u128, router: Arc<Router>, config: Arc<Config>) {
    let deadline = config.connection_timeout();
    match timeout(deadline, handle_connection(&mut stream, id, &router, &config)).await {
        Ok(outcome) => debug!("[ID{}]连接处理结束：{:?}", id, outcome),
        Err(_) => warn!("[ID{}]连接超过{}秒未完成，强制关闭", id, deadline.as_secs()),
    }
    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭连接时出错: {}", id, e);
        return;
    }
    // 带着未读数据关闭套接字会发送 RST，客户端可能因此丢掉已经写出的响应
    if timeout(LINGER, drain(&mut stream)).await.is_err() {
        debug!("[ID{}]客户端在关闭等待期内未断开", id);
    }
}

async fn drain(stream: &mut TcpStream) {
    let mut scratch = [0u8; 4096];
    while let Ok(n) = stream.read(&mut scratch).await {
        if n == 0 {
            break;
        }
    }
}
