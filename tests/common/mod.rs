// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的服务器启动与报文收发工具

#![allow(dead_code)]

use rawhttp::{Config, Request, ResponseWriter, Router, Server};

use std::{fs, net::SocketAddr, time::Duration};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};

pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut self.handle).await;
    }
}

/// 在临时目录里建一个小站点
pub fn site() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), "<h1>rawhttp</h1>").unwrap();
    fs::write(root.path().join("classic.html"), "<p>{time}</p>").unwrap();
    fs::create_dir(root.path().join("css")).unwrap();
    fs::write(root.path().join("css/styles.css"), "body { margin: 0; }").unwrap();
    fs::write(root.path().join("blob.bin"), vec![7u8; 200_000]).unwrap();
    root
}

pub fn demo_router() -> Router {
    let router = Router::new();
    router.register("GET", "/messages", |request: &Request, out: &mut ResponseWriter| {
        let body = format!(
            "Last param = {}",
            request.query_param("last").unwrap_or("not provided")
        );
        out.send(200, "OK", Some("text/plain"), body.as_bytes())
    });
    router.register("POST", "/messages", |request: &Request, out: &mut ResponseWriter| {
        out.send(200, "OK", Some("text/plain"), request.body())
    });
    router
}

pub async fn start(configure: impl FnOnce(Config) -> Config) -> TestServer {
    let root = site();
    let config = configure(
        Config::new()
            .with_www_root(root.path().to_str().unwrap())
            .with_port(0),
    );
    let server = Server::bind(config, demo_router()).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run(async {
        let _ = stopped.await;
    }));

    TestServer {
        addr,
        root,
        stop: Some(stop),
        handle,
    }
}

/// 发送原始字节并读取完整响应直到连接关闭
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server closed the connection in time")
        .unwrap();
    response
}

pub struct Parsed {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Parsed {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// 解析响应并断言 Content-Length 与正文长度一致
pub fn parse_response(response: &[u8]) -> Parsed {
    let pos = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = String::from_utf8(response[..pos].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let parsed = Parsed {
        status,
        headers,
        body: response[pos + 4..].to_vec(),
    };

    let declared: usize = parsed
        .header("Content-Length")
        .and_then(|v| v.parse().ok())
        .expect("Content-Length");
    assert_eq!(declared, parsed.body.len());
    assert_eq!(parsed.header("Connection"), Some("close"));
    parsed
}
