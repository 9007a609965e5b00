// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # rawhttp 演示服务器
//!
//! 载入配置、注册示例路由、启动监听，并提供一个简单的标准输入管理控制台。
//! 控制台指令 `stop` 或 Ctrl-C 都会触发停机。

use rawhttp::{server::ConnectionGauge, Config, Request, ResponseWriter, Router, Server};

use log::{error, info, warn};
use std::{io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
    sync::oneshot,
};

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    let config = Config::from_toml("config/development.toml");
    info!("配置文件已载入");
    info!("www root: {}", config.www_root());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .thread_name("rawhttp-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            return;
        }
    };
    info!("工作线程数量：{}", config.worker_threads());

    runtime.block_on(async move {
        let server = match Server::bind(config, demo_routes()).await {
            Ok(server) => server,
            Err(_) => return,
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(console(server.gauge(), server.router(), stop_tx));

        server
            .run(async {
                tokio::select! {
                    _ = stop_rx => info!("收到控制台停机指令"),
                    _ = tokio::signal::ctrl_c() => info!("收到Ctrl-C，准备停机"),
                }
            })
            .await;
    });

    // 控制台占用的标准输入读取线程无法被取消，不等它
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("服务器已停止");
}

/// 示例路由
fn demo_routes() -> Router {
    let router = Router::new();

    router.register("GET", "/messages", |request: &Request, out: &mut ResponseWriter| {
        let body = format!(
            "Last param = {}",
            request.query_param("last").unwrap_or("not provided")
        );
        out.send(200, "OK", Some("text/plain"), body.as_bytes())
    });

    router.register("POST", "/messages", |request: &Request, out: &mut ResponseWriter| {
        let body = format!("Received: {}", request.body_as_string());
        out.send(200, "OK", Some("text/plain"), body.as_bytes())
    });

    router.register("POST", "/submit", |request: &Request, out: &mut ResponseWriter| {
        let name = request.post_param("name").unwrap_or("anonymous");
        let hobbies = request.post_params("hobby");
        let body = match hobbies.is_empty() {
            true => format!("Hello, {}! No hobbies submitted.", name),
            false => format!("Hello, {}! Hobbies: {}", name, hobbies.join(", ")),
        };
        out.send(200, "OK", Some("text/plain"), body.as_bytes())
    });

    router
}

async fn console(gauge: ConnectionGauge, router: Arc<Router>, stop: oneshot::Sender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!("读取控制台输入失败：{}", e);
                return;
            }
        };
        match line.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                let _ = stop.send(());
                return;
            }
            "status" => {
                println!("== rawhttp 状态 ===");
                println!("当前活跃连接数: {}/{}", gauge.active(), gauge.max());
                println!("已注册路由数: {}", router.len());
                println!("==================");
            }
            "help" => print_help(&mut io::stdout()),
            "" => {}
            other => println!("无效的命令：{}", other),
        }
    }
}

fn print_help<W: io::Write>(out: &mut W) {
    let _ = writeln!(out, "== rawhttp Help ==");
    let _ = writeln!(out, "stop   - 发出停机信号");
    let _ = writeln!(out, "status - 查看当前服务器运行状态");
    let _ = writeln!(out, "help   - 显示此帮助信息");
    let _ = writeln!(out, "==================");
}
