// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表
//!
//! 方法 → 精确路径 → 处理器 的两级映射。
//!
//! ```text
//! Request → Router::resolve → Some(Handler) → ResponseWriter
//!                           → None          → 静态文件回退
//! ```
//!
//! 没有通配符、前缀匹配或路径模板；方法与路径都区分大小写。
//! 方法未注册与路径未注册不做区分，都返回 `None`。
//! 路由表由 `RwLock` 保护，服务器运行期间仍可安全地注册新路由。

use crate::{request::Request, response::ResponseWriter};

use log::{debug, warn};
use std::{
    collections::HashMap,
    io,
    sync::{Arc, RwLock},
};

/// 处理器：给定请求和响应缓冲区，写出恰好一个完整的响应。
///
/// 返回 `Err` 或发生 panic 都被视为处理器故障，连接会被直接关闭。
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request, out: &mut ResponseWriter) -> io::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut ResponseWriter) -> io::Result<()> + Send + Sync,
{
    fn handle(&self, request: &Request, out: &mut ResponseWriter) -> io::Result<()> {
        self(request, out)
    }
}

type RouteTable = HashMap<String, HashMap<String, Arc<dyn Handler>>>;

#[derive(Default)]
pub struct Router {
    routes: RwLock<RouteTable>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册或替换 (method, path) 对应的处理器。
    pub fn register<H>(&self, method: &str, path: &str, handler: H)
    where
        H: Handler + 'static,
    {
        let mut routes = match self.routes.write() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("路由表写锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        let replaced = routes
            .entry(method.to_string())
            .or_default()
            .insert(path.to_string(), Arc::new(handler))
            .is_some();
        if replaced {
            debug!("路由 {} {} 已被覆盖", method, path);
        } else {
            debug!("注册路由 {} {}", method, path);
        }
    }

    /// 精确查找处理器。
    pub fn resolve(&self, method: &str, path: &str) -> Option<Arc<dyn Handler>> {
        let routes = match self.routes.read() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("路由表读锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        routes.get(method)?.get(path).cloned()
    }

    /// 已注册的路由总数
    pub fn len(&self) -> usize {
        match self.routes.read() {
            Ok(routes) => routes.values().map(HashMap::len).sum(),
            Err(poisoned) => poisoned.into_inner().values().map(HashMap::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
