use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_max_connections")]
    max_connections: usize,
    #[serde(default = "default_template_file")]
    template_file: String,
    #[serde(default)]
    allowed_files: Option<Vec<String>>,
    #[serde(default = "default_max_header_size")]
    max_header_size: usize,
    #[serde(default = "default_max_body_size")]
    max_body_size: usize,
    #[serde(default = "default_connection_timeout")]
    connection_timeout: u64,
}

fn default_www_root() -> String {
    "public".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_local() -> bool {
    true
}

fn default_max_connections() -> usize {
    64
}

fn default_template_file() -> String {
    "classic.html".to_string()
}

fn default_max_header_size() -> usize {
    8192 // 8KB
}

fn default_max_body_size() -> usize {
    10485760 // 10MB
}

fn default_connection_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        let mut config = Self {
            www_root: default_www_root(),
            port: default_port(),
            local: default_local(),
            worker_threads: 0,
            max_connections: default_max_connections(),
            template_file: default_template_file(),
            allowed_files: None,
            max_header_size: default_max_header_size(),
            max_body_size: default_max_body_size(),
            connection_timeout: default_connection_timeout(),
        };
        config.normalize();
        config
    }

    /// 从 TOML 文件读取配置。文件缺失或内容非法时记录日志并使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        match fs::read_to_string(filename) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                Self::new()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut config: Config = match toml::from_str(text) {
            Ok(c) => c,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                return Self::new();
            }
        };
        config.normalize();
        config
    }

    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.max_connections == 0 {
            warn!("max_connections被设置为0，服务器将无法处理任何连接，因此该值将被改为64。");
            self.max_connections = default_max_connections();
        }
    }

    pub fn with_www_root(mut self, www_root: &str) -> Self {
        self.www_root = www_root.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self.normalize();
        self
    }

    pub fn with_allowed_files(mut self, allowed_files: Vec<String>) -> Self {
        self.allowed_files = Some(allowed_files);
        self
    }

    pub fn with_max_header_size(mut self, max_header_size: usize) -> Self {
        self.max_header_size = max_header_size;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout.as_secs().max(1);
        self
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn template_file(&self) -> &str {
        &self.template_file
    }

    pub fn allowed_files(&self) -> Option<&[String]> {
        self.allowed_files.as_deref()
    }

    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}
