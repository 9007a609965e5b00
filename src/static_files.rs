// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件回退
//!
//! 没有处理器匹配时，把请求路径映射到静态根目录下的文件：
//! - 含 `..`、盘符前缀或空字节的路径一律视为不存在；
//! - 规范化后的真实路径必须仍在根目录之内（防止符号链接逃逸）；
//! - 保留的模板文件按文本读入，`{time}` 替换为当前时间；
//! - 其他文件按原样流式写出，`Content-Length` 等于文件大小。

use crate::{
    config::Config,
    exception::Exception,
    param::*,
    response::{write_empty, write_response},
    util::format_file_size,
};

use chrono::Local;
use log::{debug, error, warn};
use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};
use tokio::{
    fs,
    io::{self, AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

/// 一个通过了包含性检查的静态资源。
#[derive(Debug, Clone)]
pub struct StaticAsset {
    path: PathBuf,
    content_type: Option<&'static str>,
    size: u64,
    is_template: bool,
}

impl StaticAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_template(&self) -> bool {
        self.is_template
    }
}

/// 把已解码的请求路径解析为静态根目录下的文件。
///
/// 任何越界、不存在或不是普通文件的情况都返回 `Exception::NotFound`。
pub async fn resolve(config: &Config, request_path: &str, id: u128) -> Result<StaticAsset, Exception> {
    if request_path.contains('\0') {
        warn!("[ID{}]路径中包含空字节，拒绝", id);
        return Err(Exception::NotFound);
    }
    let relative = normalize(request_path).ok_or_else(|| {
        warn!("[ID{}]路径{}试图越出静态根目录", id, request_path);
        Exception::NotFound
    })?;
    if relative.as_os_str().is_empty() {
        return Err(Exception::NotFound);
    }
    if let Some(allowed) = config.allowed_files() {
        if !allowed.iter().any(|p| normalize(p).as_ref() == Some(&relative)) {
            debug!("[ID{}]{}不在允许列表中", id, request_path);
            return Err(Exception::NotFound);
        }
    }

    let root = fs::canonicalize(config.www_root()).await.map_err(|e| {
        error!("[ID{}]静态根目录{}不可用: {}", id, config.www_root(), e);
        Exception::NotFound
    })?;
    let full_path = fs::canonicalize(root.join(&relative))
        .await
        .map_err(|_| Exception::NotFound)?;
    if !full_path.starts_with(&root) {
        warn!("[ID{}]{}解析到根目录之外：{}", id, request_path, full_path.display());
        return Err(Exception::NotFound);
    }

    let metadata = fs::metadata(&full_path)
        .await
        .map_err(|_| Exception::NotFound)?;
    if !metadata.is_file() {
        debug!("[ID{}]{}不是普通文件", id, full_path.display());
        return Err(Exception::NotFound);
    }

    Ok(StaticAsset {
        content_type: content_type_of(&full_path),
        size: metadata.len(),
        is_template: normalize(config.template_file()).as_ref() == Some(&relative),
        path: full_path,
    })
}

/// 把资源写到流上，返回实际发出的状态码。
///
/// 读取文件失败时（此时尚未写出任何字节）回复 500；写套接字失败返回 `Exception::IOFailure`。
pub async fn serve<W>(sink: &mut W, asset: &StaticAsset, id: u128) -> Result<u16, Exception>
where
    W: AsyncWrite + Unpin,
{
    let result = if asset.is_template {
        serve_template(sink, asset, id).await
    } else {
        serve_file(sink, asset, id).await
    };
    result.map_err(|e| {
        error!("[ID{}]发送静态资源失败: {}", id, e);
        Exception::IOFailure
    })
}

async fn serve_template<W>(sink: &mut W, asset: &StaticAsset, id: u128) -> io::Result<u16>
where
    W: AsyncWrite + Unpin,
{
    let template = match fs::read_to_string(&asset.path).await {
        Ok(text) => text,
        Err(e) => {
            error!("[ID{}]无法读取模板{}: {}", id, asset.path.display(), e);
            write_empty(sink, 500).await?;
            return Ok(500);
        }
    };
    let content = substitute_time(&template, &render_time());
    debug!("[ID{}]模板替换完成，{}字节", id, content.len());

    write_response(sink, 200, "OK", asset.content_type, content.len() as u64).await?;
    sink.write_all(content.as_bytes()).await?;
    sink.flush().await?;
    Ok(200)
}

async fn serve_file<W>(sink: &mut W, asset: &StaticAsset, id: u128) -> io::Result<u16>
where
    W: AsyncWrite + Unpin,
{
    let file = match fs::File::open(&asset.path).await {
        Ok(f) => f,
        Err(e) => {
            error!("[ID{}]无法打开文件{}: {}", id, asset.path.display(), e);
            write_empty(sink, 500).await?;
            return Ok(500);
        }
    };
    debug!(
        "[ID{}]发送文件{}（{}）",
        id,
        asset.path.display(),
        format_file_size(asset.size)
    );

    write_response(sink, 200, "OK", asset.content_type, asset.size).await?;
    // 文件在发送期间变长时只发出声明的字节数
    let sent = io::copy(&mut file.take(asset.size), sink).await?;
    sink.flush().await?;
    if sent != asset.size {
        error!(
            "[ID{}]文件在发送期间被截断：声明{}字节，实际发送{}字节",
            id, asset.size, sent
        );
    }
    Ok(200)
}

// 去掉开头的 '/'，只接受普通路径段
fn normalize(request_path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

fn content_type_of(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(OsStr::to_str)
        .and_then(|ext| MIME_TYPES.get(ext.to_ascii_lowercase().as_str()).copied())
}

fn render_time() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn substitute_time(template: &str, now: &str) -> String {
    template.replace(TIME_PLACEHOLDER, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("public");
        std_fs::create_dir(&root).unwrap();
        std_fs::write(root.join("index.html"), "<h1>index</h1>").unwrap();
        std_fs::write(root.join("classic.html"), "<p>now: {time}, again {time}</p>").unwrap();
        std_fs::write(root.join("data.bin"), [0u8, 1, 2, 255]).unwrap();
        std_fs::write(root.join("README"), "no extension").unwrap();
        std_fs::create_dir(root.join("css")).unwrap();
        std_fs::write(root.join("css").join("styles.CSS"), "body{}").unwrap();
        std_fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

        let config = Config::new().with_www_root(root.to_str().unwrap());
        (dir, config)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/index.html"), Some(PathBuf::from("index.html")));
        assert_eq!(normalize("/a/./b"), Some(PathBuf::from("a/b")));
        assert_eq!(normalize("//etc/passwd"), Some(PathBuf::from("etc/passwd")));
        assert_eq!(normalize("/"), Some(PathBuf::new()));
        assert_eq!(normalize("/../secret.txt"), None);
        assert_eq!(normalize("/a/../../b"), None);
        assert_eq!(normalize("/a/.."), None);
    }

    #[test]
    fn test_substitute_time() {
        assert_eq!(
            substitute_time("<p>{time}|{time}</p>", "2024-01-01T00:00:00.000000"),
            "<p>2024-01-01T00:00:00.000000|2024-01-01T00:00:00.000000</p>"
        );
        assert_eq!(substitute_time("no placeholder", "x"), "no placeholder");
    }

    #[test]
    fn test_content_type_of() {
        assert_eq!(content_type_of(Path::new("a/index.html")), Some("text/html"));
        assert_eq!(content_type_of(Path::new("styles.CSS")), Some("text/css"));
        assert_eq!(content_type_of(Path::new("README")), None);
        assert_eq!(content_type_of(Path::new("x.unknownext")), None);
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let (_dir, config) = site();
        let asset = resolve(&config, "/index.html", 0).await.unwrap();
        assert_eq!(asset.size(), 14);
        assert_eq!(asset.content_type(), Some("text/html"));
        assert!(!asset.is_template());
    }

    #[tokio::test]
    async fn test_resolve_nested_and_template() {
        let (_dir, config) = site();
        let asset = resolve(&config, "/css/styles.CSS", 0).await.unwrap();
        assert_eq!(asset.content_type(), Some("text/css"));

        let template = resolve(&config, "/classic.html", 0).await.unwrap();
        assert!(template.is_template());
    }

    #[tokio::test]
    async fn test_template_file_spellings() {
        let (_dir, config) = site();
        for spelling in ["classic.html", "/classic.html", "./classic.html"] {
            let config = Config::parse(&format!("template_file = \"{}\"", spelling))
                .with_www_root(config.www_root());
            let asset = resolve(&config, "/classic.html", 0).await.unwrap();
            assert!(asset.is_template(), "template_file = {:?}", spelling);
            assert!(!resolve(&config, "/index.html", 0).await.unwrap().is_template());
        }
    }

    #[tokio::test]
    async fn test_resolve_missing_and_directories() {
        let (_dir, config) = site();
        for path in ["/missing.html", "/", "/css", "/css/"] {
            assert_eq!(
                resolve(&config, path, 0).await.unwrap_err(),
                Exception::NotFound,
                "path {}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (_dir, config) = site();
        for path in [
            "/../secret.txt",
            "/css/../../secret.txt",
            "/./../secret.txt",
            "/index.html\0.png",
        ] {
            assert_eq!(
                resolve(&config, path, 0).await.unwrap_err(),
                Exception::NotFound,
                "path {:?}",
                path
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let (dir, config) = site();
        std::os::unix::fs::symlink(
            dir.path().join("secret.txt"),
            Path::new(config.www_root()).join("link.txt"),
        )
        .unwrap();
        assert_eq!(
            resolve(&config, "/link.txt", 0).await.unwrap_err(),
            Exception::NotFound
        );
    }

    #[tokio::test]
    async fn test_allowed_files_whitelist() {
        let (_dir, config) = site();
        let config = config.with_allowed_files(vec![
            "/index.html".to_string(),
            "css/styles.CSS".to_string(),
        ]);
        assert!(resolve(&config, "/index.html", 0).await.is_ok());
        assert!(resolve(&config, "/css/styles.CSS", 0).await.is_ok());
        assert_eq!(
            resolve(&config, "/data.bin", 0).await.unwrap_err(),
            Exception::NotFound
        );
    }

    #[tokio::test]
    async fn test_serve_file_verbatim() {
        let (_dir, config) = site();
        let asset = resolve(&config, "/data.bin", 0).await.unwrap();
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(serve(&mut sink, &asset, 0).await.unwrap(), 200);
        let head = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\n";
        assert_eq!(&sink[..head.len()], head);
        assert_eq!(&sink[head.len()..], &[0u8, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_serve_template_substitutes_time() {
        let (_dir, config) = site();
        let asset = resolve(&config, "/classic.html", 0).await.unwrap();
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(serve(&mut sink, &asset, 0).await.unwrap(), 200);
        let text = String::from_utf8(sink).unwrap();
        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        assert!(!body.contains("{time}"));
        assert!(body.starts_with("<p>now: "));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        assert!(head.contains("Content-Type: text/html"));
    }

    #[tokio::test]
    async fn test_serve_non_utf8_template_is_500() {
        let (_dir, config) = site();
        std_fs::write(Path::new(config.www_root()).join("classic.html"), [0xffu8, 0xfe]).unwrap();
        let asset = resolve(&config, "/classic.html", 0).await.unwrap();
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(serve(&mut sink, &asset, 0).await.unwrap(), 500);
        assert!(sink.starts_with(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n"));
    }
}
