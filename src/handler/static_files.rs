//! Static file serving module
//!
//! Serves the client assets (`data-frame.js`, stylesheet) from the configured
//! static directory.

use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::Path;
use tokio::fs;

/// URL prefix under which the static directory is mounted
pub const STATIC_URL_PREFIX: &str = "/static/";

/// Serve `relative_path` from `static_dir`
pub async fn serve(
    static_dir: &str,
    relative_path: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    match load_static_file(static_dir, relative_path).await {
        Some((content, content_type)) => {
            let etag = cache::generate_etag(&content);
            if cache::check_etag_match(if_none_match, &etag) {
                return http::build_304_response(&etag);
            }
            http::response::build_cached_response(Bytes::from(content), content_type, &etag, is_head)
        }
        None => http::build_404_response(),
    }
}

/// Load a file below `static_dir`, refusing anything that resolves outside it
pub async fn load_static_file(
    static_dir: &str,
    relative_path: &str,
) -> Option<(Vec<u8>, &'static str)> {
    let relative_path = relative_path.trim_start_matches('/');
    if relative_path.is_empty() {
        return None;
    }

    let static_dir_canonical = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log at warning level
    let file_path = fs::canonicalize(Path::new(static_dir).join(relative_path))
        .await
        .ok()?;
    if !file_path.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative_path} -> {}",
            file_path.display()
        ));
        return None;
    }

    let metadata = fs::metadata(&file_path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_path.display()
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::path::PathBuf;

    /// Creates `<tmp>/<name>/public/app.js` and `<tmp>/<name>/secret.txt`
    fn fixture(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("public").join("nested")).unwrap();
        std::fs::write(root.join("public").join("app.js"), "console.log(1);").unwrap();
        std::fs::write(root.join("secret.txt"), "secret").unwrap();
        root
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let root = fixture("frame-site-static-load");
        let public = root.join("public");
        let (content, content_type) = load_static_file(public.to_str().unwrap(), "app.js")
            .await
            .unwrap();
        assert_eq!(content, b"console.log(1);");
        assert_eq!(content_type, "text/javascript; charset=utf-8");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_traversal_and_directories_are_refused() {
        let root = fixture("frame-site-static-traversal");
        let public = root.join("public");
        let dir = public.to_str().unwrap();
        assert!(load_static_file(dir, "../secret.txt").await.is_none());
        assert!(load_static_file(dir, "nested").await.is_none());
        assert!(load_static_file(dir, "").await.is_none());
        assert!(load_static_file(dir, "missing.css").await.is_none());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_serve_honours_if_none_match() {
        let root = fixture("frame-site-static-etag");
        let public = root.join("public");
        let dir = public.to_str().unwrap();

        let first = serve(dir, "app.js", None, false).await;
        assert_eq!(first.status(), 200);
        let etag = first.headers()["etag"].to_str().unwrap().to_string();
        let body = first.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"console.log(1);");

        let cached = serve(dir, "app.js", Some(etag.as_str()), false).await;
        assert_eq!(cached.status(), 304);
        let _ = std::fs::remove_dir_all(&root);
    }
}
