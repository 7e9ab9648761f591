use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use std::path::{Component, Path};

/// Serve a file below `static_dir`; anything escaping the directory is a 404
pub async fn serve_static(static_dir: &Path, relative: &str) -> Response {
    let relative = Path::new(relative);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !contained || relative.as_os_str().is_empty() {
        return not_found();
    }

    let file_path = static_dir.join(relative);
    match tokio::fs::read(&file_path).await {
        Ok(content) => {
            let mime_type = from_path(&file_path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime_type.as_ref().to_string())],
                Body::from(content),
            )
                .into_response()
        }
        Err(_) => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_file_with_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("site.css"), "body{}").unwrap();

        let response = serve_static(dir.path(), "site.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
        let public = dir.path().join("public");

        for path in ["../secret.txt", "/etc/passwd", "", "absent.js"] {
            let response = serve_static(&public, path).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path:?}");
        }
    }
}
