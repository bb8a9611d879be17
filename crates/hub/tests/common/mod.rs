//! A minimal in-process model hub for exercising the client and executor.

use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

pub const REPO: &str = "acme/tiny";

/// Content served for one repository file.
#[derive(Clone)]
pub enum FileBody {
    /// Served in one piece.
    Bytes(Vec<u8>),
    /// 1 KiB chunks forever, with a delay between chunks.
    Endless,
    /// Always answers 500.
    Broken,
}

/// Start a hub serving `files` for [`REPO`] at revision `main` and return
/// its base URL.
pub async fn spawn_hub(files: Vec<(&'static str, FileBody)>) -> String {
    let siblings: Vec<serde_json::Value> = files
        .iter()
        .map(|(name, body)| match body {
            FileBody::Bytes(bytes) => serde_json::json!({ "rfilename": name, "size": bytes.len() }),
            _ => serde_json::json!({ "rfilename": name }),
        })
        .collect();

    let info = serde_json::json!({
        "id": REPO,
        "modelId": REPO,
        "private": false,
        "downloads": 42,
        "likes": 7,
        "pipeline_tag": "text-generation",
        "siblings": siblings,
    });
    let refs = serde_json::json!({
        "branches": [{ "name": "main" }, { "name": "dev" }],
        "tags": [{ "name": "v1.0" }],
    });

    let mut app = Router::new()
        .route(
            &format!("/api/models/{REPO}"),
            get({
                let info = info.clone();
                move || async move { Json(info) }
            }),
        )
        .route(
            &format!("/api/models/{REPO}/revision/main"),
            get(move || async move { Json(info) }),
        )
        .route(
            &format!("/api/models/{REPO}/refs"),
            get(move || async move { Json(refs) }),
        );

    for (name, body) in files {
        // Listed but never fetched: the executor rejects such names.
        if name.contains("..") {
            continue;
        }
        let path = format!("/{REPO}/resolve/main/{name}");
        app = app.route(
            &path,
            get(move || {
                let body = body.clone();
                async move { serve(body) }
            }),
        );
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn serve(body: FileBody) -> (StatusCode, Body) {
    match body {
        FileBody::Bytes(bytes) => (StatusCode::OK, Body::from(bytes)),
        FileBody::Broken => (StatusCode::INTERNAL_SERVER_ERROR, Body::from("boom")),
        FileBody::Endless => {
            let stream = futures::stream::unfold((), |()| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some((Ok::<_, std::io::Error>(vec![0u8; 1024]), ()))
            });
            (StatusCode::OK, Body::from_stream(stream))
        }
    }
}
