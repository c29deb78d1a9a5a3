//! Placeholder application served when no static directory is configured.

use axum::{extract::OriginalUri, response::Html};

/// Minimal page naming the requested path; only reachable past the guard
/// (or on an exempt path).
pub async fn landing(OriginalUri(uri): OriginalUri) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><title>Portico</title></head>\
         <body><h1>Portico</h1><p>{}</p></body></html>\n",
        escape(uri.path())
    ))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
