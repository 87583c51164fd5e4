//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the reading groups API.
//!
//! Usage: `openapi [output-path]`, defaulting to `openapi.json`.

use api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let doc = ApiDoc::openapi();
    let operations: usize = doc
        .paths
        .paths
        .values()
        .map(|item| {
            [&item.get, &item.put, &item.post, &item.delete, &item.patch]
                .into_iter()
                .filter(|op| op.is_some())
                .count()
        })
        .sum();

    std::fs::write(&path, doc.to_pretty_json()?)?;
    println!(
        "Wrote {} ({} paths, {} operations)",
        path.display(),
        doc.paths.paths.len(),
        operations
    );
    Ok(())
}
