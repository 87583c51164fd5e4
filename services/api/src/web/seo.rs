//! services/api/src/web/seo.rs
//!
//! `sitemap.xml` and `robots.txt`, generated from the global groups.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use reading_groups_core::domain::{Group, GroupFilter};
use std::sync::Arc;

use crate::error::port_error_response;
use crate::web::state::AppState;

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Renders the sitemap: the feed page plus one reader page per group.
pub fn render_sitemap(site_url: &str, groups: &[Group]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    xml.push_str(&format!(
        "  <url><loc>{}/feed</loc><changefreq>hourly</changefreq><priority>1.0</priority></url>\n",
        escape_xml(site_url)
    ));
    for group in groups {
        xml.push_str(&format!(
            "  <url><loc>{}/group/{}</loc><lastmod>{}</lastmod><changefreq>daily</changefreq><priority>0.8</priority></url>\n",
            escape_xml(site_url),
            group.id,
            group.created_at.format("%Y-%m-%d"),
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn render_robots(site_url: &str) -> String {
    format!("User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n", site_url)
}

/// GET /sitemap.xml
pub async fn sitemap_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let groups = state
        .db
        .list_groups(&GroupFilter::Global)
        .await
        .map_err(|e| port_error_response("Build sitemap", e))?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        render_sitemap(&state.config.site_url, &groups),
    ))
}

/// GET /robots.txt
pub async fn robots_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_robots(&state.config.site_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robots_points_at_sitemap() {
        let robots = render_robots("https://tanya.example");
        assert!(robots.contains("Sitemap: https://tanya.example/sitemap.xml"));
        assert!(robots.starts_with("User-agent: *"));
    }

    #[test]
    fn sitemap_escapes_site_url() {
        let xml = render_sitemap("https://a.example/?x=1&y=2", &[]);
        assert!(xml.contains("https://a.example/?x=1&amp;y=2/feed"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }
}
