use axum::response::Html;

const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Render the index page, injecting the output folder shown to the user
pub fn render_index(output_dir: &str) -> Html<String> {
    let html = INDEX_HTML
        .replace("{{ title }}", "PDF Merge")
        .replace("{{ output_dir }}", &escape_html(output_dir));
    Html(html)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
