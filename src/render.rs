use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tracing::info;

use crate::model::{AdjectiveMapping, AnimalRecord};
use crate::Result;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Animal Collateral Adjectives</title>
    <style>
        body { font-family: Arial, sans-serif; background: #f5f5f5; margin: 0; padding: 20px; }
        h1 { text-align: center; color: #333; }
        table { border-collapse: collapse; width: 100%; margin-top: 20px; background: white; }
        th, td { border: 1px solid #ccc; padding: 12px; vertical-align: top; }
        th { background-color: #e0e0e0; }
        td.adjective { width: 30%; font-weight: bold; background-color: #fafafa; }
        td.animals { width: 70%; }
        .animal-entry { margin-bottom: 20px; }
        .animal-entry img { max-width: 200px; max-height: 200px; margin-top: 5px; border: 1px solid #ddd; border-radius: 4px; }
        .missing-image { display: inline-block; margin-top: 5px; color: #999; font-style: italic; }
        a { text-decoration: none; color: #0645ad; }
        a:hover { text-decoration: underline; }
    </style>
</head>
<body>
    <h1>Animal Collateral Adjectives</h1>
    <table>
        <thead>
            <tr><th>Collateral Adjective</th><th>Animals</th></tr>
        </thead>
        <tbody>
"#;

const TAIL: &str = "        </tbody>
    </table>
</body>
</html>
";

/// Renders the summary page. Image paths are written relative to `base_dir` when they live under it.
/// Animals without an image get a placeholder.
pub fn render_html(
    mapping: &AdjectiveMapping,
    records: &HashMap<String, AnimalRecord>,
    base_dir: &Path,
) -> String {
    let mut html = String::from(HEAD);

    for (adjective, animals) in mapping.iter() {
        let _ = writeln!(html, "            <tr>");
        let _ = writeln!(
            html,
            "                <td class=\"adjective\">{}</td>",
            escape(adjective)
        );
        let _ = writeln!(html, "                <td class=\"animals\">");

        for animal in animals {
            let name = escape(&animal.name);
            let href = animal.wiki_url.as_deref().map(escape);
            let _ = writeln!(html, "                    <div class=\"animal-entry\">");
            let _ = match href {
                Some(href) => writeln!(
                    html,
                    "                        <a href=\"{href}\" target=\"_blank\">{name}</a><br>"
                ),
                None => writeln!(html, "                        <span>{name}</span><br>"),
            };

            let image = records
                .get(&animal.name)
                .and_then(AnimalRecord::local_image_path);
            let _ = match image {
                Some(path) => writeln!(
                    html,
                    "                        <img src=\"{}\" alt=\"{name}\">",
                    escape(&image_src(path, base_dir))
                ),
                None => writeln!(
                    html,
                    "                        <span class=\"missing-image\">No image available</span>"
                ),
            };
            let _ = writeln!(html, "                    </div>");
        }

        let _ = writeln!(html, "                </td>");
        let _ = writeln!(html, "            </tr>");
    }

    html.push_str(TAIL);
    html
}

/// Renders the report and writes it to `output`, creating parent directories as needed.
pub async fn write_report(
    mapping: &AdjectiveMapping,
    records: &HashMap<String, AnimalRecord>,
    output: &Path,
) -> Result<PathBuf> {
    let base_dir = output
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(base_dir).await?;

    let html = render_html(mapping, records, base_dir);
    let mut file = File::create(output).await?;
    file.write_all(html.as_bytes()).await?;
    file.flush().await?;

    info!(path = %output.display(), bytes = html.len(), "Wrote HTML report");
    Ok(output.to_path_buf())
}

fn image_src(path: &Path, base_dir: &Path) -> String {
    let path = absolute(path);
    match path.strip_prefix(absolute(base_dir)) {
        // HTML wants forward slashes, also on Windows.
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Joins relative paths onto the working directory and drops `.` components.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
