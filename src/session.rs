use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::Naming;

/// A notebook session as reported by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub kernel_id: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    kernel: KernelRef,
    notebook: NotebookRef,
}

#[derive(Debug, Deserialize)]
struct KernelRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NotebookRef {
    path: String,
    #[serde(default)]
    name: Option<String>,
}

/// Turns a `/api/sessions` response into session records.
///
/// Anything other than a 200 with a JSON array is treated as "no sessions".
/// Entries without a running kernel are skipped.
pub fn parse_sessions(status: u16, body: &str, naming: &Naming) -> Vec<SessionRecord> {
    if status != 200 {
        tracing::warn!(status, "session listing returned non-200, treating as empty");
        return Vec::new();
    }
    let entries = match serde_json::from_str::<Vec<Value>>(body) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(%err, "session listing is not a JSON array, treating as empty");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<SessionPayload>(entry) {
            Ok(payload) => Some(SessionRecord {
                display_name: display_name(&payload.notebook, naming),
                kernel_id: payload.kernel.id,
            }),
            Err(err) => {
                tracing::debug!(%err, "skipping session entry");
                None
            }
        })
        .collect()
}

fn display_name(notebook: &NotebookRef, naming: &Naming) -> String {
    let path = notebook_path(&notebook.path, notebook.name.as_deref());
    if let Some(base) = &naming.link_base {
        return notebook_link(base, &path).unwrap_or(path);
    }
    if naming.keep_extension {
        path
    } else {
        strip_extension(&path).to_string()
    }
}

/// Older servers report the directory in `path` and the file in `name`;
/// newer ones put the whole relative path in `path`.
fn notebook_path(path: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() && !path.ends_with(name) => {
            let dir = path.trim_end_matches('/');
            if dir.is_empty() {
                name.to_string()
            } else {
                format!("{dir}/{name}")
            }
        }
        _ => path.to_string(),
    }
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

fn notebook_link(base: &Url, path: &str) -> Option<String> {
    let mut link = base.clone();
    link.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("notebooks")
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Some(link.into())
}
