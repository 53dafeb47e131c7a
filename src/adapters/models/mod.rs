//! Model catalog backed by two files next to the binary: `models.txt` with
//! one `<model-id> <context-window>` line per model, and `model_state.json`
//! remembering which one is active across restarts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub id: String,
    pub context_window: u32,
}

#[derive(Serialize, Deserialize)]
struct ModelState {
    current_model: String,
}

pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
    current: Mutex<usize>,
    state_path: Option<PathBuf>,
}

const DEFAULT_CONTEXT_WINDOW: u32 = 8192;

fn parse_catalog(raw: &str) -> Vec<ModelEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next().unwrap_or_default().to_string();
            let context_window = fields
                .next()
                .and_then(|field| field.parse().ok())
                .unwrap_or(DEFAULT_CONTEXT_WINDOW);
            ModelEntry { id, context_window }
        })
        .filter(|entry| !entry.id.is_empty())
        .collect()
}

/// Accepts both the plain `{"current_model": "..."}` layout and a bare
/// string, which older deployments wrote.
fn parse_state(raw: &str) -> Option<String> {
    if let Ok(state) = serde_json::from_str::<ModelState>(raw) {
        return Some(state.current_model);
    }
    if let Ok(serde_json::Value::String(id)) = serde_json::from_str(raw) {
        return Some(id);
    }
    let trimmed = raw.trim();
    (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
}

impl ModelCatalog {
    /// Loads `models.txt` and the persisted selection from `dir`.
    pub fn load(dir: &Path) -> Result<Self, String> {
        let catalog_path = dir.join("models.txt");
        let raw = std::fs::read_to_string(&catalog_path)
            .map_err(|err| format!("cannot read {}: {err}", catalog_path.display()))?;
        let entries = parse_catalog(&raw);
        if entries.is_empty() {
            return Err(format!("{} lists no models", catalog_path.display()));
        }

        let state_path = dir.join("model_state.json");
        let current = std::fs::read_to_string(&state_path)
            .ok()
            .and_then(|raw| parse_state(&raw))
            .and_then(|id| entries.iter().position(|entry| entry.id == id))
            .unwrap_or(0);

        Ok(Self {
            entries,
            current: Mutex::new(current),
            state_path: Some(state_path),
        })
    }

    /// In-memory catalog for tests and overrides; never touches the disk.
    pub fn fixed(ids: &[&str]) -> Self {
        let entries = ids
            .iter()
            .map(|id| ModelEntry {
                id: (*id).to_string(),
                context_window: DEFAULT_CONTEXT_WINDOW,
            })
            .collect();
        Self {
            entries,
            current: Mutex::new(0),
            state_path: None,
        }
    }

    /// Forces the selection to `id` if the catalog lists it. Used for the
    /// environment override at startup; the choice is persisted like a
    /// spoken switch.
    pub fn select(&self, id: &str) -> bool {
        let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        *self.current.lock().expect("catalog lock") = position;
        self.persist(id);
        true
    }

    pub fn current(&self) -> String {
        let index = *self.current.lock().expect("catalog lock");
        self.entries[index].id.clone()
    }

    pub fn current_entry(&self) -> ModelEntry {
        let index = *self.current.lock().expect("catalog lock");
        self.entries[index].clone()
    }

    /// Short speakable name: the id without its provider prefix and without
    /// the `:free` routing suffix.
    pub fn current_display_name(&self) -> String {
        display_name(&self.current())
    }

    /// Rotates to the next model in catalog order, persists the choice, and
    /// returns the new display name.
    pub fn switch_next(&self) -> String {
        let id = {
            let mut index = self.current.lock().expect("catalog lock");
            *index = (*index + 1) % self.entries.len();
            self.entries[*index].id.clone()
        };
        self.persist(&id);
        display_name(&id)
    }

    fn persist(&self, id: &str) {
        let Some(path) = &self.state_path else { return };
        let state = ModelState {
            current_model: id.to_string(),
        };
        match serde_json::to_string(&state) {
            Ok(encoded) => {
                if let Err(err) = std::fs::write(path, encoded) {
                    log::error!("cannot persist model state to {}: {err}", path.display());
                }
            }
            Err(err) => log::error!("cannot encode model state: {err}"),
        }
    }
}

fn display_name(id: &str) -> String {
    let without_provider = id.rsplit('/').next().unwrap_or(id);
    let lowered = without_provider.to_lowercase();
    let stripped = lowered
        .strip_suffix(":free")
        .map(|_| &without_provider[..without_provider.len() - ":free".len()])
        .unwrap_or(without_provider);
    stripped.to_string()
}
