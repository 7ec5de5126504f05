//! # Media Inventory
//!
//! Proiezione del grafo: un elemento per ogni media del progetto.
//!
//! ## Responsabilità:
//! - Stato online/offline (esistenza del file, sostituibile nei test)
//! - Dimensione su disco, o quella dichiarata nel documento se offline
//! - Collegamento al proxy e distinzione media principale / proxy
//! - Tipo di media dai metadati o dall'estensione
//! - Sidecar dichiarati nel documento più quelli trovati su disco
//!
//! L'ordine è quello di dichiarazione nel documento, stabile tra chiamate.

use crate::file_manager::FileManager;
use crate::project::{MediaKind, ProjectGraph};
use crate::ticks::{FrameRate, Ticks};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Source of truth for whether a media path is online
pub trait MediaStatus {
    /// Size in bytes when the file exists.
    fn size(&self, path: &Path) -> Option<u64>;

    /// Companion files discovered next to `path`.
    fn sidecars(&self, path: &Path) -> Vec<PathBuf>;
}

/// The real filesystem
pub struct FsStatus;

impl MediaStatus for FsStatus {
    fn size(&self, path: &Path) -> Option<u64> {
        FileManager::file_size(path)
    }

    fn sidecars(&self, path: &Path) -> Vec<PathBuf> {
        FileManager::get_sidecar_files(path)
    }
}

/// Fixed table of online files; anything missing is offline.
impl MediaStatus for HashMap<PathBuf, u64> {
    fn size(&self, path: &Path) -> Option<u64> {
        self.get(path).copied()
    }

    fn sidecars(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub object_id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub is_online: bool,
    pub media_type: MediaKind,
    pub duration: Option<Ticks>,
    pub frame_rate: Option<FrameRate>,
    pub codec: Option<String>,
    pub proxy_id: Option<String>,
    /// This item is the proxy of another item
    pub is_proxy: bool,
    pub bin_path: String,
    pub sidecar_files: Vec<PathBuf>,
    pub sidecar_total_size: u64,
}

impl InventoryItem {
    pub fn has_proxy(&self) -> bool {
        self.proxy_id.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaInventory {
    items: Vec<InventoryItem>,
    index: HashMap<String, usize>,
}

impl MediaInventory {
    pub fn build(graph: &ProjectGraph) -> Self {
        Self::build_with(graph, &FsStatus)
    }

    pub fn build_with(graph: &ProjectGraph, status: &dyn MediaStatus) -> Self {
        let proxies = graph.proxy_ids();
        let mut items = Vec::new();
        let mut index = HashMap::new();

        for media in graph.media_items() {
            let size = status.size(&media.path);
            let is_online = size.is_some();

            let mut sidecars: BTreeSet<PathBuf> = media
                .sidecars
                .iter()
                .filter(|p| status.size(p).is_some())
                .cloned()
                .collect();
            if is_online {
                sidecars.extend(status.sidecars(&media.path));
            }
            let sidecar_files: Vec<PathBuf> = sidecars.into_iter().collect();
            let sidecar_total_size = sidecar_files
                .iter()
                .filter_map(|p| status.size(p))
                .sum();

            index.insert(media.id.clone(), items.len());
            items.push(InventoryItem {
                object_id: media.id.clone(),
                file_path: media.path.clone(),
                file_name: media.file_name(),
                file_size: size.or(media.declared_size).unwrap_or(0),
                is_online,
                media_type: media.kind(),
                duration: media.duration,
                frame_rate: media.frame_rate,
                codec: media.codec.clone(),
                proxy_id: media.proxy_id.clone(),
                is_proxy: proxies.contains(media.id.as_str()),
                bin_path: graph.media_bin_path(&media.id),
                sidecar_files,
                sidecar_total_size,
            });
        }

        Self { items, index }
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&InventoryItem> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn proxy_of(&self, id: &str) -> Option<&InventoryItem> {
        self.get(id)
            .and_then(|item| item.proxy_id.as_deref())
            .and_then(|proxy| self.get(proxy))
    }

    pub fn offline_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_online).count()
    }
}
