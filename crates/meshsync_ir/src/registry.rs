//! Identity registry
//!
//! Maps each entity path to a session id. Ids come from a counter shared by
//! every clone of a registry, so a pending copy that is later discarded can
//! never cause an id to be handed out twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use meshsync_scene::transform::{leaf_name, parent_path};
use meshsync_scene::Identifier;

#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    by_path: HashMap<String, i32>,
    by_id: HashMap<i32, String>,
    next_id: Arc<AtomicI32>,
    /// (owner path, referenced path) awaiting the end of the batch
    deferred: Vec<(String, String)>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            next_id: Arc::new(AtomicI32::new(1)),
            deferred: Vec::new(),
        }
    }

    /// Id for `path`, allocating one on first sight.
    ///
    /// Returns the id and whether it was newly allocated.
    pub fn resolve_or_insert(&mut self, path: &str) -> (i32, bool) {
        if let Some(&id) = self.by_path.get(path) {
            return (id, false);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.by_path.insert(path.to_string(), id);
        self.by_id.insert(id, path.to_string());
        log::trace!("Registered {} as {}", path, id);
        (id, true)
    }

    pub fn lookup_path(&self, path: &str) -> Option<i32> {
        self.by_path.get(path).copied()
    }

    pub fn lookup_id(&self, id: i32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn remove_by_path(&mut self, path: &str) -> Option<i32> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id);
        Some(id)
    }

    pub fn remove_by_id(&mut self, id: i32) -> Option<String> {
        let path = self.by_id.remove(&id)?;
        self.by_path.remove(&path);
        Some(path)
    }

    /// Path a Delete identifier refers to.
    ///
    /// Tries the id, then the name as a full path, then the name as a leaf
    /// name matching exactly one registered path.
    pub fn find_for_delete(&self, ident: &Identifier) -> Option<String> {
        if ident.is_valid() {
            if let Some(path) = self.by_id.get(&ident.id) {
                return Some(path.clone());
            }
        }
        if self.by_path.contains_key(&ident.name) {
            return Some(ident.name.clone());
        }

        let mut leaf_matches = self.by_path.keys().filter(|p| leaf_name(p) == ident.name);
        match (leaf_matches.next(), leaf_matches.next()) {
            (Some(path), None) => Some(path.clone()),
            (Some(_), Some(_)) => {
                log::warn!("Delete of '{}' is ambiguous, ignored", ident.name);
                None
            }
            _ => None,
        }
    }

    /// Record a reference to check once the batch is complete
    pub fn defer_reference(&mut self, owner: &str, target: &str) {
        self.deferred.push((owner.to_string(), target.to_string()));
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Resolve deferred references against the registry.
    ///
    /// Returns each owner with its target, or `None` when the target never
    /// appeared.
    pub fn settle(&mut self) -> Vec<(String, Option<String>)> {
        std::mem::take(&mut self.deferred)
            .into_iter()
            .map(|(owner, target)| {
                if self.by_path.contains_key(&target) {
                    (owner, Some(target))
                } else {
                    log::warn!("{}: reference to unknown path {}, treated as plain", owner, target);
                    (owner, None)
                }
            })
            .collect()
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.by_path.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Registered paths whose parent path is not registered, sorted
    pub fn root_paths(&self) -> Vec<&str> {
        self.paths()
            .into_iter()
            .filter(|p| parent_path(p).map_or(true, |parent| !self.by_path.contains_key(parent)))
            .collect()
    }
}
