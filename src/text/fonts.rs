//! Shared font cache for text strips.
//!
//! Text strips can render from several worker threads at once, and the
//! underlying rasterizer state is not independently thread-safe, so every
//! font lookup and every glyph rasterization happens under one cache-wide
//! lock. The lock is recursive on purpose: resolving a fallback font while
//! rendering re-enters the cache from within the locked section.

use crate::params::FontSpec;
use ab_glyph::FontArc;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifier of a loaded font within the loader service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontId(pub u32);

impl FontId {
    /// Identifier of the loader's built-in fallback font.
    pub const BUILTIN: FontId = FontId(0);
}

/// Font loading service the cache wraps.
///
/// Each successful `load_*` call hands out a fresh reference; `add_ref` and
/// `unload` adjust the count, and `unload` reports when the last reference is
/// gone so the cache can drop its map entries.
pub trait FontLoader: Send + Sync {
    fn load_path(&self, path: &Path) -> Option<FontId>;
    fn load_memory(&self, name: &str, data: &[u8]) -> Option<FontId>;
    fn is_loaded(&self, id: FontId) -> bool;
    fn add_ref(&self, id: FontId);
    /// Drop one reference; `true` when the font is now fully unloaded.
    fn unload(&self, id: FontId) -> bool;
    /// Rasterization handle for a loaded font.
    fn font(&self, id: FontId) -> Option<FontArc>;
}

struct LoaderEntry {
    font: FontArc,
    refs: usize,
}

#[derive(Default)]
struct LoaderState {
    next_id: u32,
    entries: HashMap<FontId, LoaderEntry>,
}

/// Production loader backed by `ab_glyph`.
pub struct AbGlyphLoader {
    state: Mutex<LoaderState>,
    fallback: Option<FontArc>,
}

impl AbGlyphLoader {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoaderState {
                next_id: 1,
                entries: HashMap::new(),
            }),
            fallback: None,
        }
    }

    /// Install the built-in fallback font from raw font bytes.
    pub fn with_fallback(mut self, data: Vec<u8>) -> Self {
        match FontArc::try_from_vec(data) {
            Ok(font) => self.fallback = Some(font),
            Err(err) => tracing::warn!("fallback font failed to parse: {err}"),
        }
        self
    }

    fn insert(&self, font: FontArc) -> FontId {
        let mut state = self.state.lock();
        let id = FontId(state.next_id);
        state.next_id += 1;
        state.entries.insert(id, LoaderEntry { font, refs: 1 });
        id
    }
}

impl Default for AbGlyphLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FontLoader for AbGlyphLoader {
    fn load_path(&self, path: &Path) -> Option<FontId> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!("failed to read font '{}': {err}", path.display());
                return None;
            }
        };
        match FontArc::try_from_vec(data) {
            Ok(font) => Some(self.insert(font)),
            Err(err) => {
                tracing::warn!("failed to parse font '{}': {err}", path.display());
                None
            }
        }
    }

    fn load_memory(&self, name: &str, data: &[u8]) -> Option<FontId> {
        match FontArc::try_from_vec(data.to_vec()) {
            Ok(font) => Some(self.insert(font)),
            Err(err) => {
                tracing::warn!("failed to parse in-memory font '{name}': {err}");
                None
            }
        }
    }

    fn is_loaded(&self, id: FontId) -> bool {
        if id == FontId::BUILTIN {
            return self.fallback.is_some();
        }
        self.state.lock().entries.contains_key(&id)
    }

    fn add_ref(&self, id: FontId) {
        if id == FontId::BUILTIN {
            return;
        }
        if let Some(entry) = self.state.lock().entries.get_mut(&id) {
            entry.refs += 1;
        }
    }

    fn unload(&self, id: FontId) -> bool {
        if id == FontId::BUILTIN {
            return false;
        }
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(&id) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            state.entries.remove(&id);
            return true;
        }
        false
    }

    fn font(&self, id: FontId) -> Option<FontArc> {
        if id == FontId::BUILTIN {
            return self.fallback.clone();
        }
        self.state.lock().entries.get(&id).map(|e| e.font.clone())
    }
}

#[derive(Default)]
struct FontMaps {
    path_to_id: HashMap<PathBuf, FontId>,
    name_to_id: HashMap<String, FontId>,
}

/// Thread-safe, reference-counted font cache shared across render threads.
///
/// Two independent maps key loaded fonts by file path and by content-derived
/// name. Construct one per process (or per engine instance), share it via
/// `Arc`, and tear it down with [`FontCache::clear`].
pub struct FontCache {
    loader: Box<dyn FontLoader>,
    maps: ReentrantMutex<RefCell<FontMaps>>,
}

impl FontCache {
    pub fn new(loader: Box<dyn FontLoader>) -> Self {
        Self {
            loader,
            maps: ReentrantMutex::new(RefCell::new(FontMaps::default())),
        }
    }

    pub fn with_default_loader() -> Self {
        Self::new(Box::new(AbGlyphLoader::new()))
    }

    /// Load a font file, or add a reference to the already loaded one.
    ///
    /// If the mapped font was unloaded behind the cache's back it is silently
    /// reloaded and the map entry updated.
    pub fn load_file(&self, path: &Path) -> Option<FontId> {
        let _guard = self.maps.lock();
        let existing = self.with_maps(|maps| maps.path_to_id.get(path).copied());
        match existing {
            None => {
                let id = self.loader.load_path(path)?;
                self.with_maps(|maps| maps.path_to_id.insert(path.to_path_buf(), id));
                Some(id)
            }
            Some(id) => {
                if self.loader.is_loaded(id) {
                    self.loader.add_ref(id);
                    Some(id)
                } else {
                    let id = self.loader.load_path(path)?;
                    self.with_maps(|maps| maps.path_to_id.insert(path.to_path_buf(), id));
                    Some(id)
                }
            }
        }
    }

    /// Load an in-memory font block keyed by a content-derived name.
    pub fn load_memory(&self, name: &str, data: &[u8]) -> Option<FontId> {
        let _guard = self.maps.lock();
        let existing = self.with_maps(|maps| maps.name_to_id.get(name).copied());
        match existing {
            None => {
                let id = self.loader.load_memory(name, data)?;
                self.with_maps(|maps| maps.name_to_id.insert(name.to_owned(), id));
                Some(id)
            }
            Some(id) => {
                if self.loader.is_loaded(id) {
                    self.loader.add_ref(id);
                    Some(id)
                } else {
                    let id = self.loader.load_memory(name, data)?;
                    self.with_maps(|maps| maps.name_to_id.insert(name.to_owned(), id));
                    Some(id)
                }
            }
        }
    }

    /// Drop one reference; once the loader reports the font fully unloaded,
    /// every map entry pointing at it is removed.
    pub fn unload(&self, id: FontId) {
        let _guard = self.maps.lock();
        let unloaded = self.loader.unload(id);
        if unloaded {
            self.with_maps(|maps| {
                maps.path_to_id.retain(|_, v| *v != id);
                maps.name_to_id.retain(|_, v| *v != id);
            });
        }
    }

    /// Unload everything and clear both maps.
    pub fn clear(&self) {
        let _guard = self.maps.lock();
        self.with_maps(|maps| {
            for (_, id) in maps.path_to_id.drain() {
                self.loader.unload(id);
            }
            for (_, id) in maps.name_to_id.drain() {
                self.loader.unload(id);
            }
        });
    }

    pub fn is_loaded(&self, id: FontId) -> bool {
        let _guard = self.maps.lock();
        self.loader.is_loaded(id)
    }

    /// Rasterization handle for a font, or the built-in fallback for
    /// [`FontId::BUILTIN`].
    pub fn font(&self, id: FontId) -> Option<FontArc> {
        let _guard = self.maps.lock();
        self.loader.font(id)
    }

    fn add_ref(&self, id: FontId) {
        let _guard = self.maps.lock();
        self.loader.add_ref(id);
    }

    /// Hold the cache lock for the duration of `f`.
    ///
    /// Glyph rasterization must run under this lock; nested font loads from
    /// within `f` are legal because the lock is recursive.
    pub fn with_lock<R>(&self, f: impl FnOnce(&FontCache) -> R) -> R {
        let _guard = self.maps.lock();
        f(self)
    }

    /// Load per a strip's font spec and wrap the reference in an RAII handle.
    pub fn load_handle(self: &Arc<Self>, spec: &FontSpec) -> Option<FontHandle> {
        let id = match spec {
            FontSpec::Builtin => Some(FontId::BUILTIN),
            FontSpec::Path(path) => self.load_file(path),
            FontSpec::Memory { name, data } => self.load_memory(name, data),
        }?;
        Some(FontHandle {
            cache: Arc::clone(self),
            id,
        })
    }

    fn with_maps<R>(&self, f: impl FnOnce(&mut FontMaps) -> R) -> R {
        let guard = self.maps.lock();
        let r = f(&mut guard.borrow_mut());
        r
    }
}

/// Owning reference to a cached font.
///
/// Cloning adds a cache reference, dropping releases it, so font lifetime
/// follows the text parameters that use it without manual count bookkeeping.
pub struct FontHandle {
    cache: Arc<FontCache>,
    id: FontId,
}

impl FontHandle {
    pub fn id(&self) -> FontId {
        self.id
    }
}

impl Clone for FontHandle {
    fn clone(&self) -> Self {
        self.cache.add_ref(self.id);
        Self {
            cache: Arc::clone(&self.cache),
            id: self.id,
        }
    }
}

impl Drop for FontHandle {
    fn drop(&mut self) {
        self.cache.unload(self.id);
    }
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FontHandle").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Loader double tracking reference counts without touching real fonts.
    struct CountingLoader {
        next: AtomicU32,
        refs: Mutex<HashMap<FontId, usize>>,
    }

    impl CountingLoader {
        fn new() -> Self {
            Self {
                next: AtomicU32::new(1),
                refs: Mutex::new(HashMap::new()),
            }
        }

        fn ref_count(&self, id: FontId) -> usize {
            self.refs.lock().get(&id).copied().unwrap_or(0)
        }
    }

    impl FontLoader for CountingLoader {
        fn load_path(&self, _path: &Path) -> Option<FontId> {
            let id = FontId(self.next.fetch_add(1, Ordering::Relaxed));
            self.refs.lock().insert(id, 1);
            Some(id)
        }

        fn load_memory(&self, _name: &str, _data: &[u8]) -> Option<FontId> {
            self.load_path(Path::new(""))
        }

        fn is_loaded(&self, id: FontId) -> bool {
            self.refs.lock().contains_key(&id)
        }

        fn add_ref(&self, id: FontId) {
            if let Some(count) = self.refs.lock().get_mut(&id) {
                *count += 1;
            }
        }

        fn unload(&self, id: FontId) -> bool {
            let mut refs = self.refs.lock();
            let Some(count) = refs.get_mut(&id) else {
                return false;
            };
            *count -= 1;
            if *count == 0 {
                refs.remove(&id);
                return true;
            }
            false
        }

        fn font(&self, _id: FontId) -> Option<FontArc> {
            None
        }
    }

    fn cache_with_counting() -> (Arc<FontCache>, &'static CountingLoader) {
        let loader: &'static CountingLoader = Box::leak(Box::new(CountingLoader::new()));
        struct Borrowed(&'static CountingLoader);
        impl FontLoader for Borrowed {
            fn load_path(&self, path: &Path) -> Option<FontId> {
                self.0.load_path(path)
            }
            fn load_memory(&self, name: &str, data: &[u8]) -> Option<FontId> {
                self.0.load_memory(name, data)
            }
            fn is_loaded(&self, id: FontId) -> bool {
                self.0.is_loaded(id)
            }
            fn add_ref(&self, id: FontId) {
                self.0.add_ref(id)
            }
            fn unload(&self, id: FontId) -> bool {
                self.0.unload(id)
            }
            fn font(&self, id: FontId) -> Option<FontArc> {
                self.0.font(id)
            }
        }
        (Arc::new(FontCache::new(Box::new(Borrowed(loader)))), loader)
    }

    #[test]
    fn same_path_loads_once_and_adds_references() {
        let (cache, loader) = cache_with_counting();
        let a = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        let b = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        assert_eq!(a, b);
        assert_eq!(loader.ref_count(a), 2);
    }

    #[test]
    fn different_paths_get_different_ids() {
        let (cache, _) = cache_with_counting();
        let a = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        let b = cache.load_file(Path::new("/fonts/b.ttf")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unload_removes_entry_exactly_at_zero_references() {
        let (cache, loader) = cache_with_counting();
        let id = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        cache.load_file(Path::new("/fonts/a.ttf")).unwrap();

        cache.unload(id);
        assert!(cache.is_loaded(id));
        assert_eq!(loader.ref_count(id), 1);

        cache.unload(id);
        assert!(!cache.is_loaded(id));

        // The map entry is gone: the next load produces a fresh id.
        let fresh = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        assert_ne!(fresh, id);
    }

    #[test]
    fn unload_behind_the_cache_back_triggers_reload() {
        let (cache, loader) = cache_with_counting();
        let id = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        // Someone unloads directly through the loader.
        loader.unload(id);

        let reloaded = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        assert_ne!(reloaded, id);
        assert!(cache.is_loaded(reloaded));
    }

    #[test]
    fn memory_and_path_maps_are_independent() {
        let (cache, _) = cache_with_counting();
        let a = cache.load_file(Path::new("a")).unwrap();
        let b = cache.load_memory("a", &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn handle_clone_and_drop_balance_references() {
        let (cache, loader) = cache_with_counting();
        let handle = cache
            .load_handle(&FontSpec::Path(PathBuf::from("/fonts/a.ttf")))
            .unwrap();
        let id = handle.id();
        assert_eq!(loader.ref_count(id), 1);

        let copy = handle.clone();
        assert_eq!(loader.ref_count(id), 2);
        drop(copy);
        assert_eq!(loader.ref_count(id), 1);
        drop(handle);
        assert_eq!(loader.ref_count(id), 0);
        assert!(!cache.is_loaded(id));
    }

    #[test]
    fn nested_load_from_locked_section_does_not_deadlock() {
        let (cache, _) = cache_with_counting();
        let id = cache.with_lock(|cache| cache.load_file(Path::new("/fonts/a.ttf")));
        assert!(id.is_some());
    }

    #[test]
    fn clear_empties_both_maps() {
        let (cache, _) = cache_with_counting();
        let id = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        cache.load_memory("mem", &[]).unwrap();
        cache.clear();
        assert!(!cache.is_loaded(id));
        let fresh = cache.load_file(Path::new("/fonts/a.ttf")).unwrap();
        assert_ne!(fresh, id);
    }
}
