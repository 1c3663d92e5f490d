use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use bevy::{
    asset::LoadState as AssetLoadState,
    prelude::*,
    tasks::{block_on, futures_lite::future, IoTaskPool, Task, TaskPool},
};
use serde::{Deserialize, Serialize};

use super::font::Font;
use super::loader::{DefaultFontFetcher, FontFetcher, FontLoadError, FontSource};
use crate::config::FontKey;

/// Keys tried first, in order, when a font cannot be resolved.
pub const UNIVERSAL_FALLBACKS: [&str; 2] = [FontKey::HELVETIKER, FontKey::OPTIMER];

/// Maps font keys onto the place their bytes live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontTable {
    /// Used for keys missing from `sources`
    pub default_font: FontKey,
    pub sources: BTreeMap<FontKey, FontSource>,
}

impl Default for FontTable {
    fn default() -> Self {
        let helvetiker = FontSource::Local("assets/fonts/helvetiker_regular.ttf".into());
        let optimer = FontSource::Local("assets/fonts/optimer_regular.ttf".into());
        let sources = [
            (FontKey::HELVETIKER, helvetiker.clone()),
            (FontKey::OPTIMER, optimer.clone()),
            ("sans-serif", helvetiker.clone()),
            ("monospace", helvetiker),
            ("serif", optimer),
            (
                "cookierun-bold",
                FontSource::Local("assets/fonts/CookieRun-Bold.ttf".into()),
            ),
            (
                "nanum-gothic",
                FontSource::Local("assets/fonts/NanumGothic-Regular.ttf".into()),
            ),
            (
                "noto-sans-kr",
                FontSource::Local("assets/fonts/NotoSansKR-Regular.ttf".into()),
            ),
        ]
        .into_iter()
        .map(|(key, source)| (FontKey::from(key), source))
        .collect();

        Self {
            default_font: FontKey::helvetiker(),
            sources,
        }
    }
}

impl FontTable {
    pub fn with_source(mut self, key: impl Into<FontKey>, source: FontSource) -> Self {
        self.sources.insert(key.into(), source);
        self
    }

    pub fn source_for(&self, key: &FontKey) -> Option<&FontSource> {
        self.sources
            .get(key)
            .or_else(|| self.sources.get(&self.default_font))
    }
}

/// How often and how patiently a failing font load is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: the n-th retry waits `n * base_delay`.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(retry as u64))
    }
}

/// Resolved fonts, in the order they were inserted. Never evicts.
#[derive(Debug, Default)]
pub struct FontCache {
    fonts: HashMap<FontKey, Font>,
    order: Vec<FontKey>,
}

impl FontCache {
    pub fn get(&self, key: &FontKey) -> Option<&Font> {
        self.fonts.get(key)
    }

    pub fn contains(&self, key: &FontKey) -> bool {
        self.fonts.contains_key(key)
    }

    pub fn insert(&mut self, key: FontKey, font: Font) {
        if self.fonts.insert(key.clone(), font).is_none() {
            self.order.push(key);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FontKey> {
        self.order.iter()
    }

    /// The universal fallbacks first, then whichever font was cached first.
    pub fn fallback(&self) -> Option<(&FontKey, &Font)> {
        UNIVERSAL_FALLBACKS
            .iter()
            .map(|key| FontKey::from(*key))
            .chain(self.order.iter().cloned())
            .find_map(|key| self.fonts.get_key_value(&key))
    }
}

enum LoadState {
    Fetching {
        task: Task<Result<Font, FontLoadError>>,
        attempt: u32,
    },
    Waiting {
        timer: Timer,
        retry: u32,
    },
    Adopting(Handle<Font>),
    Failed(FontLoadError),
}

impl LoadState {
    fn is_settled(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

/// Sent once, when every preloaded font has either loaded or given up.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontProviderReady;

/// Loads fonts by key, caches them and picks fallbacks.
///
/// [`FontProvider::resolve`] never blocks: a miss starts a background load
/// and returns [`Poll::Pending`]. The load advances in [`FontProvider::update`],
/// which the plugin calls every frame, and a later `resolve` returns the font
/// or, once the load has given up, the best cached fallback.
#[derive(Resource)]
pub struct FontProvider {
    table: FontTable,
    retry: RetryPolicy,
    fetcher: Arc<dyn FontFetcher>,
    cache: FontCache,
    loads: HashMap<FontKey, LoadState>,
    preload: Vec<FontKey>,
    ready: bool,
    ready_signalled: bool,
}

impl Default for FontProvider {
    fn default() -> Self {
        Self::new(FontTable::default(), RetryPolicy::default())
    }
}

impl FontProvider {
    pub fn new(table: FontTable, retry: RetryPolicy) -> Self {
        Self {
            table,
            retry,
            fetcher: Arc::new(DefaultFontFetcher),
            cache: FontCache::default(),
            loads: HashMap::new(),
            preload: Vec::new(),
            ready: false,
            ready_signalled: false,
        }
    }

    pub fn with_fetcher(mut self, fetcher: impl FontFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn table(&self) -> &FontTable {
        &self.table
    }

    pub fn cache(&self) -> &FontCache {
        &self.cache
    }

    /// Starts loading `keys` in the background. Readiness waits for them.
    pub fn preload(&mut self, keys: impl IntoIterator<Item = FontKey>) {
        for key in keys {
            if !self.cache.contains(&key) && !self.loads.contains_key(&key) {
                self.start_load(key.clone());
            }
            if !self.preload.contains(&key) {
                self.preload.push(key);
            }
        }
    }

    /// True once every preloaded font has settled. Stays true.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns true exactly once, on the first call after becoming ready.
    pub fn take_ready_signal(&mut self) -> bool {
        if self.ready && !self.ready_signalled {
            self.ready_signalled = true;
            return true;
        }
        false
    }

    pub fn is_loading(&self, key: &FontKey) -> bool {
        self.loads
            .get(key)
            .is_some_and(|state| !state.is_settled())
    }

    /// Seeds the cache directly, e.g. with a font loaded through the `AssetServer`.
    pub fn insert(&mut self, key: impl Into<FontKey>, font: Font) {
        let key = key.into();
        self.loads.remove(&key);
        self.cache.insert(key, font);
    }

    /// Resolves `key` from a `Font` asset once the `AssetServer` has loaded it.
    pub fn adopt(&mut self, key: impl Into<FontKey>, handle: Handle<Font>) {
        let key = key.into();
        if !self.cache.contains(&key) {
            self.loads.insert(key, LoadState::Adopting(handle));
        }
    }

    /// Failures are not remembered: once a failed load has handed out its
    /// fallback, the next `resolve` of the same key runs the full retry cycle
    /// again, so a font that comes back later is picked up.
    pub fn resolve(&mut self, key: &FontKey) -> Poll<Option<Font>> {
        if let Some(font) = self.cache.get(key) {
            return Poll::Ready(Some(font.clone()));
        }
        if let Some(font) = self.cached_alias(key) {
            debug!("font `{key}` shares its source with a cached font");
            self.cache.insert(key.clone(), font.clone());
            return Poll::Ready(Some(font));
        }

        match self.loads.get(key) {
            Some(LoadState::Failed(_)) => {
                if let Some(LoadState::Failed(err)) = self.loads.remove(key) {
                    warn!("font `{key}` is unavailable ({err}), falling back");
                }
                Poll::Ready(self.fallback())
            }
            Some(_) => Poll::Pending,
            None => {
                self.start_load(key.clone());
                Poll::Pending
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but never waits: while `key` is still
    /// loading the fallback is handed out instead.
    pub fn resolve_now(&mut self, key: &FontKey) -> Option<Font> {
        match self.resolve(key) {
            Poll::Ready(font) => font,
            Poll::Pending => {
                debug!("font `{key}` is still loading");
                self.fallback()
            }
        }
    }

    fn cached_alias(&self, key: &FontKey) -> Option<Font> {
        let source = self.table.source_for(key)?;
        self.cache
            .keys()
            .find(|cached| self.table.source_for(cached) == Some(source))
            .and_then(|cached| self.cache.get(cached))
            .cloned()
    }

    fn fallback(&self) -> Option<Font> {
        match self.cache.fallback() {
            Some((key, font)) => {
                warn!("using cached font `{key}` as fallback");
                Some(font.clone())
            }
            None => {
                error!("no font could be resolved, text falls back to character boxes");
                None
            }
        }
    }

    fn start_load(&mut self, key: FontKey) {
        let state = self.fetch(&key, 0);
        self.loads.insert(key, state);
    }

    fn fetch(&self, key: &FontKey, attempt: u32) -> LoadState {
        let Some(source) = self.table.source_for(key) else {
            return LoadState::Failed(FontLoadError::UnsupportedSource(key.to_string()));
        };
        debug!("loading font `{key}` from {source} (attempt {})", attempt + 1);
        let bytes = self.fetcher.fetch(source);
        let task = IoTaskPool::get_or_init(TaskPool::new)
            .spawn(async move { Font::from_bytes(bytes.await?) });
        LoadState::Fetching { task, attempt }
    }

    /// Advances in-flight loads and retry timers by `delta`.
    pub fn update(&mut self, delta: Duration) {
        let keys: Vec<FontKey> = self.loads.keys().cloned().collect();
        for key in keys {
            let Some(state) = self.loads.remove(&key) else {
                continue;
            };
            if let Some(next) = self.advance(&key, state, delta) {
                self.loads.insert(key, next);
            }
        }
        self.refresh_ready();
    }

    fn advance(&mut self, key: &FontKey, state: LoadState, delta: Duration) -> Option<LoadState> {
        match state {
            LoadState::Fetching { mut task, attempt } => {
                match block_on(future::poll_once(&mut task)) {
                    None => Some(LoadState::Fetching { task, attempt }),
                    Some(Ok(font)) => {
                        info!("loaded font `{key}`");
                        self.cache.insert(key.clone(), font);
                        None
                    }
                    Some(Err(err)) if attempt < self.retry.max_retries => {
                        let retry = attempt + 1;
                        let delay = self.retry.delay_before_retry(retry);
                        warn!(
                            "font `{key}` attempt {} failed: {err}; retry {retry}/{} in {delay:?}",
                            attempt + 1,
                            self.retry.max_retries
                        );
                        Some(LoadState::Waiting {
                            timer: Timer::new(delay, TimerMode::Once),
                            retry,
                        })
                    }
                    Some(Err(err)) => {
                        warn!("font `{key}` failed after {} attempts: {err}", attempt + 1);
                        Some(LoadState::Failed(err))
                    }
                }
            }
            LoadState::Waiting { mut timer, retry } => {
                timer.tick(delta);
                if timer.finished() {
                    Some(self.fetch(key, retry))
                } else {
                    Some(LoadState::Waiting { timer, retry })
                }
            }
            other => Some(other),
        }
    }

    /// Moves adopted asset handles into the cache once they are loaded.
    pub fn poll_assets(&mut self, assets: &Assets<Font>, server: &AssetServer) {
        let adopted: Vec<(FontKey, AssetId<Font>)> = self
            .loads
            .iter()
            .filter_map(|(key, state)| match state {
                LoadState::Adopting(handle) => Some((key.clone(), handle.id())),
                _ => None,
            })
            .collect();

        for (key, id) in adopted {
            if let Some(font) = assets.get(id) {
                info!("loaded font `{key}` from asset");
                self.insert(key, font.clone());
            } else if let AssetLoadState::Failed(err) = server.load_state(id) {
                warn!("font asset for `{key}` failed: {err}");
                self.loads
                    .insert(key, LoadState::Failed(FontLoadError::Asset(err.to_string())));
            }
        }
        self.refresh_ready();
    }

    fn refresh_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = self.preload.iter().all(|key| !self.is_loading(key));
        if self.ready {
            info!(
                "font provider ready with {} cached font(s)",
                self.cache.len()
            );
        }
    }
}
