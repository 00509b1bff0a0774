#![forbid(unsafe_code)]

//! Per-instance locale state: codes, string table, hooks, and subscribers.
//!
//! # Design
//!
//! Everything `translate` reads (pair, table, hooks, asset provider) lives in
//! one immutable `ContextState` behind `RwLock<Arc<..>>`. Readers clone the
//! `Arc` and work on that snapshot; writers build a complete replacement and
//! swap it in. A translation therefore sees either the fully-old or the
//! fully-new state, never a mix, and a hook replaced mid-call does not affect
//! calls already in flight.
//!
//! Writers (`change`, `reload`, setters) are serialized by a separate mutex so
//! that table I/O never happens while the read lock is held.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No resource for pair | Provider returned `None` | Context runs without a table |
//! | Malformed/unsupported table | Bad bytes | Logged, context runs without a table |
//! | Nothing matches | Key unknown everywhere | `translate` returns the key |

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::assets::AssetProvider;
use crate::code::{LocaleCode, LocalePair};
use crate::error::LocaleError;
use crate::event::{Emitter, LocaleEvent, SubscriptionId};
use crate::hooks::{HookSet, RESOLUTION_ORDER, TranslationSource, Translated, Translator};
use crate::table::StringTable;

#[derive(Clone)]
struct ContextState {
    pair: LocalePair,
    table: Option<Arc<StringTable>>,
    assets: Arc<dyn AssetProvider>,
    hooks: HookSet,
}

/// One self-contained unit of language state, resources, and hooks.
pub struct LocaleContext {
    name: Option<String>,
    refcount: AtomicU32,
    /// Set by `teardown`; only written while `writer` is held.
    destroyed: AtomicBool,
    state: RwLock<Arc<ContextState>>,
    writer: Mutex<()>,
    emitter: Emitter<LocaleContext>,
}

impl fmt::Debug for LocaleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("LocaleContext")
            .field("name", &self.name)
            .field("pair", &state.pair)
            .field("table", &state.table)
            .field("hooks", &state.hooks)
            .field("refcount", &self.refcount())
            .field("subscribers", &self.emitter.len())
            .finish()
    }
}

impl LocaleContext {
    /// Create a context and load the table for `pair`.
    ///
    /// An unset pair (both codes empty) is replaced by the platform locale.
    /// A missing or invalid resource is not an error: the context simply has
    /// no table. The refcount starts at 1.
    pub fn new(pair: LocalePair, assets: Arc<dyn AssetProvider>) -> Self {
        Self::with_name(None, pair, assets)
    }

    /// Create a context from raw code strings.
    pub fn from_codes(
        language: &str,
        country: &str,
        assets: Arc<dyn AssetProvider>,
    ) -> Result<Self, LocaleError> {
        Ok(Self::new(LocalePair::new(language, country)?, assets))
    }

    pub(crate) fn with_name(
        name: Option<String>,
        pair: LocalePair,
        assets: Arc<dyn AssetProvider>,
    ) -> Self {
        let pair = if pair.is_unset() {
            LocalePair::system()
        } else {
            pair
        };
        let table = load_table(assets.as_ref(), pair);
        Self {
            name,
            refcount: AtomicU32::new(1),
            destroyed: AtomicBool::new(false),
            state: RwLock::new(Arc::new(ContextState {
                pair,
                table,
                assets,
                hooks: HookSet::default(),
            })),
            writer: Mutex::new(()),
            emitter: Emitter::default(),
        }
    }

    fn snapshot(&self) -> Arc<ContextState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, state: ContextState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `edit` to a copy of the current state and publish it.
    fn update(&self, edit: impl FnOnce(&mut ContextState)) {
        let _writer = self.lock_writer();
        if self.is_destroyed() {
            return;
        }
        let mut next = ContextState::clone(&self.snapshot());
        edit(&mut next);
        self.publish(next);
    }

    /// Translate `text`. Never fails: the worst case returns `text` itself.
    pub fn translate<'a>(&self, text: &'a str) -> Translated<'a> {
        let state = self.snapshot();
        for source in RESOLUTION_ORDER {
            let hit = match source {
                TranslationSource::Table => state.table.as_ref().and_then(|table| {
                    table
                        .lookup_range(text)
                        .map(|range| Translated::from_table(Arc::clone(table), range))
                }),
                _ => state
                    .hooks
                    .get(source)
                    .and_then(|hook| hook.apply(&state.pair, text))
                    .map(|value| Translated::hooked(value, source)),
            };
            if let Some(hit) = hit {
                return hit;
            }
        }
        Translated::identity(text)
    }

    /// Switch to `pair`, reload its table, and notify `Changed` subscribers.
    ///
    /// The event fires even when no table exists for the new pair. Changing
    /// to the pair already in effect, or changing a context the registry has
    /// destroyed, does nothing. Returns whether the pair changed.
    pub fn change(&self, pair: LocalePair) -> bool {
        {
            let _writer = self.lock_writer();
            let current = self.snapshot();
            if current.pair == pair || self.is_destroyed() {
                return false;
            }
            let table = load_table(current.assets.as_ref(), pair);
            self.publish(ContextState {
                pair,
                table,
                ..ContextState::clone(&current)
            });
        }
        debug!(name = ?self.name, %pair, "locale changed");
        self.emitter.dispatch(LocaleEvent::Changed, self);
        true
    }

    /// `change` taking raw code strings.
    pub fn change_codes(&self, language: &str, country: &str) -> Result<bool, LocaleError> {
        Ok(self.change(LocalePair::new(language, country)?))
    }

    /// Re-fetch the table for the current pair and notify `Reloaded`
    /// subscribers. A destroyed context stays empty.
    pub fn reload(&self) {
        let pair = {
            let _writer = self.lock_writer();
            if self.is_destroyed() {
                return;
            }
            let current = self.snapshot();
            let table = load_table(current.assets.as_ref(), current.pair);
            self.publish(ContextState {
                table,
                ..ContextState::clone(&current)
            });
            current.pair
        };
        debug!(name = ?self.name, %pair, "locale reloaded");
        self.emitter.dispatch(LocaleEvent::Reloaded, self);
    }

    /// Replace the asset provider and reload the table from it.
    pub fn set_assets(&self, assets: Arc<dyn AssetProvider>) {
        self.update(|state| {
            state.table = load_table(assets.as_ref(), state.pair);
            state.assets = assets;
        });
    }

    /// Install a translator in its slot, returning the one it replaced.
    pub fn set_translator(&self, translator: Translator) -> Option<Translator> {
        let mut replaced = None;
        self.update(|state| replaced = state.hooks.install(translator));
        replaced
    }

    /// Empty the slot serving `source`.
    pub fn remove_translator(&self, source: TranslationSource) -> Option<Translator> {
        let mut removed = None;
        self.update(|state| removed = state.hooks.remove(source));
        removed
    }

    /// Install the custom hook consulted before the table.
    pub fn set_custom_tr(
        &self,
        hook: impl Fn(&LocalePair, &str) -> Option<String> + Send + Sync + 'static,
    ) {
        self.set_translator(Translator::custom(hook));
    }

    /// Install the plain fallback hook consulted last.
    pub fn set_fallback_tr(&self, hook: impl Fn(&str) -> Option<String> + Send + Sync + 'static) {
        self.set_translator(Translator::fallback(hook));
    }

    /// Install the context-carrying fallback consulted before `fallback_tr`.
    pub fn set_fallback_tr2(
        &self,
        hook: impl Fn(&LocalePair, &str) -> Option<String> + Send + Sync + 'static,
    ) {
        self.set_translator(Translator::fallback_with_context(hook));
    }

    /// Subscribe to `kind` (`Changed` or `Reloaded`).
    pub fn on(
        &self,
        kind: LocaleEvent,
        handler: impl Fn(LocaleEvent, &LocaleContext) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.emitter.on(kind, handler)
    }

    /// Unsubscribe. Returns whether `id` was registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.emitter.off(id)
    }

    #[must_use]
    pub fn pair(&self) -> LocalePair {
        self.snapshot().pair
    }

    #[must_use]
    pub fn language(&self) -> LocaleCode {
        self.pair().language
    }

    #[must_use]
    pub fn country(&self) -> LocaleCode {
        self.pair().country
    }

    /// Registry name; `None` for the default context and unregistered ones.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_table(&self) -> bool {
        self.snapshot().table.is_some()
    }

    /// The currently loaded table, if any.
    #[must_use]
    pub fn table(&self) -> Option<Arc<StringTable>> {
        self.snapshot().table.clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.emitter.len()
    }

    pub(crate) fn retain(&self) -> u32 {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the refcount, saturating at zero. Returns the new count.
    pub(crate) fn release_ref(&self) -> u32 {
        let previous = self
            .refcount
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_default();
        previous.saturating_sub(1)
    }

    pub(crate) fn forget_refs(&self) {
        self.refcount.store(0, Ordering::Release);
    }

    /// Drop the table and every subscriber once the last reference is gone.
    pub(crate) fn teardown(&self) {
        {
            let _writer = self.lock_writer();
            let current = self.snapshot();
            self.publish(ContextState {
                table: None,
                ..ContextState::clone(&current)
            });
            self.destroyed.store(true, Ordering::Release);
        }
        self.emitter.clear();
    }

    /// Whether the registry has torn this context down.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

fn load_table(assets: &dyn AssetProvider, pair: LocalePair) -> Option<Arc<StringTable>> {
    let Some(bytes) = assets.load_table(pair) else {
        debug!(%pair, "no string table for locale");
        return None;
    };
    match StringTable::parse(&bytes) {
        Ok(table) => {
            debug!(%pair, entries = table.len(), "string table loaded");
            Some(Arc::new(table))
        }
        Err(err) => {
            warn!(%pair, error = %err, "string table rejected");
            None
        }
    }
}
