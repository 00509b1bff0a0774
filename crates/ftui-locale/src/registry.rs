#![forbid(unsafe_code)]

//! Refcounted registry of named locale contexts.
//!
//! Independent callers (applets) share a context by asking for the same
//! name, or isolate themselves by using distinct names. The empty name
//! selects the default context. Language changes and asset reloads can be
//! broadcast to every registered context at once.
//!
//! # Invariants
//!
//! 1. At most one context per name.
//! 2. Only `acquire` and `release` change a registered context's refcount.
//! 3. A context is torn down exactly once, when its refcount reaches zero;
//!    `InfoUnloaded` fires just before teardown.
//! 4. Releasing a context the registry no longer owns is an error, never a
//!    decrement of some other context that reused the name.
//!
//! # Locking
//!
//! The name map and refcounts sit behind one mutex. Handlers are never
//! invoked while it is held, so a handler may call back into the registry.
//! `change_all` and `reload_all` are additionally serialized against each
//! other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, trace, warn};

use crate::assets::AssetProvider;
use crate::code::LocalePair;
use crate::config::LocaleConfig;
use crate::context::LocaleContext;
use crate::error::LocaleError;
use crate::event::{Emitter, LocaleEvent, SubscriptionId};

/// Chooses the asset provider for a new context (`None` = default context).
pub type ProviderFactory = Arc<dyn Fn(Option<&str>) -> Arc<dyn AssetProvider> + Send + Sync>;

static GLOBAL: OnceLock<LocaleRegistry> = OnceLock::new();

const DEFAULT_LABEL: &str = "<default>";
const UNREGISTERED_LABEL: &str = "<unregistered>";

struct RegistryInner {
    pair: LocalePair,
    default: Option<Arc<LocaleContext>>,
    instances: HashMap<String, Arc<LocaleContext>>,
}

impl RegistryInner {
    /// Default first, then named contexts by name.
    fn contexts(&self) -> Vec<Arc<LocaleContext>> {
        let mut named: Vec<(&String, &Arc<LocaleContext>)> = self.instances.iter().collect();
        named.sort_unstable_by(|a, b| a.0.cmp(b.0));
        self.default
            .iter()
            .chain(named.into_iter().map(|(_, ctx)| ctx))
            .cloned()
            .collect()
    }
}

/// Process-wide (or injected) map from applet name to locale context.
pub struct LocaleRegistry {
    inner: Mutex<RegistryInner>,
    broadcast: Mutex<()>,
    providers: ProviderFactory,
    emitter: Emitter<LocaleContext>,
}

impl fmt::Debug for LocaleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LocaleRegistry")
            .field("pair", &inner.pair)
            .field("default", &inner.default.is_some())
            .field("instances", &inner.instances.len())
            .field("subscribers", &self.emitter.len())
            .finish()
    }
}

impl LocaleRegistry {
    /// Registry whose contexts all read from `assets`.
    ///
    /// An unset `pair` is replaced by the platform locale.
    pub fn new(pair: LocalePair, assets: Arc<dyn AssetProvider>) -> Self {
        Self::with_providers(pair, move |_| Arc::clone(&assets))
    }

    /// Registry giving each applet its own asset provider.
    pub fn with_providers(
        pair: LocalePair,
        providers: impl Fn(Option<&str>) -> Arc<dyn AssetProvider> + Send + Sync + 'static,
    ) -> Self {
        let pair = if pair.is_unset() {
            LocalePair::system()
        } else {
            pair
        };
        Self {
            inner: Mutex::new(RegistryInner {
                pair,
                default: None,
                instances: HashMap::new(),
            }),
            broadcast: Mutex::new(()),
            providers: Arc::new(providers),
            emitter: Emitter::default(),
        }
    }

    /// The process-wide registry, built from the environment on first use.
    pub fn global() -> &'static LocaleRegistry {
        GLOBAL.get_or_init(|| {
            let parsed = LocaleConfig::from_env_with_diagnostics();
            for err in &parsed.errors {
                warn!(%err, "ignoring locale configuration value");
            }
            parsed.config.build_registry()
        })
    }

    /// Install `registry` as the process-wide one.
    ///
    /// Fails (handing the registry back) if a global registry already exists.
    pub fn install_global(registry: LocaleRegistry) -> Result<&'static LocaleRegistry, LocaleRegistry> {
        GLOBAL.set(registry)?;
        Ok(Self::global())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the context for `name`, creating it on first use.
    ///
    /// The empty name selects the default context. Every call takes one
    /// reference that must be returned with [`LocaleRegistry::release`].
    /// `InfoLoaded` fires whenever a context is created, default included.
    pub fn acquire(&self, name: &str) -> Arc<LocaleContext> {
        let created = {
            let mut inner = self.lock();
            if name.is_empty() {
                if let Some(ctx) = &inner.default {
                    let refs = ctx.retain();
                    trace!(name = DEFAULT_LABEL, refs, "locale context acquired");
                    return Arc::clone(ctx);
                }
                let ctx = Arc::new(LocaleContext::with_name(
                    None,
                    inner.pair,
                    (self.providers)(None),
                ));
                inner.default = Some(Arc::clone(&ctx));
                debug!(name = DEFAULT_LABEL, pair = %inner.pair, "locale context created");
                ctx
            } else if let Some(ctx) = inner.instances.get(name) {
                let refs = ctx.retain();
                trace!(name, refs, "locale context acquired");
                return Arc::clone(ctx);
            } else {
                let ctx = Arc::new(LocaleContext::with_name(
                    Some(name.to_string()),
                    inner.pair,
                    (self.providers)(Some(name)),
                ));
                inner.instances.insert(name.to_string(), Arc::clone(&ctx));
                debug!(name, pair = %inner.pair, "locale context created");
                ctx
            }
        };
        self.emitter.dispatch(LocaleEvent::InfoLoaded, &created);
        created
    }

    /// The default context (same as `acquire("")`).
    pub fn acquire_default(&self) -> Arc<LocaleContext> {
        self.acquire("")
    }

    /// Return one reference taken by [`LocaleRegistry::acquire`].
    ///
    /// When the last reference goes, the context leaves the registry,
    /// `InfoUnloaded` fires, and its table and subscribers are dropped.
    pub fn release(&self, ctx: &Arc<LocaleContext>) -> Result<(), LocaleError> {
        {
            let mut inner = self.lock();
            let owned = match ctx.name() {
                None => inner.default.as_ref().is_some_and(|d| Arc::ptr_eq(d, ctx)),
                Some(name) => inner
                    .instances
                    .get(name)
                    .is_some_and(|c| Arc::ptr_eq(c, ctx)),
            };
            if !owned {
                let label = ctx.name().unwrap_or(UNREGISTERED_LABEL);
                debug!(name = label, "release of unregistered locale context");
                return Err(LocaleError::NotRegistered(label.to_string()));
            }
            let refs = ctx.release_ref();
            trace!(name = ctx.name().unwrap_or(DEFAULT_LABEL), refs, "locale context released");
            if refs > 0 {
                return Ok(());
            }
            match ctx.name() {
                None => inner.default = None,
                Some(name) => {
                    inner.instances.remove(name);
                }
            }
        }
        self.destroy(ctx);
        Ok(())
    }

    fn destroy(&self, ctx: &LocaleContext) {
        debug!(name = ctx.name().unwrap_or(DEFAULT_LABEL), "locale context destroyed");
        self.emitter.dispatch(LocaleEvent::InfoUnloaded, ctx);
        ctx.teardown();
    }

    /// Switch every context (and future ones) to `pair`.
    ///
    /// Each context reloads independently; a missing or bad table for one
    /// does not stop the others. Each context whose pair actually changes
    /// fires exactly one `Changed` event.
    pub fn change_all(&self, pair: LocalePair) {
        let _broadcast = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = {
            let mut inner = self.lock();
            inner.pair = pair;
            inner.contexts()
        };
        debug!(%pair, contexts = targets.len(), "changing all locale contexts");
        for ctx in targets {
            ctx.change(pair);
        }
    }

    /// `change_all` taking raw code strings.
    pub fn change_all_codes(&self, language: &str, country: &str) -> Result<(), LocaleError> {
        self.change_all(LocalePair::new(language, country)?);
        Ok(())
    }

    /// Reload the table of every context, default included.
    pub fn reload_all(&self) {
        let _broadcast = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let targets = self.lock().contexts();
        debug!(contexts = targets.len(), "reloading all locale contexts");
        for ctx in targets {
            ctx.reload();
        }
    }

    /// Destroy every context regardless of outstanding references.
    pub fn shutdown(&self) {
        let _broadcast = self.broadcast.lock().unwrap_or_else(PoisonError::into_inner);
        let drained = {
            let mut inner = self.lock();
            let drained = inner.contexts();
            inner.default = None;
            inner.instances.clear();
            drained
        };
        for ctx in &drained {
            ctx.forget_refs();
            self.destroy(ctx);
        }
    }

    /// Subscribe to `InfoLoaded` / `InfoUnloaded`.
    ///
    /// Every context, default included, produces exactly one of each over
    /// its lifetime.
    pub fn on(
        &self,
        kind: LocaleEvent,
        handler: impl Fn(LocaleEvent, &LocaleContext) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.emitter.on(kind, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.emitter.off(id)
    }

    /// Pair given to newly created contexts.
    #[must_use]
    pub fn pair(&self) -> LocalePair {
        self.lock().pair
    }

    /// Outstanding references for `name` (`""` = default), if registered.
    #[must_use]
    pub fn refcount(&self, name: &str) -> Option<u32> {
        let inner = self.lock();
        if name.is_empty() {
            inner.default.as_ref().map(|ctx| ctx.refcount())
        } else {
            inner.instances.get(name).map(|ctx| ctx.refcount())
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.refcount(name).is_some()
    }

    /// Registered applet names, sorted. The default context is not listed.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().instances.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of named contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
