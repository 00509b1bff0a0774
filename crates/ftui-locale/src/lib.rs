#![forbid(unsafe_code)]

//! Runtime locale translation for FrankenTUI.
//!
//! Three layers:
//!
//! - [`StringTable`]: a compact binary table mapping key hashes to UTF-8
//!   values, searched with a binary search.
//! - [`LocaleContext`]: the active (language, country) pair, its table, and
//!   a chain of translation hooks. Resolution order is custom hook, table,
//!   context-aware fallback, plain fallback, then the input text itself.
//! - [`LocaleRegistry`]: refcounted named contexts so independent applets
//!   can share or isolate their locale, with broadcast change and reload.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ftui_locale::{LocalePair, LocaleRegistry, MemoryAssets, StringTableBuilder};
//!
//! let assets = MemoryAssets::new();
//! let fr = LocalePair::new("fr", "FR").unwrap();
//! let table = [("cancel", "Annuler")]
//!     .into_iter()
//!     .collect::<StringTableBuilder>()
//!     .build()
//!     .unwrap();
//! assets.insert(fr, table);
//!
//! let registry = LocaleRegistry::new(LocalePair::new("en", "US").unwrap(), Arc::new(assets));
//! let ctx = registry.acquire("settings");
//! assert_eq!(ctx.translate("cancel"), "cancel");
//!
//! registry.change_all(fr);
//! assert_eq!(ctx.translate("cancel"), "Annuler");
//! registry.release(&ctx).unwrap();
//! ```

pub mod assets;
pub mod code;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod hooks;
pub mod registry;
pub mod table;

pub use assets::{AssetProvider, DirAssets, MemoryAssets, NoAssets};
pub use code::{LocaleCode, LocalePair, detect_system_pair_with};
pub use config::{LocaleConfig, LocaleConfigError, LocaleConfigParse};
pub use context::LocaleContext;
pub use error::LocaleError;
pub use event::{LocaleEvent, SubscriptionId};
pub use hooks::{RESOLUTION_ORDER, TranslationSource, Translated, Translator};
pub use registry::{LocaleRegistry, ProviderFactory};
pub use table::{FORMAT_VERSION, StringTable, StringTableBuilder, key_hash};
