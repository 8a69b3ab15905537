//! Named per-player values that can be substituted into text.
//!
//! A registry maps placeholder names to providers. [`PlaceholderRegistry::expand`]
//! replaces `%name%` tokens with the provider's value for a given player;
//! tokens with no registered provider are left as written.

use std::collections::BTreeMap;
use std::sync::Arc;

use hypoxia_types::PlayerId;

/// A named value computed per player.
pub trait Placeholder: Send + Sync {
    /// Name used in `%name%` tokens.
    fn name(&self) -> &str;

    /// Current value for `player`.
    fn value(&self, player: PlayerId) -> String;
}

/// Registered placeholders, looked up by name.
#[derive(Default, Clone)]
pub struct PlaceholderRegistry {
    providers: BTreeMap<String, Arc<dyn Placeholder>>,
}

impl PlaceholderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own name, replacing any previous
    /// provider with that name.
    pub fn register(&mut self, provider: Arc<dyn Placeholder>) {
        self.providers.insert(provider.name().to_owned(), provider);
    }

    /// Remove the provider registered as `name`. Returns whether one existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.providers.remove(name).is_some()
    }

    /// Whether a provider is registered as `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Value of `name` for `player`, if registered.
    pub fn resolve(&self, name: &str, player: PlayerId) -> Option<String> {
        self.providers.get(name).map(|provider| provider.value(player))
    }

    /// Replace every known `%name%` token in `text`.
    pub fn expand(&self, text: &str, player: PlayerId) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('%') {
            let (before, from_open) = rest.split_at(open);
            out.push_str(before);
            let Some(after_open) = from_open.strip_prefix('%') else {
                break;
            };
            let Some(close) = after_open.find('%') else {
                out.push_str(from_open);
                rest = "";
                break;
            };
            let (name, from_close) = after_open.split_at(close);
            if let Some(value) = self.resolve(name, player) {
                out.push_str(&value);
                rest = from_close.strip_prefix('%').unwrap_or(from_close);
            } else {
                // Unknown token: keep the opening '%' and rescan from the
                // closing one so it can start the next token.
                out.push('%');
                out.push_str(name);
                rest = from_close;
            }
        }
        out.push_str(rest);
        out
    }
}

impl std::fmt::Debug for PlaceholderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderRegistry")
            .field("names", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
