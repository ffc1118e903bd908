//! Per-command execution context management
//!
//! Every command owns one [`ContextStore`]. The store keeps a global object,
//! one object per channel and one object per guild. Objects are created
//! lazily on first reference and live as long as the command does.

use serde_json::{Map, Value};
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A shared, mutable key/value object.
///
/// Cloning yields another handle to the same underlying map.
#[derive(Clone, Default)]
pub struct ContextObject {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl ContextObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `f` with exclusive access to the map. Use this for read-modify-write
    /// sequences that must not interleave with other invocations.
    pub fn with<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl std::fmt::Debug for ContextObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContextObject").field(&*self.lock()).finish()
    }
}

/// The resolved bundle of state a callback sees for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The command's static data blob, shared across all invocations.
    pub data: ContextObject,
    pub global_context: ContextObject,
    pub channel_context: Option<ContextObject>,
    pub guild_context: Option<ContextObject>,
}

impl ExecutionContext {
    /// The guild object if present, else the channel object if present,
    /// else the global object.
    pub fn context(&self) -> &ContextObject {
        self.guild_context
            .as_ref()
            .or(self.channel_context.as_ref())
            .unwrap_or(&self.global_context)
    }
}

/// Owns the global, per-channel and per-guild objects of one command.
#[derive(Default)]
pub struct ContextStore {
    data: ContextObject,
    global: ContextObject,
    channels: Mutex<HashMap<ChannelId, ContextObject>>,
    guilds: Mutex<HashMap<GuildId, ContextObject>>,
}

impl ContextStore {
    pub fn new(data: ContextObject) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn data(&self) -> &ContextObject {
        &self.data
    }

    /// Resolves the execution context for a channel/guild combination.
    ///
    /// The same ids always resolve to the same underlying objects.
    pub fn execution_context(
        &self,
        channel_id: Option<ChannelId>,
        guild_id: Option<GuildId>,
    ) -> ExecutionContext {
        ExecutionContext {
            data: self.data.clone(),
            global_context: self.global.clone(),
            channel_context: channel_id.map(|id| Self::bucket(&self.channels, id)),
            guild_context: guild_id.map(|id| Self::bucket(&self.guilds, id)),
        }
    }

    fn bucket<K>(map: &Mutex<HashMap<K, ContextObject>>, id: K) -> ContextObject
    where
        K: std::hash::Hash + Eq,
    {
        map.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone()
    }

    pub fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn guild_count(&self) -> usize {
        self.guilds.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_contexts_are_distinct_and_stable() {
        let store = ContextStore::default();
        let c1 = ChannelId::new(1);
        let c2 = ChannelId::new(2);

        let first = store.execution_context(Some(c1), None);
        let other = store.execution_context(Some(c2), None);
        let again = store.execution_context(Some(c1), None);

        let first = first.channel_context.unwrap();
        let other = other.channel_context.unwrap();
        let again = again.channel_context.unwrap();

        assert!(ContextObject::ptr_eq(&first, &again));
        assert!(!ContextObject::ptr_eq(&first, &other));

        first.insert("counter", json!(1));
        assert_eq!(again.get("counter"), Some(json!(1)));
        assert_eq!(other.get("counter"), None);
        assert_eq!(store.channel_count(), 2);
    }

    #[test]
    fn test_context_precedence() {
        let store = ContextStore::default();
        let channel = Some(ChannelId::new(10));
        let guild = Some(GuildId::new(20));

        let both = store.execution_context(channel, guild);
        assert!(ContextObject::ptr_eq(
            both.context(),
            both.guild_context.as_ref().unwrap()
        ));

        let channel_only = store.execution_context(channel, None);
        assert!(channel_only.guild_context.is_none());
        assert!(ContextObject::ptr_eq(
            channel_only.context(),
            channel_only.channel_context.as_ref().unwrap()
        ));

        let neither = store.execution_context(None, None);
        assert!(neither.channel_context.is_none());
        assert!(ContextObject::ptr_eq(
            neither.context(),
            &neither.global_context
        ));
    }

    #[test]
    fn test_global_and_data_shared_across_scopes() {
        let mut data = Map::new();
        data.insert("messages".to_string(), json!(["hi"]));
        let store = ContextStore::new(ContextObject::from_map(data));

        let a = store.execution_context(Some(ChannelId::new(1)), None);
        let b = store.execution_context(None, Some(GuildId::new(2)));

        assert!(ContextObject::ptr_eq(&a.global_context, &b.global_context));
        assert!(ContextObject::ptr_eq(&a.data, &b.data));

        a.data.insert("seen", json!(true));
        assert_eq!(b.data.get("seen"), Some(json!(true)));
        assert_eq!(store.data().get("messages"), Some(json!(["hi"])));
    }

    #[test]
    fn test_guild_context_persists_mutations() {
        let store = ContextStore::default();
        let guild = Some(GuildId::new(5));

        store
            .execution_context(Some(ChannelId::new(1)), guild)
            .context()
            .with(|map| {
                map.insert("k".to_string(), json!("v"));
            });

        // A different channel in the same guild sees the same object.
        let later = store.execution_context(Some(ChannelId::new(2)), guild);
        assert_eq!(later.context().get("k"), Some(json!("v")));
        assert_eq!(store.guild_count(), 1);
    }
}
