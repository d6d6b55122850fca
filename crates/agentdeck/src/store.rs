//! In-memory agent and room collections.
//!
//! Both stores follow the same discipline: readers clone an `Arc` snapshot
//! and never hold the lock while working with it; writers build a new map
//! with one entry changed and swap it in under the write lock. A reader
//! therefore sees either the old or the new map, never a half-applied edit.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::agent::{AgentConfig, AgentDraft, AgentId, AgentState, ConversationRecord};
use crate::models::room::{RoomDraft, RoomId, RoomMessage, RoomState};

type Snapshot<K, V> = Arc<BTreeMap<K, V>>;

/// Copy-and-replace map shared by both stores.
struct CowMap<K: Ord + Clone, V: Clone> {
    inner: RwLock<Snapshot<K, V>>,
}

impl<K: Ord + Clone, V: Clone> CowMap<K, V> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }

    fn snapshot(&self) -> Snapshot<K, V> {
        self.inner.read().clone()
    }

    fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.write();
        let mut next = BTreeMap::clone(&guard);
        next.insert(key, value);
        *guard = Arc::new(next);
    }

    /// Apply `f` to the entry for `key`, returning its result, or `None`
    /// when the key is absent (in which case nothing is written).
    fn modify<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut guard = self.inner.write();
        let mut value = guard.get(key)?.clone();
        let result = f(&mut value);
        let mut next = BTreeMap::clone(&guard);
        next.insert(key.clone(), value);
        *guard = Arc::new(next);
        Some(result)
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.write();
        if !guard.contains_key(key) {
            return None;
        }
        let mut next = BTreeMap::clone(&guard);
        let removed = next.remove(key);
        *guard = Arc::new(next);
        removed
    }
}

pub struct AgentStore {
    agents: CowMap<AgentId, AgentConfig>,
    next_id: AtomicU64,
}

impl Default for AgentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentStore {
    pub fn new() -> Self {
        Self {
            agents: CowMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Snapshot<AgentId, AgentConfig> {
        self.agents.snapshot()
    }

    /// All agents in id order.
    pub fn list(&self) -> Vec<AgentConfig> {
        self.snapshot().values().cloned().collect()
    }

    pub fn get(&self, id: AgentId) -> Option<AgentConfig> {
        self.snapshot().get(&id).cloned()
    }

    pub fn insert(&self, draft: AgentDraft) -> AgentConfig {
        let id = AgentId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let agent = draft.into_config(id);
        self.agents.insert(id, agent.clone());
        agent
    }

    /// Replace the user-editable fields of an agent. Returns the previous
    /// and the new configuration.
    pub fn update(&self, id: AgentId, draft: AgentDraft) -> Option<(AgentConfig, AgentConfig)> {
        self.agents.modify(&id, |agent| {
            let previous = agent.clone();
            *agent = draft.apply_to(&previous);
            (previous, agent.clone())
        })
    }

    pub fn set_state(&self, id: AgentId, state: AgentState) -> Option<AgentConfig> {
        self.agents.modify(&id, |agent| {
            agent.state = state;
            agent.clone()
        })
    }

    /// Returns the new conversation count.
    pub fn increment_conversations(&self, id: AgentId) -> Option<u64> {
        self.agents.modify(&id, |agent| {
            agent.conversation_count += 1;
            agent.conversation_count
        })
    }

    /// Returns the new value of the flag.
    pub fn toggle_learning(&self, id: AgentId) -> Option<bool> {
        self.agents.modify(&id, |agent| {
            agent.learning_enabled = !agent.learning_enabled;
            agent.learning_enabled
        })
    }

    pub fn remove(&self, id: AgentId) -> Option<AgentConfig> {
        self.agents.remove(&id)
    }
}

pub struct RoomStore {
    rooms: CowMap<RoomId, RoomState>,
    next_id: AtomicU64,
    next_message_id: AtomicU64,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: CowMap::new(),
            next_id: AtomicU64::new(1),
            next_message_id: AtomicU64::new(1),
        }
    }

    pub fn list(&self) -> Vec<RoomState> {
        self.rooms.snapshot().values().cloned().collect()
    }

    pub fn get(&self, id: RoomId) -> Option<RoomState> {
        self.rooms.snapshot().get(&id).cloned()
    }

    pub fn create(&self, draft: RoomDraft) -> RoomState {
        let id = RoomId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut members = Vec::with_capacity(draft.agent_ids.len());
        for agent_id in draft.agent_ids {
            if !members.contains(&agent_id) {
                members.push(agent_id);
            }
        }
        let room = RoomState {
            id,
            name: draft.name,
            kind: draft.kind,
            active_agent_ids: members,
            messages: Vec::new(),
            created_at: Utc::now(),
        };
        self.rooms.insert(id, room.clone());
        room
    }

    /// Returns whether the agent was newly added.
    pub fn add_agent(&self, room_id: RoomId, agent_id: AgentId) -> Option<bool> {
        self.rooms.modify(&room_id, |room| {
            if room.has_agent(agent_id) {
                false
            } else {
                room.active_agent_ids.push(agent_id);
                true
            }
        })
    }

    /// Returns whether the agent was a member.
    pub fn remove_agent(&self, room_id: RoomId, agent_id: AgentId) -> Option<bool> {
        self.rooms.modify(&room_id, |room| {
            let before = room.active_agent_ids.len();
            room.active_agent_ids.retain(|id| *id != agent_id);
            room.active_agent_ids.len() != before
        })
    }

    /// Drop an agent from every room it belongs to.
    pub fn remove_agent_everywhere(&self, agent_id: AgentId) {
        for room in self.list() {
            if room.has_agent(agent_id) {
                self.remove_agent(room.id, agent_id);
            }
        }
    }

    pub fn next_message_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn push_messages(&self, room_id: RoomId, messages: Vec<RoomMessage>) -> Option<()> {
        self.rooms
            .modify(&room_id, |room| room.messages.extend(messages))
    }

    pub fn remove(&self, id: RoomId) -> Option<RoomState> {
        self.rooms.remove(&id)
    }
}

/// Append-only record of every successful exchange.
#[derive(Default)]
pub struct ConversationLog {
    records: RwLock<Vec<ConversationRecord>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ConversationRecord) {
        self.records.write().push(record);
    }

    pub fn for_agent(&self, agent_id: AgentId) -> Vec<ConversationRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| record.agent_id == agent_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::Channel;
    use crate::models::room::RoomKind;

    fn draft(name: &str) -> AgentDraft {
        AgentDraft {
            name: name.to_string(),
            model_route: "ollama:mistral".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let store = AgentStore::new();
        let a = store.insert(draft("a"));
        let b = store.insert(draft("b"));
        store.remove(a.id);
        let c = store.insert(draft("c"));
        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = AgentStore::new();
        let agent = store.insert(draft("a"));

        let before = store.snapshot();
        store.increment_conversations(agent.id);
        store.set_state(agent.id, AgentState::Active);

        assert_eq!(before[&agent.id].conversation_count, 0);
        assert_eq!(before[&agent.id].state, AgentState::Inactive);
        let after = store.get(agent.id).unwrap();
        assert_eq!(after.conversation_count, 1);
        assert!(after.is_active());
    }

    #[test]
    fn test_update_returns_previous_and_next() {
        let store = AgentStore::new();
        let agent = store.insert(draft("a"));
        store.set_state(agent.id, AgentState::Active);

        let (previous, next) = store.update(agent.id, draft("renamed")).unwrap();
        assert_eq!(previous.name, "a");
        assert_eq!(next.name, "renamed");
        assert!(next.is_active());
        assert!(store.update(AgentId(999), draft("x")).is_none());
    }

    #[test]
    fn test_toggle_learning_and_missing_ids() {
        let store = AgentStore::new();
        let agent = store.insert(draft("a"));
        assert_eq!(store.toggle_learning(agent.id), Some(false));
        assert_eq!(store.toggle_learning(agent.id), Some(true));
        assert_eq!(store.toggle_learning(AgentId(42)), None);
        assert_eq!(store.increment_conversations(AgentId(42)), None);
        assert!(store.remove(AgentId(42)).is_none());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(AgentStore::new());
        let agent = store.insert(draft("a"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment_conversations(agent.id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(agent.id).unwrap().conversation_count, 800);
    }

    #[test]
    fn test_room_membership_is_an_ordered_set() {
        let rooms = RoomStore::new();
        let room = rooms.create(RoomDraft {
            name: "Board".to_string(),
            kind: RoomKind::Executive,
            agent_ids: vec![AgentId(2), AgentId(1), AgentId(2)],
        });
        assert_eq!(room.active_agent_ids, vec![AgentId(2), AgentId(1)]);

        assert_eq!(rooms.add_agent(room.id, AgentId(3)), Some(true));
        assert_eq!(rooms.add_agent(room.id, AgentId(1)), Some(false));
        assert_eq!(rooms.remove_agent(room.id, AgentId(2)), Some(true));
        assert_eq!(rooms.remove_agent(room.id, AgentId(2)), Some(false));
        assert_eq!(
            rooms.get(room.id).unwrap().active_agent_ids,
            vec![AgentId(1), AgentId(3)]
        );
        assert_eq!(rooms.add_agent(RoomId(99), AgentId(1)), None);

        rooms.remove_agent_everywhere(AgentId(1));
        assert_eq!(rooms.get(room.id).unwrap().active_agent_ids, vec![AgentId(3)]);
    }

    #[test]
    fn test_push_messages() {
        let rooms = RoomStore::new();
        let room = rooms.create(RoomDraft::default());
        let first = rooms.next_message_id();
        let second = rooms.next_message_id();
        assert!(first < second);

        rooms
            .push_messages(
                room.id,
                vec![
                    RoomMessage::user(first, "hi"),
                    RoomMessage::agent(second, AgentId(1), "ollama:mistral", "hello"),
                ],
            )
            .unwrap();
        let stored = rooms.get(room.id).unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[1].text, "hello");
        assert!(rooms.push_messages(RoomId(99), vec![]).is_none());
    }

    #[test]
    fn test_conversation_log_filters_by_agent() {
        let log = ConversationLog::new();
        log.append(ConversationRecord::new(AgentId(1), Channel::Web, "user", "q1", "a1"));
        log.append(ConversationRecord::new(AgentId(2), Channel::Relay, "bob", "q2", "a2"));
        log.append(ConversationRecord::new(AgentId(1), Channel::Room, "user", "q3", "a3"));

        let records = log.for_agent(AgentId(1));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].user_message, "q3");
        assert_eq!(log.len(), 3);
    }
}
