//! The application state behind the dashboard: every user action is a
//! method here, and every long-running task is owned from here.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::collaborators::search::DEFAULT_SEARCH_LIMIT;
use crate::collaborators::{
    Destination, DuckDuckGoSearch, FileContent, FileDescriptor, FileStore, SearchResult,
    WebSearch, DUCKDUCKGO_BASE,
};
use crate::credentials::{CredentialError, CredentialStore, KNOWN_CREDENTIALS};
use crate::errors::{CollaboratorError, ErrorKind, GenerationError, RelayError};
use crate::generator::{Endpoints, ReplyGenerator, ResponseGenerator, Route};
use crate::models::agent::{
    AgentConfig, AgentDraft, AgentId, AgentState, Channel, ConversationRecord,
};
use crate::models::model::{BackendKind, ModelDescriptor, ModelKey};
use crate::models::room::{RoomDraft, RoomExport, RoomId, RoomMessage, RoomState};
use crate::probe::{
    local_backends, ProbeService, Prober, DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT,
};
use crate::providers::configs::OllamaProviderConfig;
use crate::providers::ollama::OllamaProvider;
use crate::registry::{ActiveModels, BackendStatus, ModelRegistry};
use crate::relay::poller::DEFAULT_POLL_INTERVAL;
use crate::relay::{verify_token, RelayChannelFactory, RelaySupervisor};
use crate::store::{AgentStore, ConversationLog, RoomStore};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::AgentNotFound(_)
            | DashboardError::RoomNotFound(_)
            | DashboardError::FileNotFound(_) => ErrorKind::NotFound,
            DashboardError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            DashboardError::Validation(_) => ErrorKind::Validation,
            DashboardError::Generation(e) => e.kind(),
            DashboardError::Relay(e) => e.kind(),
            DashboardError::Credential(CredentialError::Missing(_)) => {
                ErrorKind::MissingCredential
            }
            DashboardError::Credential(_) => ErrorKind::Validation,
            DashboardError::Collaborator(e) => e.kind(),
        }
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub probe: Duration,
    pub probe_timeout: Duration,
    pub relay_poll: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            probe: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            relay_poll: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Everything the dashboard talks to. Tests swap in fakes for the
/// generator, relay and search.
pub struct DashboardDeps {
    pub client: Client,
    pub endpoints: Endpoints,
    pub credentials: Arc<dyn CredentialStore>,
    pub relay_factory: Arc<dyn RelayChannelFactory>,
    pub generator: Option<Arc<dyn ReplyGenerator>>,
    pub search: Option<Arc<dyn WebSearch>>,
    pub files_root: PathBuf,
    pub intervals: Intervals,
}

impl DashboardDeps {
    pub fn new(
        client: Client,
        endpoints: Endpoints,
        credentials: Arc<dyn CredentialStore>,
        relay_factory: Arc<dyn RelayChannelFactory>,
    ) -> Self {
        Self {
            client,
            endpoints,
            credentials,
            relay_factory,
            generator: None,
            search: None,
            files_root: PathBuf::from("uploads"),
            intervals: Intervals::default(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_files_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.files_root = root.into();
        self
    }

    pub fn with_intervals(mut self, intervals: Intervals) -> Self {
        self.intervals = intervals;
        self
    }
}

/// Parameters of a one-off generation outside any stored agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub model_route: String,
    pub message: String,
    #[serde(default)]
    pub system_prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub agent_id: AgentId,
    pub model_route: String,
    pub reply: String,
    pub conversation_count: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub agents_online: usize,
    pub total_agents: usize,
    pub active_models: usize,
    pub total_models: usize,
    pub total_conversations: u64,
    pub running_relays: usize,
}

pub struct Dashboard {
    client: Client,
    endpoints: Endpoints,
    credentials: Arc<dyn CredentialStore>,
    relay_factory: Arc<dyn RelayChannelFactory>,
    generator: Arc<dyn ReplyGenerator>,
    search: Arc<dyn WebSearch>,
    files: FileStore,
    agents: Arc<AgentStore>,
    rooms: RoomStore,
    log: Arc<ConversationLog>,
    registry: Arc<ModelRegistry>,
    active_models: RwLock<ActiveModels>,
    prober: Prober,
    relays: RelaySupervisor,
    probe_service: Mutex<Option<ProbeService>>,
    /// Held across an agent state change and the matching poller start/stop
    lifecycle: Mutex<()>,
    intervals: Intervals,
}

impl Dashboard {
    pub fn new(deps: DashboardDeps) -> Self {
        let DashboardDeps {
            client,
            endpoints,
            credentials,
            relay_factory,
            generator,
            search,
            files_root,
            intervals,
        } = deps;

        let generator = generator.unwrap_or_else(|| {
            Arc::new(ResponseGenerator::new(
                client.clone(),
                endpoints.clone(),
                credentials.clone(),
            ))
        });
        let search = search
            .unwrap_or_else(|| Arc::new(DuckDuckGoSearch::new(client.clone(), DUCKDUCKGO_BASE)));

        let agents = Arc::new(AgentStore::new());
        let log = Arc::new(ConversationLog::new());
        let relays = RelaySupervisor::new(
            relay_factory.clone(),
            generator.clone(),
            agents.clone(),
            log.clone(),
            intervals.relay_poll,
        );
        let prober = Prober::new(
            client.clone(),
            local_backends(&endpoints),
            intervals.probe_timeout,
        );

        Self {
            client,
            endpoints,
            credentials,
            relay_factory,
            generator,
            search,
            files: FileStore::new(files_root),
            agents,
            rooms: RoomStore::new(),
            log,
            registry: Arc::new(ModelRegistry::new()),
            active_models: RwLock::new(ActiveModels::new()),
            prober,
            relays,
            probe_service: Mutex::new(None),
            lifecycle: Mutex::new(()),
            intervals,
        }
    }

    // Agents

    pub fn list_agents(&self) -> Vec<AgentConfig> {
        self.agents.list()
    }

    pub fn get_agent(&self, id: AgentId) -> DashboardResult<AgentConfig> {
        self.agents.get(id).ok_or(DashboardError::AgentNotFound(id))
    }

    async fn check_relay_token(&self, token: Option<&str>) -> DashboardResult<()> {
        if let Some(token) = token {
            let channel = self.relay_factory.channel(token);
            let bot = verify_token(channel.as_ref()).await?;
            info!("relay token verified for bot {}", bot.username.as_deref().unwrap_or(&bot.first_name));
        }
        Ok(())
    }

    pub async fn create_agent(&self, draft: AgentDraft) -> DashboardResult<AgentConfig> {
        draft.validate().map_err(DashboardError::Validation)?;
        self.check_relay_token(draft.relay_token()).await?;

        let agent = self.agents.insert(draft);
        info!("created agent {} ({})", agent.id, agent.name);
        Ok(agent)
    }

    /// Edit an agent. A running poller is restarted from the new config when
    /// its behaviour changes, and stopped when the relay no longer applies.
    pub async fn update_agent(&self, id: AgentId, draft: AgentDraft) -> DashboardResult<AgentConfig> {
        self.get_agent(id)?;
        draft.validate().map_err(DashboardError::Validation)?;
        self.check_relay_token(draft.relay_token()).await?;

        let _lifecycle = self.lifecycle.lock();
        let (previous, agent) = self
            .agents
            .update(id, draft)
            .ok_or(DashboardError::AgentNotFound(id))?;

        let wants_relay = agent.is_active() && agent.relay_token().is_some();
        if !wants_relay {
            self.relays.stop(id);
        } else if !self.relays.is_running(id) {
            self.relays.start(&agent);
        } else if previous.relay_settings_differ(&agent) {
            self.relays.restart(&agent);
        }

        Ok(agent)
    }

    pub fn delete_agent(&self, id: AgentId) -> DashboardResult<AgentConfig> {
        let _lifecycle = self.lifecycle.lock();
        self.relays.stop(id);
        let agent = self
            .agents
            .remove(id)
            .ok_or(DashboardError::AgentNotFound(id))?;
        self.rooms.remove_agent_everywhere(id);
        info!("deleted agent {} ({})", agent.id, agent.name);
        Ok(agent)
    }

    /// Whether the agent's model can serve requests right now.
    pub async fn check_model_available(&self, agent: &AgentConfig) -> DashboardResult<()> {
        let route = Route::parse(&agent.model_route)?;

        if let Some(backend) = route.local_backend() {
            if self.registry.results().is_empty() {
                self.refresh_models().await;
            }
            if !self.registry.is_reachable(backend) {
                return Err(DashboardError::ModelUnavailable(format!(
                    "{} is not reachable",
                    backend
                )));
            }
            if backend == BackendKind::Ollama {
                let listed = self.registry.snapshot().iter().any(|model| {
                    model.backend == BackendKind::Ollama && model.name.starts_with(route.model())
                });
                if !listed {
                    return Err(DashboardError::ModelUnavailable(format!(
                        "{} is not installed in Ollama",
                        route.model()
                    )));
                }
            }
        }

        if let Some(credential) = route.credential() {
            if !self.credentials.is_configured(credential) {
                return Err(DashboardError::ModelUnavailable(format!(
                    "{} is not configured",
                    credential
                )));
            }
        }

        Ok(())
    }

    pub async fn activate_agent(&self, id: AgentId) -> DashboardResult<AgentConfig> {
        let agent = self.get_agent(id)?;
        self.check_model_available(&agent).await?;

        let _lifecycle = self.lifecycle.lock();
        let agent = self
            .agents
            .set_state(id, AgentState::Active)
            .ok_or(DashboardError::AgentNotFound(id))?;
        if agent.relay_token().is_some() {
            self.relays.start(&agent);
        }
        info!("activated agent {} ({})", agent.id, agent.name);
        Ok(agent)
    }

    pub fn deactivate_agent(&self, id: AgentId) -> DashboardResult<AgentConfig> {
        let _lifecycle = self.lifecycle.lock();
        self.relays.stop(id);
        let agent = self
            .agents
            .set_state(id, AgentState::Inactive)
            .ok_or(DashboardError::AgentNotFound(id))?;
        info!("deactivated agent {} ({})", agent.id, agent.name);
        Ok(agent)
    }

    pub fn toggle_learning(&self, id: AgentId) -> DashboardResult<bool> {
        self.agents
            .toggle_learning(id)
            .ok_or(DashboardError::AgentNotFound(id))
    }

    /// Talk to an agent directly from the dashboard.
    pub async fn chat(&self, id: AgentId, message: &str) -> DashboardResult<ChatReply> {
        let agent = self.get_agent(id)?;
        if message.trim().is_empty() {
            return Err(DashboardError::Validation("message is empty".to_string()));
        }

        let reply = self.generator.generate(message, &agent).await?;
        let conversation_count = self.agents.increment_conversations(id).unwrap_or_default();
        self.log.append(ConversationRecord::new(
            id,
            Channel::Web,
            "dashboard",
            message,
            reply.clone(),
        ));

        Ok(ChatReply {
            agent_id: id,
            model_route: agent.model_route,
            reply,
            conversation_count,
            timestamp: Utc::now(),
        })
    }

    pub fn conversations(&self, id: AgentId) -> DashboardResult<Vec<ConversationRecord>> {
        self.get_agent(id)?;
        Ok(self.log.for_agent(id))
    }

    /// Generate once with ad-hoc settings, recording nothing.
    pub async fn generate(&self, request: GenerateRequest) -> DashboardResult<String> {
        if request.message.trim().is_empty() {
            return Err(DashboardError::Validation("message is empty".to_string()));
        }
        let agent = AgentDraft {
            name: "ad-hoc".to_string(),
            model_route: request.model_route,
            system_prompt: request.system_prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            ..Default::default()
        }
        .into_config(AgentId(0));
        Ok(self.generator.generate(&request.message, &agent).await?)
    }

    // Models

    /// The last discovered models with the user's active flags applied.
    pub fn models(&self) -> Vec<ModelDescriptor> {
        self.active_models.read().apply(&self.registry.snapshot())
    }

    pub fn set_model_active(
        &self,
        backend: BackendKind,
        name: &str,
        active: bool,
    ) -> DashboardResult<ModelDescriptor> {
        let key = ModelKey::new(backend, name);
        let model = self
            .registry
            .snapshot()
            .iter()
            .find(|model| model.key() == key)
            .cloned()
            .ok_or_else(|| {
                DashboardError::ModelUnavailable(format!("{} is not listed by {}", name, backend))
            })?;

        self.active_models.write().set(key, active);
        Ok(ModelDescriptor { active, ..model })
    }

    pub fn service_status(&self) -> Vec<BackendStatus> {
        self.registry.status()
    }

    /// Run one probe cycle now instead of waiting for the next one.
    pub async fn refresh_models(&self) -> Vec<ModelDescriptor> {
        let results = self.prober.probe_all().await;
        self.registry.publish(results);
        self.models()
    }

    fn ollama(&self) -> OllamaProvider {
        OllamaProvider::new(
            self.client.clone(),
            OllamaProviderConfig {
                host: self.endpoints.ollama.clone(),
            },
        )
    }

    pub async fn pull_model(&self, name: &str) -> DashboardResult<Vec<ModelDescriptor>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DashboardError::Validation("model name is required".to_string()));
        }
        info!("pulling {} into Ollama", name);
        self.ollama().pull_model(name).await?;
        Ok(self.refresh_models().await)
    }

    pub async fn delete_model(&self, name: &str) -> DashboardResult<Vec<ModelDescriptor>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DashboardError::Validation("model name is required".to_string()));
        }
        info!("deleting {} from Ollama", name);
        self.ollama().delete_model(name).await?;
        self.active_models
            .write()
            .set(ModelKey::new(BackendKind::Ollama, name), false);
        Ok(self.refresh_models().await)
    }

    // Rooms

    pub fn list_rooms(&self) -> Vec<RoomState> {
        self.rooms.list()
    }

    pub fn get_room(&self, id: RoomId) -> DashboardResult<RoomState> {
        self.rooms.get(id).ok_or(DashboardError::RoomNotFound(id))
    }

    pub fn create_room(&self, draft: RoomDraft) -> DashboardResult<RoomState> {
        if draft.name.trim().is_empty() {
            return Err(DashboardError::Validation("room name is required".to_string()));
        }
        for agent_id in &draft.agent_ids {
            self.get_agent(*agent_id)?;
        }
        let room = self.rooms.create(draft);
        info!("created room {} ({})", room.id, room.name);
        Ok(room)
    }

    pub fn add_agent_to_room(&self, room_id: RoomId, agent_id: AgentId) -> DashboardResult<RoomState> {
        self.get_agent(agent_id)?;
        self.rooms
            .add_agent(room_id, agent_id)
            .ok_or(DashboardError::RoomNotFound(room_id))?;
        self.get_room(room_id)
    }

    pub fn remove_agent_from_room(
        &self,
        room_id: RoomId,
        agent_id: AgentId,
    ) -> DashboardResult<RoomState> {
        self.rooms
            .remove_agent(room_id, agent_id)
            .ok_or(DashboardError::RoomNotFound(room_id))?;
        self.get_room(room_id)
    }

    /// Post a user message and collect one reply from every active member.
    /// Returns the messages appended to the room, user message first.
    pub async fn send_room_message(&self, room_id: RoomId, text: &str) -> DashboardResult<Vec<RoomMessage>> {
        let room = self.get_room(room_id)?;
        if text.trim().is_empty() {
            return Err(DashboardError::Validation("message is empty".to_string()));
        }

        let members: Vec<AgentConfig> = room
            .active_agent_ids
            .iter()
            .filter_map(|id| self.agents.get(*id))
            .filter(AgentConfig::is_active)
            .collect();

        let replies = join_all(
            members
                .iter()
                .map(|agent| self.generator.generate(text, agent)),
        )
        .await;

        let mut messages = vec![RoomMessage::user(self.rooms.next_message_id(), text)];
        for (agent, reply) in members.iter().zip(replies) {
            let id = self.rooms.next_message_id();
            match reply {
                Ok(reply) => {
                    self.agents.increment_conversations(agent.id);
                    self.log.append(
                        ConversationRecord::new(agent.id, Channel::Room, "dashboard", text, reply.clone())
                            .in_room(room_id),
                    );
                    messages.push(RoomMessage::agent(id, agent.id, &agent.model_route, reply));
                }
                Err(e) => {
                    warn!("agent {} failed to answer in room {}: {}", agent.id, room_id, e);
                    messages.push(
                        RoomMessage::agent(id, agent.id, &agent.model_route, e.reply_text()).failed(),
                    );
                }
            }
        }

        self.rooms
            .push_messages(room_id, messages.clone())
            .ok_or(DashboardError::RoomNotFound(room_id))?;
        Ok(messages)
    }

    pub fn export_room(&self, id: RoomId) -> DashboardResult<RoomExport> {
        let room = self.get_room(id)?;
        Ok(RoomExport::from_room(&room, Utc::now()))
    }

    pub fn delete_room(&self, id: RoomId) -> DashboardResult<RoomState> {
        self.rooms.remove(id).ok_or(DashboardError::RoomNotFound(id))
    }

    // Credentials

    pub fn set_credential(&self, name: &str, value: &str) -> DashboardResult<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DashboardError::Validation(format!("{} must not be empty", name)));
        }
        self.credentials.set(name, value)?;
        info!("credential {} updated", name);
        Ok(())
    }

    pub fn clear_credential(&self, name: &str) -> DashboardResult<bool> {
        if !KNOWN_CREDENTIALS.contains(&name) {
            return Err(CredentialError::UnknownName(name.to_string()).into());
        }
        Ok(self.credentials.clear(name))
    }

    /// Which credentials are usable. Values are never exposed.
    pub fn credential_status(&self) -> BTreeMap<String, bool> {
        KNOWN_CREDENTIALS
            .iter()
            .map(|name| (name.to_string(), self.credentials.is_configured(name)))
            .collect()
    }

    // Collaborators

    pub async fn search(&self, query: &str, limit: Option<usize>) -> DashboardResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(DashboardError::Validation("query is empty".to_string()));
        }
        Ok(self
            .search
            .search(query.trim(), limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .await?)
    }

    pub async fn upload_file(
        &self,
        name: &str,
        bytes: &[u8],
        destination: Destination,
        agent_id: Option<AgentId>,
    ) -> DashboardResult<FileDescriptor> {
        if let Some(agent_id) = agent_id {
            self.get_agent(agent_id)?;
        }
        Ok(self.files.upload(name, bytes, destination, agent_id).await?)
    }

    pub fn list_files(
        &self,
        destination: Option<Destination>,
        agent_id: Option<AgentId>,
    ) -> Vec<FileDescriptor> {
        self.files.list(destination, agent_id)
    }

    /// The stored bytes, for download.
    pub async fn read_file(&self, id: &str) -> DashboardResult<(FileDescriptor, Vec<u8>)> {
        self.files
            .read(id)
            .await?
            .ok_or_else(|| DashboardError::FileNotFound(id.to_string()))
    }

    /// The file as text for an agent to read.
    pub async fn file_content(&self, id: &str) -> DashboardResult<FileContent> {
        self.files
            .content(id)
            .await?
            .ok_or_else(|| DashboardError::FileNotFound(id.to_string()))
    }

    pub async fn delete_file(&self, id: &str) -> DashboardResult<()> {
        if self.files.delete(id).await? {
            Ok(())
        } else {
            Err(DashboardError::FileNotFound(id.to_string()))
        }
    }

    // Stats and lifecycle

    pub fn stats(&self) -> DashboardStats {
        let agents = self.agents.snapshot();
        let models = self.models();
        DashboardStats {
            agents_online: agents.values().filter(|agent| agent.is_active()).count(),
            total_agents: agents.len(),
            active_models: models.iter().filter(|model| model.active).count(),
            total_models: models.len(),
            total_conversations: agents.values().map(|agent| agent.conversation_count).sum(),
            running_relays: self.relays.running_agents().len(),
        }
    }

    pub fn relay_running(&self, id: AgentId) -> bool {
        self.relays.is_running(id)
    }

    /// Start the recurring probe cycle. Calling it again is a no-op.
    pub fn start_background(&self) {
        let mut service = self.probe_service.lock();
        if service.as_ref().is_some_and(ProbeService::is_running) {
            return;
        }
        *service = Some(ProbeService::spawn(
            self.prober.clone(),
            self.registry.clone(),
            self.intervals.probe,
        ));
    }

    pub fn shutdown(&self) {
        if let Some(service) = self.probe_service.lock().take() {
            service.shutdown();
        }
        self.relays.shutdown();
        info!("dashboard background tasks stopped");
    }
}
