use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RelayChannel, RelayChannelFactory, Update};
use crate::generator::ReplyGenerator;
use crate::models::agent::{AgentConfig, AgentId, Channel, ConversationRecord};
use crate::store::{AgentStore, ConversationLog};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The fetch, generate, deliver, advance loop for one agent.
///
/// The worker works from the agent snapshot it was started with; a config
/// change restarts the worker rather than mutating it. The cursor only ever
/// moves forward and is advanced past every update it has seen, delivered
/// or not, so a failing update is never redelivered.
pub struct RelayWorker {
    agent: AgentConfig,
    channel: Arc<dyn RelayChannel>,
    generator: Arc<dyn ReplyGenerator>,
    agents: Arc<AgentStore>,
    log: Arc<ConversationLog>,
    cancel: CancellationToken,
    cursor: i64,
}

impl RelayWorker {
    pub fn new(
        agent: AgentConfig,
        channel: Arc<dyn RelayChannel>,
        generator: Arc<dyn ReplyGenerator>,
        agents: Arc<AgentStore>,
        log: Arc<ConversationLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            agent,
            channel,
            generator,
            agents,
            log,
            cancel,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Run one poll cycle. Returns the number of updates consumed.
    pub async fn tick(&mut self) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }

        let updates = match self.channel.get_updates(self.cursor).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("agent {} relay poll failed: {}", self.agent.id, e);
                return 0;
            }
        };

        let mut consumed = 0;
        for update in updates {
            if self.cancel.is_cancelled() {
                break;
            }
            // Stale updates can come back if the relay ignores the offset
            if update.update_id < self.cursor {
                continue;
            }
            if !self.handle(&update).await {
                break;
            }
            self.cursor = update.update_id + 1;
            consumed += 1;
        }
        consumed
    }

    /// Returns false when cancellation interrupted the update.
    async fn handle(&self, update: &Update) -> bool {
        let Some((message, text)) = update.text_message() else {
            debug!("agent {} skipping update {} without text", self.agent.id, update.update_id);
            return true;
        };

        let reply = self.generator.generate(text, &self.agent).await;
        if self.cancel.is_cancelled() {
            return false;
        }

        let (reply_text, succeeded) = match reply {
            Ok(reply) => (reply, true),
            Err(e) => {
                warn!("agent {} failed to generate a relay reply: {}", self.agent.id, e);
                (e.reply_text(), false)
            }
        };

        if let Err(e) = self.channel.send_message(message.chat.id, &reply_text).await {
            warn!(
                "agent {} could not deliver reply to chat {}: {}",
                self.agent.id, message.chat.id, e
            );
        }
        if self.cancel.is_cancelled() {
            return false;
        }

        if succeeded {
            self.agents.increment_conversations(self.agent.id);
            self.log.append(ConversationRecord::new(
                self.agent.id,
                Channel::Relay,
                message.sender_name(),
                text,
                reply_text,
            ));
        }
        true
    }

    /// Tick every `interval` until cancelled. Ticks never overlap: a slow
    /// tick pushes the next one back.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }
        debug!("agent {} relay worker exited at cursor {}", self.agent.id, self.cursor);
    }
}

struct RunningWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningWorker {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Owns every running relay worker, at most one per agent.
pub struct RelaySupervisor {
    factory: Arc<dyn RelayChannelFactory>,
    generator: Arc<dyn ReplyGenerator>,
    agents: Arc<AgentStore>,
    log: Arc<ConversationLog>,
    interval: Duration,
    workers: Mutex<HashMap<AgentId, RunningWorker>>,
}

impl RelaySupervisor {
    pub fn new(
        factory: Arc<dyn RelayChannelFactory>,
        generator: Arc<dyn ReplyGenerator>,
        agents: Arc<AgentStore>,
        log: Arc<ConversationLog>,
        interval: Duration,
    ) -> Self {
        Self {
            factory,
            generator,
            agents,
            log,
            interval,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Start polling for `agent`. Returns false, doing nothing, when a
    /// worker is already running for it or it has no usable relay token.
    pub fn start(&self, agent: &AgentConfig) -> bool {
        let Some(token) = agent.relay_token() else {
            warn!("agent {} has no relay token, not starting a poller", agent.id);
            return false;
        };

        let mut workers = self.workers.lock();
        if workers.contains_key(&agent.id) {
            debug!("agent {} relay poller already running", agent.id);
            return false;
        }

        let cancel = CancellationToken::new();
        let worker = RelayWorker::new(
            agent.clone(),
            self.factory.channel(token),
            self.generator.clone(),
            self.agents.clone(),
            self.log.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run(self.interval));
        workers.insert(agent.id, RunningWorker { cancel, handle });

        info!("started relay poller for agent {} ({})", agent.id, agent.name);
        true
    }

    /// Stop the worker for `agent_id`. Cancellation is immediate: whatever
    /// the worker had in flight is discarded. Returns false when nothing was
    /// running.
    pub fn stop(&self, agent_id: AgentId) -> bool {
        let Some(worker) = self.workers.lock().remove(&agent_id) else {
            return false;
        };
        worker.stop();
        info!("stopped relay poller for agent {}", agent_id);
        true
    }

    /// Stop then start from `agent`, so the new worker sees the new config.
    pub fn restart(&self, agent: &AgentConfig) -> bool {
        self.stop(agent.id);
        self.start(agent)
    }

    pub fn is_running(&self, agent_id: AgentId) -> bool {
        self.workers.lock().contains_key(&agent_id)
    }

    pub fn running_agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.workers.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().drain().collect();
        let count = workers.len();
        for (_, worker) in workers {
            worker.stop();
        }
        if count > 0 {
            info!("stopped {} relay pollers", count);
        }
    }
}

impl Drop for RelaySupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
