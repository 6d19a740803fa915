//! The turn orchestrator
//!
//! An [`Engine`] owns the injected collaborators and drives one thread's state
//! through the stage graph until the turn ends or suspends. Turns on the same
//! thread are serialized; distinct threads run concurrently.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use desk_ai::{AnswerGenerator, Classifier, Embedder, Message, TaskDecomposer};
use tokio::sync::broadcast;

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::FlowEvent;
use crate::retrieval::EvidenceRetriever;
use crate::stage::{self, Stage};
use crate::stages::{self, StageContext};
use crate::state::{Action, ConversationState, StateUpdate, Status, TurnInput};
use crate::store::{CacheStore, EvidenceStore, StateStore, TicketStore};

/// Everything the stages call out to
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub decomposer: Arc<dyn TaskDecomposer>,
    pub answerer: Arc<dyn AnswerGenerator>,
    pub embedder: Arc<dyn Embedder>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub cache: Arc<dyn CacheStore>,
    pub tickets: Arc<dyn TicketStore>,
}

/// Runs conversation turns against a state store
pub struct Engine {
    config: EngineConfig,
    classifier: Arc<dyn Classifier>,
    decomposer: Arc<dyn TaskDecomposer>,
    answerer: Arc<dyn AnswerGenerator>,
    tickets: Arc<dyn TicketStore>,
    retriever: EvidenceRetriever,
    cache: ResultCache,
    states: Arc<dyn StateStore>,
    event_tx: broadcast::Sender<FlowEvent>,
    /// One async lock per thread id
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Engine {
    /// Create a new engine
    pub fn new(collaborators: Collaborators, states: Arc<dyn StateStore>, config: EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let retriever = EvidenceRetriever::new(
            collaborators.embedder.clone(),
            collaborators.evidence,
            config.retrieval.clone(),
        );
        let cache = ResultCache::new(
            collaborators.embedder,
            collaborators.cache,
            config.cache.clone(),
        );
        Self {
            config,
            classifier: collaborators.classifier,
            decomposer: collaborators.decomposer,
            answerer: collaborators.answerer,
            tickets: collaborators.tickets,
            retriever,
            cache,
            states,
            event_tx,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to flow events
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tickets(&self) -> &dyn TicketStore {
        self.tickets.as_ref()
    }

    /// The persisted state of a thread, if it has one
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        self.states.load(thread_id).await
    }

    /// Thread ids with persisted state
    pub async fn threads(&self) -> Result<Vec<String>> {
        self.states.list().await
    }

    /// Run one turn: merge the utterance onto the thread's snapshot, drive the
    /// stages, persist and return the resulting state.
    ///
    /// Stage faults end up in the returned state; only store failures and
    /// malformed input are errors.
    pub async fn run_turn(&self, input: TurnInput) -> Result<ConversationState> {
        let thread_id = input.thread_id.trim();
        if thread_id.is_empty() {
            return Err(Error::InvalidInput("thread id must not be empty".into()));
        }

        let lock = self.thread_lock(thread_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(thread_id, &input).await
        };
        drop(lock);
        self.release_lock(thread_id);
        result
    }

    async fn run_locked(&self, thread_id: &str, input: &TurnInput) -> Result<ConversationState> {
        let mut state = self.states.load(thread_id).await?.unwrap_or_default();
        state.begin_turn(input)?;

        let _ = self.event_tx.send(FlowEvent::TurnStart {
            thread_id: thread_id.to_string(),
        });
        tracing::debug!("Thread {}: turn started ({} chars)", thread_id, input.utterance.len());

        let ctx = self.stage_context(thread_id, &input.user_id);
        self.drive(&ctx, &mut state).await;

        self.states.save(thread_id, &state).await?;

        if state.status == Status::AwaitingUser {
            tracing::info!("Thread {}: waiting for the user", thread_id);
            let _ = self.event_tx.send(FlowEvent::Suspended {
                thread_id: thread_id.to_string(),
            });
        } else {
            tracing::info!("Thread {}: turn finished with {}", thread_id, state.status);
        }
        let _ = self.event_tx.send(FlowEvent::TurnEnd {
            thread_id: thread_id.to_string(),
            status: state.status,
        });

        Ok(state)
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget a thread's lock once no turn holds or waits on it
    fn release_lock(&self, thread_id: &str) {
        let mut locks = self.locks.lock();
        if locks.get(thread_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(thread_id);
        }
    }

    pub(crate) fn stage_context<'a>(&'a self, thread_id: &'a str, user_id: &'a str) -> StageContext<'a> {
        StageContext {
            thread_id,
            user_id,
            config: &self.config,
            classifier: self.classifier.as_ref(),
            decomposer: self.decomposer.as_ref(),
            answerer: self.answerer.as_ref(),
            tickets: self.tickets.as_ref(),
            retriever: &self.retriever,
            cache: &self.cache,
            events: &self.event_tx,
        }
    }

    /// Walk the stage graph from the entry stage until a stage ends the turn
    async fn drive(&self, ctx: &StageContext<'_>, state: &mut ConversationState) {
        let mut stage = Stage::ENTRY;
        let mut transitions = 0usize;

        loop {
            transitions += 1;
            if transitions > self.config.max_transitions {
                let detail = "transition limit exceeded";
                tracing::warn!("Thread {}: {} at {}", ctx.thread_id, detail, stage);
                ctx.emit(FlowEvent::Error {
                    thread_id: ctx.thread_id.to_string(),
                    stage,
                    message: format!("engine_error: {}", detail),
                });
                state.apply(
                    StateUpdate::new()
                        .message(Message::assistant(format!("Request failed: {}", detail)))
                        .action(Action::Reject)
                        .status(Status::Failed)
                        .error(format!("engine_error: {}", detail)),
                );
                return;
            }

            ctx.emit(FlowEvent::StageStart {
                thread_id: ctx.thread_id.to_string(),
                stage,
            });

            match stages::run(stage, ctx, state).await {
                Ok(update) => state.apply(update),
                Err(failure) => {
                    tracing::warn!("Thread {}: {}", ctx.thread_id, failure);
                    ctx.emit(FlowEvent::Error {
                        thread_id: ctx.thread_id.to_string(),
                        stage,
                        message: failure.to_string(),
                    });

                    if stage == Stage::Respond {
                        // The composer itself failed: fall back to a fixed reply.
                        state.apply(
                            StateUpdate::new()
                                .message(Message::assistant(format!("Request failed: {}", failure.detail)))
                                .status(Status::Failed)
                                .error(failure.to_string()),
                        );
                        self.stage_end(ctx, stage, state);
                        return;
                    }

                    state.apply(failure.into_update());
                    self.stage_end(ctx, stage, state);
                    stage = Stage::Respond;
                    continue;
                }
            }

            self.stage_end(ctx, stage, state);
            match stage::next(stage, state) {
                Some(next) => {
                    tracing::debug!("Thread {}: {} -> {}", ctx.thread_id, stage, next);
                    stage = next;
                }
                None => return,
            }
        }
    }

    fn stage_end(&self, ctx: &StageContext<'_>, stage: Stage, state: &ConversationState) {
        ctx.emit(FlowEvent::StageEnd {
            thread_id: ctx.thread_id.to_string(),
            stage,
            status: state.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeclinePolicy;
    use crate::stages::response::{
        DECLINED_REPLY, GENERAL_SYSTEM_PROMPT, GREETING_REPLY, NOT_FOUND_REPLY, POLICY_SYSTEM_PROMPT,
    };
    use crate::state::{Field, TaskStatus};
    use crate::testing::Fakes;
    use desk_ai::{Intent, ServiceType, SplitTask};

    fn two_ticket_split() -> Vec<SplitTask> {
        vec![
            SplitTask::new("Install VS 2024", Intent::ServiceRequest, ServiceType::It),
            SplitTask::new("my VPN is not working", Intent::Incident, ServiceType::It),
        ]
    }

    async fn turn(engine: &Engine, thread: &str, text: &str) -> ConversationState {
        engine.run_turn(TurnInput::new(thread, text)).await.unwrap()
    }

    #[tokio::test]
    async fn test_single_incident_creates_ticket() {
        let fakes = Fakes::new().with_split(vec![SplitTask::new(
            "VPN is not working",
            Intent::Incident,
            ServiceType::It,
        )]);
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "VPN is not working").await;

        assert_eq!(state.status, Status::Completed);
        assert!(!state.awaiting_confirmation);
        let id = state.ticket_id.clone().unwrap();
        assert_eq!(state.task_ticket_ids, vec![id.clone()]);
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].status, TaskStatus::Completed);
        assert_eq!(state.current_task_index, 1);

        let reply = state.last_reply().unwrap();
        assert!(reply.starts_with("Ticket Created\nID: "));
        assert!(reply.contains("Department: IT"));
        assert!(reply.contains("Priority: medium"));

        let ticket = fakes.tickets.get(&id).await.unwrap();
        assert_eq!(ticket.description, "VPN is not working");
        assert_eq!(ticket.user_id, "anonymous");
    }

    #[tokio::test]
    async fn test_multi_ticket_confirm_yes() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let engine = fakes.engine();

        let first = turn(&engine, "t1", "Install VS 2024 and my VPN is not working").await;
        assert!(first.awaiting_confirmation);
        assert_eq!(first.status, Status::AwaitingUser);
        let prompt = first.last_reply().unwrap();
        assert!(prompt.contains("1. [SERVICE_REQUEST] Install VS 2024"));
        assert!(prompt.contains("2. [INCIDENT] my VPN is not working"));
        assert!(fakes.tickets.is_empty());

        let second = turn(&engine, "t1", "yes").await;
        assert!(second.confirmed);
        assert!(!second.awaiting_confirmation);
        assert_eq!(second.status, Status::Completed);
        assert!(second.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(second.task_ticket_ids.len(), 2);
        assert_eq!(fakes.tickets.len(), 2);
        assert_eq!(fakes.split_calls(), 1);

        let descriptions: Vec<String> = {
            let mut out = Vec::new();
            for id in &second.task_ticket_ids {
                out.push(fakes.tickets.get(id).await.unwrap().description);
            }
            out
        };
        assert_eq!(descriptions, vec!["Install VS 2024", "my VPN is not working"]);
    }

    #[tokio::test]
    async fn test_multi_ticket_confirm_no() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let engine = fakes.engine();
        turn(&engine, "t1", "Install VS 2024 and my VPN is not working").await;

        let state = turn(&engine, "t1", "no").await;
        assert!(state.tasks.is_empty());
        assert_eq!(state.status, Status::Completed);
        assert_eq!(state.last_reply(), Some(DECLINED_REPLY));
        assert!(fakes.tickets.is_empty());
        assert_eq!(state.current_task_index, 0);
        assert_eq!(state.intent, Intent::General);
    }

    #[tokio::test]
    async fn test_decline_with_clear_queue_policy() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let config = EngineConfig {
            decline_policy: DeclinePolicy::ClearQueue,
            ..Default::default()
        };
        let engine = fakes.engine_with(config);
        turn(&engine, "t1", "Install VS 2024 and my VPN is not working").await;
        let state = turn(&engine, "t1", "cancel").await;
        assert!(state.tasks.is_empty());
        assert_eq!(state.status, Status::Completed);
        assert_eq!(state.last_reply(), Some(DECLINED_REPLY));
    }

    #[tokio::test]
    async fn test_ambiguous_reply_asks_again() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let engine = fakes.engine();
        let first = turn(&engine, "t1", "Install VS 2024 and my VPN is not working").await;
        let second = turn(&engine, "t1", "hmm, not sure").await;
        assert_eq!(second.status, Status::AwaitingUser);
        assert!(second.awaiting_confirmation);
        assert_eq!(second.last_reply(), first.last_reply());
        assert_eq!(second.tasks.len(), 2);

        let third = turn(&engine, "t1", "Yes").await;
        assert_eq!(third.task_ticket_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_policy_below_threshold_answers_not_found() {
        let fakes = Fakes::new()
            .with_split(vec![SplitTask::new(
                "What is the parental leave policy?",
                Intent::PolicyQuery,
                ServiceType::Hr,
            )])
            .with_corpus(&["Laptops are refreshed every three years."]);
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "What is the parental leave policy?").await;
        assert!(!state.rag_found);
        assert_eq!(state.last_reply(), Some(NOT_FOUND_REPLY));
        assert_eq!(state.status, Status::Completed);
        assert!(state.ticket_id.is_none());
        assert!(fakes.tickets.is_empty());
        assert_eq!(fakes.answer_calls(), 0);
    }

    #[tokio::test]
    async fn test_policy_answer_from_evidence() {
        let fakes = Fakes::new()
            .with_split(vec![SplitTask::new(
                "How many days of annual leave do employees receive?",
                Intent::PolicyQuery,
                ServiceType::Hr,
            )])
            .with_corpus(&["How many days of annual leave do employees receive? 25 days."])
            .with_answer("25 days per year.");
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "How many days of annual leave do employees receive?").await;
        assert!(state.rag_found);
        assert_eq!(state.last_reply(), Some("25 days per year."));
    }

    #[tokio::test]
    async fn test_general_answer_is_not_reused_for_policy() {
        let query = "How many days of annual leave do employees receive?";
        let fakes = Fakes::new()
            .with_split(vec![SplitTask::new(query, Intent::General, ServiceType::General)])
            .with_split(vec![SplitTask::new(query, Intent::PolicyQuery, ServiceType::Hr)])
            .with_corpus(&["How many days of annual leave do employees receive? 25 days."]);
        let engine = fakes.engine();

        turn(&engine, "general", query).await;
        let request = fakes.last_answer_request().unwrap();
        assert_eq!(request.system, GENERAL_SYSTEM_PROMPT);

        let state = turn(&engine, "policy", query).await;
        assert!(state.rag_found);
        assert_eq!(fakes.answer_calls(), 2);
        let request = fakes.last_answer_request().unwrap();
        assert_eq!(request.system, POLICY_SYSTEM_PROMPT);
        assert!(request.context.is_some());
    }

    #[tokio::test]
    async fn test_invalid_department_fails_without_ticket() {
        let fakes = Fakes::new().with_split(vec![SplitTask::new(
            "Set up a campaign dashboard",
            Intent::Incident,
            ServiceType::It,
        )]);
        let engine = fakes.engine();
        let input = TurnInput::new("t1", "Set up a campaign dashboard").with_field("department", "Marketing");
        let state = engine.run_turn(input).await.unwrap();

        assert_eq!(state.status, Status::Failed);
        assert_eq!(state.action, Action::Reject);
        assert_eq!(state.error.as_deref(), Some("invalid_department: Marketing"));
        assert_eq!(
            state.last_reply(),
            Some("Request rejected. Reason: invalid_department: Marketing")
        );
        assert!(fakes.tickets.is_empty());
    }

    #[tokio::test]
    async fn test_failed_queue_is_retired_on_next_request() {
        let fakes = Fakes::new().with_split(vec![
            SplitTask::new("Set up a campaign dashboard", Intent::Incident, ServiceType::It),
            SplitTask::new("Reset my VPN token", Intent::Incident, ServiceType::It),
        ]);
        let engine = fakes.engine();
        let input = TurnInput::new("t1", "dashboard and VPN").with_field("department", "Marketing");
        let first = engine.run_turn(input).await.unwrap();
        // two ticket tasks ask for confirmation before anything else
        assert_eq!(first.status, Status::AwaitingUser);

        let second = turn(&engine, "t1", "yes").await;
        assert_eq!(second.status, Status::Failed);
        assert!(second.tasks[1].is_pending());

        let third = turn(&engine, "t1", "hello").await;
        assert_eq!(third.status, Status::Completed);
        assert_eq!(fakes.split_calls(), 2);
        assert_eq!(third.tasks.len(), 1);
        assert_eq!(third.tasks[0].sub_query, "hello");
        assert!(third.error.is_none());
    }

    #[tokio::test]
    async fn test_slot_filling_resumes() {
        let fakes = Fakes::new().with_split(vec![SplitTask::new(
            "Process my expense claim",
            Intent::ServiceRequest,
            ServiceType::Finance,
        )]);
        let engine = fakes.engine();

        let first = turn(&engine, "t1", "Process my expense claim").await;
        assert_eq!(first.status, Status::AwaitingUser);
        assert_eq!(first.missing_fields, vec![Field::AmountContext]);
        assert_eq!(
            first.last_reply(),
            Some("I need additional details before I can proceed.\nMissing fields: amount_context")
        );

        let second = turn(&engine, "t1", "The amount is 120 USD").await;
        assert_eq!(second.status, Status::Completed);
        assert!(second.ticket_id.is_some());
        assert_eq!(fakes.split_calls(), 1);
        let payload = second.ticket_payload.unwrap();
        assert_eq!(payload.description, "Process my expense claim");
        assert_eq!(payload.department, "Finance");
    }

    #[tokio::test]
    async fn test_slot_filling_on_a_later_task() {
        let fakes = Fakes::new().with_split(vec![
            SplitTask::new("VPN is not working", Intent::Incident, ServiceType::It),
            SplitTask::new("Process my expense claim", Intent::ServiceRequest, ServiceType::Finance),
        ]);
        let engine = fakes.engine();

        let first = turn(&engine, "t1", "VPN is not working and process my expense claim").await;
        assert!(first.awaiting_confirmation);

        let second = turn(&engine, "t1", "yes").await;
        assert_eq!(second.status, Status::AwaitingUser);
        assert_eq!(second.current_task_index, 1);
        assert_eq!(second.missing_fields, vec![Field::AmountContext]);
        assert_eq!(second.task_ticket_ids.len(), 1);
        assert_eq!(second.tasks[0].status, TaskStatus::Completed);
        assert_eq!(
            second.last_reply(),
            Some("I need additional details before I can proceed.\nMissing fields: amount_context")
        );

        let third = turn(&engine, "t1", "The amount is 120 USD").await;
        assert_eq!(third.status, Status::Completed);
        assert_eq!(third.task_ticket_ids.len(), 2);
        assert!(third.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(fakes.split_calls(), 1);
        assert_eq!(fakes.tickets.len(), 2);

        let expense = fakes.tickets.get(&third.task_ticket_ids[1]).await.unwrap();
        assert_eq!(expense.description, "Process my expense claim");
        assert_eq!(expense.department, "Finance");
    }

    #[tokio::test]
    async fn test_supplied_field_completes_request() {
        let fakes = Fakes::new().with_split(vec![SplitTask::new(
            "Process my expense claim",
            Intent::ServiceRequest,
            ServiceType::Finance,
        )]);
        let engine = fakes.engine();
        turn(&engine, "t1", "Process my expense claim").await;
        let state = engine
            .run_turn(TurnInput::new("t1", "").with_field("amount_context", "120 EUR"))
            .await
            .unwrap();
        assert_eq!(state.status, Status::Completed);
        assert_eq!(state.task_ticket_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_utterance_greets() {
        let fakes = Fakes::new();
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "   ").await;
        assert_eq!(state.last_reply(), Some(GREETING_REPLY));
        assert_eq!(state.status, Status::Completed);
        assert_eq!(fakes.split_calls(), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_is_reported() {
        let fakes = Fakes::new()
            .with_split(vec![SplitTask::new(
                "VPN is not working",
                Intent::Incident,
                ServiceType::It,
            )])
            .with_failing_tickets();
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "VPN is not working").await;
        assert_eq!(state.status, Status::Failed);
        assert!(state.ticket_id.is_none());
        assert!(
            state
                .last_reply()
                .unwrap()
                .starts_with("Request rejected. Reason: execution_error: ")
        );
    }

    #[tokio::test]
    async fn test_response_failure_appends_fixed_message() {
        let fakes = Fakes::new().with_answer_error();
        let engine = fakes.engine();
        let state = turn(&engine, "t1", "hello").await;
        assert_eq!(state.status, Status::Failed);
        assert!(state.error.as_deref().unwrap().starts_with("response_error: "));
        assert!(state.last_reply().unwrap().starts_with("Request failed: "));
        let assistant_replies = state.messages.iter().filter(|m| m.is_assistant()).count();
        assert_eq!(assistant_replies, 1);
    }

    #[tokio::test]
    async fn test_transition_limit() {
        let fakes = Fakes::new();
        let config = EngineConfig {
            max_transitions: 2,
            ..Default::default()
        };
        let engine = fakes.engine_with(config);
        let state = turn(&engine, "t1", "hello").await;
        assert_eq!(state.status, Status::Failed);
        assert_eq!(
            state.error.as_deref(),
            Some("engine_error: transition limit exceeded")
        );
        assert_eq!(
            state.last_reply(),
            Some("Request failed: transition limit exceeded")
        );
    }

    #[tokio::test]
    async fn test_state_persists_across_engines() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let first_engine = fakes.engine();
        let first = turn(&first_engine, "t1", "Install VS 2024 and my VPN is not working").await;
        assert_eq!(first_engine.snapshot("t1").await.unwrap(), Some(first));

        // a fresh engine over the same stores resumes the suspended turn
        let second_engine = fakes.engine();
        let state = turn(&second_engine, "t1", "yes").await;
        assert_eq!(state.task_ticket_ids.len(), 2);
        assert_eq!(second_engine.threads().await.unwrap(), vec!["t1"]);
        assert!(second_engine.snapshot("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threads_run_independently() {
        let mut fakes = Fakes::new();
        for _ in 0..8 {
            fakes = fakes.with_split(vec![SplitTask::new(
                "VPN is not working",
                Intent::Incident,
                ServiceType::It,
            )]);
        }
        let engine = fakes.engine();
        let turns = (0..8).map(|i| {
            let engine = &engine;
            async move { turn(engine, &format!("thread-{}", i), "VPN is not working").await }
        });
        let states = futures::future::join_all(turns).await;

        assert!(states.iter().all(|s| s.ticket_id.is_some()));
        assert_eq!(fakes.tickets.len(), 8);
        assert_eq!(engine.threads().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_same_thread_turns_are_serialized() {
        let fakes = Fakes::new();
        let engine = fakes.engine();
        let (a, b) = tokio::join!(turn(&engine, "t1", "hello"), turn(&engine, "t1", "hi again"));
        let longest = if a.messages.len() > b.messages.len() { a } else { b };
        assert_eq!(longest.messages.len(), 4);
        let users = longest.messages.iter().filter(|m| m.is_user()).count();
        assert_eq!(users, 2);
    }

    #[tokio::test]
    async fn test_events_bracket_the_turn() {
        let fakes = Fakes::new().with_split(two_ticket_split());
        let engine = fakes.engine();
        let mut events = engine.subscribe();
        turn(&engine, "t1", "Install VS 2024 and my VPN is not working").await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received.first(), Some(FlowEvent::TurnStart { .. })));
        assert!(received.last().unwrap().is_terminal());
        assert!(received.iter().any(|e| matches!(e, FlowEvent::Suspended { .. })));
        assert!(received.iter().all(|e| e.thread_id() == "t1"));
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let fakes = Fakes::new();
        let engine = fakes.engine();
        let err = engine.run_turn(TurnInput::new("  ", "hi")).await.unwrap_err();
        assert!(err.is_invalid_input());

        let err = engine
            .run_turn(TurnInput::new("t1", "hi").with_field("colour", "blue"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(engine.snapshot("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_idle_thread_locks_are_released() {
        let fakes = Fakes::new();
        let engine = fakes.engine();
        let turns = (0..4).map(|i| {
            let engine = &engine;
            async move { turn(engine, &format!("thread-{}", i % 2), "hello").await }
        });
        futures::future::join_all(turns).await;
        assert!(engine.locks.lock().is_empty());

        engine.run_turn(TurnInput::new("t1", "hi").with_field("colour", "blue")).await.unwrap_err();
        assert!(engine.locks.lock().is_empty());
    }
}
