//! Conversation state threaded through the workflow stages.
//!
//! One [`ConversationState`] is persisted per thread. Stages never mutate it
//! directly: each returns a [`StateUpdate`] that the engine merges with
//! [`ConversationState::apply`]. Scalars replace, `messages` and
//! `task_ticket_ids` append, and `missing_fields` is always re-derived.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use desk_ai::{Intent, Message, ServiceType, SplitTask};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Error tag recorded when the user declines a multi-task confirmation.
/// It drives response wording only and is not a failure.
pub const DECLINED_TAG: &str = "user_declined_multi_ticket_confirmation";

/// What the workflow has decided to do for the active task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Answer,
    AskUser,
    CreateTicket,
    Reject,
    #[default]
    None,
}

/// Where the conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    InProgress,
    ReadyForDecision,
    /// The turn stopped and waits for a new utterance
    AwaitingUser,
    Validated,
    Executed,
    Completed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::InProgress => "IN_PROGRESS",
            Status::ReadyForDecision => "READY_FOR_DECISION",
            Status::AwaitingUser => "AWAITING_USER",
            Status::Validated => "VALIDATED",
            Status::Executed => "EXECUTED",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// One decomposed unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub sub_query: String,
    pub intent: Intent,
    pub service_type: ServiceType,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Create a pending task
    pub fn pending(sub_query: impl Into<String>, intent: Intent, service_type: ServiceType) -> Self {
        Self {
            sub_query: sub_query.into(),
            intent,
            service_type,
            status: TaskStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

impl From<SplitTask> for Task {
    fn from(task: SplitTask) -> Self {
        Task::pending(task.sub_query, task.intent, task.service_type)
    }
}

/// A structured field collected before a ticket can be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Description,
    Priority,
    Department,
    AmountContext,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Description,
        Field::Priority,
        Field::Department,
        Field::AmountContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Description => "description",
            Field::Priority => "priority",
            Field::Department => "department",
            Field::AmountContext => "amount_context",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidInput(format!("unknown field: {}", name)))
    }
}

/// The payload handed to the ticket store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    pub department: String,
    pub description: String,
    pub priority: String,
}

/// Persistent per-thread workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    /// Append-only conversation history
    pub messages: Vec<Message>,
    /// The latest raw utterance driving this turn
    pub user_query: String,

    // Classification of the active task
    pub intent: Intent,
    pub service_type: ServiceType,

    // Evidence
    pub rag_context: String,
    pub rag_score: f32,
    pub rag_found: bool,

    // Field collection
    pub required_fields: Vec<Field>,
    pub collected_fields: BTreeMap<Field, String>,
    /// Derived: required minus collected-with-non-blank-value
    pub missing_fields: Vec<Field>,
    pub validation_passed: bool,

    pub action: Action,

    // Execution results
    pub ticket_payload: Option<TicketPayload>,
    pub ticket_id: Option<String>,
    /// Every ticket created in this conversation, oldest first
    pub task_ticket_ids: Vec<String>,

    pub status: Status,
    pub error: Option<String>,

    // Task queue
    pub tasks: Vec<Task>,
    pub current_task_index: usize,

    // Confirmation
    pub awaiting_confirmation: bool,
    pub confirmed: bool,
    pub confirmation_prompt: Option<String>,
}

impl ConversationState {
    /// The task at the queue pointer, if it is still pending
    pub fn active_task(&self) -> Option<&Task> {
        self.tasks
            .get(self.current_task_index)
            .filter(|t| t.is_pending())
    }

    /// Text the active task is about: its sub-query, else the latest utterance
    pub fn active_text(&self) -> &str {
        match self.active_task() {
            Some(task) if !task.sub_query.trim().is_empty() => &task.sub_query,
            _ => &self.user_query,
        }
    }

    /// Whether the user declined the pending confirmation
    pub fn is_declined(&self) -> bool {
        self.error.as_deref() == Some(DECLINED_TAG)
    }

    /// A collected field's value, if present and not blank
    pub fn field(&self, field: Field) -> Option<&str> {
        self.collected_fields
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Text of the most recent assistant message
    pub fn last_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content.as_str())
    }

    /// Merge a stage's partial update into the state
    pub fn apply(&mut self, update: StateUpdate) {
        let fields_changed =
            update.required_fields.is_some() || update.collected_fields.is_some();

        self.messages.extend(update.messages);
        if let Some(v) = update.user_query {
            self.user_query = v;
        }
        if let Some(v) = update.intent {
            self.intent = v;
        }
        if let Some(v) = update.service_type {
            self.service_type = v;
        }
        if let Some(v) = update.rag_context {
            self.rag_context = v;
        }
        if let Some(v) = update.rag_score {
            self.rag_score = v;
        }
        if let Some(v) = update.rag_found {
            self.rag_found = v;
        }
        if let Some(v) = update.required_fields {
            self.required_fields = v;
        }
        if let Some(v) = update.collected_fields {
            self.collected_fields = v;
        }
        if let Some(v) = update.validation_passed {
            self.validation_passed = v;
        }
        if let Some(v) = update.action {
            self.action = v;
        }
        if let Some(v) = update.ticket_payload {
            self.ticket_payload = v;
        }
        if let Some(v) = update.ticket_id {
            self.ticket_id = v;
        }
        self.task_ticket_ids.extend(update.task_ticket_ids);
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.error {
            self.error = v;
        }
        if let Some(v) = update.tasks {
            self.tasks = v;
        }
        if let Some(v) = update.current_task_index {
            self.current_task_index = v;
        }
        if let Some(v) = update.awaiting_confirmation {
            self.awaiting_confirmation = v;
        }
        if let Some(v) = update.confirmed {
            self.confirmed = v;
        }
        if let Some(v) = update.confirmation_prompt {
            self.confirmation_prompt = v;
        }

        if fields_changed {
            self.missing_fields = self
                .required_fields
                .iter()
                .copied()
                .filter(|f| self.field(*f).is_none())
                .collect();
        }
    }

    /// Clear every per-task transient field
    pub fn reset_task_fields(&mut self) {
        self.apply(StateUpdate::reset_task());
    }

    /// Merge a new utterance onto the persisted snapshot.
    ///
    /// A settled snapshot (not awaiting the user) starts a fresh request: per-task
    /// fields are reset and any queue left pending by a failed turn is retired.
    pub fn begin_turn(&mut self, input: &TurnInput) -> Result<()> {
        let supplied = input.supplied_fields()?;

        if self.status != Status::AwaitingUser {
            self.reset_task_fields();
            if self.current_task_index < self.tasks.len() {
                self.current_task_index = self.tasks.len();
            }
        }

        self.messages.push(Message::user(input.utterance.as_str()));
        self.user_query = input.utterance.trim().to_string();

        if !supplied.is_empty() {
            let mut collected = self.collected_fields.clone();
            collected.extend(supplied);
            self.apply(StateUpdate::new().collected_fields(collected));
        }
        Ok(())
    }
}

/// A partial state produced by one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Appended
    pub messages: Vec<Message>,
    pub user_query: Option<String>,
    pub intent: Option<Intent>,
    pub service_type: Option<ServiceType>,
    pub rag_context: Option<String>,
    pub rag_score: Option<f32>,
    pub rag_found: Option<bool>,
    pub required_fields: Option<Vec<Field>>,
    pub collected_fields: Option<BTreeMap<Field, String>>,
    pub validation_passed: Option<bool>,
    pub action: Option<Action>,
    pub ticket_payload: Option<Option<TicketPayload>>,
    pub ticket_id: Option<Option<String>>,
    /// Appended
    pub task_ticket_ids: Vec<String>,
    pub status: Option<Status>,
    pub error: Option<Option<String>>,
    pub tasks: Option<Vec<Task>>,
    pub current_task_index: Option<usize>,
    pub awaiting_confirmation: Option<bool>,
    pub confirmed: Option<bool>,
    pub confirmation_prompt: Option<Option<String>>,
}

impl StateUpdate {
    /// An empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every per-task transient field to its default
    pub fn reset_task() -> Self {
        Self {
            rag_context: Some(String::new()),
            rag_score: Some(0.0),
            rag_found: Some(false),
            required_fields: Some(Vec::new()),
            collected_fields: Some(BTreeMap::new()),
            validation_passed: Some(false),
            action: Some(Action::None),
            ticket_payload: Some(None),
            ticket_id: Some(None),
            error: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }

    pub fn classification(mut self, intent: Intent, service_type: ServiceType) -> Self {
        self.intent = Some(intent);
        self.service_type = Some(service_type);
        self
    }

    pub fn evidence(mut self, context: impl Into<String>, score: f32, found: bool) -> Self {
        self.rag_context = Some(context.into());
        self.rag_score = Some(score);
        self.rag_found = Some(found);
        self
    }

    pub fn required_fields(mut self, fields: Vec<Field>) -> Self {
        self.required_fields = Some(fields);
        self
    }

    pub fn collected_fields(mut self, fields: BTreeMap<Field, String>) -> Self {
        self.collected_fields = Some(fields);
        self
    }

    pub fn validation_passed(mut self, passed: bool) -> Self {
        self.validation_passed = Some(passed);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Record a created ticket and append it to the ledger
    pub fn ticket(mut self, id: impl Into<String>, payload: TicketPayload) -> Self {
        let id = id.into();
        self.task_ticket_ids.push(id.clone());
        self.ticket_id = Some(Some(id));
        self.ticket_payload = Some(Some(payload));
        self
    }

    pub fn tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn current_task_index(mut self, index: usize) -> Self {
        self.current_task_index = Some(index);
        self
    }

    pub fn awaiting_confirmation(mut self, awaiting: bool) -> Self {
        self.awaiting_confirmation = Some(awaiting);
        self
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = Some(confirmed);
        self
    }

    pub fn confirmation_prompt(mut self, prompt: Option<String>) -> Self {
        self.confirmation_prompt = Some(prompt);
        self
    }
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

/// One incoming turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnInput {
    pub thread_id: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub utterance: String,
    /// Field values supplied by the caller, keyed by field name
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl TurnInput {
    pub fn new(thread_id: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: default_user_id(),
            utterance: utterance.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Parse supplied fields, dropping blank values
    fn supplied_fields(&self) -> Result<BTreeMap<Field, String>> {
        let mut parsed = BTreeMap::new();
        for (name, value) in &self.fields {
            let field: Field = name.parse()?;
            let value = value.trim();
            if !value.is_empty() {
                parsed.insert(field, value.to_string());
            }
        }
        Ok(parsed)
    }
}
