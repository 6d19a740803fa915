//! Core types shared by the collaborators and the workflow

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the user wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Question answered from policy documents
    PolicyQuery,
    /// Something is broken
    Incident,
    /// Something is being asked for
    ServiceRequest,
    #[default]
    General,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::PolicyQuery,
        Intent::Incident,
        Intent::ServiceRequest,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PolicyQuery => "POLICY_QUERY",
            Intent::Incident => "INCIDENT",
            Intent::ServiceRequest => "SERVICE_REQUEST",
            Intent::General => "GENERAL",
        }
    }

    /// Whether handling this intent ends in a ticket
    pub fn requires_ticket(&self) -> bool {
        matches!(self, Intent::Incident | Intent::ServiceRequest)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::Validation(format!("unknown intent: {}", s)))
    }
}

/// The service line a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "HR")]
    Hr,
    #[serde(rename = "Finance")]
    Finance,
    #[serde(rename = "IT")]
    It,
    #[serde(rename = "Travel")]
    Travel,
    #[default]
    #[serde(rename = "GENERAL")]
    General,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::Hr,
        ServiceType::Finance,
        ServiceType::It,
        ServiceType::Travel,
        ServiceType::General,
    ];

    /// Service types that are also ticket departments
    pub const DEPARTMENTS: [ServiceType; 4] = [
        ServiceType::Hr,
        ServiceType::Finance,
        ServiceType::It,
        ServiceType::Travel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Hr => "HR",
            ServiceType::Finance => "Finance",
            ServiceType::It => "IT",
            ServiceType::Travel => "Travel",
            ServiceType::General => "GENERAL",
        }
    }

    /// Department name, if this service type is a department
    pub fn department(&self) -> Option<&'static str> {
        match self {
            ServiceType::General => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        ServiceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::Validation(format!("unknown service type: {}", s)))
    }
}

/// Output of the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub service_type: ServiceType,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// One unit of work produced by the task decomposer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTask {
    pub sub_query: String,
    pub intent: Intent,
    pub service_type: ServiceType,
}

impl SplitTask {
    pub fn new(sub_query: impl Into<String>, intent: Intent, service_type: ServiceType) -> Self {
        Self {
            sub_query: sub_query.into(),
            intent,
            service_type,
        }
    }
}

/// A request to the answer generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    /// System instructions
    pub system: String,
    /// The user's text
    pub user: String,
    /// Retrieved context the answer must be grounded in
    pub context: Option<String>,
}

impl AnswerRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// An embedding vector
pub type Embedding = Vec<f32>;

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
