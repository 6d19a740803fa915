//! Field collection for ticket-worthy tasks
//!
//! Fields are inferred from keyword lexicons over the active task's own text.
//! The latest utterance is consulted only for fields the task text and its
//! service type leave open, so a slot-filling reply can supply them while one
//! task in a batch never borrows a sibling's keywords.

use std::sync::LazyLock;

use desk_ai::{Intent, ServiceType};
use regex::Regex;

use crate::stage::StageResult;
use crate::state::{ConversationState, Field, StateUpdate, Status};

/// Value recorded when a currency or expense mention is detected
pub const AMOUNT_PRESENT: &str = "present";

pub const DEFAULT_PRIORITY: &str = "medium";

/// Compile a keyword into a word-bounded pattern.
///
/// Upper-case acronyms match case-sensitively. Other keywords ignore case, and
/// those of four or more letters also match inflected forms ("flights",
/// "reimbursement") but not unrelated words that share a prefix ("highlight").
fn keyword_pattern(keyword: &str) -> String {
    let body = regex::escape(keyword).replace(' ', r"\s+");
    if keyword.chars().all(|c| c.is_ascii_uppercase()) {
        format!(r"\b{}\b", body)
    } else if keyword.len() >= 4 {
        format!(r"(?i)\b{}(?:s|es|d|ed|ing|ment|ments)?\b", body)
    } else {
        format!(r"(?i)\b{}\b", body)
    }
}

fn compile(keywords: &[&str]) -> Vec<Regex> {
    keywords
        .iter()
        .filter_map(|k| Regex::new(&keyword_pattern(k)).ok())
        .collect()
}

/// Priority lexicons, highest first
static PRIORITY_LEXICON: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            "urgent",
            compile(&["critical", "sev1", "urgent", "immediately", "asap", "outage"]),
        ),
        ("high", compile(&["high", "major", "blocked"])),
        ("low", compile(&["low", "minor", "whenever"])),
    ]
});

/// Department lexicons, checked in order
static DEPARTMENT_LEXICON: LazyLock<Vec<(ServiceType, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            ServiceType::Hr,
            compile(&["human resources", "leave", "payroll", "HR"]),
        ),
        (
            ServiceType::Finance,
            compile(&["reimbursement", "invoice", "expense", "finance", "payment"]),
        ),
        (
            ServiceType::It,
            compile(&["laptop", "vpn", "access", "VM", "IT", "system", "login"]),
        ),
        (
            ServiceType::Travel,
            compile(&["travel", "flight", "hotel", "trip", "booking"]),
        ),
    ]
});

static AMOUNT_LEXICON: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&["usd", "amount", "invoice", "reimburse"]));

fn matches_any(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Priority named by keywords in `text`, if any
pub fn detect_priority(text: &str) -> Option<&'static str> {
    PRIORITY_LEXICON
        .iter()
        .find(|(_, patterns)| matches_any(patterns, text))
        .map(|(priority, _)| *priority)
}

/// Department named by keywords in `text`, if any
pub fn detect_department(text: &str) -> Option<ServiceType> {
    DEPARTMENT_LEXICON
        .iter()
        .find(|(_, patterns)| matches_any(patterns, text))
        .map(|(department, _)| *department)
}

pub fn mentions_amount(text: &str) -> bool {
    text.contains('$') || matches_any(&AMOUNT_LEXICON, text)
}

/// Fields a ticket for this classification cannot be created without
pub fn required_fields(intent: Intent, service_type: ServiceType) -> Vec<Field> {
    if !intent.requires_ticket() {
        return Vec::new();
    }
    let mut fields = vec![Field::Description, Field::Priority, Field::Department];
    if intent == Intent::ServiceRequest && service_type == ServiceType::Finance {
        fields.push(Field::AmountContext);
    }
    fields
}

pub fn run(state: &ConversationState) -> StageResult {
    let required = required_fields(state.intent, state.service_type);
    let own = state.active_text().trim();
    let latest = state.user_query.trim();
    let mut collected = state.collected_fields.clone();

    if state.field(Field::Description).is_none() && !own.is_empty() {
        collected.insert(Field::Description, own.to_string());
    }

    if state.field(Field::Priority).is_none() {
        let priority = detect_priority(own).unwrap_or(DEFAULT_PRIORITY);
        collected.insert(Field::Priority, priority.to_string());
    }

    if state.field(Field::Department).is_none() {
        let department = detect_department(own)
            .and_then(|d| d.department())
            .or_else(|| state.service_type.department())
            .or_else(|| detect_department(latest).and_then(|d| d.department()));
        if let Some(department) = department {
            collected.insert(Field::Department, department.to_string());
        }
    }

    if required.contains(&Field::AmountContext)
        && state.field(Field::AmountContext).is_none()
        && (mentions_amount(own) || mentions_amount(latest))
    {
        collected.insert(Field::AmountContext, AMOUNT_PRESENT.to_string());
    }

    Ok(StateUpdate::new()
        .required_fields(required)
        .collected_fields(collected)
        .status(Status::InProgress)
        .clear_error())
}
