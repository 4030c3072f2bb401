//! LLM-assisted ranking: mail filtering, MIT selection, duration estimates.
//!
//! Generator output is untrusted free text. Each step parses it as a JSON
//! array on a best-effort basis and falls back to a deterministic answer
//! when the generator fails or the output does not parse.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::integrations::traits::{Email, TextGenerator, Todo};
use crate::scheduler::{TaskRequest, MAX_TASK_MINUTES, MAX_TITLE_CHARS, MIN_TASK_MINUTES};

/// Emails sent to the filter at most.
pub const MAX_FILTERED_EMAILS: usize = 30;
/// MITs kept at most.
pub const MAX_MITS: usize = 5;
/// MITs kept by the estimation fallback.
pub const FALLBACK_ESTIMATES: usize = 3;
/// Minutes assumed when an estimate is missing.
pub const DEFAULT_MINUTES: i64 = 60;
const MAX_CANDIDATE_SNIPPET_CHARS: usize = 200;

const FILTER_SYSTEM: &str = "Filter emails like a disciplined executive assistant.\n\
- KEEP items that request a decision/approval, deliverable, meeting/coordination, \
deadline/payment, or a substantive reply.\n\
- DROP FYIs, newsletters, promos, login/security alerts, generic receipts, or anything \
without a user action.\n\
Return ONLY a JSON array of thread_id strings to KEEP.";

const SELECT_SYSTEM: &str = "You are a productivity assistant. Inputs may be in any language; \
reason internally in English. Select 3-5 Most Important Tasks (MITs) for TODAY from the given \
candidates. Focus on urgency, importance, and alignment with daily goals.\n\
Return ONLY a valid JSON array of the selected task texts: [{\"text\": str}] with no extra text.";

const ESTIMATE_SYSTEM: &str = "You are a productivity assistant. You receive a list of tasks \
(text only). Estimate how long each one takes today:\n\
- Deep work: 45-90 minutes each.\n\
- Small tasks (under 15 minutes): bundle them into a single block called \"Admin Sweep\" with \
the total (30 minutes or less if possible).\n\
Return ONLY valid JSON: [{\"text\": str, \"minutes\": int}, ...]";

/// Best-effort: the JSON array between the first `[` and the last `]`.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Vec<Value>>(&text[start..=end]).ok()
}

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CandidateSource {
    Todo { block_id: String },
    Email { thread_id: String, snippet: String },
}

/// Something that could become one of today's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub text: String,
    #[serde(flatten)]
    pub source: CandidateSource,
}

impl Candidate {
    pub fn from_todo(todo: &Todo) -> Self {
        Self {
            text: todo.text.trim().to_string(),
            source: CandidateSource::Todo {
                block_id: todo.block_id.clone(),
            },
        }
    }

    pub fn from_email(email: &Email) -> Self {
        let subject = email.subject.trim();
        let text = if subject.is_empty() { "(no subject)" } else { subject };
        Self {
            text: text.chars().take(MAX_TITLE_CHARS).collect(),
            source: CandidateSource::Email {
                thread_id: email.thread_id.clone(),
                snippet: email
                    .snippet
                    .chars()
                    .take(MAX_CANDIDATE_SNIPPET_CHARS)
                    .collect(),
            },
        }
    }

    /// Mail thread this candidate came from.
    pub fn thread_id(&self) -> Option<&str> {
        match &self.source {
            CandidateSource::Email { thread_id, .. } => Some(thread_id),
            CandidateSource::Todo { .. } => None,
        }
    }

    fn source_label(&self) -> &'static str {
        match self.source {
            CandidateSource::Todo { .. } => "notion",
            CandidateSource::Email { .. } => "email",
        }
    }
}

/// A MIT with its estimated duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimatedTask {
    pub text: String,
    pub minutes: i64,
    pub origin_id: Option<String>,
}

impl EstimatedTask {
    /// Scheduler input for this estimate.
    pub fn to_request(&self) -> Result<TaskRequest, ValidationError> {
        let request = TaskRequest::new(&self.text, self.minutes)?;
        Ok(match &self.origin_id {
            Some(origin) => request.with_origin(origin.clone()),
            None => request,
        })
    }
}

/// Keep only actionable mail.
///
/// At most [`MAX_FILTERED_EMAILS`] messages are considered. When the
/// generator fails or its answer does not parse, nothing is kept.
pub fn filter_actionable(generator: &dyn TextGenerator, emails: &[Email]) -> Vec<Email> {
    let window = &emails[..emails.len().min(MAX_FILTERED_EMAILS)];
    if window.is_empty() {
        return Vec::new();
    }

    let payload = json!(window
        .iter()
        .map(|e| json!({
            "thread_id": e.thread_id,
            "subject": e.subject,
            "snippet": e.snippet,
            "sender": e.sender,
            "date": e.date,
        }))
        .collect::<Vec<_>>());

    let raw = match generator.generate(FILTER_SYSTEM, &payload.to_string()) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "mail filter unavailable, keeping no emails");
            return Vec::new();
        }
    };

    let Some(items) = extract_json_array(&raw) else {
        warn!("mail filter returned no JSON array, keeping no emails");
        return Vec::new();
    };

    let keep: HashSet<&str> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    let kept: Vec<Email> = window
        .iter()
        .filter(|e| keep.contains(e.thread_id.as_str()))
        .cloned()
        .collect();
    debug!(considered = window.len(), kept = kept.len(), "filtered mail");
    kept
}

/// Pick today's most important tasks from `candidates`.
///
/// Selections are matched back to candidates by exact text, in candidate
/// order, and capped at [`MAX_MITS`]. If the generator fails, its output
/// does not parse, or nothing matches, the first [`MAX_MITS`] candidates
/// are used.
pub fn select_mits(generator: &dyn TextGenerator, candidates: &[Candidate]) -> Vec<Candidate> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let fallback = || candidates.iter().take(MAX_MITS).cloned().collect::<Vec<_>>();

    let payload = json!(candidates
        .iter()
        .map(|c| json!({ "text": c.text, "source": c.source_label() }))
        .collect::<Vec<_>>());

    let raw = match generator.generate(SELECT_SYSTEM, &format!("CANDIDATES:\n{payload}")) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "MIT selection unavailable, using first candidates");
            return fallback();
        }
    };

    let Some(items) = extract_json_array(&raw) else {
        warn!("MIT selection returned no JSON array, using first candidates");
        return fallback();
    };

    let selected: HashSet<&str> = items
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();

    let mits: Vec<Candidate> = candidates
        .iter()
        .filter(|c| selected.contains(c.text.as_str()))
        .take(MAX_MITS)
        .cloned()
        .collect();

    if mits.is_empty() {
        warn!("MIT selection matched no candidate, using first candidates");
        return fallback();
    }
    mits
}

fn parse_minutes(value: Option<&Value>) -> Option<i64> {
    match value {
        None | Some(Value::Null) => Some(DEFAULT_MINUTES),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    }
}

fn parse_estimates(items: &[Value], mits: &[Candidate]) -> Option<Vec<EstimatedTask>> {
    items
        .iter()
        .map(|item| {
            let text = item.get("text")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            let minutes =
                parse_minutes(item.get("minutes"))?.clamp(MIN_TASK_MINUTES, MAX_TASK_MINUTES);
            let origin_id = mits
                .iter()
                .find(|mit| mit.text == text)
                .and_then(|mit| mit.thread_id())
                .map(str::to_string);
            Some(EstimatedTask {
                text: text.to_string(),
                minutes,
                origin_id,
            })
        })
        .collect()
}

/// Deterministic estimate: the first [`FALLBACK_ESTIMATES`] MITs at an hour each.
pub fn fallback_estimates(mits: &[Candidate]) -> Vec<EstimatedTask> {
    mits.iter()
        .take(FALLBACK_ESTIMATES)
        .map(|mit| EstimatedTask {
            text: mit.text.clone(),
            minutes: DEFAULT_MINUTES,
            origin_id: mit.thread_id().map(str::to_string),
        })
        .collect()
}

/// Estimate durations for the MITs.
///
/// Missing minutes default to [`DEFAULT_MINUTES`] and every estimate is
/// clamped to the schedulable range. Any malformed item, an empty answer,
/// unparseable output or a generator failure yields
/// [`fallback_estimates`].
pub fn estimate_durations(generator: &dyn TextGenerator, mits: &[Candidate]) -> Vec<EstimatedTask> {
    if mits.is_empty() {
        return Vec::new();
    }

    let texts: Vec<&str> = mits.iter().map(|m| m.text.as_str()).collect();
    let prompt = format!("TASKS:\n{}", json!(texts));

    let raw = match generator.generate(ESTIMATE_SYSTEM, &prompt) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "duration estimates unavailable, using fallback");
            return fallback_estimates(mits);
        }
    };

    match extract_json_array(&raw).and_then(|items| parse_estimates(&items, mits)) {
        Some(estimates) if !estimates.is_empty() => estimates,
        _ => {
            warn!("duration estimates did not parse, using fallback");
            fallback_estimates(mits)
        }
    }
}
