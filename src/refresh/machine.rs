//! Per-provider refresh row.
//!
//! The parent sends [`Command`]s; the row answers with at most one
//! [`Effect`] for the caller to run, and the effect's result comes back as
//! an [`Event`]. The row never talks to the network itself.

use serde::Serialize;
use serde_json::Value;

use super::{NO_DATA_ERROR, NO_WEBSITE_ERROR, diff_proposal, refresh_prompt};
use crate::store::{Record, record_id, record_str};

#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Idle,
    /// Extraction in flight.
    Loading,
    Success { proposal: Record },
    /// `proposal` is kept when a save failed so it can be retried without
    /// fetching again.
    Error {
        message: String,
        proposal: Option<Record>,
    },
    Saving { proposal: Record },
}

impl RowState {
    pub fn name(&self) -> &'static str {
        match self {
            RowState::Idle => "idle",
            RowState::Loading => "loading",
            RowState::Success { .. } => "success",
            RowState::Error { .. } => "error",
            RowState::Saving { .. } => "saving",
        }
    }
}

/// How the row last came back to `Idle`. Lets a caller tell "checked, nothing
/// new" apart from "never refreshed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastOutcome {
    #[default]
    Never,
    UpToDate,
    Saved,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Approve,
    Discard,
    /// Forced return to idle, used after the parent saved or reloaded.
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Extracted(Value),
    ExtractFailed(String),
    Saved,
    SaveFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Extract { prompt: String },
    Save { provider_id: String, fields: Record },
}

#[derive(Debug, Clone)]
pub struct RefreshRow {
    id: String,
    provider: Record,
    state: RowState,
    last_outcome: LastOutcome,
}

impl RefreshRow {
    /// `None` for records without an id.
    pub fn new(provider: Record) -> Option<Self> {
        let id = record_id(&provider)?;
        Some(Self {
            id,
            provider,
            state: RowState::Idle,
            last_outcome: LastOutcome::Never,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        record_str(&self.provider, "name").unwrap_or(&self.id)
    }

    pub fn provider(&self) -> &Record {
        &self.provider
    }

    pub fn state(&self) -> &RowState {
        &self.state
    }

    pub fn last_outcome(&self) -> LastOutcome {
        self.last_outcome
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, RowState::Loading | RowState::Saving { .. })
    }

    /// The proposal waiting for approval, if any.
    pub fn pending(&self) -> Option<&Record> {
        match &self.state {
            RowState::Success { proposal } => Some(proposal),
            _ => None,
        }
    }

    /// Replaces the stored provider values, e.g. after a reload.
    pub fn set_provider(&mut self, provider: Record) {
        self.provider = provider;
    }

    pub fn handle(&mut self, command: Command) -> Option<Effect> {
        match command {
            Command::Refresh => self.start_refresh(),
            Command::Approve => self.start_save(),
            Command::Discard => {
                let has_proposal = matches!(
                    self.state,
                    RowState::Success { .. } | RowState::Error { .. }
                );
                if has_proposal {
                    self.state = RowState::Idle;
                    self.last_outcome = LastOutcome::Discarded;
                }
                None
            }
            Command::Reset => {
                if !self.is_busy() {
                    self.state = RowState::Idle;
                }
                None
            }
        }
    }

    fn start_refresh(&mut self) -> Option<Effect> {
        if self.is_busy() {
            return None;
        }
        let website = record_str(&self.provider, "website")
            .map(str::trim)
            .filter(|w| !w.is_empty());
        let Some(website) = website else {
            self.state = RowState::Error {
                message: NO_WEBSITE_ERROR.to_string(),
                proposal: None,
            };
            return None;
        };
        let prompt = refresh_prompt(website, self.name());
        self.state = RowState::Loading;
        Some(Effect::Extract { prompt })
    }

    fn start_save(&mut self) -> Option<Effect> {
        let proposal = match &self.state {
            RowState::Success { proposal } => proposal.clone(),
            RowState::Error {
                proposal: Some(proposal),
                ..
            } => proposal.clone(),
            _ => return None,
        };
        self.state = RowState::Saving {
            proposal: proposal.clone(),
        };
        Some(Effect::Save {
            provider_id: self.id.clone(),
            fields: proposal,
        })
    }

    /// Events that do not belong to the current state are ignored.
    pub fn apply(&mut self, event: Event) {
        let state = std::mem::replace(&mut self.state, RowState::Idle);
        self.state = match (state, event) {
            (RowState::Loading, Event::Extracted(Value::Object(extracted))) => {
                let proposal = diff_proposal(&self.provider, &extracted);
                if proposal.is_empty() {
                    self.last_outcome = LastOutcome::UpToDate;
                    RowState::Idle
                } else {
                    RowState::Success { proposal }
                }
            }
            (RowState::Loading, Event::Extracted(_)) => RowState::Error {
                message: NO_DATA_ERROR.to_string(),
                proposal: None,
            },
            (RowState::Loading, Event::ExtractFailed(message)) => RowState::Error {
                message,
                proposal: None,
            },
            (RowState::Saving { proposal }, Event::Saved) => {
                for (k, v) in proposal {
                    self.provider.insert(k, v);
                }
                self.last_outcome = LastOutcome::Saved;
                RowState::Idle
            }
            (RowState::Saving { proposal }, Event::SaveFailed(message)) => RowState::Error {
                message,
                proposal: Some(proposal),
            },
            (state, event) => {
                tracing::debug!("{}: ignoring {:?} in state {}", self.id, event, state.name());
                state
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> RefreshRow {
        RefreshRow::new(v.as_object().cloned().unwrap()).unwrap()
    }

    fn acme() -> RefreshRow {
        row(json!({
            "id": "a", "name": "Acme", "website": "https://acme.example",
            "rating": 4.8, "wait_time": "2 days"
        }))
    }

    #[test]
    fn refresh_asks_for_extraction_with_site_and_name() {
        let mut r = acme();
        let Some(Effect::Extract { prompt }) = r.handle(Command::Refresh) else {
            panic!("expected extract effect");
        };
        assert!(prompt.contains("https://acme.example"));
        assert!(prompt.ends_with("Provider Name: Acme"));
        assert_eq!(r.state(), &RowState::Loading);

        // a second refresh while loading is ignored
        assert_eq!(r.handle(Command::Refresh), None);
    }

    #[test]
    fn missing_website_is_an_error_without_effect() {
        let mut r = row(json!({"id": "b", "name": "Beta", "website": " "}));
        assert_eq!(r.handle(Command::Refresh), None);
        assert_eq!(
            r.state(),
            &RowState::Error {
                message: "Provider has no website URL to scan.".to_string(),
                proposal: None
            }
        );
    }

    #[test]
    fn empty_diff_returns_to_idle_as_up_to_date() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(json!({"rating": "4.8", "wait_time": null})));
        assert_eq!(r.state(), &RowState::Idle);
        assert_eq!(r.last_outcome(), LastOutcome::UpToDate);
    }

    #[test]
    fn null_extraction_is_an_error() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(Value::Null));
        assert!(matches!(r.state(), RowState::Error { message, .. } if message.starts_with("AI returned no data")));
    }

    #[test]
    fn approve_saves_only_the_diff_and_merges_on_success() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(json!({
            "rating": 4.8, "review_count": 210, "wait_time": null
        })));
        assert_eq!(r.pending(), Some(&json!({"review_count": 210}).as_object().cloned().unwrap()));

        let Some(Effect::Save { provider_id, fields }) = r.handle(Command::Approve) else {
            panic!("expected save effect");
        };
        assert_eq!(provider_id, "a");
        assert_eq!(Value::Object(fields), json!({"review_count": 210}));

        r.apply(Event::Saved);
        assert_eq!(r.state(), &RowState::Idle);
        assert_eq!(r.last_outcome(), LastOutcome::Saved);
        assert_eq!(r.provider()["review_count"], json!(210));
        assert_eq!(r.provider()["wait_time"], json!("2 days"));
    }

    #[test]
    fn failed_save_keeps_proposal_for_retry() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(json!({"wait_time": "Same day"})));
        r.handle(Command::Approve);
        r.apply(Event::SaveFailed("boom".to_string()));
        assert!(matches!(r.state(), RowState::Error { proposal: Some(_), .. }));

        let retry = r.handle(Command::Approve);
        assert!(matches!(retry, Some(Effect::Save { .. })));
        assert_eq!(r.state().name(), "saving");
    }

    #[test]
    fn discard_drops_proposal_and_stale_events_are_ignored() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(json!({"wait_time": "Same day"})));
        assert_eq!(r.handle(Command::Discard), None);
        assert_eq!(r.state(), &RowState::Idle);
        assert_eq!(r.last_outcome(), LastOutcome::Discarded);

        r.apply(Event::Saved);
        assert_eq!(r.state(), &RowState::Idle);
        assert_eq!(r.provider()["wait_time"], json!("2 days"));
    }

    #[test]
    fn refresh_from_success_replaces_the_proposal() {
        let mut r = acme();
        r.handle(Command::Refresh);
        r.apply(Event::Extracted(json!({"wait_time": "Same day"})));
        assert!(r.handle(Command::Refresh).is_some());
        assert_eq!(r.pending(), None);
        r.apply(Event::ExtractFailed("timeout".to_string()));
        assert_eq!(
            r.state(),
            &RowState::Error {
                message: "timeout".to_string(),
                proposal: None
            }
        );
        r.handle(Command::Reset);
        assert_eq!(r.state(), &RowState::Idle);
    }
}
