use futures::future::join_all;
use serde::Serialize;

use super::machine::{Command, Effect, Event, LastOutcome, RefreshRow, RowState};
use super::refresh_schema;
use crate::llm::ExtractionService;
use crate::runner::SequentialRunner;
use crate::store::{EntityKind, EntityStore, Record};

/// Rows for every provider on the "manage provider data" board, in list order.
#[derive(Debug, Clone, Default)]
pub struct RefreshBoard {
    rows: Vec<RefreshRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub proposals: usize,
    pub up_to_date: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveAllReport {
    pub saved: Vec<String>,
    /// `(provider name, error)`.
    pub failed: Vec<(String, String)>,
}

impl SaveAllReport {
    pub fn message(&self) -> String {
        let mut msg = format!("Saved changes for {} providers.", self.saved.len());
        if !self.failed.is_empty() {
            msg.push_str(" An error occurred during bulk save. Some changes may not have been saved.");
        }
        msg
    }
}

impl RefreshBoard {
    pub fn new(providers: Vec<Record>) -> Self {
        Self {
            rows: providers.into_iter().filter_map(RefreshRow::new).collect(),
        }
    }

    pub async fn load<S: EntityStore>(store: &S) -> crate::error::StoreResult<Self> {
        let providers = store.list(EntityKind::Provider, None, None).await?;
        Ok(Self::new(providers))
    }

    pub fn rows(&self) -> &[RefreshRow] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&RefreshRow> {
        self.rows.iter().find(|r| r.id() == id)
    }

    fn row_mut(&mut self, id: &str) -> Option<&mut RefreshRow> {
        self.rows.iter_mut().find(|r| r.id() == id)
    }

    /// Sends a command to one row. Returns the effect the caller must run.
    pub fn dispatch(&mut self, id: &str, command: Command) -> Option<Effect> {
        self.row_mut(id)?.handle(command)
    }

    pub fn deliver(&mut self, id: &str, event: Event) {
        if let Some(row) = self.row_mut(id) {
            row.apply(event);
        }
    }

    /// Provider id → proposal, for every row waiting on approval.
    pub fn pending(&self) -> Vec<(&str, &Record)> {
        self.rows
            .iter()
            .filter_map(|r| r.pending().map(|p| (r.id(), p)))
            .collect()
    }

    pub async fn refresh<L: ExtractionService>(&mut self, llm: &L, id: &str) -> Option<&RowState> {
        let row = self.row_mut(id)?;
        refresh_row(llm, row).await;
        Some(row.state())
    }

    /// Refreshes every row one after another with the runner's pause between
    /// them. A failing row ends in `Error` and the batch continues.
    pub async fn refresh_all<L: ExtractionService>(
        &mut self,
        llm: &L,
        runner: &SequentialRunner,
    ) -> RefreshSummary {
        let rows = std::mem::take(&mut self.rows);
        self.rows = runner
            .run(rows, |mut row| async move {
                refresh_row(llm, &mut row).await;
                row
            })
            .await;

        let mut summary = RefreshSummary::default();
        for row in &self.rows {
            match row.state() {
                RowState::Success { .. } => summary.proposals += 1,
                RowState::Error { .. } => summary.failed += 1,
                RowState::Idle if row.last_outcome() == LastOutcome::UpToDate => {
                    summary.up_to_date += 1
                }
                _ => {}
            }
        }
        tracing::info!(
            "refresh all: proposals={} up_to_date={} failed={}",
            summary.proposals,
            summary.up_to_date,
            summary.failed
        );
        summary
    }

    pub async fn approve<S: EntityStore>(&mut self, store: &S, id: &str) -> Option<&RowState> {
        let row = self.row_mut(id)?;
        save_row(store, row).await;
        Some(row.state())
    }

    /// Writes every pending proposal at once. Each row settles on its own:
    /// saved rows go back to idle, failed ones keep their proposal.
    pub async fn save_all<S: EntityStore>(&mut self, store: &S) -> SaveAllReport {
        let writes = self
            .rows
            .iter_mut()
            .filter(|r| r.pending().is_some())
            .map(|row| async move {
                save_row(store, row).await;
                row
            });

        let mut report = SaveAllReport::default();
        for row in join_all(writes).await {
            match row.state() {
                RowState::Error { message, .. } => {
                    report.failed.push((row.name().to_string(), message.clone()))
                }
                _ => report.saved.push(row.name().to_string()),
            }
        }
        if !report.failed.is_empty() {
            tracing::warn!("Error during bulk save: {} rows failed", report.failed.len());
        }
        report
    }

    /// Swaps in freshly listed provider values and resets every row that is
    /// not busy.
    pub fn reload(&mut self, providers: Vec<Record>) {
        for provider in providers {
            let Some(mut fresh) = RefreshRow::new(provider) else {
                continue;
            };
            match self.row_mut(fresh.id()) {
                Some(row) => {
                    row.set_provider(fresh.provider().clone());
                    row.handle(Command::Reset);
                }
                None => {
                    fresh.handle(Command::Reset);
                    self.rows.push(fresh);
                }
            }
        }
    }
}

async fn refresh_row<L: ExtractionService>(llm: &L, row: &mut RefreshRow) {
    let Some(Effect::Extract { prompt }) = row.handle(Command::Refresh) else {
        return;
    };
    let event = match llm.invoke(&prompt, &refresh_schema(), true).await {
        Ok(extracted) => Event::Extracted(extracted),
        Err(e) => {
            tracing::warn!("Refreshing {} failed: {}", row.name(), e);
            Event::ExtractFailed(e.to_string())
        }
    };
    row.apply(event);
}

async fn save_row<S: EntityStore>(store: &S, row: &mut RefreshRow) {
    let Some(Effect::Save {
        provider_id,
        fields,
    }) = row.handle(Command::Approve)
    else {
        return;
    };
    let event = match store.update(EntityKind::Provider, &provider_id, fields).await {
        Ok(_) => Event::Saved,
        Err(e) => {
            tracing::warn!("Saving refreshed data for {} failed: {}", row.name(), e);
            Event::SaveFailed(e.to_string())
        }
    };
    row.apply(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;
    use crate::store::MemoryStore;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn providers() -> Vec<Record> {
        vec![
            rec(json!({"id": "a", "name": "Acme", "website": "https://acme.example", "rating": 4.8})),
            rec(json!({"id": "b", "name": "Beta"})),
            rec(json!({"id": "c", "name": "Gamma", "website": "https://gamma.example", "rating": 3})),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_all_runs_each_row_and_keeps_going() {
        let llm = ScriptedLlm::new(vec![
            Ok(json!({"rating": "4.8", "wait_time": null})),
            Ok(json!({"rating": 4.1, "wait_time": "Same day"})),
        ]);
        let mut board = RefreshBoard::new(providers());
        let summary = board
            .refresh_all(&llm, &SequentialRunner::new(Duration::from_millis(500)))
            .await;

        assert_eq!(
            summary,
            RefreshSummary {
                proposals: 1,
                up_to_date: 1,
                failed: 1
            }
        );
        assert_eq!(board.row("a").unwrap().last_outcome(), LastOutcome::UpToDate);
        assert_eq!(board.row("b").unwrap().state().name(), "error");
        assert_eq!(llm.prompts().len(), 2);

        let pending = board.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "c");
        assert_eq!(
            Value::Object(pending[0].1.clone()),
            json!({"rating": 4.1, "wait_time": "Same day"})
        );
    }

    #[tokio::test]
    async fn extraction_error_lands_in_error_state() {
        let llm = ScriptedLlm::new(vec![Err("service unavailable".to_string())]);
        let mut board = RefreshBoard::new(providers());
        let state = board.refresh(&llm, "a").await.unwrap();
        assert_eq!(
            state,
            &RowState::Error {
                message: "service unavailable".to_string(),
                proposal: None
            }
        );
    }

    #[tokio::test]
    async fn save_all_writes_only_pending_diffs() {
        let store = MemoryStore::new().with_records(EntityKind::Provider, providers());
        let llm = ScriptedLlm::new(vec![
            Ok(json!({"rating": 4.9, "description": "Online clinic"})),
            Ok(json!({"rating": 3})),
        ]);
        let mut board = RefreshBoard::load(&store).await.unwrap();
        board.refresh(&llm, "a").await;
        board.refresh(&llm, "c").await;
        assert_eq!(board.pending().len(), 1);

        let report = board.save_all(&store).await;
        assert_eq!(report.saved, vec!["Acme"]);
        assert!(report.failed.is_empty());
        assert!(board.pending().is_empty());

        let acme = store.get(EntityKind::Provider, "a").await.unwrap();
        assert_eq!(acme["rating"], json!(4.9));
        assert_eq!(acme["description"], json!("Online clinic"));
        assert_eq!(acme["website"], json!("https://acme.example"));
        let gamma = store.get(EntityKind::Provider, "c").await.unwrap();
        assert_eq!(gamma["rating"], json!(3));
    }

    #[tokio::test]
    async fn approve_one_row_and_ignore_stale_events() {
        let store = MemoryStore::new().with_records(EntityKind::Provider, providers());
        let llm = ScriptedLlm::new(vec![Ok(json!({"wait_time": "48 hours"}))]);
        let mut board = RefreshBoard::load(&store).await.unwrap();
        board.refresh(&llm, "c").await;

        // a late extraction result for a row that is not loading
        board.deliver("c", Event::ExtractFailed("late".to_string()));
        assert_eq!(board.row("c").unwrap().state().name(), "success");

        let state = board.approve(&store, "c").await.unwrap();
        assert_eq!(state, &RowState::Idle);
        assert_eq!(board.row("c").unwrap().last_outcome(), LastOutcome::Saved);
        let gamma = store.get(EntityKind::Provider, "c").await.unwrap();
        assert_eq!(gamma["wait_time"], json!("48 hours"));
        assert!(board.approve(&store, "missing").await.is_none());
    }

    #[tokio::test]
    async fn discard_never_writes() {
        let store = MemoryStore::new().with_records(EntityKind::Provider, providers());
        let before = store.snapshot(EntityKind::Provider).await;
        let llm = ScriptedLlm::new(vec![Ok(json!({"rating": 1}))]);
        let mut board = RefreshBoard::load(&store).await.unwrap();
        board.refresh(&llm, "a").await;
        assert_eq!(board.dispatch("a", Command::Discard), None);
        assert!(board.save_all(&store).await.saved.is_empty());
        assert_eq!(store.snapshot(EntityKind::Provider).await, before);
    }
}
