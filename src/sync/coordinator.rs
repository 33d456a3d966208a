use std::collections::HashMap;
use std::mem;

use crate::conflict::{self, ConflictReport};
use crate::db::{SaveOutcome, WordRepository};
use crate::models::{WordDocument, WordRecord};
use crate::offline::OfflineStore;

use super::state::{ItemState, Resolution};
use super::{
    BatchSummary, CheckResult, CheckStatus, ItemCheck, ItemError, ItemOutcome, SyncError,
    SyncItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Execute { force: bool },
    Decide(Resolution),
}

/// Reconciles offline records with the repository.
///
/// Items are processed one at a time. A failure is recorded against the item
/// and never stops the rest of a batch.
pub struct SyncCoordinator<'a> {
    repo: &'a WordRepository,
    offline: &'a OfflineStore,
}

impl<'a> SyncCoordinator<'a> {
    pub fn new(repo: &'a WordRepository, offline: &'a OfflineStore) -> Self {
        Self { repo, offline }
    }

    /// Compares one document with the stored record for its lemma. Read-only.
    pub async fn check_one(&self, raw: &str) -> Result<CheckResult, SyncError> {
        let doc = WordDocument::parse(raw)?;
        let (existing, report) = self.lookup(&doc).await?;
        let lemma = Some(doc.lemma_key());

        Ok(match (existing, report) {
            (Some(existing), Some(report)) if report.has_conflict => CheckResult {
                status: CheckStatus::Conflict,
                lemma,
                diff: Some(report.diff),
                old_data: Some(existing.original_document),
                new_data: Some(doc.into_value()),
                error: None,
            },
            (Some(_), _) => CheckResult::status(CheckStatus::Ok, lemma),
            (None, _) => CheckResult::status(CheckStatus::Created, lemma),
        })
    }

    /// Checks every item, keeping input order. Lookup failures become
    /// `error` entries.
    pub async fn check_many(&self, items: &[SyncItem]) -> Vec<ItemCheck> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = match self.check_one(&item.raw_yaml).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!(item = %item.id, error = %e, "Check failed");
                    CheckResult::error(e.to_string())
                }
            };
            results.push(ItemCheck {
                id: item.id.clone(),
                result,
            });
        }
        results
    }

    /// Syncs one item. The offline copy is removed only after a committed write.
    pub async fn execute_one(&self, item: &SyncItem, force: bool) -> ItemOutcome {
        self.run(item, Mode::Execute { force }).await
    }

    pub async fn execute_many(&self, items: &[SyncItem], force: bool) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for item in items {
            let outcome = self.execute_one(item, force).await;
            summary.record(outcome, false);
        }
        tracing::info!(
            success = summary.success_count,
            failed = summary.failed_count,
            conflicts = summary.conflict_count,
            "Batch sync finished"
        );
        summary
    }

    /// Runs a batch where some conflicts already have a decision.
    ///
    /// Items without a decision sync normally without force. `Overwrite`
    /// items are forced. `Skip` items are never written and keep their
    /// offline copy.
    pub async fn apply_decisions(
        &self,
        items: &[SyncItem],
        decisions: &HashMap<String, Resolution>,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for item in items {
            let decision = decisions.get(&item.id).copied();
            let mode = match decision {
                Some(resolution) => Mode::Decide(resolution),
                None => Mode::Execute { force: false },
            };
            let outcome = self.run(item, mode).await;
            summary.record(outcome, decision == Some(Resolution::Skip));
        }
        tracing::info!(
            success = summary.success_count,
            failed = summary.failed_count,
            conflicts = summary.conflict_count,
            skipped = summary.skipped_count,
            "Resolved batch finished"
        );
        summary
    }

    async fn run(&self, item: &SyncItem, mode: Mode) -> ItemOutcome {
        let mut state = ItemState::Unchecked;
        if let Err(e) = self.drive(item, mode, &mut state).await {
            tracing::debug!(item = %item.id, state = state.name(), error = %e, "Sync item failed");
            state = state.fail(e.to_string());
        }
        ItemOutcome {
            item_id: item.id.clone(),
            state,
        }
    }

    async fn drive(&self, item: &SyncItem, mode: Mode, state: &mut ItemState) -> Result<(), SyncError> {
        let doc = WordDocument::parse(&item.raw_yaml)?;
        let (_, report) = self.lookup(&doc).await?;
        *state = mem::take(state).checked(report.as_ref())?;

        match (state.is_conflict(), mode) {
            (true, Mode::Execute { force: true }) | (true, Mode::Decide(Resolution::Overwrite)) => {
                *state = mem::take(state).resolve(Resolution::Overwrite)?;
            }
            (true, Mode::Decide(Resolution::Skip)) => {
                *state = mem::take(state).resolve(Resolution::Skip)?;
            }
            (false, Mode::Decide(Resolution::Skip)) => return Ok(()),
            _ => {}
        }
        // Unforced conflicts and skipped items stay where they are.
        if !state.is_writable() {
            return Ok(());
        }

        let force = matches!(
            mode,
            Mode::Execute { force: true } | Mode::Decide(Resolution::Overwrite)
        );

        match self.repo.save(&doc, force).await? {
            SaveOutcome::Conflict { report, .. } => {
                tracing::debug!(item = %item.id, "Record changed since check");
                *state = mem::take(state).conflicted(report.diff)?;
            }
            SaveOutcome::Saved { id, status, .. } => {
                self.offline.delete(&item.id)?;
                *state = mem::take(state).synced(status, id)?;
                tracing::debug!(item = %item.id, word = %id, status = %status, "Synced item");
            }
        }
        Ok(())
    }

    async fn lookup(
        &self,
        doc: &WordDocument,
    ) -> Result<(Option<WordRecord>, Option<ConflictReport>), SyncError> {
        let existing = self.repo.find_by_lemma(doc.lemma()).await?;
        let report = existing
            .as_ref()
            .map(|record| conflict::analyze(&record.original_document, doc.value()));
        Ok((existing, report))
    }
}

impl BatchSummary {
    fn record(&mut self, outcome: ItemOutcome, skipped: bool) {
        match &outcome.state {
            ItemState::Synced { .. } => self.success_count += 1,
            ItemState::Failed { reason } => {
                self.failed_count += 1;
                self.errors.push(ItemError {
                    item_id: outcome.item_id.clone(),
                    error: reason.clone(),
                });
            }
            ItemState::Conflict { .. } => self.conflict_count += 1,
            _ if skipped => self.skipped_count += 1,
            _ => {}
        }
        self.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_pool, SaveStatus};
    use crate::models::document::fixtures::{minimal, HOUSEHOLD};
    use tempfile::TempDir;

    struct TestContext {
        repo: WordRepository,
        offline: OfflineStore,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path().join("words.db").to_str().unwrap())
            .await
            .unwrap();
        TestContext {
            repo: WordRepository::new(pool),
            offline: OfflineStore::new(temp_dir.path().join("local_words.json"), 100),
            _temp_dir: temp_dir,
        }
    }

    fn offline_item(ctx: &TestContext, raw: &str) -> SyncItem {
        let id = ctx.offline.save(raw, None).unwrap();
        SyncItem {
            id,
            raw_yaml: raw.to_string(),
        }
    }

    fn changed_household() -> String {
        HOUSEHOLD.replace("Noun (Collective)", "Noun")
    }

    #[tokio::test]
    async fn test_household_created_and_synced() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let item = offline_item(&ctx, HOUSEHOLD);

        let check = coordinator.check_one(&item.raw_yaml).await.unwrap();
        assert_eq!(check.status, CheckStatus::Created);
        assert_eq!(check.lemma.as_deref(), Some("household"));

        let outcome = coordinator.execute_one(&item, false).await;
        assert!(matches!(
            outcome.state,
            ItemState::Synced { status: SaveStatus::Created, .. }
        ));

        let word = ctx.repo.find_by_lemma("household").await.unwrap().unwrap();
        assert_eq!(word.lemma, "household");
        assert!(ctx.offline.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_check_is_read_only() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        coordinator.check_one(HOUSEHOLD).await.unwrap();
        assert!(ctx.repo.find_by_lemma("household").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_ok_and_conflict() {
        let ctx = setup().await;
        ctx.repo
            .create(&WordDocument::parse(HOUSEHOLD).unwrap())
            .await
            .unwrap();
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        let same_word_new_context =
            HOUSEHOLD.replace("The entire household gathered", "The whole household gathered");
        let check = coordinator.check_one(&same_word_new_context).await.unwrap();
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.diff.is_none());

        let check = coordinator.check_one(&changed_household()).await.unwrap();
        assert_eq!(check.status, CheckStatus::Conflict);
        let diff = check.diff.unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].path_string(), "yield.part_of_speech");
        assert!(check.old_data.is_some());
        assert!(check.new_data.is_some());
    }

    #[tokio::test]
    async fn test_check_many_keeps_order_and_isolates_errors() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let items = vec![
            SyncItem::new("a", minimal("alpha")),
            SyncItem::new("b", "yield:\n  part_of_speech: Noun\n"),
            SyncItem::new("c", minimal("gamma")),
        ];

        let results = coordinator.check_many(&items).await;
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(results[0].result.status, CheckStatus::Created);
        assert_eq!(results[1].result.status, CheckStatus::Error);
        assert!(results[1].result.error.as_ref().unwrap().contains("lemma"));
        assert_eq!(results[2].result.status, CheckStatus::Created);
    }

    #[tokio::test]
    async fn test_execute_many_mixed_batch() {
        let ctx = setup().await;
        ctx.repo
            .create(&WordDocument::parse(&minimal("bravo")).unwrap())
            .await
            .unwrap();
        ctx.repo
            .create(&WordDocument::parse(HOUSEHOLD).unwrap())
            .await
            .unwrap();
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        let a = offline_item(&ctx, &minimal("alpha"));
        let b = offline_item(&ctx, &minimal("bravo"));
        let c = offline_item(&ctx, &changed_household());

        let summary = coordinator
            .execute_many(&[a.clone(), b.clone(), c.clone()], false)
            .await;
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.conflict_count, 1);
        assert_eq!(summary.failed_count, 0);
        assert!(summary.errors.is_empty());

        assert!(ctx.offline.get(&a.id).unwrap().is_none());
        assert!(ctx.offline.get(&b.id).unwrap().is_none());
        assert!(ctx.offline.get(&c.id).unwrap().is_some());

        assert!(matches!(
            summary.outcomes[1].state,
            ItemState::Synced { status: SaveStatus::Logged, .. }
        ));
        assert!(summary.outcomes[2].state.is_conflict());

        let stored = ctx.repo.find_by_lemma("household").await.unwrap().unwrap();
        assert_eq!(stored.part_of_speech.as_deref(), Some("Noun (Collective)"));
    }

    #[tokio::test]
    async fn test_execute_forced_overwrites() {
        let ctx = setup().await;
        ctx.repo
            .create(&WordDocument::parse(HOUSEHOLD).unwrap())
            .await
            .unwrap();
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let item = offline_item(&ctx, &changed_household());

        let outcome = coordinator.execute_one(&item, true).await;
        assert!(matches!(
            outcome.state,
            ItemState::Synced { status: SaveStatus::Updated, .. }
        ));

        let stored = ctx.repo.find_by_lemma("household").await.unwrap().unwrap();
        assert_eq!(stored.part_of_speech.as_deref(), Some("Noun"));
        assert_eq!(stored.revision_count, 2);
        assert!(ctx.offline.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_execute_many_isolates_failures() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        let bad = SyncItem::new("bad", "yield: [unclosed");
        let good = offline_item(&ctx, &minimal("alpha"));

        let summary = coordinator.execute_many(&[bad, good.clone()], false).await;
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.errors[0].item_id, "bad");
        assert!(ctx.offline.get(&good.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_many_reports_unreachable_repository() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let items = vec![
            offline_item(&ctx, &minimal("alpha")),
            offline_item(&ctx, HOUSEHOLD),
        ];
        ctx.repo.pool().close().await;

        let results = coordinator.check_many(&items).await;
        assert_eq!(results.len(), 2);
        for (item, check) in items.iter().zip(&results) {
            assert_eq!(check.id, item.id);
            assert_eq!(check.result.status, CheckStatus::Error);
            assert!(!check.result.error.as_deref().unwrap_or("").is_empty());
        }
    }

    #[tokio::test]
    async fn test_execute_many_keeps_offline_copies_when_repository_fails() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let items = vec![
            offline_item(&ctx, &minimal("alpha")),
            offline_item(&ctx, &minimal("bravo")),
        ];
        ctx.repo.pool().close().await;

        let summary = coordinator.execute_many(&items, false).await;
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failed_count, 2);
        let failed: Vec<&str> = summary.errors.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(failed, vec![items[0].id.as_str(), items[1].id.as_str()]);
        assert_eq!(ctx.offline.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_execute_many_write_failure_midway() {
        let ctx = setup().await;
        sqlx::query(
            "CREATE TRIGGER reject_bravo BEFORE INSERT ON words \
             WHEN NEW.lemma_key = 'bravo' \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(ctx.repo.pool())
        .await
        .unwrap();
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        let alpha = offline_item(&ctx, &minimal("alpha"));
        let bravo = offline_item(&ctx, &minimal("bravo"));
        let charlie = offline_item(&ctx, &minimal("charlie"));

        let summary = coordinator
            .execute_many(&[alpha.clone(), bravo.clone(), charlie.clone()], false)
            .await;
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].item_id, bravo.id);
        assert!(matches!(summary.outcomes[1].state, ItemState::Failed { .. }));

        assert!(ctx.offline.get(&alpha.id).unwrap().is_none());
        assert!(ctx.offline.get(&bravo.id).unwrap().is_some());
        assert!(ctx.offline.get(&charlie.id).unwrap().is_none());
        assert!(ctx.repo.find_by_lemma("bravo").await.unwrap().is_none());
        assert!(ctx.repo.find_by_lemma("charlie").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_decisions() {
        let ctx = setup().await;
        ctx.repo
            .create(&WordDocument::parse(HOUSEHOLD).unwrap())
            .await
            .unwrap();
        ctx.repo
            .create(&WordDocument::parse("yield:\n  lemma: walk\n  part_of_speech: Verb\n").unwrap())
            .await
            .unwrap();
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);

        let overwrite = offline_item(&ctx, &changed_household());
        let skip = offline_item(&ctx, "yield:\n  lemma: walk\n  part_of_speech: Noun\n");
        let fresh = offline_item(&ctx, &minimal("stride"));

        let mut decisions = HashMap::new();
        decisions.insert(overwrite.id.clone(), Resolution::Overwrite);
        decisions.insert(skip.id.clone(), Resolution::Skip);

        let summary = coordinator
            .apply_decisions(&[overwrite.clone(), skip.clone(), fresh.clone()], &decisions)
            .await;
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(summary.conflict_count, 0);
        assert_eq!(
            summary.outcomes[1].state,
            ItemState::Resolved {
                resolution: Resolution::Skip
            }
        );

        assert!(ctx.offline.get(&skip.id).unwrap().is_some());
        assert!(ctx.offline.get(&overwrite.id).unwrap().is_none());

        let walk = ctx.repo.find_by_lemma("walk").await.unwrap().unwrap();
        assert_eq!(walk.part_of_speech.as_deref(), Some("Verb"));
        let household = ctx.repo.find_by_lemma("household").await.unwrap().unwrap();
        assert_eq!(household.part_of_speech.as_deref(), Some("Noun"));
    }

    #[tokio::test]
    async fn test_batch_summary_serialization() {
        let ctx = setup().await;
        let coordinator = SyncCoordinator::new(&ctx.repo, &ctx.offline);
        let summary = coordinator
            .execute_many(&[SyncItem::new("x", "")], false)
            .await;

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["successCount"], 0);
        assert_eq!(json["failedCount"], 1);
        assert_eq!(json["errors"][0]["itemId"], "x");
    }
}
