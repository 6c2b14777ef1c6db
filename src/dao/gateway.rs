//! Two-tier repository in front of the bucket stores.
//!
//! Reads prefer the primary tier and fall back to the secondary one. Writes
//! always target both: the primary is staged under its lock, the secondary is
//! written while that lock is still held, then the primary commits. Without a
//! primary, the secondary's own transaction is held for the whole unit of work.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        bucket_store::{BucketStore, BucketTransaction},
        models::{BucketEntity, DrawRecordEntity, UserCooldownEntity},
        storage::{StorageError, StorageResult},
    },
    state::{bucket::BucketState, roster::ClosersRegistry},
};

/// Configuration a fresh bucket is bootstrapped from when no tier holds one.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeed {
    pub roster: ClosersRegistry,
    pub cycle_length: u32,
}

/// Where the snapshot handed to a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Primary,
    Secondary,
    Bootstrap,
}

/// Health of one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierStatus {
    pub backend: &'static str,
    pub error: Option<String>,
}

impl TierStatus {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Health of both tiers. `primary` is `None` when no primary store is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayHealth {
    pub primary: Option<TierStatus>,
    pub secondary: TierStatus,
}

/// Transaction serializing one read-modify-write.
enum WriteLock<'a> {
    /// Cross-process lock of the primary tier.
    Primary(Box<dyn BucketTransaction + 'a>),
    /// In-process gate of the secondary tier, used when no primary is configured.
    Secondary(Box<dyn BucketTransaction + 'a>),
}

/// Locked unit of work handed to [`PersistenceGateway::transact`] callers.
pub struct BucketSession<'a> {
    bucket: BucketState,
    source: SnapshotSource,
    lock: WriteLock<'a>,
    secondary: &'a dyn BucketStore,
    staged_draws: Vec<DrawRecordEntity>,
    staged_cooldowns: Vec<UserCooldownEntity>,
    dirty: bool,
}

impl BucketSession<'_> {
    pub fn bucket(&self) -> &BucketState {
        &self.bucket
    }

    /// Mutable access to the snapshot. Marks the session for persistence.
    pub fn bucket_mut(&mut self) -> &mut BucketState {
        self.dirty = true;
        &mut self.bucket
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    /// Whether the session holds the cross-process primary lock.
    pub fn is_locked(&self) -> bool {
        matches!(self.lock, WriteLock::Primary(_))
    }

    /// Cooldown row of `user`, read inside the session's lock.
    pub fn find_cooldown(&mut self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        if let Some(staged) = self.staged_cooldowns.iter().rev().find(|c| c.user == user) {
            return Ok(Some(staged.clone()));
        }

        let primary_error = match &mut self.lock {
            WriteLock::Secondary(txn) => return txn.find_cooldown(user),
            WriteLock::Primary(txn) => match txn.find_cooldown(user) {
                Ok(Some(cooldown)) => return Ok(Some(cooldown)),
                Ok(None) => None,
                Err(err) => {
                    warn!(user, error = %err, "primary cooldown lookup failed; trying secondary");
                    Some(err)
                }
            },
        };

        self.secondary.find_cooldown(user).or_else(|err| match primary_error {
            Some(primary) => Err(StorageError::AllTiersFailed {
                primary: primary.to_string(),
                secondary: err.to_string(),
            }),
            None => {
                warn!(user, error = %err, "secondary cooldown lookup failed");
                Ok(None)
            }
        })
    }

    /// Stage the history row and the cooldown upsert of one draw.
    pub fn record_draw(&mut self, record: DrawRecordEntity, cooldown: UserCooldownEntity) {
        self.dirty = true;
        self.staged_draws.push(record);
        self.staged_cooldowns.push(cooldown);
    }
}

/// Repository combining the relational primary and the file-backed secondary.
pub struct PersistenceGateway {
    primary: Option<Arc<dyn BucketStore>>,
    secondary: Arc<dyn BucketStore>,
    seed: BucketSeed,
}

impl PersistenceGateway {
    pub fn new(
        primary: Option<Arc<dyn BucketStore>>,
        secondary: Arc<dyn BucketStore>,
        seed: BucketSeed,
    ) -> Self {
        if primary.is_none() {
            warn!(
                secondary = secondary.backend(),
                "no primary store configured; writes are not serialized across processes"
            );
        }
        Self {
            primary,
            secondary,
            seed,
        }
    }

    pub fn seed(&self) -> &BucketSeed {
        &self.seed
    }

    /// Current bucket without taking the lock.
    ///
    /// Falls back to the secondary tier, then to a bootstrap from the seed.
    pub fn load(&self, now: OffsetDateTime) -> BucketState {
        if let Some(primary) = &self.primary
            && let Some(bucket) = decode_tier(primary.backend(), primary.load_bucket())
        {
            return bucket;
        }

        decode_tier(self.secondary.backend(), self.secondary.load_bucket())
            .unwrap_or_else(|| self.bootstrap(now))
    }

    /// Run `work` against the locked bucket and persist what it changed.
    ///
    /// A configured primary that cannot be locked fails the call; the work is
    /// never run unlocked. The primary transaction is rolled back when `work`
    /// fails. Write errors are only surfaced when every tier rejects the write.
    pub fn transact<T, E, F>(&self, now: OffsetDateTime, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut BucketSession<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut lock = match &self.primary {
            Some(store) => WriteLock::Primary(store.begin().inspect_err(|err| {
                warn!(
                    backend = store.backend(),
                    error = %err,
                    "failed to lock primary store; refusing the write"
                );
            })?),
            None => WriteLock::Secondary(self.secondary.begin()?),
        };

        let (bucket, source) = self.load_for_update(&mut lock, now);
        let mut session = BucketSession {
            bucket,
            source,
            // A primary that did not provide the snapshot gets seeded with it.
            dirty: matches!(lock, WriteLock::Primary(_)) && source != SnapshotSource::Primary,
            lock,
            secondary: self.secondary.as_ref(),
            staged_draws: Vec::new(),
            staged_cooldowns: Vec::new(),
        };

        let value = work(&mut session)?;

        let BucketSession {
            bucket,
            lock,
            staged_draws,
            staged_cooldowns,
            dirty,
            ..
        } = session;

        if !dirty {
            if let WriteLock::Primary(txn) = lock
                && let Err(err) = txn.commit()
            {
                debug!(error = %err, "failed to release read-only primary transaction");
            }
            return Ok(value);
        }

        let entity = BucketEntity::from(&bucket);
        match lock {
            WriteLock::Primary(txn) => {
                self.write_both(txn, &entity, &staged_draws, &staged_cooldowns)?
            }
            WriteLock::Secondary(mut txn) => {
                stage(&mut *txn, &entity, &staged_draws, &staged_cooldowns)
                    .and_then(|()| txn.commit())
                    .map_err(|err| {
                        error!(
                            backend = self.secondary.backend(),
                            error = %err,
                            "bucket could not be persisted and no primary is configured"
                        );
                        StorageError::AllTiersFailed {
                            primary: "not configured".into(),
                            secondary: err.to_string(),
                        }
                    })?
            }
        }
        Ok(value)
    }

    /// Stage the primary, write the secondary while the primary lock is held,
    /// then commit the primary.
    fn write_both(
        &self,
        mut primary: Box<dyn BucketTransaction + '_>,
        entity: &BucketEntity,
        draws: &[DrawRecordEntity],
        cooldowns: &[UserCooldownEntity],
    ) -> StorageResult<()> {
        let staged = stage(&mut *primary, entity, draws, cooldowns);

        let secondary_result = self.secondary.begin().and_then(|mut txn| {
            stage(&mut *txn, entity, draws, cooldowns)?;
            txn.commit()
        });

        let primary_result = staged.and_then(|()| primary.commit());

        match (primary_result, secondary_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), Ok(())) => {
                warn!(
                    error = %err,
                    "primary write failed; bucket persisted to secondary only"
                );
                Ok(())
            }
            (Ok(()), Err(err)) => {
                warn!(
                    backend = self.secondary.backend(),
                    error = %err,
                    "secondary write failed"
                );
                Ok(())
            }
            (Err(primary), Err(secondary)) => {
                error!(
                    primary = %primary,
                    secondary = %secondary,
                    "bucket could not be persisted to any tier"
                );
                Err(StorageError::AllTiersFailed {
                    primary: primary.to_string(),
                    secondary: secondary.to_string(),
                })
            }
        }
    }

    /// Cooldown row of `user` without taking the lock.
    pub fn find_cooldown(&self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        let mut primary_error = None;
        if let Some(primary) = &self.primary {
            match primary.find_cooldown(user) {
                Ok(Some(cooldown)) => return Ok(Some(cooldown)),
                Ok(None) => {}
                Err(err) => {
                    warn!(user, error = %err, "primary cooldown lookup failed; trying secondary");
                    primary_error = Some(err);
                }
            }
        }

        self.secondary
            .find_cooldown(user)
            .map_err(|err| all_failed(primary_error, err))
    }

    /// Most recent draws, newest first.
    pub fn recent_draws(&self, limit: usize) -> StorageResult<Vec<DrawRecordEntity>> {
        let mut primary_error = None;
        if let Some(primary) = &self.primary {
            match primary.recent_draws(limit) {
                Ok(records) => return Ok(records),
                Err(err) => {
                    warn!(error = %err, "primary history read failed; trying secondary");
                    primary_error = Some(err);
                }
            }
        }

        self.secondary
            .recent_draws(limit)
            .map_err(|err| all_failed(primary_error, err))
    }

    pub fn health(&self) -> GatewayHealth {
        GatewayHealth {
            primary: self.primary.as_deref().map(|store| probe(store)),
            secondary: probe(self.secondary.as_ref()),
        }
    }

    fn load_for_update(
        &self,
        lock: &mut WriteLock<'_>,
        now: OffsetDateTime,
    ) -> (BucketState, SnapshotSource) {
        let secondary = match lock {
            WriteLock::Primary(txn) => {
                let backend = self.primary.as_deref().map_or("primary", |p| p.backend());
                if let Some(bucket) = decode_tier(backend, txn.load()) {
                    return (bucket, SnapshotSource::Primary);
                }
                self.secondary.load_bucket()
            }
            WriteLock::Secondary(txn) => txn.load(),
        };

        match decode_tier(self.secondary.backend(), secondary) {
            Some(bucket) => (bucket, SnapshotSource::Secondary),
            None => (self.bootstrap(now), SnapshotSource::Bootstrap),
        }
    }

    fn bootstrap(&self, now: OffsetDateTime) -> BucketState {
        info!(
            closers = self.seed.roster.len(),
            cycle_length = self.seed.cycle_length,
            "bootstrapping bucket from configured defaults"
        );
        BucketState::bootstrap(self.seed.roster.clone(), self.seed.cycle_length, now)
    }
}

fn stage<T: BucketTransaction + ?Sized>(
    txn: &mut T,
    bucket: &BucketEntity,
    draws: &[DrawRecordEntity],
    cooldowns: &[UserCooldownEntity],
) -> StorageResult<()> {
    txn.save(bucket)?;
    for record in draws {
        txn.append_draw(record)?;
    }
    for cooldown in cooldowns {
        txn.upsert_cooldown(cooldown)?;
    }
    Ok(())
}

fn decode_tier(
    backend: &str,
    loaded: StorageResult<Option<BucketEntity>>,
) -> Option<BucketState> {
    match loaded {
        Ok(Some(entity)) => match BucketState::try_from(entity) {
            Ok(bucket) => Some(bucket),
            Err(err) => {
                warn!(backend, error = %err, "ignoring corrupt bucket");
                None
            }
        },
        Ok(None) => {
            debug!(backend, "no bucket stored");
            None
        }
        Err(err) => {
            warn!(backend, error = %err, "failed to load bucket");
            None
        }
    }
}

fn probe(store: &dyn BucketStore) -> TierStatus {
    TierStatus {
        backend: store.backend(),
        error: store.health_check().err().map(|err| err.to_string()),
    }
}

fn all_failed(primary: Option<StorageError>, secondary: StorageError) -> StorageError {
    match primary {
        Some(primary) => StorageError::AllTiersFailed {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        },
        None => secondary,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::bucket_store::file::FileBucketStore,
        state::{phase::ResetReason, roster::Closer},
    };

    const NOW: OffsetDateTime = datetime!(2026-04-01 10:00 UTC);

    /// Store whose every operation fails.
    struct BrokenStore;

    fn broken() -> StorageError {
        StorageError::unavailable("broken".into(), io::Error::other("disk on fire"))
    }

    impl BucketStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }
        fn begin(&self) -> StorageResult<Box<dyn BucketTransaction + '_>> {
            Err(broken())
        }
        fn load_bucket(&self) -> StorageResult<Option<BucketEntity>> {
            Err(broken())
        }
        fn find_cooldown(&self, _user: &str) -> StorageResult<Option<UserCooldownEntity>> {
            Err(broken())
        }
        fn recent_draws(&self, _limit: usize) -> StorageResult<Vec<DrawRecordEntity>> {
            Err(broken())
        }
        fn health_check(&self) -> StorageResult<()> {
            Err(broken())
        }
    }

    /// Store that hands out transactions but rejects every write.
    struct RejectingStore;

    struct RejectingTransaction;

    impl BucketStore for RejectingStore {
        fn backend(&self) -> &'static str {
            "rejecting"
        }
        fn begin(&self) -> StorageResult<Box<dyn BucketTransaction + '_>> {
            Ok(Box::new(RejectingTransaction))
        }
        fn load_bucket(&self) -> StorageResult<Option<BucketEntity>> {
            Ok(None)
        }
        fn find_cooldown(&self, _user: &str) -> StorageResult<Option<UserCooldownEntity>> {
            Ok(None)
        }
        fn recent_draws(&self, _limit: usize) -> StorageResult<Vec<DrawRecordEntity>> {
            Err(broken())
        }
        fn health_check(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    impl BucketTransaction for RejectingTransaction {
        fn load(&mut self) -> StorageResult<Option<BucketEntity>> {
            Ok(None)
        }
        fn find_cooldown(&mut self, _user: &str) -> StorageResult<Option<UserCooldownEntity>> {
            Ok(None)
        }
        fn save(&mut self, _bucket: &BucketEntity) -> StorageResult<()> {
            Err(broken())
        }
        fn append_draw(&mut self, _record: &DrawRecordEntity) -> StorageResult<()> {
            Err(broken())
        }
        fn upsert_cooldown(&mut self, _cooldown: &UserCooldownEntity) -> StorageResult<()> {
            Err(broken())
        }
        fn commit(self: Box<Self>) -> StorageResult<()> {
            Err(broken())
        }
    }

    fn seed() -> BucketSeed {
        let closer = |name: &str, default_weight| Closer {
            name: name.into(),
            display_name: name.into(),
            color: "#123456".into(),
            default_weight,
            active: true,
        };
        BucketSeed {
            roster: ClosersRegistry::new([closer("alpha", 3.0), closer("bravo", 1.0)]),
            cycle_length: 10,
        }
    }

    fn file_store(dir: &tempfile::TempDir) -> Arc<FileBucketStore> {
        Arc::new(FileBucketStore::open(dir.path()).unwrap())
    }

    fn record(user: &str) -> (DrawRecordEntity, UserCooldownEntity) {
        (
            DrawRecordEntity {
                id: Uuid::new_v4(),
                user: user.into(),
                closer_drawn: "alpha".into(),
                draw_kind: "lead".into(),
                customer_label: None,
                tickets_remaining_after: 3,
                weight_after: 2.0,
                drawn_at: "2026-04-01T10:00:00Z".into(),
            },
            UserCooldownEntity {
                user: user.into(),
                last_draw_at: "2026-04-01T10:00:00Z".into(),
                last_closer_drawn: "alpha".into(),
                last_draw_kind: "lead".into(),
                last_customer_label: None,
            },
        )
    }

    fn degrade_alpha(session: &mut BucketSession<'_>) -> Result<(), StorageError> {
        session.bucket_mut().set_weight("alpha", 1.0).map_err(|err| {
            StorageError::unavailable("roster".into(), err)
        })?;
        session.bucket_mut().reset(ResetReason::WeightChanged, NOW);
        let (record, cooldown) = record("maria");
        session.record_draw(record, cooldown);
        Ok(())
    }

    #[test]
    fn empty_tiers_bootstrap_from_seed() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::new(None, file_store(&dir), seed());

        let bucket = gateway.load(NOW);
        assert_eq!(bucket.tickets().len(), 4);
        assert_eq!(bucket.cycle_length(), 10);
        assert_eq!(bucket.last_reset(), NOW);
    }

    #[test]
    fn primary_write_failure_is_absorbed_by_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = file_store(&dir);
        let gateway =
            PersistenceGateway::new(Some(Arc::new(RejectingStore)), secondary.clone(), seed());

        gateway
            .transact(NOW, |session| {
                assert!(session.is_locked());
                assert_eq!(session.source(), SnapshotSource::Bootstrap);
                degrade_alpha(session)
            })
            .unwrap();

        let stored = secondary.load_bucket().unwrap().unwrap();
        assert_eq!(stored.weights["alpha"], 1.0);
        assert_eq!(gateway.load(NOW).weight("alpha"), 1.0);
        assert_eq!(gateway.recent_draws(5).unwrap().len(), 1);
        assert!(gateway.find_cooldown("maria").unwrap().is_some());
    }

    #[test]
    fn unlockable_primary_refuses_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = file_store(&dir);
        let gateway =
            PersistenceGateway::new(Some(Arc::new(BrokenStore)), secondary.clone(), seed());

        let mut ran = false;
        let result: Result<(), StorageError> = gateway.transact(NOW, |session| {
            ran = true;
            degrade_alpha(session)
        });

        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
        assert!(!ran);
        assert!(secondary.load_bucket().unwrap().is_none());
    }

    #[test]
    fn every_tier_failing_is_an_error() {
        let gateway = PersistenceGateway::new(
            Some(Arc::new(RejectingStore)),
            Arc::new(BrokenStore),
            seed(),
        );

        let result: Result<(), StorageError> = gateway.transact(NOW, degrade_alpha);
        assert!(matches!(result, Err(StorageError::AllTiersFailed { .. })));

        let gateway = PersistenceGateway::new(
            Some(Arc::new(BrokenStore)),
            Arc::new(BrokenStore),
            seed(),
        );
        assert!(matches!(
            gateway.find_cooldown("maria"),
            Err(StorageError::AllTiersFailed { .. })
        ));
    }

    #[test]
    fn secondary_gate_spans_the_whole_update_without_primary() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = PersistenceGateway::new(None, file_store(&dir), seed());

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let gateway = &gateway;
                scope.spawn(move || {
                    for round in 0..5 {
                        gateway
                            .transact(NOW, |session| -> Result<(), StorageError> {
                                assert!(!session.is_locked());
                                let bucket = session.bucket_mut();
                                let next = bucket.cycle_length() + 1;
                                bucket.set_cycle_length(next);
                                let (record, cooldown) = record(&format!("user-{worker}-{round}"));
                                session.record_draw(record, cooldown);
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        // Every increment survived: no update read a stale snapshot.
        assert_eq!(gateway.load(NOW).cycle_length(), 10 + 40);
        assert_eq!(gateway.recent_draws(100).unwrap().len(), 40);
    }

    #[test]
    fn failed_work_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = file_store(&dir);
        let gateway = PersistenceGateway::new(None, secondary.clone(), seed());

        let result: Result<(), StorageError> = gateway.transact(NOW, |session| {
            session.bucket_mut().set_weight("alpha", 0.0).ok();
            Err(broken())
        });
        assert!(result.is_err());
        assert!(secondary.load_bucket().unwrap().is_none());
    }

    #[test]
    fn untouched_sessions_do_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = file_store(&dir);
        let gateway = PersistenceGateway::new(None, secondary.clone(), seed());

        let tickets: Result<usize, StorageError> =
            gateway.transact(NOW, |session| Ok(session.bucket().tickets().len()));
        assert_eq!(tickets.unwrap(), 4);
        assert!(secondary.load_bucket().unwrap().is_none());
    }

    #[test]
    fn corrupt_secondary_falls_back_to_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let secondary = file_store(&dir);
        std::fs::write(secondary.path(), r#"{"closers": {}, "weights": {}, "tickets": [], "draws_in_cycle": 0, "lifetime_stats": {}, "cycle_length": 20, "last_reset": "2026-01-01T00:00:00Z"}"#).unwrap();
        let gateway = PersistenceGateway::new(None, secondary, seed());

        assert_eq!(gateway.load(NOW).roster().len(), 2);
    }

    #[test]
    fn health_reports_each_tier() {
        let dir = tempfile::tempdir().unwrap();
        let gateway =
            PersistenceGateway::new(Some(Arc::new(BrokenStore)), file_store(&dir), seed());

        let health = gateway.health();
        let primary = health.primary.unwrap();
        assert_eq!(primary.backend, "broken");
        assert!(!primary.is_healthy());
        assert!(health.secondary.is_healthy());
    }

    #[cfg(feature = "sqlite-store")]
    mod with_sqlite {
        use super::*;
        use crate::dao::bucket_store::sqlite::{SqliteBucketStore, SqliteConfig};

        fn sqlite(dir: &tempfile::TempDir) -> Arc<SqliteBucketStore> {
            Arc::new(
                SqliteBucketStore::open(SqliteConfig::new(dir.path().join("bucket.sqlite3")))
                    .unwrap(),
            )
        }

        #[test]
        fn writes_reach_both_tiers() {
            let dir = tempfile::tempdir().unwrap();
            let primary = sqlite(&dir);
            let secondary = file_store(&dir);
            let gateway =
                PersistenceGateway::new(Some(primary.clone()), secondary.clone(), seed());

            gateway
                .transact(NOW, |session| {
                    assert!(session.is_locked());
                    degrade_alpha(session)
                })
                .unwrap();

            assert_eq!(primary.load_bucket().unwrap().unwrap().weights["alpha"], 1.0);
            assert_eq!(secondary.load_bucket().unwrap().unwrap().weights["alpha"], 1.0);
            assert_eq!(primary.recent_draws(10).unwrap().len(), 1);
            assert_eq!(secondary.recent_draws(10).unwrap().len(), 1);
        }

        #[test]
        fn primary_is_preferred_and_seeded_from_secondary() {
            let dir = tempfile::tempdir().unwrap();
            let secondary = file_store(&dir);
            PersistenceGateway::new(None, secondary.clone(), seed())
                .transact(NOW, degrade_alpha)
                .unwrap();

            let primary = sqlite(&dir);
            let gateway =
                PersistenceGateway::new(Some(primary.clone()), secondary.clone(), seed());

            let source: Result<SnapshotSource, StorageError> =
                gateway.transact(NOW, |session| Ok(session.source()));
            assert_eq!(source.unwrap(), SnapshotSource::Secondary);
            assert!(primary.load_bucket().unwrap().is_some());

            let source: Result<SnapshotSource, StorageError> =
                gateway.transact(NOW, |session| Ok(session.source()));
            assert_eq!(source.unwrap(), SnapshotSource::Primary);
            assert_eq!(gateway.load(NOW).weight("alpha"), 1.0);
        }

        #[test]
        fn busy_primary_fails_the_call_instead_of_writing_the_secondary_alone() {
            let dir = tempfile::tempdir().unwrap();
            let holder = sqlite(&dir);
            let secondary = file_store(&dir);
            let contender = Arc::new(
                SqliteBucketStore::open(
                    SqliteConfig::new(dir.path().join("bucket.sqlite3"))
                        .with_busy_timeout(std::time::Duration::from_millis(50)),
                )
                .unwrap(),
            );
            let gateway = PersistenceGateway::new(Some(contender), secondary.clone(), seed());

            let held = holder.begin().unwrap();
            let result: Result<(), StorageError> = gateway.transact(NOW, degrade_alpha);
            assert!(matches!(result, Err(StorageError::Unavailable { .. })));
            assert!(secondary.load_bucket().unwrap().is_none());
            drop(held);

            gateway.transact(NOW, degrade_alpha).unwrap();
            assert_eq!(holder.load_bucket().unwrap().unwrap().weights["alpha"], 1.0);
            assert_eq!(holder.recent_draws(10).unwrap().len(), 1);
        }

        #[test]
        fn session_sees_cooldowns_inside_the_lock() {
            let dir = tempfile::tempdir().unwrap();
            let gateway =
                PersistenceGateway::new(Some(sqlite(&dir)), file_store(&dir), seed());
            gateway.transact(NOW, degrade_alpha).unwrap();

            let found: Result<bool, StorageError> = gateway.transact(NOW, |session| {
                Ok(session.find_cooldown("maria")?.is_some())
            });
            assert!(found.unwrap());
        }
    }
}
