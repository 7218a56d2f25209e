mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;
pub use mutations::SubmitRequest;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::*;
use crate::notify::NotifyHandle;
use crate::wal::Wal;

pub type SharedLane = Arc<RwLock<PeriodLane>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) struct WalAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
            .record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[WalAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for entry in batch {
        if let Err(e) = wal.append_buffered(&entry.event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: Vec<WalAppend>, result: &io::Result<()>) {
    for entry in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = entry.response.send(r);
    }
}

/// Apply an event directly to a PeriodLane (no locking — caller holds the lock).
fn apply_to_lane(lane: &mut PeriodLane, event: &Event, index: &DashMap<ReservationId, Period>) {
    match event {
        Event::Submitted {
            id,
            date_start,
            date_end,
            period,
            request_type,
            institution,
            responsible,
            email,
            phone,
            purpose,
            notes,
            attachment_url,
            created_at,
        } => {
            lane.insert(Reservation {
                id: *id,
                date_start: *date_start,
                date_end: *date_end,
                period: *period,
                request_type: *request_type,
                institution: institution.clone(),
                responsible: responsible.clone(),
                email: email.clone(),
                phone: phone.clone(),
                purpose: purpose.clone(),
                notes: notes.clone(),
                attachment_url: attachment_url.clone(),
                status: Status::Pendente,
                decided_by: None,
                decided_by_email: None,
                decision_reason: None,
                decided_at: None,
                created_at: *created_at,
            });
            index.insert(*id, *period);
        }
        Event::Decided {
            id,
            status,
            decided_by,
            decided_by_email,
            reason,
            decided_at,
        } => {
            if let Some(r) = lane.get_mut(*id) {
                r.status = *status;
                r.decided_by = Some(decided_by.clone());
                r.decided_by_email = Some(decided_by_email.clone());
                r.decision_reason = reason.clone();
                r.decided_at = Some(*decided_at);
            }
        }
    }
}

pub struct Engine {
    /// One lane per catalog period, each serializing its own
    /// check-then-insert sequence behind a write lock.
    lanes: DashMap<Period, SharedLane>,
    /// Reverse lookup: reservation id → period.
    index: DashMap<ReservationId, Period>,
    next_id: AtomicU64,
    wal_tx: mpsc::Sender<WalAppend>,
    pub notify: NotifyHandle,
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: NotifyHandle) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            lanes: DashMap::new(),
            index: DashMap::new(),
            next_id: AtomicU64::new(1),
            wal_tx,
            notify,
        };
        for period in Period::ALL {
            engine
                .lanes
                .insert(period, Arc::new(RwLock::new(PeriodLane::new(period))));
        }

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        let mut max_id = 0;
        for event in &events {
            let period = match event {
                Event::Submitted { period, .. } => *period,
                Event::Decided { id, .. } => match engine.index.get(id) {
                    Some(entry) => *entry.value(),
                    // Decided without its Submitted prefix — corrupt tail
                    // already dropped by replay, skip defensively.
                    None => continue,
                },
            };
            let lane_arc = engine.lane(period);
            let mut guard = lane_arc.try_write().expect("replay: uncontended write");
            apply_to_lane(&mut guard, event, &engine.index);
            max_id = max_id.max(event.reservation_id());
        }
        engine.next_id.store(max_id + 1, Ordering::SeqCst);

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalAppend { event: event.clone(), response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// Every catalog period has a lane from construction on.
    pub(super) fn lane(&self, period: Period) -> SharedLane {
        self.lanes
            .get(&period)
            .map(|e| e.value().clone())
            .expect("catalog lane")
    }

    pub(super) fn allocate_id(&self) -> ReservationId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(super) fn period_of(&self, id: ReservationId) -> Option<Period> {
        self.index.get(&id).map(|e| *e.value())
    }

    /// WAL-append + apply in one call, under the caller's lane lock.
    pub(super) async fn persist_and_apply(
        &self,
        lane: &mut PeriodLane,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_lane(lane, event, &self.index);
        Ok(())
    }
}
