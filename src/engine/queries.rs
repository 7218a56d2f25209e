use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::*;

use super::conflict::{find_conflict, occupies};
use super::Engine;

impl Engine {
    pub async fn get(&self, id: ReservationId) -> Option<Reservation> {
        let period = self.period_of(id)?;
        let lane = self.lane(period);
        let guard = lane.read().await;
        guard.get(id).cloned()
    }

    /// Read-only conflict probe over current state. Submission does not use
    /// this — it re-checks under the lane write lock to avoid stale reads.
    pub async fn has_conflict(
        &self,
        period: Period,
        dates: &DateRange,
        excluding: Option<ReservationId>,
    ) -> bool {
        let lane = self.lane(period);
        let guard = lane.read().await;
        find_conflict(&guard, dates, excluding).is_some()
    }

    /// Staff view: every reservation, pending first, then by start date,
    /// then by catalog period order.
    pub async fn list_all(&self) -> Vec<Reservation> {
        let mut all = Vec::new();
        for period in Period::ALL {
            let lane = self.lane(period);
            let guard = lane.read().await;
            all.extend(guard.reservations.iter().cloned());
        }
        all.sort_by(|a, b| {
            let a_rank = u8::from(a.status != Status::Pendente);
            let b_rank = u8::from(b.status != Status::Pendente);
            a_rank
                .cmp(&b_rank)
                .then(a.date_start.cmp(&b.date_start))
                .then(a.period.cmp(&b.period))
        });
        all
    }

    /// Public calendar: active reservations only, restricted fields,
    /// ordered by start date then period.
    pub async fn list_public(&self) -> Vec<PublicReservation> {
        let mut active = Vec::new();
        for period in Period::ALL {
            let lane = self.lane(period);
            let guard = lane.read().await;
            active.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.is_active())
                    .map(PublicReservation::from),
            );
        }
        active.sort_by(|a, b| a.date_start.cmp(&b.date_start).then(a.period.cmp(&b.period)));
        active
    }

    pub async fn occupied_periods_for_date(&self, day: NaiveDate) -> HashSet<Period> {
        let mut occupied = HashSet::new();
        for period in Period::ALL {
            let lane = self.lane(period);
            let guard = lane.read().await;
            if occupies(&guard, day) {
                occupied.insert(period);
            }
        }
        occupied
    }

    /// Catalog periods not occupied on `day` by an active reservation, in
    /// catalog order. Periods are independent — an INTEGRAL reservation
    /// occupies only INTEGRAL.
    pub async fn free_periods_for_date(&self, day: NaiveDate) -> Vec<Period> {
        let occupied = self.occupied_periods_for_date(day).await;
        Period::ALL
            .iter()
            .copied()
            .filter(|p| !occupied.contains(p))
            .collect()
    }
}
