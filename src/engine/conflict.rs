use chrono::{Datelike, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    if range.start.year() < MIN_VALID_YEAR || range.end.year() > MAX_VALID_YEAR {
        return Err(EngineError::Validation("data fora do intervalo aceito"));
    }
    if range.num_days() > MAX_RANGE_DAYS {
        return Err(EngineError::Validation("intervalo de datas muito longo"));
    }
    Ok(())
}

/// First active reservation in the lane whose range overlaps `range`, if any.
/// Terminal statuses (NEGADA, CANCELADA) never block. `excluding` skips one
/// id, reserved for edit flows — submission passes `None`.
///
/// Caller holds the lane lock; check-then-insert stays serialized per period.
pub(crate) fn find_conflict(
    lane: &PeriodLane,
    range: &DateRange,
    excluding: Option<ReservationId>,
) -> Option<ReservationId> {
    lane.overlapping(range)
        .filter(|r| r.is_active())
        .find(|r| excluding != Some(r.id))
        .map(|r| r.id)
}

/// Whether any active reservation in the lane covers `day`.
pub(crate) fn occupies(lane: &PeriodLane, day: NaiveDate) -> bool {
    lane.overlapping(&DateRange::single(day)).any(|r| r.is_active())
}
