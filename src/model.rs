use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reservation ids are small monotonic integers, assigned at creation.
pub type ReservationId = u64;

/// Inclusive calendar-date interval `[start, end]`. Day granularity,
/// timezone-naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Single-day range.
    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Two inclusive ranges overlap iff `NOT (other.end < start OR other.start > end)`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// The four bookable time-of-day windows. Fixed catalog, stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Integral,
    Manha,
    Tarde,
    Noite,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Integral, Period::Manha, Period::Tarde, Period::Noite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Integral => "INTEGRAL",
            Period::Manha => "MANHA",
            Period::Tarde => "TARDE",
            Period::Noite => "NOITE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Integral => "Integral (08h às 18h)",
            Period::Manha => "Manhã (08h às 12h)",
            Period::Tarde => "Tarde (13h às 17h)",
            Period::Noite => "Noite (18h às 21h)",
        }
    }

    /// Parse free-text input. Trims and uppercases before matching.
    pub fn parse(input: &str) -> Option<Period> {
        match input.trim().to_uppercase().as_str() {
            "INTEGRAL" => Some(Period::Integral),
            "MANHA" => Some(Period::Manha),
            "TARDE" => Some(Period::Tarde),
            "NOITE" => Some(Period::Noite),
            _ => None,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the requester is internal or external to the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Interna,
    Externa,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Interna => "INTERNA",
            RequestType::Externa => "EXTERNA",
        }
    }

    /// Normalize free-text input (trim + uppercase) against the closed set.
    pub fn normalize(input: &str) -> Option<RequestType> {
        match input.trim().to_uppercase().as_str() {
            "INTERNA" => Some(RequestType::Interna),
            "EXTERNA" => Some(RequestType::Externa),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation lifecycle status. PENDENTE and APROVADA occupy their
/// period/date range; NEGADA and CANCELADA are terminal and inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pendente,
    Aprovada,
    Negada,
    Cancelada,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pendente => "PENDENTE",
            Status::Aprovada => "APROVADA",
            Status::Negada => "NEGADA",
            Status::Cancelada => "CANCELADA",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Pendente | Status::Aprovada)
    }

    /// NEGADA and CANCELADA must carry a decision reason.
    pub fn requires_reason(&self) -> bool {
        matches!(self, Status::Negada | Status::Cancelada)
    }

    pub fn parse(input: &str) -> Option<Status> {
        match input.trim().to_uppercase().as_str() {
            "PENDENTE" => Some(Status::Pendente),
            "APROVADA" => Some(Status::Aprovada),
            "NEGADA" => Some(Status::Negada),
            "CANCELADA" => Some(Status::Cancelada),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated staff identity recording a decision. Resolved from a
/// session token — the core never reads ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub email: String,
}

/// The central entity. The store owns the record; status and decision
/// metadata are written only by the lifecycle manager after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub period: Period,
    pub request_type: RequestType,
    pub institution: String,
    pub responsible: String,
    pub email: String,
    pub phone: String,
    pub purpose: String,
    pub notes: Option<String>,
    pub attachment_url: Option<String>,
    pub status: Status,
    pub decided_by: Option<String>,
    pub decided_by_email: Option<String>,
    pub decision_reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn dates(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Restricted projection for the public calendar: no attachment, no
/// decision metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicReservation {
    pub id: ReservationId,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub period: Period,
    pub request_type: RequestType,
    pub institution: String,
    pub responsible: String,
    pub email: String,
    pub phone: String,
    pub purpose: String,
    pub notes: Option<String>,
    pub status: Status,
}

impl From<&Reservation> for PublicReservation {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            date_start: r.date_start,
            date_end: r.date_end,
            period: r.period,
            request_type: r.request_type,
            institution: r.institution.clone(),
            responsible: r.responsible.clone(),
            email: r.email.clone(),
            phone: r.phone.clone(),
            purpose: r.purpose.clone(),
            notes: r.notes.clone(),
            status: r.status,
        }
    }
}

/// Catalog entry as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub id: Period,
    pub label: String,
}

/// The fixed period catalog in display order.
pub fn catalog() -> Vec<PeriodInfo> {
    Period::ALL
        .iter()
        .map(|p| PeriodInfo { id: *p, label: p.label().to_string() })
        .collect()
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Submitted {
        id: ReservationId,
        date_start: NaiveDate,
        date_end: NaiveDate,
        period: Period,
        request_type: RequestType,
        institution: String,
        responsible: String,
        email: String,
        phone: String,
        purpose: String,
        notes: Option<String>,
        attachment_url: Option<String>,
        created_at: DateTime<Utc>,
    },
    Decided {
        id: ReservationId,
        status: Status,
        decided_by: String,
        decided_by_email: String,
        reason: Option<String>,
        decided_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn reservation_id(&self) -> ReservationId {
        match self {
            Event::Submitted { id, .. } | Event::Decided { id, .. } => *id,
        }
    }
}

/// All reservations for one period, sorted by `date_start`.
#[derive(Debug, Clone)]
pub struct PeriodLane {
    pub period: Period,
    pub reservations: Vec<Reservation>,
}

impl PeriodLane {
    pub fn new(period: Period) -> Self {
        Self { period, reservations: Vec::new() }
    }

    /// Insert maintaining sort order by date_start.
    pub fn insert(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.date_start, |r| r.date_start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn get(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose range overlaps the query window.
    /// Uses binary search to skip reservations starting after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        // Everything at index >= right_bound starts after query.end → can't overlap.
        let right_bound = self
            .reservations
            .partition_point(|r| r.date_start <= query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.date_end >= query.start)
    }
}
