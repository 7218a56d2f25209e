//! Hard caps on inbound data. Everything here bounds memory or WAL growth;
//! requests past a limit are rejected with a validation error.

/// Short requester fields: institution, responsible, email, phone.
pub const MAX_FIELD_LEN: usize = 256;

/// Long free text: purpose, notes, decision reason.
pub const MAX_TEXT_LEN: usize = 2_000;

/// Attachment URLs are stored verbatim.
pub const MAX_URL_LEN: usize = 1_024;

/// Widest bookable date range, inclusive.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Accepted calendar window for reservation dates.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2100;

/// Per-period reservation cap; the four lanes bound total state.
pub const MAX_RESERVATIONS_PER_PERIOD: usize = 100_000;

/// Concurrent staff sessions.
pub const MAX_SESSIONS: usize = 10_000;
