use crate::model::ReservationId;

#[derive(Debug)]
pub enum EngineError {
    /// Missing/invalid field, invalid enum value, bad date ordering,
    /// missing decision reason, or a limit overrun. Detected before any write.
    Validation(&'static str),
    /// The requested period/date range overlaps an active reservation.
    Conflict(ReservationId),
    NotFound(ReservationId),
    /// A decision with no acting staff identity.
    Unauthorized,
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "{msg}"),
            EngineError::Conflict(id) => {
                write!(f, "período já reservado em parte do intervalo informado (reserva {id})")
            }
            EngineError::NotFound(id) => write!(f, "reserva não encontrada: {id}"),
            EngineError::Unauthorized => write!(f, "não autenticado"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
