use shared::{CodecError, ConnectionId, ErrorCode, RoomCode, ServerEvent};
use thiserror::Error;

/// Rejections produced while handling a single client event.
///
/// None of these are fatal: the handler stops, the sender gets an error
/// event, and every other room and connection carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),
    #[error("room {code} is full ({capacity} players)")]
    RoomFull { code: RoomCode, capacity: usize },
    #[error("player {player} not found in room {code}")]
    PlayerNotFound { code: RoomCode, player: ConnectionId },
    #[error("connection {connection} is not a player in room {code}")]
    NotInRoom {
        code: RoomCode,
        connection: ConnectionId,
    },
    #[error("it is not connection {connection}'s turn in room {code}")]
    NotYourTurn {
        code: RoomCode,
        connection: ConnectionId,
    },
    #[error("cannot advance the turn in empty room {0}")]
    EmptyRoom(RoomCode),
    #[error("no free room code after {attempts} attempts")]
    RoomCodeExhausted { attempts: usize },
}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            RelayError::RoomFull { .. } => ErrorCode::RoomFull,
            RelayError::PlayerNotFound { .. } => ErrorCode::PlayerNotFound,
            RelayError::NotInRoom { .. } => ErrorCode::NotInRoom,
            RelayError::NotYourTurn { .. } => ErrorCode::NotYourTurn,
            RelayError::EmptyRoom(_) => ErrorCode::Internal,
            RelayError::RoomCodeExhausted { .. } => ErrorCode::RoomCodeExhausted,
        }
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::error(self.code(), self.to_string())
    }
}

/// Failures of the transport around the relay.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
