//! Client side of the board: a local shadow copy of one board, optimistic mutations
//! against it, the drag state machine, and the transport to the server.
//!
//! ```text
//!   drag gesture ──► DragSession ──► Move ──┐
//!                                           ▼
//!   create/rename/delete ──────────► MutationController ──► Transport ──► /api
//!                                     │ confirmed snapshot
//!                                     │ local state (+ pending)
//! ```

mod controller;
mod drag;
mod state;
mod transport;

pub use controller::{Mutation, MutationController, MutationOutcome, MutationPhase, Notice};
pub use drag::{DragSession, DragState};
pub use state::{BoardState, ListColumn, TaskCard};
pub use transport::{HttpTransport, Transport};

use std::fmt;

use uuid::Uuid;

/// Identity of a record on the client: a temporary id until the server confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClientId {
    /// Local-only record, rendered as `temp-N`.
    Temp(u64),
    Server(Uuid),
}

impl ClientId {
    pub fn is_temp(&self) -> bool {
        matches!(self, ClientId::Temp(_))
    }

    pub fn server_id(&self) -> Option<Uuid> {
        match self {
            ClientId::Server(id) => Some(*id),
            ClientId::Temp(_) => None,
        }
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        ClientId::Server(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientId::Temp(n) => write!(f, "temp-{}", n),
            ClientId::Server(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId::Temp(3).to_string(), "temp-3");
        let id = Uuid::new_v4();
        assert_eq!(ClientId::from(id).to_string(), id.to_string());
        assert_eq!(ClientId::Server(id).server_id(), Some(id));
        assert!(ClientId::Temp(1).is_temp());
    }
}
