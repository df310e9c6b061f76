/// Jeton d'une requête de disponibilité en vol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Ne laisse passer que le résultat de la requête la plus récente ; les
/// réponses dépassées (navigation rapide entre dates) sont écartées.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest,
                "stale availability result dropped"
            );
            None
        }
    }
}
