/// Which end of the connection the decoder sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Clients must mask every frame they send, servers must never mask, so
    /// a server decodes masked input and a client decodes unmasked input.
    #[must_use]
    pub fn expects_masked(self) -> bool { matches!(self, Role::Server) }
}
