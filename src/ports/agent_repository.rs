//! Agent repository port (read side).

use async_trait::async_trait;

use crate::domain::agent::Agent;
use crate::domain::foundation::{AgentId, DomainError};

/// Read access to agents.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Find an agent by its ID.
    async fn find_agent(&self, id: AgentId) -> Result<Option<Agent>, DomainError>;

    /// All agents in registration order.
    async fn list_agents(&self) -> Result<Vec<Agent>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn AgentRepository) {}
    }
}
