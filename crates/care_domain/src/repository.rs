use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionChange;
use crate::error::RepositoryError;
use crate::model::{Pet, Reminder, VetVisit};

/// Partial update applied to a stored reminder. The core only ever patches
/// completion state; all other fields belong to the CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderPatch {
    pub completion: CompletionChange,
}

#[async_trait]
pub trait ReminderRepository: Send + Sync {
    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>, RepositoryError>;

    async fn patch_reminder(
        &self,
        user_id: &str,
        reminder_id: &str,
        patch: ReminderPatch,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn list_visits(&self, user_id: &str) -> Result<Vec<VetVisit>, RepositoryError>;
}

#[async_trait]
pub trait PetRepository: Send + Sync {
    async fn list_pets(&self, user_id: &str) -> Result<Vec<Pet>, RepositoryError>;
}
