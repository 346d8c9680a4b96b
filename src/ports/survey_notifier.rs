//! Survey notifier port - asks the customer for a satisfaction rating.

use async_trait::async_trait;

use super::DeliveryError;
use crate::domain::conversation::Conversation;
use crate::domain::ticket::CsatRating;

/// Sends the CSAT survey request for a resolved conversation or ticket.
///
/// Invoked after the commit, outside any lock. Failures are recorded as
/// `delivery_failed` audit entries by the caller and never undo the
/// resolution.
#[async_trait]
pub trait SurveyNotifier: Send + Sync {
    async fn request_survey(
        &self,
        conversation: &Conversation,
        csat: &CsatRating,
    ) -> Result<(), DeliveryError>;
}
