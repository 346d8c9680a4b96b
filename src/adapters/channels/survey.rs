//! CSAT survey requests sent through the customer's own channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ChannelRegistry;
use crate::domain::conversation::{Conversation, OutboundMessage};
use crate::domain::ticket::CsatRating;
use crate::ports::{DeliveryError, SurveyNotifier};

/// Sends the survey as a plain message on the conversation's channel.
///
/// The text links to `{survey_base_url}/{csat_id}` when a base URL is
/// configured and otherwise asks for a 1-5 reply.
pub struct ChannelSurveyNotifier {
    channels: Arc<ChannelRegistry>,
    survey_base_url: Option<String>,
}

impl ChannelSurveyNotifier {
    pub fn new(channels: Arc<ChannelRegistry>, survey_base_url: Option<String>) -> Self {
        Self {
            channels,
            survey_base_url: survey_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn survey_text(&self, csat: &CsatRating) -> String {
        match &self.survey_base_url {
            Some(base) => format!(
                "Thanks for contacting us! How did we do? Rate us here: {}/{}",
                base,
                csat.id()
            ),
            None => "Thanks for contacting us! How did we do? Reply with a rating from 1 to 5.".to_string(),
        }
    }
}

#[async_trait]
impl SurveyNotifier for ChannelSurveyNotifier {
    async fn request_survey(&self, conversation: &Conversation, csat: &CsatRating) -> Result<(), DeliveryError> {
        let adapter = self.channels.get(conversation.channel()).ok_or_else(|| {
            DeliveryError::NotConfigured(format!("no adapter for {}", conversation.channel()))
        })?;
        let message = OutboundMessage::to_customer(
            conversation.channel(),
            conversation.customer(),
            self.survey_text(csat),
        )
        .with_subject("How did we do?");

        adapter.deliver(&message).await?;
        tracing::debug!(
            conversation_id = %conversation.id(),
            csat_id = %csat.id(),
            channel = %conversation.channel(),
            "Survey request sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channels::RecordingChannelAdapter;
    use crate::domain::conversation::{Channel, CustomerIdentity};
    use crate::domain::foundation::{ExternalUserId, Timestamp};

    fn conversation() -> Conversation {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("psid-1").unwrap());
        Conversation::start(Channel::SocialA, customer, Timestamp::now())
    }

    #[tokio::test]
    async fn survey_is_sent_on_conversation_channel_with_link() {
        let recorder = Arc::new(RecordingChannelAdapter::new(Channel::SocialA));
        let registry = Arc::new(ChannelRegistry::new().with_adapter(recorder.clone()));
        let notifier = ChannelSurveyNotifier::new(registry, Some("https://desk.example.com/csat/".into()));
        let conv = conversation();
        let csat = CsatRating::request(conv.id(), None, Timestamp::now());

        notifier.request_survey(&conv, &csat).await.unwrap();

        let sent = recorder.delivered();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient.as_str(), "psid-1");
        assert!(sent[0].text.ends_with(&format!("https://desk.example.com/csat/{}", csat.id())));
    }

    #[tokio::test]
    async fn missing_adapter_is_not_configured() {
        let notifier = ChannelSurveyNotifier::new(Arc::new(ChannelRegistry::new()), None);
        let conv = conversation();
        let csat = CsatRating::request(conv.id(), None, Timestamp::now());

        let err = notifier.request_survey(&conv, &csat).await.unwrap_err();
        assert!(matches!(err, DeliveryError::NotConfigured(_)));
    }
}
