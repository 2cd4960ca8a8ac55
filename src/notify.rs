//! Outbound event dispatch.
//!
//! Publishing happens after the originating transaction commits and is
//! fire-and-forget: a NATS failure is logged and dropped, never propagated
//! back into the state transition that produced the event.

use crate::domain::DomainEvent;

#[derive(Clone)]
pub struct Notifier {
    client: Option<async_nats::Client>,
}

impl Notifier {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        if client.is_none() {
            tracing::warn!("notifications disabled: no NATS client configured");
        }
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn publish(&self, event: DomainEvent) {
        let Some(client) = self.client.clone() else {
            tracing::debug!(subject = event.subject(), "notification skipped");
            return;
        };
        tokio::spawn(async move {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(subject, error = %err, "event serialization failed");
                    return;
                }
            };
            if let Err(err) = client.publish(subject, payload.into()).await {
                tracing::warn!(subject, error = %err, "event publish failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantId;

    #[tokio::test]
    async fn publish_without_client_never_fails_the_caller() {
        let notifier = Notifier::disabled();
        notifier.publish(DomainEvent::OrderCreated {
            tenant_id: TenantId(1),
            order_id: 1,
            customer_id: 1,
            public_token: "tok".into(),
        });
    }
}
