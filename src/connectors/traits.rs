use crate::connectors::gateway::GatewayClient;
use crate::session::SessionStore;
use anyhow::Result;
use async_trait::async_trait;

/// Side effect hook for alert acknowledgement. The engine flips the
/// local flag first and then calls this; a failed hook never rolls the
/// view back.
#[async_trait]
pub trait AlertAcker: Send + Sync {
    async fn acknowledge(&self, alert_id: i64) -> Result<()>;
}

/// Production acker: forwards the acknowledgement to the gateway using
/// the current session token.
pub struct GatewayAcker {
    gateway: GatewayClient,
    session: SessionStore,
}

impl GatewayAcker {
    pub fn new(gateway: GatewayClient, session: SessionStore) -> Self {
        Self { gateway, session }
    }
}

#[async_trait]
impl AlertAcker for GatewayAcker {
    async fn acknowledge(&self, alert_id: i64) -> Result<()> {
        let token = self
            .session
            .token()
            .await
            .ok_or_else(|| anyhow::anyhow!("no active session"))?;
        self.gateway.acknowledge_alert(&token, alert_id).await?;
        Ok(())
    }
}

/// Acker that does nothing. Used when no gateway is reachable and in
/// tests.
pub struct NoopAcker;

#[async_trait]
impl AlertAcker for NoopAcker {
    async fn acknowledge(&self, _alert_id: i64) -> Result<()> {
        Ok(())
    }
}
