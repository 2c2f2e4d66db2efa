//! Process-lifetime cache of per-entity display colors.

use std::collections::HashMap;
use std::sync::Arc;

use peyk_odata::{CredentialContext, OdataClient, Query};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Color served when the remote defines none or the lookup fails.
pub const DEFAULT_ENTITY_COLOR: &str = "#6c757d";

#[derive(Debug, Deserialize)]
struct ColorRow {
    #[serde(rename = "EntityColor")]
    entity_color: Option<String>,
}

/// Caches entity metadata colors for the lifetime of the process.
/// Failed lookups are not cached, so a later call may still succeed.
#[derive(Debug, Clone, Default)]
pub struct EntityColorCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl EntityColorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Display color for an entity logical name. Never fails; unknown
    /// or unreachable metadata yields [`DEFAULT_ENTITY_COLOR`].
    pub async fn get(
        &self,
        client: &OdataClient,
        credentials: &CredentialContext,
        kind: &str,
    ) -> String {
        if let Some(color) = self.inner.read().await.get(kind) {
            return color.clone();
        }

        let target = format!("EntityDefinitions(LogicalName='{}')", kind.replace('\'', "''"));
        let query = Query::new().select(["EntityColor"]);
        match client.get::<ColorRow>(&target, &query, credentials).await {
            Ok(row) => {
                let color = row
                    .entity_color
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| DEFAULT_ENTITY_COLOR.to_string());
                debug!(kind, color = %color, "cached entity color");
                self.inner
                    .write()
                    .await
                    .insert(kind.to_string(), color.clone());
                color
            }
            Err(err) => {
                warn!(kind, error = %err, "entity color lookup failed, using default");
                DEFAULT_ENTITY_COLOR.to_string()
            }
        }
    }
}
