//! Identity Normalization
//!
//! Resolves alias identifiers to phone identifiers. Resolution is an
//! enrichment: any failure returns the input unchanged.

use std::sync::Arc;

use tracing::debug;

use crate::protocol::{Jid, ProtocolClient};

/// Resolves alias-form identifiers through the protocol client's reverse mapping.
#[derive(Clone)]
pub struct IdentityNormalizer {
    client: Arc<dyn ProtocolClient>,
}

impl IdentityNormalizer {
    pub fn new(client: Arc<dyn ProtocolClient>) -> Self {
        Self { client }
    }

    /// Resolve `jid` to its phone form. Non-alias identifiers are returned
    /// unchanged without a lookup. The device index is preserved.
    pub async fn normalize(&self, jid: &Jid) -> Jid {
        if !jid.is_alias() {
            return jid.clone();
        }

        match self.client.pn_for_lid(&jid.to_non_device()).await {
            Ok(Some(pn)) if !pn.is_empty() => pn.to_non_device().with_device(jid.device),
            Ok(_) => {
                debug!(lid = %jid, "No phone mapping for alias identifier");
                jid.clone()
            }
            Err(e) => {
                debug!(lid = %jid, error = %e, "Alias identifier lookup failed");
                jid.clone()
            }
        }
    }

    /// Normalize every identifier in `jids`, preserving order.
    pub async fn normalize_all(&self, jids: &[Jid]) -> Vec<Jid> {
        let mut out = Vec::with_capacity(jids.len());
        for jid in jids {
            out.push(self.normalize(jid).await);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{jid, FakeClient};

    #[tokio::test]
    async fn phone_identifier_is_unchanged_without_lookup() {
        let client = Arc::new(FakeClient::default());
        let normalizer = IdentityNormalizer::new(client.clone());
        let pn = jid("5511999999999@s.whatsapp.net");

        assert_eq!(normalizer.normalize(&pn).await, pn);
        assert_eq!(client.lookup_count(), 0);
    }

    #[tokio::test]
    async fn normalization_is_idempotent() {
        let client = FakeClient::default().map_lid("777@lid", "5511988887777@s.whatsapp.net");
        let normalizer = IdentityNormalizer::new(Arc::new(client));
        let lid = jid("777@lid");

        let once = normalizer.normalize(&lid).await;
        let twice = normalizer.normalize(&once).await;
        assert_eq!(once.to_string(), "5511988887777@s.whatsapp.net");
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn keeps_device_index() {
        let client = FakeClient::default().map_lid("777@lid", "5511988887777@s.whatsapp.net");
        let normalizer = IdentityNormalizer::new(Arc::new(client));

        assert_eq!(
            normalizer.normalize(&jid("777:4@lid")).await.to_string(),
            "5511988887777:4@s.whatsapp.net"
        );
    }

    #[tokio::test]
    async fn unmapped_alias_is_unchanged() {
        let normalizer = IdentityNormalizer::new(Arc::new(FakeClient::default()));
        let lid = jid("123@lid");
        assert_eq!(normalizer.normalize(&lid).await, lid);
    }

    #[tokio::test]
    async fn lookup_failure_is_unchanged() {
        let client = FakeClient {
            fail_lookups: true,
            ..FakeClient::default()
        };
        let normalizer = IdentityNormalizer::new(Arc::new(client));
        let lid = jid("123@lid");
        assert_eq!(normalizer.normalize(&lid).await, lid);
    }
}
