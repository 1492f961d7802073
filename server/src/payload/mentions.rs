//! Mention substitution.
//!
//! Message text refers to mentioned users as `@<user>`. When the mention was
//! made with an alias identifier, the alias user is replaced by the resolved
//! phone number so consumers see one consistent form.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::identity::IdentityNormalizer;
use crate::protocol::Jid;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\d+)").expect("valid regex"));

/// Mentions of a message after identity normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMentions {
    pub text: Option<String>,
    /// Normalized identifiers, in mention order.
    pub jids: Vec<String>,
}

/// Normalize `mentioned` and rewrite their `@user` tokens in `text`.
pub async fn resolve_mentions(
    identity: &IdentityNormalizer,
    text: Option<&str>,
    mentioned: &[Jid],
) -> ResolvedMentions {
    let normalized = identity.normalize_all(mentioned).await;

    let replacements: HashMap<&str, &str> = mentioned
        .iter()
        .zip(&normalized)
        .filter(|(from, to)| from.user != to.user)
        .map(|(from, to)| (from.user.as_str(), to.user.as_str()))
        .collect();

    ResolvedMentions {
        text: text.map(|t| substitute(t, &replacements)),
        jids: normalized.iter().map(|j| j.to_non_device().to_string()).collect(),
    }
}

/// Replace whole `@<digits>` tokens found in `replacements`.
pub fn substitute(text: &str, replacements: &HashMap<&str, &str>) -> String {
    if replacements.is_empty() {
        return text.to_string();
    }
    MENTION
        .replace_all(text, |caps: &Captures<'_>| match replacements.get(&caps[1]) {
            Some(user) => format!("@{user}"),
            None => caps[0].to_string(),
        })
        .into_owned()
}
