//! Option-set metadata resolution.
//!
//! Dataverse stores enumerated columns as integers and exposes the
//! label ↔ value mapping through the `EntityDefinitions` metadata API.
//! The gateway resolves caller-supplied labels ("Male", "Family", "Credit
//! Card") to their integer values before writing.
//!
//! ## Caching
//!
//! Option sets change only when the CRM solution is republished, so each
//! `(entity, attribute)` pair is fetched once per process and served from
//! an in-memory map afterwards.
//!
//! ## Miss semantics
//!
//! A label with no matching option resolves to `Ok(None)` — never to a
//! default value. Callers decide whether a miss is caller error (unknown
//! gender label) or an environment fault (missing `Activated` status).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::CrmError;
use crate::API_PREFIX;

/// Cached label → value maps, keyed by `(entity, attribute)`.
type OptionCache = HashMap<(String, String), HashMap<String, i32>>;

// -- Metadata wire types ------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PicklistMetadata {
    #[serde(rename = "OptionSet", default)]
    option_set: Option<OptionSetMetadata>,
}

#[derive(Debug, Deserialize)]
struct OptionSetMetadata {
    #[serde(rename = "Options", default)]
    options: Vec<OptionMetadata>,
}

#[derive(Debug, Deserialize)]
struct OptionMetadata {
    #[serde(rename = "Value")]
    value: i32,
    #[serde(rename = "Label", default)]
    label: Option<LabelMetadata>,
}

#[derive(Debug, Deserialize)]
struct LabelMetadata {
    #[serde(rename = "UserLocalizedLabel", default)]
    user_localized_label: Option<LocalizedLabel>,
}

#[derive(Debug, Deserialize)]
struct LocalizedLabel {
    #[serde(rename = "Label", default)]
    label: Option<String>,
}

// -- Client -------------------------------------------------------------------

/// Client for option-set metadata lookups.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: url::Url,
    cache: Arc<RwLock<OptionCache>>,
}

impl MetadataClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self {
            http,
            base_url,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve an option-set label to its integer value.
    ///
    /// Labels are matched case-insensitively. Returns `Ok(None)` when the
    /// attribute has no option with that label.
    pub async fn option_value(
        &self,
        entity: &str,
        attribute: &str,
        label: &str,
    ) -> Result<Option<i32>, CrmError> {
        let key = (entity.to_string(), attribute.to_string());
        let needle = label.trim().to_lowercase();

        if let Some(options) = self.cache.read().get(&key) {
            return Ok(options.get(&needle).copied());
        }

        let options = self.fetch_options(entity, attribute).await?;
        let resolved = options.get(&needle).copied();
        self.cache.write().insert(key, options);
        Ok(resolved)
    }

    /// Fetch and flatten the option list for one attribute.
    ///
    /// Calls `GET {base_url}/api/data/v9.2/EntityDefinitions(LogicalName=
    /// '{entity}')/Attributes(LogicalName='{attribute}')/Microsoft.Dynamics.
    /// CRM.PicklistAttributeMetadata?$select=LogicalName&$expand=OptionSet
    /// ($select=Options)`.
    async fn fetch_options(
        &self,
        entity: &str,
        attribute: &str,
    ) -> Result<HashMap<String, i32>, CrmError> {
        let endpoint = format!("GET /EntityDefinitions/{entity}/{attribute}");
        let url = format!(
            "{}{}/EntityDefinitions(LogicalName='{entity}')/Attributes(LogicalName='{attribute}')/Microsoft.Dynamics.CRM.PicklistAttributeMetadata",
            self.base_url, API_PREFIX
        );

        let resp = crate::retry::retry_send(|| {
            self.http
                .get(&url)
                .query(&[
                    ("$select", "LogicalName"),
                    ("$expand", "OptionSet($select=Options)"),
                ])
                .send()
        })
        .await
        .map_err(|e| CrmError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint,
                status,
                body,
            });
        }

        let parsed: PicklistMetadata =
            resp.json().await.map_err(|e| CrmError::Deserialization {
                endpoint,
                source: e,
            })?;

        let mut options = HashMap::new();
        if let Some(option_set) = parsed.option_set {
            for option in option_set.options {
                let label = option
                    .label
                    .and_then(|l| l.user_localized_label)
                    .and_then(|l| l.label);
                if let Some(label) = label {
                    options.insert(label.trim().to_lowercase(), option.value);
                }
            }
        }
        Ok(options)
    }
}
