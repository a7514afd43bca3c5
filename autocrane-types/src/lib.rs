//! Wire-level data model shared by the orchestrator and the download agent.
//!
//! Everything here is a plain value type: no I/O, no cluster client, no
//! clock. `autocrane-operator` builds the orchestrator's collaborators on top
//! of these types; a download-agent sidecar would depend on this crate alone
//! to stay in lockstep with the annotation contract.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

/// Prefix for the per-repo download-request annotation key.
///
/// Bit-exact: `"data.autocrane/req-" + repoName`. Downstream agents depend on
/// this string.
pub const REQUEST_ANNOTATION_PREFIX: &str = "data.autocrane/req-";

/// Builds the annotation key a pod's download request for `repo` is stored
/// under.
pub fn request_annotation_key(repo: &str) -> String {
    format!("{REQUEST_ANNOTATION_PREFIX}{repo}")
}

/// `(namespace, name)` identity of a pod. Value type, equality by both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodIdentifier {
    pub namespace: String,
    pub name: String,
}

impl PodIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PodIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A single download request, as transported base64(JSON)-encoded in an
/// annotation value.
///
/// Field names are bit-exact with the annotation contract (`hash`, `path`,
/// `unixTimestampSeconds`); downstream agents parse this JSON shape directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDownloadRequestDetails {
    pub hash: String,
    pub path: String,
    #[serde(rename = "unixTimestampSeconds")]
    pub unix_timestamp_seconds: i64,
}

/// Decodes an annotation value into request details.
///
/// Parse failures (invalid base64, invalid JSON, wrong shape) yield `None`
/// rather than an error: per the spec's error-handling design, a malformed
/// request annotation is treated as "no current request", not a fault worth
/// counting toward the orchestrator's consecutive-error budget.
pub fn decode_request(encoded: &str) -> Option<DataDownloadRequestDetails> {
    let bytes = BASE64.decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Encodes request details into the annotation value format.
pub fn encode_request(details: &DataDownloadRequestDetails) -> String {
    let bytes = serde_json::to_vec(details).expect("DataDownloadRequestDetails always serializes");
    BASE64.encode(bytes)
}

/// Everything the orchestrator needs to know about one pod's data
/// dependencies for a single iteration.
///
/// `data_sources` is the authoritative enumeration of repos this pod wants;
/// `requests` is the last-written (still base64-JSON-encoded) state for each,
/// keyed by repo name. A pod with an empty `drop_folder` is not a data
/// consumer this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PodDataRequestInfo {
    pub id: PodIdentifier,
    pub drop_folder: String,
    pub data_sources: Vec<String>,
    pub requests: HashMap<String, String>,
}

impl PodDataRequestInfo {
    pub fn current_request(&self, repo: &str) -> Option<DataDownloadRequestDetails> {
        self.requests.get(repo).and_then(|raw| decode_request(raw))
    }
}

/// One version entry in a repository's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub version: String,
    pub timestamp: i64,
}

/// The global manifest: for each repo, an ordered list of `{version,
/// timestamp}`, newest-last. Versions within a repo are unique and strictly
/// ordered by timestamp — callers that build a manifest are responsible for
/// upholding that invariant; nothing here enforces it at the type level since
/// the manifest is just transport.
pub type DataRepositoryManifest = HashMap<String, Vec<ManifestEntry>>;

/// `repo -> version` known-good or latest pointer, scoped to one namespace.
pub type RepoVersionMap = HashMap<String, String>;

/// Replaces the platform path separator with `_`, matching the download
/// agent's extraction-location contract (§3, §4.5).
pub fn sanitize_path_component(path: &str) -> String {
    path.replace(std::path::MAIN_SEPARATOR, "_")
}

/// A request the download agent is expected to act on: fetch `details` (if
/// present) from `repo` and place it at `extraction_location` under
/// `drop_folder`. Absent `details` signals "desired repo but no valid target
/// yet" — the pod wants data from `repo` but has no parseable request.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDownloadRequest {
    pub pod: PodIdentifier,
    pub repo: String,
    pub drop_folder: String,
    pub extraction_location: String,
    pub details: Option<DataDownloadRequestDetails>,
}

/// Download-request factory (§4.5): the contract the download agent
/// implements against. Given a pod's known data requests, emits one
/// `DataDownloadRequest` per entry in `data_sources`.
///
/// If `drop_folder` is empty, the pod is not a data consumer this cycle and
/// the empty list is returned.
pub fn build_download_requests(info: &PodDataRequestInfo) -> Vec<DataDownloadRequest> {
    if info.drop_folder.is_empty() {
        return Vec::new();
    }
    info.data_sources
        .iter()
        .map(|repo| {
            let details = info.current_request(repo);
            let extraction_location = match &details {
                Some(d) => join_drop_folder(&info.drop_folder, &sanitize_path_component(&d.path)),
                None => String::new(),
            };
            DataDownloadRequest {
                pod: info.id.clone(),
                repo: repo.clone(),
                drop_folder: info.drop_folder.clone(),
                extraction_location,
                details,
            }
        })
        .collect()
}

fn join_drop_folder(drop_folder: &str, sanitized: &str) -> String {
    let mut path = std::path::PathBuf::from(drop_folder);
    path.push(sanitized);
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(hash: &str, path: &str, ts: i64) -> DataDownloadRequestDetails {
        DataDownloadRequestDetails {
            hash: hash.to_string(),
            path: path.to_string(),
            unix_timestamp_seconds: ts,
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let d = details("v2", "models/foo.bin", 1_700_000_000);
        let encoded = encode_request(&d);
        assert_eq!(decode_request(&encoded), Some(d));
    }

    #[test]
    fn decode_rejects_non_base64() {
        assert_eq!(decode_request("not-base64!!"), None);
    }

    #[test]
    fn decode_rejects_base64_non_json() {
        let encoded = BASE64.encode("not json");
        assert_eq!(decode_request(&encoded), None);
    }

    #[test]
    fn request_annotation_key_is_bit_exact() {
        assert_eq!(request_annotation_key("models"), "data.autocrane/req-models");
    }

    #[test]
    fn factory_emits_empty_list_for_non_consumer() {
        let info = PodDataRequestInfo {
            id: PodIdentifier::new("ns", "p1"),
            drop_folder: String::new(),
            data_sources: vec!["models".into()],
            requests: HashMap::new(),
        };
        assert!(build_download_requests(&info).is_empty());
    }

    #[test]
    fn factory_emits_request_with_parsed_details() {
        let mut requests = HashMap::new();
        requests.insert(
            "models".to_string(),
            encode_request(&details("v2", "models", 1000)),
        );
        let info = PodDataRequestInfo {
            id: PodIdentifier::new("ns", "p1"),
            drop_folder: "/var/lib/autocrane/drop".into(),
            data_sources: vec!["models".into()],
            requests,
        };
        let reqs = build_download_requests(&info);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].repo, "models");
        assert!(reqs[0].extraction_location.ends_with("models"));
        assert_eq!(reqs[0].details.as_ref().unwrap().hash, "v2");
    }

    #[test]
    fn factory_emits_empty_extraction_location_when_details_missing_or_malformed() {
        let mut requests = HashMap::new();
        requests.insert("models".to_string(), "garbage".to_string());
        let info = PodDataRequestInfo {
            id: PodIdentifier::new("ns", "p1"),
            drop_folder: "/var/lib/autocrane/drop".into(),
            data_sources: vec!["models".into(), "weights".into()],
            requests,
        };
        let reqs = build_download_requests(&info);
        assert_eq!(reqs.len(), 2);
        let models = reqs.iter().find(|r| r.repo == "models").unwrap();
        assert!(models.details.is_none());
        assert!(models.extraction_location.is_empty());
        let weights = reqs.iter().find(|r| r.repo == "weights").unwrap();
        assert!(weights.details.is_none());
    }
}
