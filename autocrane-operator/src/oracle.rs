use std::cell::RefCell;
use std::collections::HashMap;

use autocrane_types::{DataDownloadRequestDetails, PodDataRequestInfo, RepoVersionMap};

/// Pure decision function producing per-`(pod, repo)` upgrade/rollback
/// decisions (§4.2).
///
/// Constructed fresh each iteration from `(known_good, latest, requests)` and
/// discarded after use — it owns no lifetime beyond one iteration (§9,
/// "Pure oracle built each iteration"). It performs no I/O, no clock reads,
/// and never mutates its inputs; the only interior state it keeps is the
/// per-repo rollout-gate counter described below, which is local bookkeeping
/// for *this* construction, not a mutation of the inputs themselves.
///
/// Rollout gate: at most `max(1, ceil(N / 3))` pods for a given repo may hold
/// `cur.version == latest` at once, counting pods already observed there plus
/// upgrades granted earlier in this pass, where `N` is the number of pods
/// that list the repo in `data_sources`. `N` and the cap are fixed at
/// construction time from the `requests` slice, so repeated
/// `get_data_request` calls against the same constructed oracle are
/// deterministic (Testable Property 1) — only the *order* of calls, which is
/// the caller's iteration order over `requests`, affects which specific pods
/// get through the gate.
pub struct UpgradeOracle {
    known_good: RepoVersionMap,
    latest: RepoVersionMap,
    rollout_caps: HashMap<String, usize>,
    already_at_latest: HashMap<String, usize>,
    granted_this_pass: RefCell<HashMap<String, usize>>,
}

impl UpgradeOracle {
    pub fn new(
        known_good: RepoVersionMap,
        latest: RepoVersionMap,
        requests: &[PodDataRequestInfo],
    ) -> Self {
        let mut totals: HashMap<String, usize> = HashMap::new();
        let mut already_at_latest: HashMap<String, usize> = HashMap::new();
        for info in requests {
            for repo in &info.data_sources {
                *totals.entry(repo.clone()).or_insert(0) += 1;
                if let Some(lt) = latest.get(repo)
                    && let Some(cur) = info.current_request(repo)
                    && &cur.hash == lt
                {
                    *already_at_latest.entry(repo.clone()).or_insert(0) += 1;
                }
            }
        }
        let rollout_caps = totals
            .into_iter()
            .map(|(repo, n)| (repo, rollout_cap(n)))
            .collect();
        Self {
            known_good,
            latest,
            rollout_caps,
            already_at_latest,
            granted_this_pass: RefCell::new(HashMap::new()),
        }
    }

    /// Decides the next request for `repo` on `pod`, given the repo's
    /// currently-annotated (still base64-JSON-encoded) request, if any.
    ///
    /// `pod` is accepted for symmetry with the spec's `GetDataRequest(pod,
    /// repo)` signature and future extension (e.g. per-pod rollout
    /// overrides); the decision policy itself is pod-identity-agnostic.
    pub fn get_data_request(
        &self,
        _pod: &autocrane_types::PodIdentifier,
        repo: &str,
        current_raw: Option<&str>,
    ) -> Option<DataDownloadRequestDetails> {
        let kg = self.known_good.get(repo);
        let lt = self.latest.get(repo);
        if kg.is_none() && lt.is_none() {
            return None;
        }

        let cur = current_raw.and_then(autocrane_types::decode_request);
        let Some(cur) = cur else {
            // rule 2: absent or malformed -> propose kg, else lt
            let target = kg.or(lt)?;
            return Some(self.propose(target, repo));
        };

        if let Some(lt) = lt
            && cur.hash == *lt
        {
            // rule 3: already at target
            return None;
        }

        if let (Some(kg), Some(lt)) = (kg, lt)
            && cur.hash == *kg
            && lt != kg
        {
            // rule 4: begin upgrade, gated by rollout cap
            return if self.try_reserve_upgrade(repo) {
                Some(self.propose(lt, repo))
            } else {
                None
            };
        }

        // rule 5: drift (cur is neither kg nor lt) -> roll back to
        // known-good, if we have one.
        match kg {
            Some(kg) if cur.hash != *kg => Some(self.propose(kg, repo)),
            _ => None,
        }
    }

    fn propose(&self, version: &str, repo: &str) -> DataDownloadRequestDetails {
        DataDownloadRequestDetails {
            hash: version.to_string(),
            // No separate repo-path registry exists in the data model; the
            // canonical path for a repo is the repo name itself (see
            // SPEC_FULL.md's resolved ambiguity note).
            path: repo.to_string(),
            // Filled in by the caller from the injected clock.
            unix_timestamp_seconds: 0,
        }
    }

    fn try_reserve_upgrade(&self, repo: &str) -> bool {
        let cap = *self.rollout_caps.get(repo).unwrap_or(&0);
        let already = *self.already_at_latest.get(repo).unwrap_or(&0);
        let mut granted = self.granted_this_pass.borrow_mut();
        let slot = granted.entry(repo.to_string()).or_insert(0);
        if already + *slot < cap {
            *slot += 1;
            true
        } else {
            false
        }
    }
}

fn rollout_cap(n: usize) -> usize {
    n.div_ceil(3).max(1)
}
