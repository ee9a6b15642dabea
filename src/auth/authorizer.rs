//! Server-side verification of signed content requests.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::DenialReason;
use crate::identity::{Address, ChainId};
use crate::protocol::AuthorizedRequest;
use crate::validation::Area;

use super::{recover_signer, NonceCheck, NonceKey, NonceStore};

/// Proof that a request was authorized for one owner and area.
///
/// Only [`RequestAuthorizer`] can create one, and gateway operations consume
/// it, so every store access is preceded by a fresh verdict.
#[derive(Debug)]
pub struct Authorization {
    visitor: Address,
    owner: Address,
    area: Area,
}

impl Authorization {
    pub fn visitor(&self) -> &Address {
        &self.visitor
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn area(&self) -> &Area {
        &self.area
    }
}

/// Outcome of an authorization check.
#[derive(Debug)]
pub enum Verdict {
    Authorized(Authorization),
    Denied(DenialReason),
}

impl Verdict {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// The denial reason, if any.
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            Self::Authorized(_) => None,
            Self::Denied(reason) => Some(*reason),
        }
    }
}

/// Nonce freshness policy.
#[derive(Debug, Clone)]
pub struct NoncePolicy {
    /// Oldest accepted nonce age.
    pub max_age: Duration,
    /// Tolerated clock difference for nonces stamped in the future.
    pub max_clock_skew: Duration,
    /// Accept nonces without an embedded issuance time.
    pub accept_opaque: bool,
}

impl Default for NoncePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(300),
            max_clock_skew: Duration::from_secs(30),
            accept_opaque: false,
        }
    }
}

impl NoncePolicy {
    /// Shortest TTL the nonce store may use under this policy.
    ///
    /// Freshness is judged in whole seconds and the age bound is inclusive,
    /// so a nonce stays acceptable for up to one second past
    /// `max_age + max_clock_skew` after it is first seen.
    pub fn min_store_ttl(&self) -> Duration {
        self.max_age
            .saturating_add(self.max_clock_skew)
            .saturating_add(Duration::from_secs(1))
    }

    fn is_fresh(&self, issued_at: Option<u64>, now: u64) -> bool {
        let Some(issued_at) = issued_at else {
            return self.accept_opaque;
        };

        if issued_at > now {
            return issued_at - now <= self.max_clock_skew.as_secs();
        }
        now - issued_at <= self.max_age.as_secs()
    }
}

/// Verifies signed requests.
pub struct RequestAuthorizer {
    chain_id: ChainId,
    policy: NoncePolicy,
    nonce_store: Arc<NonceStore>,
}

impl RequestAuthorizer {
    /// Create a new authorizer accepting signatures for `chain_id`.
    pub fn new(chain_id: ChainId, policy: NoncePolicy, nonce_store: Arc<NonceStore>) -> Self {
        if nonce_store.ttl() < policy.min_store_ttl() {
            warn!(
                store_ttl_secs = nonce_store.ttl().as_secs(),
                required_secs = policy.min_store_ttl().as_secs(),
                "Nonce store TTL is shorter than the nonce validity window, replays are possible"
            );
        }
        if policy.accept_opaque {
            warn!(
                store_ttl_secs = nonce_store.ttl().as_secs(),
                "Opaque nonces are accepted: they carry no issuance time and can be replayed once the nonce store forgets them"
            );
        }
        Self {
            chain_id,
            policy,
            nonce_store,
        }
    }

    /// Create an authorizer from settings, sharing `nonce_store`.
    pub fn from_settings(settings: &Settings, nonce_store: Arc<NonceStore>) -> Self {
        Self::new(
            ChainId(settings.chain.chain_id),
            NoncePolicy {
                max_age: Duration::from_secs(settings.security.max_nonce_age_seconds),
                max_clock_skew: Duration::from_secs(settings.security.max_clock_skew_seconds),
                accept_opaque: settings.security.accept_opaque_nonces,
            },
            nonce_store,
        )
    }

    /// The chain this authorizer accepts.
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Judge `request` against the current wall clock.
    pub fn authorize(&self, request: &AuthorizedRequest) -> Verdict {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.authorize_at(request, now)
    }

    /// Judge `request` as of `now` (unix seconds).
    ///
    /// Checks, in order:
    /// 1. Chain id matches the configured chain
    /// 2. Signature recovers to the claimed visitor
    /// 3. Nonce not already consumed for this visitor/owner/area (consumes it)
    /// 4. Nonce issuance time inside the validity window
    pub fn authorize_at(&self, request: &AuthorizedRequest, now: u64) -> Verdict {
        if request.chain_id != self.chain_id {
            return Verdict::Denied(DenialReason::ChainMismatch);
        }

        let message = request.signing_message();
        match recover_signer(&message, &request.signature) {
            Some(signer) if signer == request.visitor => {}
            recovered => {
                debug!(
                    claimed = %request.visitor,
                    recovered = ?recovered,
                    "Signature does not match claimed visitor"
                );
                return Verdict::Denied(DenialReason::AddressMismatch);
            }
        }

        let key = NonceKey {
            visitor: request.visitor,
            owner: request.owner,
            area: request.area.clone(),
            nonce: request.nonce.clone(),
        };
        match self.nonce_store.check_and_store(key) {
            NonceCheck::Recorded => {}
            NonceCheck::Replayed => return Verdict::Denied(DenialReason::NonceReplayed),
            NonceCheck::Full => return Verdict::Denied(DenialReason::NonceStoreFull),
        }

        if !self.policy.is_fresh(request.nonce.issued_at(), now) {
            return Verdict::Denied(DenialReason::NonceExpired);
        }

        Verdict::Authorized(Authorization {
            visitor: request.visitor,
            owner: request.owner,
            area: request.area.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AuthHeaders, ChallengeBuilder, Nonce};
    use crate::validation::validate_area;
    use crate::wallet::LocalKeyWallet;
    use k256::ecdsa::SigningKey;

    const NOW: u64 = 1_700_000_000;

    fn owner() -> Address {
        "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359".parse().unwrap()
    }

    fn authorizer(policy: NoncePolicy) -> RequestAuthorizer {
        let store = Arc::new(NonceStore::new(policy.min_store_ttl(), 1024));
        RequestAuthorizer::new(ChainId(42), policy, store)
    }

    fn signed_request(key: &SigningKey, area: &str, chain: ChainId, nonce: Nonce) -> AuthorizedRequest {
        let visitor = LocalKeyWallet::address_of(key);
        let area = validate_area(area).unwrap();
        let message = ChallengeBuilder::build(&visitor, &owner(), &area, chain, &nonce);
        let signature = LocalKeyWallet::sign_with(key, &message).unwrap();
        AuthorizedRequest::new(
            AuthHeaders {
                visitor,
                nonce,
                signature,
                chain_id: chain,
            },
            owner(),
            area,
        )
    }

    #[test]
    fn test_valid_request_authorized() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(7);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW));

        match authorizer.authorize_at(&request, NOW + 5) {
            Verdict::Authorized(auth) => {
                assert_eq!(auth.owner(), &owner());
                assert_eq!(auth.area().as_str(), "gallery");
                assert_eq!(auth.visitor(), &LocalKeyWallet::address_of(&key));
            }
            Verdict::Denied(reason) => panic!("unexpected denial: {}", reason),
        }
    }

    #[test]
    fn test_opaque_nonce_scenario() {
        let authorizer = authorizer(NoncePolicy {
            accept_opaque: true,
            ..NoncePolicy::default()
        });
        let key = LocalKeyWallet::key_from_seed(8);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::parse("n-123").unwrap());

        assert!(authorizer.authorize_at(&request, NOW).is_authorized());
        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceReplayed)
        );
    }

    #[test]
    fn test_replay_denied() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(9);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW));

        assert!(authorizer.authorize_at(&request, NOW).is_authorized());
        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceReplayed)
        );
    }

    #[test]
    fn test_foreign_key_denied() {
        let authorizer = authorizer(NoncePolicy::default());
        let visitor_key = LocalKeyWallet::key_from_seed(10);
        let attacker_key = LocalKeyWallet::key_from_seed(11);

        let mut request =
            signed_request(&attacker_key, "gallery", ChainId(42), Nonce::mint_at(NOW));
        request.visitor = LocalKeyWallet::address_of(&visitor_key);

        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::AddressMismatch)
        );
    }

    #[test]
    fn test_tampered_area_denied() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(12);
        let mut request = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW));
        request.area = validate_area("vip").unwrap();

        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::AddressMismatch)
        );
    }

    #[test]
    fn test_wrong_chain_denied_regardless_of_signature() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(13);

        let valid = signed_request(&key, "gallery", ChainId(1), Nonce::mint_at(NOW));
        assert_eq!(
            authorizer.authorize_at(&valid, NOW).denial(),
            Some(DenialReason::ChainMismatch)
        );

        let mut forged = signed_request(&key, "gallery", ChainId(1), Nonce::mint_at(NOW));
        forged.visitor = owner();
        assert_eq!(
            authorizer.authorize_at(&forged, NOW).denial(),
            Some(DenialReason::ChainMismatch)
        );
    }

    #[test]
    fn test_denied_requests_do_not_burn_nonce() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(14);
        let nonce = Nonce::mint_at(NOW);

        let mut wrong_chain = signed_request(&key, "gallery", ChainId(42), nonce.clone());
        wrong_chain.chain_id = ChainId(5);
        assert!(!authorizer.authorize_at(&wrong_chain, NOW).is_authorized());

        let mut forged = signed_request(&key, "gallery", ChainId(42), nonce.clone());
        forged.signature = signed_request(&LocalKeyWallet::key_from_seed(15), "gallery", ChainId(42), nonce.clone()).signature;
        assert!(!authorizer.authorize_at(&forged, NOW).is_authorized());

        let genuine = signed_request(&key, "gallery", ChainId(42), nonce);
        assert!(authorizer.authorize_at(&genuine, NOW).is_authorized());
    }

    #[test]
    fn test_opaque_nonce_accepted_again_after_store_forgets() {
        let policy = NoncePolicy {
            accept_opaque: true,
            ..NoncePolicy::default()
        };
        let store = Arc::new(NonceStore::new(Duration::from_millis(20), 16));
        let authorizer = RequestAuthorizer::new(ChainId(42), policy, store);
        let key = LocalKeyWallet::key_from_seed(21);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::parse("n-456").unwrap());

        assert!(authorizer.authorize_at(&request, NOW).is_authorized());
        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceReplayed)
        );

        // No issuance time to age it out, so only the store stands in the way.
        std::thread::sleep(Duration::from_millis(40));
        assert!(authorizer.authorize_at(&request, NOW + 3600).is_authorized());
    }

    #[test]
    fn test_nonce_remembered_through_last_fresh_second() {
        let policy = NoncePolicy {
            max_age: Duration::from_secs(1),
            max_clock_skew: Duration::ZERO,
            accept_opaque: false,
        };
        let authorizer = authorizer(policy);
        let key = LocalKeyWallet::key_from_seed(20);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW));

        assert!(authorizer.authorize_at(&request, NOW).is_authorized());

        // Still inside the inclusive age bound one second later.
        std::thread::sleep(Duration::from_millis(1050));
        assert_eq!(
            authorizer.authorize_at(&request, NOW + 1).denial(),
            Some(DenialReason::NonceReplayed)
        );
    }

    #[test]
    fn test_full_nonce_store_fails_closed() {
        let store = Arc::new(NonceStore::new(NoncePolicy::default().min_store_ttl(), 4));
        let authorizer = RequestAuthorizer::new(ChainId(42), NoncePolicy::default(), store);
        let victim = LocalKeyWallet::key_from_seed(21);
        let attacker = LocalKeyWallet::key_from_seed(22);

        let request = signed_request(&victim, "gallery", ChainId(42), Nonce::mint_at(NOW));
        assert!(authorizer.authorize_at(&request, NOW).is_authorized());

        for i in 0..4 {
            let filler = signed_request(&attacker, "gallery", ChainId(42), Nonce::mint_at(NOW + i));
            let _ = authorizer.authorize_at(&filler, NOW);
        }

        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceReplayed)
        );
        let fresh = signed_request(&attacker, "archive", ChainId(42), Nonce::mint_at(NOW));
        assert_eq!(
            authorizer.authorize_at(&fresh, NOW).denial(),
            Some(DenialReason::NonceStoreFull)
        );
    }

    #[test]
    fn test_min_store_ttl_covers_boundary_second() {
        let policy = NoncePolicy::default();
        assert_eq!(policy.min_store_ttl(), Duration::from_secs(331));
    }

    #[test]
    fn test_stale_nonce_expired() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(16);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW - 600));

        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceExpired)
        );
    }

    #[test]
    fn test_future_nonce_beyond_skew_expired() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(17);

        let slight = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW + 10));
        assert!(authorizer.authorize_at(&slight, NOW).is_authorized());

        let far = signed_request(&key, "gallery", ChainId(42), Nonce::mint_at(NOW + 120));
        assert_eq!(
            authorizer.authorize_at(&far, NOW).denial(),
            Some(DenialReason::NonceExpired)
        );
    }

    #[test]
    fn test_opaque_nonce_rejected_by_default() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(18);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::parse("n-123").unwrap());

        assert_eq!(
            authorizer.authorize_at(&request, NOW).denial(),
            Some(DenialReason::NonceExpired)
        );
    }

    #[test]
    fn test_authorize_uses_wall_clock() {
        let authorizer = authorizer(NoncePolicy::default());
        let key = LocalKeyWallet::key_from_seed(19);
        let request = signed_request(&key, "gallery", ChainId(42), Nonce::mint());

        assert!(authorizer.authorize(&request).is_authorized());
    }
}
