use pawnshop_backoffice::{
    CredentialVerifier, HashCost, credentials::CredentialError,
};

// Minimum Argon2 parameters keep the suite fast; the algorithm and format are unchanged.
fn cheap_verifier() -> CredentialVerifier {
    CredentialVerifier::new(HashCost {
        memory_kib: 8,
        iterations: 1,
        lanes: 1,
    })
    .expect("cheap cost is valid")
}

#[test]
fn test_hash_then_verify() {
    let verifier = cheap_verifier();
    let hash = verifier.hash("correct horse battery staple").unwrap();

    assert!(hash.starts_with("$argon2id$"));
    assert!(verifier.verify("correct horse battery staple", &hash));
    assert!(!verifier.verify("correct horse battery stapl", &hash));
    assert!(!verifier.verify("", &hash));
}

#[test]
fn test_hashing_twice_gives_distinct_outputs_that_both_verify() {
    let verifier = cheap_verifier();
    let first = verifier.hash("s3cret!").unwrap();
    let second = verifier.hash("s3cret!").unwrap();

    assert_ne!(first, second, "each hash must carry a fresh salt");
    assert!(verifier.verify("s3cret!", &first));
    assert!(verifier.verify("s3cret!", &second));
}

#[test]
fn test_hash_does_not_contain_plaintext() {
    let verifier = cheap_verifier();
    let hash = verifier.hash("plain-visible-password").unwrap();
    assert!(!hash.contains("plain-visible-password"));
}

#[test]
fn test_malformed_hash_fails_to_verify() {
    let verifier = cheap_verifier();
    assert!(!verifier.verify("anything", "not-a-phc-string"));
    assert!(!verifier.verify("anything", ""));
    assert!(!verifier.verify("anything", "$2a$12$truncated"));
}

#[test]
fn test_legacy_bcrypt_hashes_still_verify() {
    let verifier = cheap_verifier();
    let legacy = bcrypt::hash("clerk-pass", 12).unwrap();
    assert!(legacy.starts_with("$2b$12$"));

    assert!(verifier.verify("clerk-pass", &legacy));
    assert!(!verifier.verify("Clerk-pass", &legacy));
    assert!(!verifier.verify("", &legacy));

    // Older libraries write the same hash under the 2a and 2y markers.
    for marker in ["$2a$", "$2y$"] {
        let relabelled = legacy.replacen("$2b$", marker, 1);
        assert!(verifier.verify("clerk-pass", &relabelled), "{marker}");
    }
}

#[test]
fn test_verification_reads_cost_from_stored_hash() {
    let old = cheap_verifier();
    let hash = old.hash("rotated-cost").unwrap();

    let newer = CredentialVerifier::new(HashCost {
        memory_kib: 16,
        iterations: 2,
        lanes: 1,
    })
    .unwrap();

    assert!(newer.verify("rotated-cost", &hash));
    assert!(newer.hash("rotated-cost").unwrap().contains("m=16,t=2,p=1"));
}

#[test]
fn test_invalid_cost_is_rejected() {
    let result = CredentialVerifier::new(HashCost {
        memory_kib: 8,
        iterations: 0,
        lanes: 1,
    });
    assert!(matches!(result, Err(CredentialError::InvalidCost(_))));
}

#[test]
fn test_default_cost_is_argon2id_strength() {
    let cost = HashCost::default();
    assert_eq!(cost.memory_kib, 64 * 1024);
    assert_eq!(cost.iterations, 3);
    assert_eq!(cost.lanes, 1);
}
