//! Tests for HMAC-SHA256 delivery verification.

use super::*;

const SECRET: &str = "s3cr3t";
const BODY: &[u8] = br#"{"repository":{"name":"r1"},"sender":{"login":"u1"}}"#;

mod verify_signature_tests {
    use super::*;

    /// Verify that a correctly computed signature is accepted
    #[test]
    fn test_valid_signature_is_accepted() {
        let signature = compute_signature(SECRET.as_bytes(), BODY);
        assert!(verify_signature(SECRET.as_bytes(), BODY, &signature));
    }

    /// Verify the known digest for a published test vector
    #[test]
    fn test_known_digest() {
        // RFC 4231 test case 2
        let signature = compute_signature(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    /// Verify that any single-byte mutation of the body is rejected
    #[test]
    fn test_mutated_body_is_rejected() {
        let signature = compute_signature(SECRET.as_bytes(), BODY);
        for index in 0..BODY.len() {
            let mut mutated = BODY.to_vec();
            mutated[index] ^= 0x01;
            assert!(
                !verify_signature(SECRET.as_bytes(), &mutated, &signature),
                "mutation at byte {} was accepted",
                index
            );
        }
    }

    /// Verify that a signature made with a different secret is rejected
    #[test]
    fn test_wrong_secret_is_rejected() {
        let signature = compute_signature(b"other-secret", BODY);
        assert!(!verify_signature(SECRET.as_bytes(), BODY, &signature));
    }

    /// Verify that malformed header values are rejected without panicking
    #[test]
    fn test_malformed_header_values_are_rejected() {
        let digest = compute_signature(SECRET.as_bytes(), BODY);
        let bare_hex = digest.trim_start_matches(SIGNATURE_PREFIX);

        assert!(!verify_signature(SECRET.as_bytes(), BODY, bare_hex));
        assert!(!verify_signature(SECRET.as_bytes(), BODY, "sha256=zz"));
        assert!(!verify_signature(SECRET.as_bytes(), BODY, "sha256="));
        assert!(!verify_signature(SECRET.as_bytes(), BODY, ""));
        assert!(!verify_signature(
            SECRET.as_bytes(),
            BODY,
            &format!("sha1={}", bare_hex)
        ));
    }
}

mod signature_verifier_tests {
    use super::*;

    #[test]
    fn test_without_secret_everything_is_accepted() {
        let verifier = SignatureVerifier::new(None);
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(BODY, None));
        assert!(verifier.verify(BODY, Some("sha256=garbage")));
    }

    #[test]
    fn test_empty_secret_disables_verification() {
        let verifier = SignatureVerifier::new(Some(String::new()));
        assert!(!verifier.is_enabled());
    }

    #[test]
    fn test_missing_header_is_rejected_when_secret_configured() {
        let verifier = SignatureVerifier::new(Some(SECRET.to_string()));
        assert!(verifier.is_enabled());
        assert!(!verifier.verify(BODY, None));
    }

    #[test]
    fn test_signature_over_different_body_is_rejected() {
        let verifier = SignatureVerifier::new(Some(SECRET.to_string()));
        let signature = compute_signature(SECRET.as_bytes(), b"{\"other\":true}");
        assert!(!verifier.verify(BODY, Some(&signature)));
        assert!(verifier.verify(
            BODY,
            Some(&compute_signature(SECRET.as_bytes(), BODY))
        ));
    }

    #[test]
    fn test_debug_output_redacts_secret() {
        let verifier = SignatureVerifier::new(Some(SECRET.to_string()));
        let debug = format!("{:?}", verifier);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("<REDACTED>"));
    }
}
