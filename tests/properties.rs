//! Property tests for push signatures and feed serialization.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use secrecy::SecretString;

use hubbub::federation::{sign, verify};
use hubbub::feed::{parse, serialize, FeedDocument};
use hubbub::storage::{Author, Feed, Update};

fn flip(bytes: &[u8], index: usize, bit: u8) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let i = index % out.len();
    out[i] ^= 1 << bit;
    out
}

proptest! {
    #[test]
    fn signed_payload_verifies(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        secret in "[a-z0-9]{1,32}",
    ) {
        prop_assert!(verify(&payload, &sign(&payload, &secret), &secret));
    }

    #[test]
    fn payload_bit_flip_fails(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        secret in "[a-z0-9]{1,32}",
        index in any::<usize>(),
        bit in 0u8..8,
    ) {
        let signature = sign(&payload, &secret);
        let tampered = flip(&payload, index, bit);
        prop_assert!(!verify(&tampered, &signature, &secret));
    }

    #[test]
    fn signature_bit_flip_fails(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        secret in "[a-z0-9]{1,32}",
        index in any::<usize>(),
        bit in 0u8..8,
    ) {
        let signature = sign(&payload, &secret);
        let tampered = String::from_utf8(flip(signature.as_bytes(), index, bit));
        prop_assume!(tampered.is_ok());
        prop_assert!(!verify(&payload, &tampered.unwrap(), &secret));
    }

    #[test]
    fn secret_bit_flip_fails(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        secret in "[a-z0-9]{1,32}",
        index in any::<usize>(),
        bit in 0u8..7,
    ) {
        let signature = sign(&payload, &secret);
        // Bits 0..7 of an ASCII byte keep it ASCII.
        let other = String::from_utf8(flip(secret.as_bytes(), index, bit)).unwrap();
        prop_assert!(!verify(&payload, &signature, &other));
    }

    #[test]
    fn serialized_entries_newest_first_and_round_trip(
        created in prop::collection::vec(0i64..50, 0..20),
    ) {
        let updates: Vec<Update> = created
            .iter()
            .enumerate()
            .map(|(i, secs)| Update {
                id: i as i64 + 1,
                feed_id: 1,
                author_id: 1,
                url: format!("urn:test:{i}"),
                text: format!("update {i}"),
                created_at: ts(1_700_000_000 + secs),
                updated_at: ts(1_700_000_000 + secs + 5),
            })
            .collect();

        let mut expected = updates.clone();
        expected.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let xml = serialize(&document(updates), "https://social.example/").unwrap();
        let parsed = parse(&xml).unwrap();

        let got: Vec<(String, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = parsed
            .entries
            .iter()
            .map(|e| (e.url.clone(), e.published, e.updated))
            .collect();
        let want: Vec<(String, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = expected
            .iter()
            .map(|u| (u.url.clone(), Some(u.created_at), Some(u.updated_at)))
            .collect();
        prop_assert_eq!(got, want);
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn document(updates: Vec<Update>) -> FeedDocument {
    FeedDocument {
        feed: Feed {
            id: 1,
            remote_url: None,
            verify_token: "vt".into(),
            secret: SecretString::from("s"),
            hubs: vec!["https://hub.example/".into()],
            author_id: Some(1),
        },
        author: Author {
            id: 1,
            name: "Erin".into(),
            username: "erin".into(),
            email: None,
            remote_url: None,
            image_url: None,
        },
        updates,
    }
}
