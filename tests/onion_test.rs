// onion_test.rs - tulip onion formation and peeling tests
// Copyright (C) 2018  David Stainton.

use rand::rngs::OsRng;
use rand::{CryptoRng, Error, RngCore};

use tulipcrypto::client::{form_onion, FormedOnion, Hop};
use tulipcrypto::content::Message;
use tulipcrypto::ecdh::{PrivateKey, SymmetricKey};
use tulipcrypto::encrypt;
use tulipcrypto::error::{CryptoError, FormError, PeelErrorKind, PeelStage};
use tulipcrypto::header::{decode_header, Role};
use tulipcrypto::onion::Onion;
use tulipcrypto::params::OnionParams;
use tulipcrypto::server::{peel_onion, peel_onion_with_keys, PeelOutcome};

const SENDER_ADDRESS: &str = "http://client-0.local";

struct NodeParams {
    pub address: String,
    pub private_key: PrivateKey,
}

struct TestPath {
    sender: PrivateKey,
    nodes: Vec<NodeParams>,
    formed: FormedOnion,
}

fn new_node<R: RngCore + CryptoRng>(rng: &mut R, address: String) -> NodeParams {
    NodeParams {
        address,
        private_key: PrivateKey::generate(rng).unwrap(),
    }
}

fn new_path<R: RngCore + CryptoRng>(rng: &mut R, params: &OnionParams, body: &str) -> TestPath {
    let sender = PrivateKey::generate(rng).unwrap();
    let mut nodes = vec![];
    for i in 0..params.mixers {
        nodes.push(new_node(rng, format!("http://mixer-{}.local", i)));
    }
    for i in 0..params.gatekeepers {
        nodes.push(new_node(rng, format!("http://gatekeeper-{}.local", i)));
    }
    nodes.push(new_node(rng, "http://recipient.local".to_owned()));

    let hops: Vec<Hop> = nodes
        .iter()
        .map(|node| Hop::new(node.address.clone(), node.private_key.public_key()))
        .collect();
    let (mixers, rest) = hops.split_at(params.mixers);
    let (gatekeepers, recipient) = rest.split_at(params.gatekeepers);
    let metadata: Vec<Vec<u8>> = (0..params.num_layers()).map(|i| format!("meta-{}", i + 1).into_bytes()).collect();

    let message = Message::new(SENDER_ADDRESS, body);
    let formed = form_onion(rng, params, &sender, mixers, gatekeepers, &recipient[0], &message, &metadata).unwrap();
    TestPath { sender, nodes, formed }
}

/// Route the onion hop by hop, bruising at the mixers named in `bruises`.
/// Returns the layers peeled and the final result.
fn route(path: &TestPath, bruises: &[bool]) -> Result<Message, (u32, PeelErrorKind)> {
    let mut wire = path.formed.first().to_base64();
    let mut address = path.formed.first_hop.clone();
    for (i, node) in path.nodes.iter().enumerate() {
        assert_eq!(address, node.address);
        let peeled = peel_onion_with_keys(&wire, &node.private_key, &path.sender.public_key())
            .map_err(|err| (err.layer.unwrap_or(0), err.kind))?;
        assert_eq!(peeled.layer as usize, i + 1);
        assert_eq!(peeled.metadata, format!("meta-{}", i + 1).into_bytes());
        if let Some(message) = peeled.message() {
            return Ok(message.clone());
        }
        let bruise = bruises.get(i).copied().unwrap_or(false);
        let (next_hop, onion) = peeled.into_next(bruise).unwrap();

        // every forwarded onion is one the sender formed
        assert!(path.formed.variants(i + 2).contains(&onion));
        address = next_hop;
        wire = onion.to_base64();
    }
    panic!("onion was never delivered");
}

#[test]
fn onion_round_trip_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(5, 5, 3).unwrap();
    let path = new_path(&mut rng, &params, "secret message");
    let message = route(&path, &[]).unwrap();
    assert_eq!(message.body, b"secret message".to_vec());
    assert_eq!(message.from, SENDER_ADDRESS);
}

#[test]
fn short_path_round_trip_test() {
    let mut rng = OsRng;
    for (l1, l2) in vec![(1, 1), (1, 3), (4, 1), (2, 2)] {
        let params = OnionParams::new(l1, l2, 1).unwrap().with_payload_size(256);
        let path = new_path(&mut rng, &params, "short path");
        assert_eq!(route(&path, &[]).unwrap().body, b"short path".to_vec());
    }
}

#[test]
fn roles_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 2, 1).unwrap();
    let path = new_path(&mut rng, &params, "roles");
    let mut onion = path.formed.first().clone();
    let mut roles = vec![];
    for node in &path.nodes {
        let peeled = peel_onion_with_keys(&onion.to_base64(), &node.private_key, &path.sender.public_key()).unwrap();
        roles.push(peeled.role.clone());
        match peeled.into_next(false) {
            Some((_, next)) => onion = next,
            None => break,
        }
    }
    assert_eq!(
        roles,
        vec![
            Role::Mixer,
            Role::Mixer,
            Role::Gatekeeper,
            Role::LastGatekeeper,
            Role::Recipient("http://recipient.local".to_owned()),
        ]
    );
}

#[test]
fn header_chain_integrity_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(3, 2, 2).unwrap();
    let path = new_path(&mut rng, &params, "headers");
    let l = params.num_layers();
    for i in 0..l - 1 {
        let shared_key = path.nodes[i].private_key.shared_key(&path.sender.public_key());
        let header = &path.formed.variants(i + 1)[0].header;
        let decoded = decode_header(header, &shared_key).unwrap();
        let next = decoded.next.unwrap();
        assert_eq!(next.address, path.nodes[i + 1].address);
        assert_eq!(next.header, path.formed.variants(i + 2)[0].header.to_bytes());
    }
    let shared_key = path.nodes[l - 1].private_key.shared_key(&path.sender.public_key());
    let decoded = decode_header(&path.formed.variants(l)[0].header, &shared_key).unwrap();
    assert!(decoded.next.is_none());
}

#[test]
fn bruise_threshold_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(4, 2, 2).unwrap();
    let path = new_path(&mut rng, &params, "bruised");
    for bruises in 0..=params.mixers {
        // bruise at the last mixers so the first ones are exercised advancing
        let pattern: Vec<bool> = (0..params.mixers).map(|i| i >= params.mixers - bruises).collect();
        match route(&path, &pattern) {
            Ok(message) => {
                assert!(bruises < params.bruise_threshold);
                assert_eq!(message.body, b"bruised".to_vec());
            }
            Err((layer, kind)) => {
                assert!(bruises >= params.bruise_threshold);
                assert_eq!(layer as usize, params.last_gatekeeper());
                assert!(matches!(kind, PeelErrorKind::CheckpointFailed));
            }
        }
    }
}

#[test]
fn bruise_order_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(3, 1, 2).unwrap();
    let path = new_path(&mut rng, &params, "order");
    for history in 0..(1u32 << params.mixers) {
        let pattern: Vec<bool> = (0..params.mixers).map(|i| history & (1 << i) != 0).collect();
        let bruises = history.count_ones() as usize;
        assert_eq!(route(&path, &pattern).is_ok(), bruises < params.bruise_threshold);
    }
}

#[test]
fn wrong_key_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "misrouted");
    let wire = path.formed.first().to_base64();
    let err = peel_onion_with_keys(&wire, &path.nodes[1].private_key, &path.sender.public_key()).unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(err.stage, PeelStage::Header);
    assert!(err.layer.is_none());
}

#[test]
fn header_tamper_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "tampered");
    let shared_key = path.nodes[0].private_key.shared_key(&path.sender.public_key());
    let onion = path.formed.first();
    for i in 0..onion.header.e.len() {
        let mut tampered = onion.clone();
        tampered.header.e[i] ^= 0x80;
        let err = peel_onion(&tampered.to_base64(), &shared_key).unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(err.stage, PeelStage::Header);
    }
}

#[test]
fn content_tamper_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 2, 1).unwrap().with_payload_size(128);
    let path = new_path(&mut rng, &params, "tampered");
    // a mixer, a gatekeeper, the last gatekeeper and the recipient
    for layer in vec![1, 3, 4, 5] {
        let node = &path.nodes[layer - 1];
        let shared_key = node.private_key.shared_key(&path.sender.public_key());
        // the last gatekeeper needs a variant whose sepal still holds the key
        let onion = path
            .formed
            .variants(layer)
            .iter()
            .find(|onion| peel_onion(&onion.to_base64(), &shared_key).is_ok())
            .unwrap();
        for i in (0..onion.content.len()).step_by(7) {
            let mut tampered = onion.clone();
            tampered.content[i] ^= 0x01;
            let err = peel_onion(&tampered.to_base64(), &shared_key).unwrap_err();
            assert!(err.is_authentication(), "layer {} byte {}: {}", layer, i, err);
            assert_eq!(err.stage, PeelStage::Content);
            assert_eq!(err.layer, Some(layer as u32));
        }
    }
}

#[test]
fn next_header_tamper_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(1, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "tampered");
    let shared_key = path.nodes[0].private_key.shared_key(&path.sender.public_key());
    let mut tampered = path.formed.first().clone();
    tampered.header.next_header[0] ^= 0x01;
    let err = peel_onion(&tampered.to_base64(), &shared_key).unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(err.stage, PeelStage::Routing);
}

#[test]
fn malformed_cypher_text_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(1, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "malformed");
    let shared_key = path.nodes[0].private_key.shared_key(&path.sender.public_key());
    let mut onion = path.formed.first().clone();
    onion.header.e = encrypt(&mut rng, &shared_key, b"not a cypher text").unwrap();
    let err = peel_onion(&onion.to_base64(), &shared_key).unwrap_err();
    assert!(err.is_deserialization());
    assert!(!err.is_authentication());
    assert_eq!(err.stage, PeelStage::Header);
    assert!(err.layer.is_none());
}

#[test]
fn malformed_routing_info_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(1, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "malformed");
    let shared_key = path.nodes[0].private_key.shared_key(&path.sender.public_key());
    let mut onion = path.formed.first().clone();
    let layer_key = decode_header(&onion.header, &shared_key).unwrap().cypher_text.key;
    onion.header.next_header = encrypt(&mut rng, &layer_key, &[0xff, 0xff]).unwrap();
    let err = peel_onion(&onion.to_base64(), &shared_key).unwrap_err();
    assert!(err.is_deserialization());
    assert_eq!(err.stage, PeelStage::Routing);
    assert_eq!(err.layer, Some(1));
}

/// An entropy source that always fails.
struct BrokenRng;

impl RngCore for BrokenRng {
    fn next_u32(&mut self) -> u32 {
        panic!("BrokenRng used infallibly")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("BrokenRng used infallibly")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("BrokenRng used infallibly")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), Error> {
        Err(Error::new("entropy source unavailable"))
    }
}

impl CryptoRng for BrokenRng {}

#[test]
fn entropy_failure_test() {
    let mut rng = OsRng;
    let mut broken = BrokenRng;
    assert!(matches!(PrivateKey::generate(&mut broken), Err(CryptoError::KeyGeneration(_))));
    assert!(matches!(SymmetricKey::generate(&mut broken), Err(CryptoError::KeyGeneration(_))));
    let key = SymmetricKey::generate(&mut rng).unwrap();
    assert!(matches!(encrypt(&mut broken, &key, b"plaintext"), Err(CryptoError::KeyGeneration(_))));

    let params = OnionParams::new(1, 1, 1).unwrap();
    let sender = PrivateKey::generate(&mut rng).unwrap();
    let hops: Vec<Hop> = (0..3)
        .map(|i| Hop::new(format!("node-{}", i), PrivateKey::generate(&mut rng).unwrap().public_key()))
        .collect();
    let message = Message::new(SENDER_ADDRESS, "never sent");
    let err = form_onion(&mut broken, &params, &sender, &hops[..1], &hops[1..2], &hops[2], &message, &[]).unwrap_err();
    assert!(matches!(err, FormError::Crypto(CryptoError::KeyGeneration(_))));
}

#[test]
fn sepal_substitution_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "first");
    let other = new_path(&mut rng, &params, "second");
    let shared_key = path.nodes[0].private_key.shared_key(&path.sender.public_key());

    let mut onion = path.formed.first().clone();
    onion.sepal = other.formed.first().sepal.clone();
    let err = peel_onion(&onion.to_base64(), &shared_key).unwrap_err();
    assert!(err.is_sepal_integrity());
    assert_eq!(err.stage, PeelStage::Sepal);

    // replacing the digest table as well breaks the header tag
    onion.header.a = other.formed.first().header.a.clone();
    let err = peel_onion(&onion.to_base64(), &shared_key).unwrap_err();
    assert!(matches!(err.kind, PeelErrorKind::TagMismatch));
}

#[test]
fn untrimmed_sepal_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(2, 1, 1).unwrap();
    let path = new_path(&mut rng, &params, "untrimmed");
    let peeled = peel_onion_with_keys(&path.formed.first().to_base64(), &path.nodes[0].private_key, &path.sender.public_key()).unwrap();
    let pending = match peeled.outcome {
        PeelOutcome::Mix(pending) => pending,
        other => panic!("expected a mixer outcome, got {:?}", other),
    };
    assert_eq!(pending.sepal().len(), params.num_sepal_blocks());

    // forwarding without trimming is caught by the next hop
    let untrimmed = Onion {
        sepal: pending.sepal().clone(),
        ..pending.advance()
    };
    let err = peel_onion_with_keys(&untrimmed.to_base64(), &path.nodes[1].private_key, &path.sender.public_key()).unwrap_err();
    assert!(err.is_sepal_integrity());
    assert_eq!(err.layer, Some(2));
}

#[test]
fn idempotent_peel_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(3, 2, 2).unwrap();
    let path = new_path(&mut rng, &params, "twice");
    for (i, node) in path.nodes.iter().enumerate() {
        let wire = path.formed.variants(i + 1)[0].to_base64();
        let first = peel_onion_with_keys(&wire, &node.private_key, &path.sender.public_key());
        let second = peel_onion_with_keys(&wire, &node.private_key, &path.sender.public_key());
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            _ => panic!("peeling the same onion twice diverged at layer {}", i + 1),
        }
    }
}

#[test]
fn malformed_wire_test() {
    let mut rng = OsRng;
    let node = PrivateKey::generate(&mut rng).unwrap();
    let sender = PrivateKey::generate(&mut rng).unwrap();
    let err = peel_onion_with_keys("%%%", &node, &sender.public_key()).unwrap_err();
    assert!(err.is_deserialization());
    assert_eq!(err.stage, PeelStage::Wire);
}

#[test]
fn formed_wire_round_trip_test() {
    let mut rng = OsRng;
    let params = OnionParams::new(3, 2, 2).unwrap();
    let path = new_path(&mut rng, &params, "wire");
    for layer in 1..=params.num_layers() {
        for onion in path.formed.variants(layer) {
            assert_eq!(&Onion::from_base64(&onion.to_base64()).unwrap(), onion);
        }
    }
}
