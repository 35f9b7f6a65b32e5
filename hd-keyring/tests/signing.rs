//! Tests for signing through the keyring

use std::str::FromStr;

use ethers::types::{Signature, TransactionRequest, H256};
use hd_keyring::crypto::curve::{Curve, CurveHash, CurveParams};
use hd_keyring::crypto::keys::{DerivationPath, DerivationTree};
use hd_keyring::crypto::mnemonic::mnemonic_to_seed;
use hd_keyring::signing::decode_hex;
use hd_keyring::{Error, EthereumTransaction, Keyring, KeyringOptions, LegacyTypedField, TypedData};

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const FIRST: &str = "0x9858effd232b4033e47d90003d41ec34ecaeda94";
const DIGEST: &str = "0x1e542e2da71b3f5d7b4e9d329b4d30ac0b5d6f266ebef7364bf61c39aac35d00";
const APP_PATH: &str = "m/44'/60'/1'/0/0";
const APP_ADDRESS: &str = "0x78839f6054d7ed13918bae0473ba31b1ca9d7265";

fn keyring() -> Keyring {
    Keyring::new(KeyringOptions {
        mnemonic: Some(ABANDON.to_string()),
        number_of_accounts: Some(1),
        hd_path: None,
    })
    .unwrap()
}

fn signer_of(signature: &str, message: impl Into<ethers::types::RecoveryMessage>) -> String {
    let signature = Signature::from_str(signature).unwrap();
    format!("{:?}", signature.recover(message).unwrap())
}

fn app_private_key() -> Vec<u8> {
    let seed = mnemonic_to_seed(ABANDON, None).unwrap();
    let tree = DerivationTree::new(&seed, &DerivationPath::default()).unwrap();
    tree.derive_path(&APP_PATH.parse().unwrap()).unwrap().private_key().as_bytes().to_vec()
}

fn secp256k1_params() -> CurveParams {
    CurveParams {
        p: "ffffffff ffffffff ffffffff ffffffff ffffffff ffffffff fffffffe fffffc2f".to_string(),
        a: "0".to_string(),
        b: "7".to_string(),
        n: "ffffffff ffffffff ffffffff fffffffe baaedce6 af48a03b bfd25e8c d0364141".to_string(),
        g: (
            "79be667e f9dcbbac 55a06295 ce870b07 029bfcdb 2dce28d9 59f2815b 16f81798".to_string(),
            "483ada77 26a3c465 5da4fbfc 0e1108a8 fd17b448 a6855419 9c47d08f fb10d4b8".to_string(),
        ),
        hash: CurveHash::Sha256,
    }
}

#[test]
fn test_sign_message_recovers_account() {
    let keyring = keyring();
    let signature = keyring.sign_message(FIRST, DIGEST).unwrap();

    let digest = H256::from_slice(&decode_hex(DIGEST).unwrap());
    assert_eq!(signer_of(&signature, digest), FIRST);
}

#[test]
fn test_encodings_are_distinct() {
    let keyring = keyring();

    let raw = keyring.sign_message(FIRST, DIGEST).unwrap();
    let geth = keyring.new_geth_sign_message(FIRST, DIGEST).unwrap();
    let personal_text = keyring.sign_personal_message(FIRST, "hello").unwrap();

    assert_ne!(raw, geth);
    assert_ne!(geth, personal_text);

    // Both prefixed encodings recover against the EIP-191 hash of their payload
    assert_eq!(signer_of(&geth, decode_hex(DIGEST).unwrap()), FIRST);
    assert_eq!(signer_of(&personal_text, "hello"), FIRST);
}

#[test]
fn test_personal_message_hex_matches_geth_digest() {
    let keyring = keyring();

    let personal = keyring.sign_personal_message(FIRST, "0xdeadbeef").unwrap();
    let geth = keyring.new_geth_sign_message(FIRST, "0xdeadbeef").unwrap();
    assert_eq!(personal, geth);
}

#[test]
fn test_signatures_are_deterministic() {
    let keyring = keyring();
    assert_eq!(keyring.sign_message(FIRST, DIGEST).unwrap(), keyring.sign_message(FIRST, DIGEST).unwrap());
    assert_eq!(
        keyring.sign_personal_message(FIRST, "hello").unwrap(),
        keyring.sign_personal_message(FIRST, "hello").unwrap()
    );
}

#[test]
fn test_sign_message_rejects_non_digest() {
    let keyring = keyring();
    assert!(matches!(keyring.sign_message(FIRST, "0x1234"), Err(Error::SigningFailed(_))));
    assert!(matches!(keyring.new_geth_sign_message(FIRST, "not hex"), Err(Error::SigningFailed(_))));
}

#[test]
fn test_odd_length_digest_is_not_padded() {
    let keyring = keyring();
    let short = &DIGEST[..DIGEST.len() - 1];

    assert!(matches!(keyring.sign_message(FIRST, short), Err(Error::SigningFailed(_))));
    assert!(matches!(keyring.sign_app_key_message(APP_PATH, short), Err(Error::SigningFailed(_))));
}

#[test]
fn test_sign_legacy_typed_data() {
    let keyring = keyring();
    let typed = TypedData::Legacy(vec![
        LegacyTypedField::new("string", "message", "Hi, Alice!"),
        LegacyTypedField::new("uint32", "value", 42),
    ]);

    let signature = keyring.sign_typed_data(FIRST, &typed).unwrap();
    let digest = H256::from(typed.signing_hash().unwrap());
    assert_eq!(signer_of(&signature, digest), FIRST);
}

#[test]
fn test_sign_eip712_typed_data_from_json() {
    let keyring = keyring();
    let typed: TypedData = serde_json::from_value(serde_json::json!({
        "types": {
            "EIP712Domain": [
                { "name": "name", "type": "string" },
                { "name": "version", "type": "string" },
                { "name": "chainId", "type": "uint256" },
                { "name": "verifyingContract", "type": "address" }
            ],
            "Person": [
                { "name": "name", "type": "string" },
                { "name": "wallet", "type": "address" }
            ],
            "Mail": [
                { "name": "from", "type": "Person" },
                { "name": "to", "type": "Person" },
                { "name": "contents", "type": "string" }
            ]
        },
        "primaryType": "Mail",
        "domain": {
            "name": "Ether Mail",
            "version": "1",
            "chainId": 1,
            "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
        },
        "message": {
            "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
            "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
            "contents": "Hello, Bob!"
        }
    }))
    .unwrap();

    let digest = typed.signing_hash().unwrap();
    assert_eq!(hex::encode(digest), "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2");

    let signature = keyring.sign_typed_data(FIRST, &typed).unwrap();
    assert_eq!(signer_of(&signature, H256::from(digest)), FIRST);
}

#[test]
fn test_sign_transaction() {
    let keyring = keyring();
    let request = TransactionRequest::new()
        .to("0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB".parse::<ethers::types::Address>().unwrap())
        .value(1_000u64)
        .gas(21_000u64)
        .gas_price(1_000_000_000u64)
        .nonce(3u64)
        .chain_id(5u64);

    let signed = keyring.sign_transaction(FIRST, EthereumTransaction::new(request)).unwrap();

    assert!(signed.is_signed());
    let signer = signed.signature().unwrap().recover(signed.sighash()).unwrap();
    assert_eq!(format!("{:?}", signer), FIRST);
    assert!(signed.raw_signed().is_some());
}

#[test]
fn test_sign_transaction_unknown_account() {
    let keyring = keyring();
    let tx = EthereumTransaction::new(TransactionRequest::new().nonce(0u64));

    let result = keyring.sign_transaction("0x0000000000000000000000000000000000000002", tx);
    assert!(matches!(result, Err(Error::UnknownAccount(_))));
}

#[test]
fn test_app_key_message_and_transaction() {
    let keyring = keyring();

    let signature = keyring.sign_app_key_message(APP_PATH, DIGEST).unwrap();
    let digest = H256::from_slice(&decode_hex(DIGEST).unwrap());
    assert_eq!(signer_of(&signature, digest), APP_ADDRESS);

    let tx = EthereumTransaction::new(TransactionRequest::new().nonce(0u64).gas(21_000u64));
    let signed = keyring.sign_app_key_transaction(APP_PATH, tx).unwrap();
    let signer = signed.signature().unwrap().recover(signed.sighash()).unwrap();
    assert_eq!(format!("{:?}", signer), APP_ADDRESS);

    // App keys never become accounts
    assert!(matches!(keyring.sign_message(APP_ADDRESS, DIGEST), Err(Error::UnknownAccount(_))));
}

#[test]
fn test_app_key_typed_message() {
    let keyring = keyring();
    let typed = TypedData::Legacy(vec![LegacyTypedField::new("string", "message", "Hi, Alice!")]);

    let signature = keyring.sign_app_key_typed_message(APP_PATH, &typed).unwrap();
    assert_eq!(signer_of(&signature, H256::from(typed.signing_hash().unwrap())), APP_ADDRESS);
}

#[test]
fn test_app_key_stark_signature_verifies() {
    let keyring = keyring();
    let curve = Curve::stark().unwrap();

    let signature = keyring.sign_app_key_alternate_curve_message(APP_PATH, DIGEST).unwrap();
    assert_eq!(keyring.sign_app_key_alternate_curve_message(APP_PATH, DIGEST).unwrap(), signature);

    let public_key = curve.public_key(&app_private_key()).unwrap();
    assert!(curve.verify(&public_key, DIGEST, &signature).unwrap());

    let json = serde_json::to_value(&signature).unwrap();
    assert!(json.get("r").is_some());
    assert!(json.get("s").is_some());
    assert!(json.get("recoveryParam").is_some());
}

#[test]
fn test_app_key_custom_curve_matches_secp256k1_nonce() {
    let keyring = keyring();
    let params = secp256k1_params();
    let curve = Curve::from_params(&params).unwrap();

    let signature = keyring.sign_app_key_curve_message(APP_PATH, DIGEST, &params).unwrap();
    let public_key = curve.public_key(&app_private_key()).unwrap();
    assert!(curve.verify(&public_key, DIGEST, &signature).unwrap());

    // Both use RFC 6979 nonces over SHA-256, so r agrees with the secp256k1 signer
    let ecdsa = keyring.sign_app_key_message(APP_PATH, DIGEST).unwrap();
    assert_eq!(&ecdsa[2..66], format!("{:0>64}", signature.r_hex()));
}

#[test]
fn test_unsupported_curve_parameters() {
    let keyring = keyring();
    let mut params = secp256k1_params();
    params.b = "0".to_string();
    params.a = "0".to_string();

    let result = keyring.sign_app_key_curve_message(APP_PATH, DIGEST, &params);
    assert!(matches!(result, Err(Error::UnsupportedCurveParameters(_))));

    // Rejected parameters never derive an app key
    assert!(keyring.app_key_paths().unwrap().is_empty());
}
