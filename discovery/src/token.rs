//! SHIP/SLAP advertisement token format.
//!
//! Four PushDrop fields: protocol tag, 33-byte identity key, hosting URL,
//! capability name.

use overlay_codec::{CodecError, PushDropToken, Script};
use overlay_types::{Advertisement, AdvertisementProtocol};
use thiserror::Error;

pub const FIELD_COUNT: usize = 4;
pub const IDENTITY_KEY_LEN: usize = 33;
/// Longest capability name accepted, prefix included.
pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum AdvertisementError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("advertisement tokens have 4 fields, this one has {0}")]
    FieldCount(usize),

    #[error("unknown protocol tag {0:?}")]
    UnknownProtocol(String),

    #[error("expected a {expected} advertisement, found {found}")]
    WrongProtocol {
        expected: AdvertisementProtocol,
        found: AdvertisementProtocol,
    },

    #[error("identity key must be a 33-byte compressed public key")]
    IdentityKey,

    #[error("domain is not an advertisable URL: {0}")]
    Domain(String),

    #[error("invalid capability name {0:?}")]
    Name(String),
}

/// Whether `name` is a valid capability name for `protocol`: the protocol's
/// prefix followed by lowercase words joined by single underscores.
pub fn is_valid_name(protocol: AdvertisementProtocol, name: &str) -> bool {
    if name.len() > MAX_NAME_LEN {
        return false;
    }
    let Some(rest) = name.strip_prefix(protocol.capability_prefix()) else {
        return false;
    };
    !rest.is_empty()
        && rest
            .split('_')
            .all(|word| !word.is_empty() && word.bytes().all(|b| b.is_ascii_lowercase()))
}

/// Whether `domain` is an `http`/`https` URL with a host.
pub fn is_advertisable_url(domain: &str) -> bool {
    let rest = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn valid_identity_key(key: &[u8]) -> bool {
    key.len() == IDENTITY_KEY_LEN && matches!(key[0], 0x02 | 0x03)
}

fn utf8(field: Vec<u8>, err: fn(String) -> AdvertisementError) -> Result<String, AdvertisementError> {
    String::from_utf8(field).map_err(|e| err(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Decode and validate an advertisement from a locking script.
pub fn decode_advertisement(locking_script: &[u8]) -> Result<Advertisement, AdvertisementError> {
    let token = PushDropToken::decode(&Script::new(locking_script.to_vec()))?;
    let [tag, identity_key, domain, name]: [Vec<u8>; FIELD_COUNT] = token
        .fields
        .try_into()
        .map_err(|fields: Vec<Vec<u8>>| AdvertisementError::FieldCount(fields.len()))?;

    let protocol = AdvertisementProtocol::from_tag(&tag).ok_or_else(|| {
        AdvertisementError::UnknownProtocol(String::from_utf8_lossy(&tag).into_owned())
    })?;
    if !valid_identity_key(&identity_key) {
        return Err(AdvertisementError::IdentityKey);
    }
    let domain = utf8(domain, AdvertisementError::Domain)?;
    if !is_advertisable_url(&domain) {
        return Err(AdvertisementError::Domain(domain));
    }
    let name = utf8(name, AdvertisementError::Name)?;
    if !is_valid_name(protocol, &name) {
        return Err(AdvertisementError::Name(name));
    }

    Ok(Advertisement {
        protocol,
        identity_key: hex::encode(identity_key),
        domain,
        topic_or_service: name,
        outpoint: None,
    })
}

/// Decode an advertisement and require it to be of `protocol`.
pub fn decode_for(
    protocol: AdvertisementProtocol,
    locking_script: &[u8],
) -> Result<Advertisement, AdvertisementError> {
    let ad = decode_advertisement(locking_script)?;
    if ad.protocol != protocol {
        return Err(AdvertisementError::WrongProtocol {
            expected: protocol,
            found: ad.protocol,
        });
    }
    Ok(ad)
}

/// Locking script advertising `name` under `protocol`, locked to the
/// identity key.
pub fn encode_advertisement(
    protocol: AdvertisementProtocol,
    identity_key: &[u8],
    domain: &str,
    name: &str,
) -> Script {
    PushDropToken::new(
        identity_key.to_vec(),
        vec![
            protocol.tag().as_bytes().to_vec(),
            identity_key.to_vec(),
            domain.as_bytes().to_vec(),
            name.as_bytes().to_vec(),
        ],
    )
    .encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Vec<u8> {
        let mut k = vec![0x02];
        k.extend_from_slice(&[0x5a; 32]);
        k
    }

    #[test]
    fn encodes_and_decodes_ship() {
        let script = encode_advertisement(
            AdvertisementProtocol::Ship,
            &identity(),
            "https://overlay.example.com",
            "tm_kvstore",
        );
        let ad = decode_advertisement(script.as_bytes()).unwrap();
        assert_eq!(ad.protocol, AdvertisementProtocol::Ship);
        assert_eq!(ad.identity_key, hex::encode(identity()));
        assert_eq!(ad.domain, "https://overlay.example.com");
        assert_eq!(ad.topic_or_service, "tm_kvstore");
    }

    #[test]
    fn prefix_must_match_protocol() {
        let script = encode_advertisement(
            AdvertisementProtocol::Slap,
            &identity(),
            "https://overlay.example.com",
            "tm_kvstore",
        );
        assert!(matches!(
            decode_advertisement(script.as_bytes()),
            Err(AdvertisementError::Name(_))
        ));
    }

    #[test]
    fn wrong_protocol_for_topic() {
        let script = encode_advertisement(
            AdvertisementProtocol::Slap,
            &identity(),
            "https://overlay.example.com",
            "ls_kvstore",
        );
        assert!(matches!(
            decode_for(AdvertisementProtocol::Ship, script.as_bytes()),
            Err(AdvertisementError::WrongProtocol { .. })
        ));
    }

    #[test]
    fn rejects_bad_domains_and_keys() {
        let bad_domain = encode_advertisement(
            AdvertisementProtocol::Ship,
            &identity(),
            "ftp://overlay.example.com",
            "tm_kvstore",
        );
        assert!(matches!(
            decode_advertisement(bad_domain.as_bytes()),
            Err(AdvertisementError::Domain(_))
        ));

        let mut short_key = identity();
        short_key.pop();
        let bad_key = PushDropToken::new(
            identity(),
            vec![
                b"SHIP".to_vec(),
                short_key,
                b"https://a.example".to_vec(),
                b"tm_kvstore".to_vec(),
            ],
        )
        .encode();
        assert!(matches!(
            decode_advertisement(bad_key.as_bytes()),
            Err(AdvertisementError::IdentityKey)
        ));
    }

    #[test]
    fn field_count_is_exact() {
        let three = PushDropToken::new(
            identity(),
            vec![b"SHIP".to_vec(), identity(), b"https://a.example".to_vec()],
        )
        .encode();
        assert!(matches!(
            decode_advertisement(three.as_bytes()),
            Err(AdvertisementError::FieldCount(3))
        ));
    }

    #[test]
    fn name_rules() {
        use AdvertisementProtocol::*;
        assert!(is_valid_name(Ship, "tm_kvstore"));
        assert!(is_valid_name(Slap, "ls_user_profiles"));
        assert!(!is_valid_name(Ship, "tm_"));
        assert!(!is_valid_name(Ship, "tm_Upper"));
        assert!(!is_valid_name(Ship, "tm_double__underscore"));
        assert!(!is_valid_name(Ship, &format!("tm_{}", "a".repeat(60))));
    }

    #[test]
    fn url_rules() {
        assert!(is_advertisable_url("https://node.example.com"));
        assert!(is_advertisable_url("http://localhost:8080/"));
        assert!(!is_advertisable_url("https://"));
        assert!(!is_advertisable_url("node.example.com"));
    }
}
