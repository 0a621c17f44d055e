//! The session credential sent with `authGame`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const CREDENTIAL_KEY: &[u8] = b"damajiang";

/// Lower-case hex HMAC-SHA256 of `token ++ account_id ++ game_uuid`.
///
/// The account id is concatenated in decimal. The result goes into the
/// `gift` field of the authentication request.
pub fn session_credential(token: &str, account_id: u32, game_uuid: &str) -> String {
    // HMAC takes keys of any length; new_from_slice cannot fail here.
    let mut mac = HmacSha256::new_from_slice(CREDENTIAL_KEY).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac.update(account_id.to_string().as_bytes());
    mac.update(game_uuid.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_credential_known_vector() {
        assert_eq!(
            session_credential("tok-abc", 123456, "uuid-1"),
            "67a30b8381b140647cb202b887c590a2a736de510c6ab83b6ed1bdfc1ea9cc5d"
        );
    }

    #[test]
    fn test_session_credential_is_lowercase_hex() {
        let gift = session_credential("t", 1, "g");
        assert_eq!(gift.len(), 64);
        assert!(gift.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_session_credential_depends_on_every_part() {
        let base = session_credential("t", 1, "g");
        assert_ne!(base, session_credential("u", 1, "g"));
        assert_ne!(base, session_credential("t", 2, "g"));
        assert_ne!(base, session_credential("t", 1, "h"));
    }
}
