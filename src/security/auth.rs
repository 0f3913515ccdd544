use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use sha2::{Digest, Sha256};

/// The configured service token, held in Rocket managed state.
pub struct ApiToken(pub String);

/// Guard: caller presented `Authorization: Bearer <token>` matching `ApiToken`.
/// An empty configured token refuses everyone.
pub struct ServiceCaller;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ServiceCaller {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let expected = match request.rocket().state::<ApiToken>() {
            Some(token) if !token.0.is_empty() => token.0.as_str(),
            _ => return Outcome::Error((Status::Unauthorized, ())),
        };

        let presented = request
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if tokens_match(token, expected) => Outcome::Success(ServiceCaller),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Compares digests so the timing does not depend on the common prefix length.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = hash_token(presented);
    let b = hash_token(expected);
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
