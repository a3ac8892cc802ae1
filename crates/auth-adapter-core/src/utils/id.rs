// Id and token generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::options::GenerateIdStrategy;

const RANDOM_ID_LEN: usize = 32;

/// Generate a user id under the given strategy.
pub fn generate_id(strategy: GenerateIdStrategy) -> String {
    match strategy {
        GenerateIdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
        GenerateIdStrategy::Random => generate_id_with_length(RANDOM_ID_LEN),
    }
}

/// Alphanumeric id of the given length.
pub fn generate_id_with_length(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Unguessable opaque token (256 bits, hex encoded).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
