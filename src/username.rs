//! Handles for newly confirmed accounts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{Backend, Filter, Query, Table};
use crate::error::{AppError, AppResult};

pub const PREFIX: &str = "user_";
pub const SUFFIX_LEN: usize = 8;
pub const MAX_ATTEMPTS: usize = 10;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn candidate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{PREFIX}{suffix}")
}

/// Returns a username no existing user holds at the time of the check.
pub async fn generate(backend: &dyn Backend) -> AppResult<String> {
    let mut rng = StdRng::from_entropy();
    generate_with(backend, &mut rng).await
}

pub async fn generate_with<R: Rng + Send>(backend: &dyn Backend, rng: &mut R) -> AppResult<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let name = candidate(rng);
        let taken = backend
            .count(&Query::from(Table::Users).filter(Filter::eq("username", name.as_str())))
            .await?;
        if taken == 0 {
            return Ok(name);
        }
        tracing::debug!(attempt, username = %name, "generated username already taken");
    }
    Err(AppError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let name = candidate(&mut rng);
            assert_eq!(name.len(), PREFIX.len() + SUFFIX_LEN);
            let suffix = name.strip_prefix(PREFIX).unwrap();
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn candidate_is_deterministic_for_a_seed() {
        let a = candidate(&mut StdRng::seed_from_u64(42));
        let b = candidate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
