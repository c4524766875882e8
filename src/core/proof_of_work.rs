use crate::error::{LedgerError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// Attempts between two checks of the cancellation flag
const CANCEL_CHECK_INTERVAL: u64 = 1_024;

/// Proof-of-work puzzle chained on the previous block's proof.
///
/// A candidate is valid when the hex digest of `"{last_proof}{candidate}"`
/// starts with `difficulty` zero characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    last_proof: u64,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(last_proof: u64, difficulty: u32) -> ProofOfWork {
        ProofOfWork {
            last_proof,
            difficulty,
        }
    }

    /// Validate a candidate proof without searching
    pub fn validate(last_proof: u64, candidate: u64, difficulty: u32) -> bool {
        let digest = Self::digest(&last_proof.to_string(), candidate);
        has_zero_prefix(&digest, difficulty)
    }

    /// Hex digest checked by the predicate, for display
    pub fn guess_hash(last_proof: u64, candidate: u64) -> String {
        HEXLOWER.encode(&Self::digest(&last_proof.to_string(), candidate))
    }

    fn digest(prefix: &str, candidate: u64) -> Vec<u8> {
        let mut guess = String::with_capacity(prefix.len() + 20);
        guess.push_str(prefix);
        guess.push_str(&candidate.to_string());
        sha256_digest(guess.as_bytes())
    }

    pub fn get_last_proof(&self) -> u64 {
        self.last_proof
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Lazy search over candidates 0, 1, 2, ...
    pub fn search(&self) -> ProofSearch {
        ProofSearch {
            prefix: self.last_proof.to_string(),
            difficulty: self.difficulty,
            next_candidate: Some(0),
        }
    }

    /// Search until a proof is found
    pub fn run(&self) -> Result<u64> {
        self.run_until_cancelled(&AtomicBool::new(false))
    }

    /// Search until a proof is found or `cancel` is raised
    pub fn run_until_cancelled(&self, cancel: &AtomicBool) -> Result<u64> {
        info!(
            "Searching for a proof on {} at difficulty {}",
            self.last_proof, self.difficulty
        );
        let mut search = self.search();
        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("Proof search cancelled after {} candidates", search.tried());
                return Err(LedgerError::Cancelled);
            }
            if let Some(proof) = search.step(CANCEL_CHECK_INTERVAL) {
                info!("Found proof {proof} for {}", self.last_proof);
                return Ok(proof);
            }
            if search.is_exhausted() {
                return Err(LedgerError::Mining(format!(
                    "No proof for {} at difficulty {} in the u64 range",
                    self.last_proof, self.difficulty
                )));
            }
        }
    }
}

/// Resumable state of a proof search.
///
/// Iterating yields every valid proof in ascending order; [`ProofSearch::step`]
/// bounds the work done per call so a caller can interleave cancellation or
/// timeouts.
#[derive(Debug, Clone)]
pub struct ProofSearch {
    prefix: String,
    difficulty: u32,
    next_candidate: Option<u64>,
}

impl ProofSearch {
    /// Try at most `budget` candidates, returning the first valid one
    pub fn step(&mut self, budget: u64) -> Option<u64> {
        for _ in 0..budget {
            let candidate = self.next_candidate?;
            self.next_candidate = candidate.checked_add(1);
            let digest = ProofOfWork::digest(&self.prefix, candidate);
            if has_zero_prefix(&digest, self.difficulty) {
                return Some(candidate);
            }
        }
        None
    }

    /// Next candidate the search will try
    pub fn next_candidate(&self) -> Option<u64> {
        self.next_candidate
    }

    /// Number of candidates tried so far
    pub fn tried(&self) -> u64 {
        match self.next_candidate {
            Some(next) => next,
            None => u64::MAX,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_candidate.is_none()
    }
}

impl Iterator for ProofSearch {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        while !self.is_exhausted() {
            if let Some(proof) = self.step(CANCEL_CHECK_INTERVAL) {
                return Some(proof);
            }
        }
        None
    }
}

/// True when the hex rendering of `digest` starts with `zeros` '0' characters
fn has_zero_prefix(digest: &[u8], zeros: u32) -> bool {
    let zeros = zeros as usize;
    if zeros > digest.len() * 2 {
        return false;
    }
    let full_bytes = zeros / 2;
    if digest[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    // odd count: high nibble of the next byte
    zeros % 2 == 0 || digest[full_bytes] >> 4 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_prefix_matches_hex_rendering() {
        let digest = [0x00, 0x0a, 0xff];
        assert!(has_zero_prefix(&digest, 0));
        assert!(has_zero_prefix(&digest, 2));
        assert!(has_zero_prefix(&digest, 3));
        assert!(!has_zero_prefix(&digest, 4));
        assert!(!has_zero_prefix(&digest, 7));
    }

    #[test]
    fn test_validate_agrees_with_hex_digest() {
        for candidate in 0..200 {
            let hex = ProofOfWork::guess_hash(100, candidate);
            assert_eq!(
                ProofOfWork::validate(100, candidate, 1),
                hex.starts_with('0'),
                "candidate {candidate}"
            );
        }
    }

    #[test]
    fn test_mined_proof_is_valid() {
        for difficulty in 1..=3 {
            let proof = ProofOfWork::new(100, difficulty).run().unwrap();
            assert!(ProofOfWork::validate(100, proof, difficulty));
            assert!(ProofOfWork::guess_hash(100, proof).starts_with(&"0".repeat(difficulty as usize)));
        }
    }

    #[test]
    fn test_run_returns_first_valid_candidate() {
        let proof = ProofOfWork::new(7, 2).run().unwrap();
        for candidate in 0..proof {
            assert!(!ProofOfWork::validate(7, candidate, 2));
        }
    }

    #[test]
    fn test_search_is_resumable() {
        let pow = ProofOfWork::new(42, 2);
        let expected = pow.run().unwrap();

        let mut search = pow.search();
        let mut found = None;
        while found.is_none() {
            found = search.step(3);
        }
        assert_eq!(found, Some(expected));
        assert_eq!(search.next_candidate(), Some(expected + 1));
    }

    #[test]
    fn test_iterator_yields_ascending_proofs() {
        let proofs: Vec<u64> = ProofOfWork::new(5, 1).search().take(4).collect();
        assert_eq!(proofs.len(), 4);
        assert!(proofs.windows(2).all(|w| w[0] < w[1]));
        assert!(proofs.iter().all(|&p| ProofOfWork::validate(5, p, 1)));
    }

    #[test]
    fn test_cancelled_search() {
        let cancel = AtomicBool::new(true);
        let result = ProofOfWork::new(100, 60).run_until_cancelled(&cancel);
        assert_eq!(result, Err(LedgerError::Cancelled));
    }

    #[test]
    fn test_different_last_proof_changes_predicate() {
        let a = ProofOfWork::new(100, 2).run().unwrap();
        let b = ProofOfWork::new(101, 2).run().unwrap();
        assert!(ProofOfWork::validate(100, a, 2));
        assert!(ProofOfWork::validate(101, b, 2));
    }
}
