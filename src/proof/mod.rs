//! Ownership proofs
//!
//! `ton_proof` is shared by the connect flow and the NFT verifier link.

pub mod nft_ownership;
pub mod ton_proof;

pub use nft_ownership::build_nft_ownership_proof_url;
pub use ton_proof::{unix_now, Domain, TonProof};
