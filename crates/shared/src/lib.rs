//! Shared utilities and common types for the LifeGuard backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, random tokens)
//! - JWT issuance and validation (HS256)
//! - Password hashing with Argon2id
//! - Time-based one-time codes (RFC 6238)
//! - AES-256-GCM sealing of secrets at rest
//! - Common validation logic

pub mod crypto;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod secret_box;
pub mod validation;
