//! Token verification for connection owners

mod jwt;

pub use jwt::{Claims, JwtVerifier};
