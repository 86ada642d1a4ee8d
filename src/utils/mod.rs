pub mod codes;
pub mod crypto;
