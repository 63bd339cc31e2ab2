pub mod codec;
pub mod jwks;
pub mod scopes;
pub mod security_log;
pub mod token_client;
pub mod token_validator;

#[cfg(any(test, feature = "test-util"))]
pub mod test_keys;
