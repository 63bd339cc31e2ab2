use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::security::token_validator::AccessToken;

/// Permission scopes understood by the secrets routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Delete,
    Decrypt,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read:secrets",
            Permission::Write => "write:secrets",
            Permission::Delete => "delete:secrets",
            Permission::Decrypt => "decrypt:secrets",
        }
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller lacks at least one required scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("insufficient scope, missing: {}", .missing.join(" "))]
pub struct ForbiddenError {
    pub missing: Vec<String>,
}

/// Set of scopes granted to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scopes {
    granted: BTreeSet<String>,
}

impl Scopes {
    /// Build from a space-delimited OAuth2 `scope` string.
    pub fn parse(scope: &str) -> Self {
        Self::from_iter(scope.split_whitespace())
    }

    pub fn extend<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in scopes {
            let scope = item.as_ref().trim();
            if !scope.is_empty() {
                self.granted.insert(scope.to_string());
            }
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.granted.contains(scope)
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.granted.iter().map(String::as_str)
    }

    /// Required scopes not present in this set, in the order given.
    pub fn missing<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        let mut missing = Vec::new();
        for item in required {
            let scope: &str = item.as_ref();
            if !self.contains(scope) {
                missing.push(scope.to_string());
            }
        }
        missing
    }
}

impl<S: AsRef<str>> FromIterator<S> for Scopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut scopes = Scopes::default();
        scopes.extend(iter);
        scopes
    }
}

/// Allow iff every required scope is granted. An empty requirement allows.
pub fn authorize<S: AsRef<str>>(token: &AccessToken, required: &[S]) -> Result<(), ForbiddenError> {
    let missing = token.permissions.missing(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForbiddenError { missing })
    }
}
