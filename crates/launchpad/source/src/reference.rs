//! Source references and resolved commit ids.

use std::fmt;

/// A named git reference to clone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GitRef {
    /// The remote's default branch
    #[default]
    DefaultBranch,
    /// A branch, cloned on its own
    Branch(String),
    /// A tag, cloned with all tags and checked out
    Tag(String),
}

impl GitRef {
    /// Fully qualified reference name, `None` for the default branch
    pub fn full_name(&self) -> Option<String> {
        match self {
            Self::DefaultBranch => None,
            Self::Branch(branch) => Some(format!("refs/heads/{branch}")),
            Self::Tag(tag) => Some(format!("refs/tags/{tag}")),
        }
    }
}

/// A resolved, full hexadecimal commit id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitHash(String);

impl CommitHash {
    /// Wrap an already resolved commit id
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The hexadecimal id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommitHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<git2::Oid> for CommitHash {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// Where to fetch a chain's source from.
///
/// A pinned hash always wins: it is checked out exactly, on top of whatever
/// named reference was cloned. Without one, the tip of the named reference
/// (or of the remote default branch) is resolved and recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    url: String,
    reference: GitRef,
    pinned: Option<String>,
}

impl SourceReference {
    /// Track the remote's default branch
    pub fn remote(url: impl Into<String>) -> Self {
        Self { url: url.into(), reference: GitRef::DefaultBranch, pinned: None }
    }

    /// Track the tip of `branch`
    pub fn branch(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self { url: url.into(), reference: GitRef::Branch(branch.into()), pinned: None }
    }

    /// Track the commit `tag` points at
    pub fn tag(url: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { url: url.into(), reference: GitRef::Tag(tag.into()), pinned: None }
    }

    /// Check out exactly `hash` from the default branch's history
    pub fn pinned(url: impl Into<String>, hash: impl Into<String>) -> Self {
        Self::remote(url).with_pin(hash)
    }

    /// Pin the reference to `hash`. An empty hash leaves it unpinned.
    pub fn with_pin(mut self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        self.pinned = (!hash.is_empty()).then_some(hash);
        self
    }

    /// Remote url
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Named reference that is cloned
    pub const fn reference(&self) -> &GitRef {
        &self.reference
    }

    /// Pinned revision, if any
    pub fn pinned_hash(&self) -> Option<&str> {
        self.pinned.as_deref()
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        match &self.reference {
            GitRef::DefaultBranch => {}
            GitRef::Branch(branch) => write!(f, "#{branch}")?,
            GitRef::Tag(tag) => write!(f, "@{tag}")?,
        }
        if let Some(pin) = &self.pinned {
            write!(f, " ({pin})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pin_stays_unpinned() {
        let reference = SourceReference::pinned("https://example.com/chain.git", "");
        assert_eq!(reference.pinned_hash(), None);
        assert_eq!(reference.reference(), &GitRef::DefaultBranch);
    }

    #[test]
    fn pin_keeps_named_reference() {
        let reference = SourceReference::branch("https://example.com/chain.git", "release")
            .with_pin("abc123");
        assert_eq!(reference.pinned_hash(), Some("abc123"));
        assert_eq!(reference.reference().full_name().as_deref(), Some("refs/heads/release"));
        assert_eq!(reference.to_string(), "https://example.com/chain.git#release (abc123)");
    }
}
