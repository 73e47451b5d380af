use std::fmt;
use std::sync::Arc;

/// Identity that an [`ArenaPool`][crate::ArenaPool] is bound to.
///
/// Every allocation must present the same tag as the pool it is made from and every slot
/// carries the tag of the pool that issued it, which prevents slots from one pool being
/// recycled into another pool's free list.
///
/// Cloning a tag is cheap - the text is shared.
///
/// # Example
///
/// ```rust
/// use arena_pool::GroupTag;
///
/// let tag = GroupTag::from("USER");
///
/// assert_eq!(tag, "USER");
/// assert_eq!(tag.as_str(), "USER");
/// assert_eq!(tag.to_string(), "USER");
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GroupTag {
    name: Arc<str>,
}

impl GroupTag {
    /// Returns the tag as a string slice.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&str> for GroupTag {
    #[inline]
    fn from(name: &str) -> Self {
        Self { name: name.into() }
    }
}

impl From<String> for GroupTag {
    #[inline]
    fn from(name: String) -> Self {
        Self { name: name.into() }
    }
}

impl PartialEq<str> for GroupTag {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        *self.name == *other
    }
}

impl PartialEq<&str> for GroupTag {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        *self.name == **other
    }
}

impl fmt::Display for GroupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
