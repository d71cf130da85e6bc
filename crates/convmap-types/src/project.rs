//! Project-tag helpers.

/// Extract the trailing slug segment of a colon-delimited project tag.
///
/// Project tags follow the addressable `kind:pubkey:slug` format; only
/// the slug names the project. A tag with no colons is returned as-is.
pub fn project_slug(tag: &str) -> &str {
    tag.rsplit(':').next().unwrap_or(tag)
}
