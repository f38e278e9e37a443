//! File naming scheme for key records.

use cluster_trust_core::KeyId;

/// Prefix shared by every key record file.
pub const RECORD_PREFIX: &str = "ed25519-";

/// Suffix of a private key record.
pub const PRIVATE_SUFFIX: &str = ".jwk";

/// Suffix of a public key record.
pub const PUBLIC_SUFFIX: &str = ".pub.jwk";

/// File name of the private record for `kid`.
#[must_use]
pub fn private_file_name(kid: &KeyId) -> String {
    format!("{RECORD_PREFIX}{kid}{PRIVATE_SUFFIX}")
}

/// File name of the public record for `kid`.
#[must_use]
pub fn public_file_name(kid: &KeyId) -> String {
    format!("{RECORD_PREFIX}{kid}{PUBLIC_SUFFIX}")
}

/// Whether `name` is the file name of a private key record.
#[must_use]
pub fn is_private_record(name: &str) -> bool {
    name.starts_with(RECORD_PREFIX)
        && name.ends_with(PRIVATE_SUFFIX)
        && !name.ends_with(PUBLIC_SUFFIX)
}
