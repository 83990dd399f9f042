use serde::Deserialize;

/// Atomic reference-counted string type used for compiled stylesheet text.
pub(crate) type ArcStr = std::sync::Arc<str>;

/// A 32-byte BLAKE3 hash.
///
/// In `wxss-loader` this is used for identifiers that must be stable across
/// runs and platforms, never for content addressing:
/// 1. The short form names the compiled output of an imported stylesheet, it is
///    derived from the absolute request path only.
/// 2. It identifies a stylesheet module by its project-relative path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub(crate) fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in self.0.iter() {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }

    /// First 8 hex digits, used inside file names.
    pub(crate) fn to_short(self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(8);
        hex
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

/// The mini-program platform the build targets.
///
/// Every platform ships its own stylesheet dialect with a dedicated file
/// extension, the compiled output of an imported stylesheet has to use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// WeChat.
    #[default]
    Wx,
    /// Alipay.
    Ali,
    /// Baidu.
    Swan,
    /// QQ.
    Qq,
    /// ByteDance.
    Tt,
    /// JD.
    Jd,
}

impl Platform {
    /// Extension of compiled stylesheets, including the leading dot.
    pub fn styles_ext(self) -> &'static str {
        match self {
            Platform::Wx => ".wxss",
            Platform::Ali => ".acss",
            Platform::Swan => ".css",
            Platform::Qq => ".qss",
            Platform::Tt => ".ttss",
            Platform::Jd => ".jxss",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = Hash32::hash("/project/src/a.css");
        let b = Hash32::hash("/project/src/a.css");
        let c = Hash32::hash("/project/src/b.css");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
        assert_eq!(a.to_short(), a.to_hex()[..8]);
    }

    #[test]
    fn test_platform_from_json() {
        let platform: Platform = serde_json::from_str(r#""ali""#).unwrap();
        assert_eq!(platform, Platform::Ali);
        assert_eq!(platform.styles_ext(), ".acss");
        assert_eq!(Platform::default().styles_ext(), ".wxss");
    }
}
