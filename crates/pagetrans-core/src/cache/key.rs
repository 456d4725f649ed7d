use crate::config::Lang;

/// File extension of cached page artifacts.
pub const ARTIFACT_SUFFIX: &str = ".pdf";

/// Number of hex characters kept from each MD5 digest.
const HASH_LEN: usize = 8;

/// Identity of a source document for cache partitioning.
///
/// Built from metadata rather than file bytes, so re-saving a file without
/// changing its title, author or page count keeps its cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    raw: String,
}

impl DocumentIdentity {
    pub fn new(title: Option<&str>, author: Option<&str>, page_count: usize) -> Self {
        Self {
            raw: format!(
                "{}_{}_{}",
                title.unwrap_or_default(),
                author.unwrap_or_default(),
                page_count
            ),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Truncated hash used as the first key component
    pub fn hash(&self) -> String {
        short_hash(&self.raw)
    }
}

/// Cache key for a translated page.
///
/// Layout: `{doc_hash}_{text_hash}_page{N}_{translator}_{target}.pdf`.
/// Two pages with identical text under the same document identity, page
/// index, translator and target language share a key; any change to the
/// page text yields a new one. Hashes are truncated MD5 and only partition
/// the cache, they are not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
}

impl CacheKey {
    pub fn fingerprint(
        doc: &DocumentIdentity,
        page_num: usize,
        translator: &str,
        target_lang: &Lang,
        page_text: &str,
    ) -> Self {
        let name = format!(
            "{}_{}_page{}_{}_{}{}",
            doc.hash(),
            short_hash(page_text),
            page_num,
            sanitize(translator),
            sanitize(target_lang.as_str()),
            ARTIFACT_SUFFIX,
        );

        Self { name }
    }

    /// File name of the artifact inside the cache directory
    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn short_hash(input: &str) -> String {
    let mut hex = format!("{:x}", md5::compute(input.as_bytes()));
    hex.truncate(HASH_LEN);
    hex
}

/// Keep key components usable as a single path segment.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
