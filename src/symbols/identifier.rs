use anyhow::Result;

use super::IdentifierType;

/// Third-party identifier mapping (CUSIP/ISIN → ticker).
#[async_trait::async_trait]
pub trait IdentifierMappingProvider: Send + Sync {
    /// `Ok(None)` when the service knows no ticker for the identifier.
    async fn lookup(&self, id_type: IdentifierType, value: &str) -> Result<Option<String>>;

    fn name(&self) -> &str;
}

/// Mapper that never finds anything. Used when no mapping service is configured.
pub struct NoopIdentifierMapper;

#[async_trait::async_trait]
impl IdentifierMappingProvider for NoopIdentifierMapper {
    async fn lookup(&self, _id_type: IdentifierType, _value: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}
