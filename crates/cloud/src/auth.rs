//! Request signing for archive asset reads.

use crate::error::Result;

/// Adds authentication headers to outgoing COG range requests.
///
/// Catalogs that authorize through signed URLs (Planetary Computer SAS
/// tokens) are handled by [`StacClient::sign_asset_href`](crate::StacClient::sign_asset_href)
/// instead, and use [`NoAuth`] here.
pub trait CloudAuth: Send + Sync {
    /// Push `(name, value)` header pairs for a request to `url`.
    fn sign_request(
        &self,
        url: &str,
        method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()>;
}

/// Public endpoints: no headers added.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn sign_request(&self, _: &str, _: &str, _: &mut Vec<(String, String)>) -> Result<()> {
        Ok(())
    }
}
