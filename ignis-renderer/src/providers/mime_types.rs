use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::error::RenderError;

use super::FileProvider;

const MIME_TYPES: &str = include_str!("../templates/mime.types");

/// The static `mime.types` table included by `nginx.conf`.
pub struct MimeTypesProvider;

impl FileProvider for MimeTypesProvider {
    fn name(&self) -> &'static str {
        "mime types"
    }

    fn provide(&self, _ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        Ok(vec![ConfigurationFile::text(names::MIME_TYPES, MIME_TYPES)])
    }
}
