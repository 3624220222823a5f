//! Limits and fixed constants shared by the tree and the codecs.

/// Maximum nesting depth accepted by the decoders.
pub const MAX_DECODE_DEPTH: usize = 64;

/// Maximum idShort length in characters.
pub const MAX_ID_SHORT_LEN: usize = 128;

/// Maximum number of segments in a parsed element path.
pub const MAX_PATH_SEGMENTS: usize = 256;

/// Default XML namespace written on the document element.
pub const XML_NAMESPACE: &str = "https://admin-shell.io/aas/3/0";

/// URN prefix used for generated submodel identifiers.
pub const GENERATED_ID_PREFIX: &str = "urn:uuid:";
