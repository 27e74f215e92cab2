/// Application name
pub const APP_NAME: &str = "Vitrine";

/// Default HTTP port (server)
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Maximum upload size in bytes (512 MiB); splat captures get large.
pub const MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

/// Collection file names inside the data directory
pub const MODELS_FILE: &str = "models.json";
pub const BACKGROUNDS_FILE: &str = "backgrounds.json";

/// Asset sub-directories inside the public directory, and their URI prefixes
pub const MODELS_DIR: &str = "models";
pub const IMAGES_DIR: &str = "images";
pub const MODELS_URI_PREFIX: &str = "/models/";
pub const IMAGES_URI_PREFIX: &str = "/images/";

/// Multipart field names
pub const FIELD_MODEL_FILE: &str = "modelFile";
pub const FIELD_THUMBNAIL_FILE: &str = "thumbnailFile";
pub const FIELD_BACKGROUND_FILE: &str = "backgroundFile";

/// Batch-delete selector matching every record
pub const FORMAT_ALL: &str = "all";
