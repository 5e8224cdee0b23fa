//! Attachment storage.

mod backend;
mod manager;

pub use backend::{FilesystemBackend, StorageBackend};
pub use manager::{
    validate_files, AttachmentManager, Download, FileLocation, ALLOWED_EXTENSIONS, MAX_FILE_KB,
};
