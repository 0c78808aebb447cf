use crate::{CodecLoader, DecodeError, ImageHeader, ImageLoader, PpmLoader, SharedLoader};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Extensions handled by [`PpmLoader`] in the default registry.
pub const PPM_EXTENSIONS: [&str; 4] = ["ppm", "pgm", "pbm", "pnm"];

/// Chooses a loader by file extension.
///
/// Extensions are matched case-insensitively. Files whose extension has no
/// registered loader go to the fallback loader, if one is set; otherwise they
/// fail with [`DecodeError::Unrecognized`].
///
/// The default registry sends NetPBM files to [`PpmLoader`] and everything else
/// to [`CodecLoader`].
#[derive(Clone)]
pub struct LoaderRegistry {
    by_extension: HashMap<String, SharedLoader>,
    fallback: Option<SharedLoader>,
}

impl LoaderRegistry {
    /// Creates a registry with no loaders and no fallback.
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
            fallback: None,
        }
    }

    /// Routes files ending in `extension` to `loader`, replacing any previous
    /// registration.
    #[must_use]
    pub fn register<L>(mut self, extension: &str, loader: L) -> Self
    where
        L: ImageLoader + Send + Sync + 'static,
    {
        self.by_extension
            .insert(extension.to_ascii_lowercase(), Arc::new(loader));
        self
    }

    /// Routes files with unregistered extensions to `loader`.
    #[must_use]
    pub fn with_fallback<L>(mut self, loader: L) -> Self
    where
        L: ImageLoader + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(loader));
        self
    }

    /// Returns the loader responsible for `path`.
    pub fn loader_for(&self, path: &Path) -> Option<&SharedLoader> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(&ext.to_ascii_lowercase()))
            .or(self.fallback.as_ref())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let registry = PPM_EXTENSIONS
            .iter()
            .fold(Self::empty(), |registry, ext| registry.register(ext, PpmLoader));
        registry.with_fallback(CodecLoader)
    }
}

impl ImageLoader for LoaderRegistry {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        match self.loader_for(path) {
            Some(loader) => loader.open_header(path),
            None => Err(DecodeError::Unrecognized {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl core::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut extensions: Vec<_> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("LoaderRegistry")
            .field("extensions", &extensions)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
