use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

const CODE_EXTENSIONS: &[&str] = &[
    "js", "ts", "tsx", "jsx", "json", "html", "css", "scss", "md", "py", "rs", "xml", "c", "cpp",
    "h", "qml", "qrc", "mo", "toml", "txt", "java", "kt", "kts", "proto", "gradle", "move",
];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Code,
    Image,
    Video,
    Unsupported,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileCategory::Code => "code",
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// Classifies files by the lower-cased extension of their name.
#[derive(Debug, Clone, Default)]
pub struct FileClassifier {
    extra_code: BTreeSet<String>,
}

impl FileClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats the given extensions as code too. A leading dot is ignored.
    pub fn with_extra_code_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_code.extend(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty()),
        );
        self
    }

    pub fn classify(&self, name: &str) -> FileCategory {
        let Some(ext) = extension_of(name) else {
            return FileCategory::Unsupported;
        };
        if CODE_EXTENSIONS.contains(&ext.as_str()) || self.extra_code.contains(&ext) {
            FileCategory::Code
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Video
        } else {
            FileCategory::Unsupported
        }
    }

    pub fn is_code(&self, name: &str) -> bool {
        self.classify(name) == FileCategory::Code
    }
}

fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() && !file_name[1..].contains('.') {
        // ".gitignore" has no extension
        return None;
    }
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
