//! Parsing of the explicit image list given with `--image-file`
//!
//! The file is newline separated. Each line is either `<image-name>:<tag>` to
//! migrate exactly that tag, or `<image-name>` to migrate every tag of that
//! repository. Blank and malformed lines are ignored.

use crate::logging::Logger;
use crate::migration::ImageReference;
use std::path::Path;

/// Images named in an explicit list, split by whether the tag is pinned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageList {
    /// Bare repository names whose tags still have to be discovered
    pub names: Vec<String>,
    /// Fully specified images
    pub images: Vec<ImageReference>,
}

impl ImageList {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.images.is_empty()
    }
}

/// Parse the contents of an image list
pub fn parse_image_list(content: &str) -> ImageList {
    let mut list = ImageList::default();

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        match line.split_once(':') {
            Some((name, tag)) => {
                if !name.is_empty() && !tag.is_empty() && !tag.contains(':') {
                    list.images.push(ImageReference::new(name, tag));
                }
            }
            None => {
                // Hand-written lists sometimes carry a trailing comma
                let name = line.trim_end_matches(',').trim_end();
                if !name.is_empty() {
                    list.names.push(name.to_string());
                }
            }
        }
    }

    list
}

/// Read and parse an image list file.
///
/// An unreadable file is logged and yields an empty list; the caller then has
/// nothing to migrate rather than a fatal error.
pub async fn parse_image_file(path: &Path, logger: &Logger) -> ImageList {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let list = parse_image_list(&content);
            logger.verbose(&format!(
                "Read {} image names and {} pinned images from {}",
                list.names.len(),
                list.images.len(),
                path.display()
            ));
            list
        }
        Err(e) => {
            logger.error(&format!(
                "Unable to read in image file '{}' due to {}",
                path.display(),
                e
            ));
            ImageList::default()
        }
    }
}
