use campus_core::RawEntry;

use crate::error::FilesError;
use crate::icons::{FOLDER_ICON, icon_for_file};
use crate::location::FileLocation;

/// A listing entry made self-contained: the raw record plus the link
/// parameters needed to re-fetch its context, a stable local identifier
/// derived from them, and its display classification.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub link: FileLocation,
    pub link_id: String,
    pub file_name: String,
    pub is_dir: bool,
    pub url: Option<String>,
    pub icon: &'static str,
    pub size: Option<i64>,
    pub modified: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub entries: Vec<FileDescriptor>,
    pub count: usize,
}

/// Turn a raw response into descriptors, preserving the response order.
/// An entry without its `isdir` or `filename` discriminant is malformed.
pub fn normalize(raw: &[RawEntry]) -> Result<Listing, FilesError> {
    let mut entries = Vec::with_capacity(raw.len());
    for entry in raw {
        entries.push(normalize_entry(entry)?);
    }
    let count = entries.len();
    Ok(Listing { entries, count })
}

fn normalize_entry(entry: &RawEntry) -> Result<FileDescriptor, FilesError> {
    let is_dir = entry.isdir.ok_or(FilesError::MalformedEntry)?;
    let file_name = entry.filename.clone().ok_or(FilesError::MalformedEntry)?;

    let mut link = FileLocation {
        contextid: entry.contextid.unwrap_or_default(),
        component: entry.component.clone().unwrap_or_default(),
        filearea: entry.filearea.clone().unwrap_or_default(),
        itemid: entry.itemid.unwrap_or_default(),
        filepath: entry.filepath.clone().unwrap_or_default(),
        filename: file_name.clone(),
    };
    // Directories under a component are re-fetched without a file name.
    if !link.component.is_empty() && is_dir {
        link.filename = String::new();
    }

    let link_id = link.link_id();
    let icon = if is_dir {
        FOLDER_ICON
    } else {
        icon_for_file(&file_name)
    };

    Ok(FileDescriptor {
        link,
        link_id,
        file_name,
        is_dir,
        url: entry.url.clone(),
        icon,
        size: entry.filesize,
        modified: entry.timemodified,
    })
}
