pub const FOLDER_ICON: &str = "folder-symbolic";
pub const GENERIC_FILE_ICON: &str = "text-x-generic-symbolic";

/// Pick a display icon from the file-name extension.
pub fn icon_for_file(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application-pdf-symbolic",
        "doc" | "docx" | "odt" | "rtf" => "x-office-document-symbolic",
        "xls" | "xlsx" | "ods" | "csv" => "x-office-spreadsheet-symbolic",
        "ppt" | "pptx" | "odp" => "x-office-presentation-symbolic",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => "image-x-generic-symbolic",
        "mp3" | "ogg" | "wav" | "flac" | "m4a" => "audio-x-generic-symbolic",
        "mp4" | "mkv" | "webm" | "avi" | "mov" => "video-x-generic-symbolic",
        "zip" | "tar" | "gz" | "rar" | "7z" => "package-x-generic-symbolic",
        "html" | "htm" => "text-html-symbolic",
        _ => GENERIC_FILE_ICON,
    }
}
