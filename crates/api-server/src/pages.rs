//! HTML pages
//!
//! Templates live in `templates/`; askama escapes every interpolated value.

use askama::Template;
use drive::DriveFile;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage {
    title: &'static str,
    signed_in: bool,
}

#[derive(Template)]
#[template(path = "upload.html")]
struct UploadPage {
    title: &'static str,
}

/// Result of an upload, with actions for the new file
#[derive(Template)]
#[template(path = "uploaded.html")]
struct UploadedPage<'a> {
    title: &'static str,
    file: &'a DriveFile,
}

#[derive(Template)]
#[template(path = "share.html")]
struct SharePage<'a> {
    title: &'static str,
    file_id: &'a str,
}

#[derive(Template)]
#[template(path = "message.html")]
struct MessagePage<'a> {
    title: &'a str,
    text: &'a str,
}

pub fn index(signed_in: bool) -> askama::Result<String> {
    IndexPage {
        title: "Cloud Drive",
        signed_in,
    }
    .render()
}

pub fn upload_form() -> askama::Result<String> {
    UploadPage { title: "Upload" }.render()
}

pub fn uploaded(file: &DriveFile) -> askama::Result<String> {
    UploadedPage {
        title: "Uploaded",
        file,
    }
    .render()
}

pub fn share_form(file_id: &str) -> askama::Result<String> {
    SharePage {
        title: "Share",
        file_id,
    }
    .render()
}

pub fn shared(file_id: &str, email: &str) -> askama::Result<String> {
    message(
        "Shared",
        &format!("File {} is now shared with {}.", file_id, email),
    )
}

pub fn deleted(file_id: &str) -> askama::Result<String> {
    message("Deleted", &format!("File {} was deleted.", file_id))
}

/// Simple page with a title and one line of text
pub fn message(title: &str, text: &str) -> askama::Result<String> {
    MessagePage { title, text }.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_escaped() {
        let page = message("Oops", r#"<script>alert("x")</script>"#).unwrap();
        assert!(!page.contains("<script>"));
        assert!(page.contains("alert"));
    }

    #[test]
    fn test_uploaded_escapes_file_name() {
        let file = DriveFile {
            id: "abc".into(),
            name: "<b>.txt".into(),
            mime_type: None,
            size: None,
        };
        let page = uploaded(&file).unwrap();
        assert!(!page.contains("<b>.txt"));
        assert!(page.contains(".txt"));
        assert!(page.contains(r#"action="/delete/abc""#));
    }

    #[test]
    fn test_share_form_escapes_id() {
        let page = share_form(r#"x"><img src=y>"#).unwrap();
        assert!(!page.contains("<img"));
    }

    #[test]
    fn test_index_links() {
        assert!(index(false).unwrap().contains(r#"href="/authorize""#));
        assert!(index(true).unwrap().contains(r#"href="/logout""#));
    }
}
