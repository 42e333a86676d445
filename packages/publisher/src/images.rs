//! Image pipeline: inline images and the cover (eyecatch) image.
//!
//! Inline images referenced by http(s) URL are downloaded, staged in a
//! temporary file and re-uploaded through the presigned-post flow; the
//! markdown is then rewritten to point at the platform copies. A failure on
//! one image is a warning and leaves its original URL in place.
//!
//! Staged files are `tempfile::NamedTempFile`s owned by the upload call, so
//! they are removed on every exit path, including early returns and panics.

use indexmap::{IndexMap, IndexSet};
use note_client::{ApiResponse, NoteApi, PresignedPost, Session, UploadFile};
use regex::Captures;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use url::Url;

use crate::error::{PublishError, Result};
use crate::events::{EventLog, Step};
use crate::markdown::inline::IMAGE;

/// Extension used when neither the URL nor the content type names one.
const DEFAULT_EXTENSION: &str = "jpg";

/// Status the storage target answers a successful POST with.
const STORAGE_SUCCESS_STATUS: u16 = 204;

/// Field-name / file-name pairs accepted by the eyecatch endpoint, tried in order.
const EYECATCH_VARIANTS: [(&str, Option<&str>); 3] =
    [("file", Some("blob")), ("file", None), ("image", Some("blob"))];

/// An image now hosted by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public URL
    pub url: String,
    /// Storage key, when the platform reported one
    pub key: Option<String>,
}

/// Result of [`process_inline_images`].
#[derive(Debug, Clone)]
pub struct InlineImages {
    /// Markdown with uploaded image URLs substituted
    pub markdown: String,
    /// Storage keys of uploaded images, deduplicated, in document order
    pub uploaded_keys: Vec<String>,
    pub events: EventLog,
}

/// Retry policy for the cover image upload.
#[derive(Debug, Clone)]
pub struct CoverUploadPolicy {
    pub attempts: u32,
    /// Sleep `backoff * attempt` after each failed attempt
    pub backoff: Duration,
}

impl Default for CoverUploadPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(1500),
        }
    }
}

/// Upload every external image in `markdown` and rewrite its references.
pub async fn process_inline_images<A>(api: &A, session: &Session, markdown: &str) -> InlineImages
where
    A: NoteApi + ?Sized,
{
    let mut events = EventLog::new();

    let mut uploads: IndexMap<String, Option<UploadedImage>> = IndexMap::new();
    for caps in IMAGE.captures_iter(markdown) {
        uploads.entry(caps[2].to_string()).or_insert(None);
    }

    if uploads.is_empty() {
        events.debug(Step::InlineImages, "no external images in body");
        return InlineImages {
            markdown: markdown.to_string(),
            uploaded_keys: Vec::new(),
            events,
        };
    }

    events.info(
        Step::InlineImages,
        format!("uploading {} unique image(s)", uploads.len()),
    );

    for (source_url, uploaded) in uploads.iter_mut() {
        match upload_image_from_url(api, session, source_url, &mut events).await {
            Ok(image) => {
                events.info(
                    Step::InlineImages,
                    format!("uploaded {} -> {}", source_url, image.url),
                );
                *uploaded = Some(image);
            }
            Err(e) => {
                events.warn(
                    Step::InlineImages,
                    format!("keeping original URL {}: {}", source_url, e),
                );
            }
        }
    }

    let rewritten = IMAGE
        .replace_all(markdown, |caps: &Captures| {
            match uploads.get(&caps[2]).and_then(Option::as_ref) {
                Some(image) => format!("![{}]({})", &caps[1], image.url),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    let uploaded_keys: IndexSet<String> = uploads
        .values()
        .flatten()
        .filter_map(|i| i.key.clone())
        .collect();

    InlineImages {
        markdown: rewritten,
        uploaded_keys: uploaded_keys.into_iter().collect(),
        events,
    }
}

/// Download an external image and re-upload it to the platform.
pub async fn upload_image_from_url<A>(
    api: &A,
    session: &Session,
    source_url: &str,
    events: &mut EventLog,
) -> Result<UploadedImage>
where
    A: NoteApi + ?Sized,
{
    let staged = download_and_stage(api, source_url).await?;
    upload_image(api, session, staged.path(), events).await
}

/// Upload a local image file through the presigned-post flow.
pub async fn upload_image<A>(
    api: &A,
    session: &Session,
    path: &Path,
    events: &mut EventLog,
) -> Result<UploadedImage>
where
    A: NoteApi + ?Sized,
{
    let file_name = file_name_of(path);

    let presign = api
        .presign_image_upload(session, &file_name)
        .await
        .map_err(|e| PublishError::from_client("presigned_post", e))?;
    if !presign.is_accepted() {
        return Err(PublishError::rejected("presigned_post", &presign));
    }

    let post = presign
        .data()
        .as_ref()
        .and_then(PresignedPost::from_data)
        .ok_or_else(|| incomplete("presigned_post", &presign, "missing upload target or fields"))?;

    let file = UploadFile::new("file", file_name, path);
    let stored = api
        .upload_to_storage(&post, &file)
        .await
        .map_err(|e| PublishError::from_client("storage_upload", e))?;
    if stored.status != STORAGE_SUCCESS_STATUS {
        return Err(PublishError::rejected("storage_upload", &stored));
    }

    let url = post
        .url
        .clone()
        .ok_or_else(|| incomplete("presigned_post", &presign, "missing public URL"))?;

    match api.probe(&url).await {
        Ok(status) => events.debug(Step::InlineImages, format!("{} answered {}", url, status)),
        Err(e) => events.debug(Step::InlineImages, format!("{} unreachable: {}", url, e)),
    }

    Ok(UploadedImage {
        url,
        key: post.path.clone(),
    })
}

/// Upload the cover image for `article_id` from a URL or a local path.
///
/// Returns the eyecatch URL reported by the platform, if any.
pub async fn upload_cover_image<A>(
    api: &A,
    session: &Session,
    article_id: &str,
    source: &str,
    policy: &CoverUploadPolicy,
    events: &mut EventLog,
) -> Result<Option<String>>
where
    A: NoteApi + ?Sized,
{
    if is_remote(source) {
        let staged = download_and_stage(api, source).await?;
        upload_eyecatch_file(api, session, article_id, staged.path(), policy, events).await
    } else {
        let path = Path::new(source);
        if !path.is_file() {
            return Err(PublishError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cover image not found: {}", source),
            )));
        }
        upload_eyecatch_file(api, session, article_id, path, policy, events).await
    }
}

async fn upload_eyecatch_file<A>(
    api: &A,
    session: &Session,
    article_id: &str,
    path: &Path,
    policy: &CoverUploadPolicy,
    events: &mut EventLog,
) -> Result<Option<String>>
where
    A: NoteApi + ?Sized,
{
    let file_name = file_name_of(path);
    let mut last_response: Option<ApiResponse> = None;
    let mut last_error: Option<PublishError> = None;

    for attempt in 1..=policy.attempts {
        for (field, upload_name) in EYECATCH_VARIANTS {
            let upload_name = upload_name.unwrap_or(&file_name);
            let file = UploadFile::new(field, upload_name, path);

            match api.upload_eyecatch(session, article_id, &file).await {
                Ok(resp) if resp.is_accepted() => {
                    let url = resp
                        .data()
                        .and_then(|d| d.get("url").and_then(note_client::value_to_string));
                    return Ok(url);
                }
                Ok(resp) => {
                    events.debug(
                        Step::CoverImage,
                        format!(
                            "attempt {} ({}={}) answered {}",
                            attempt, field, upload_name, resp.status
                        ),
                    );
                    last_response = Some(resp);
                }
                Err(e) => {
                    events.debug(
                        Step::CoverImage,
                        format!("attempt {} ({}={}) failed: {}", attempt, field, upload_name, e),
                    );
                    last_error = Some(PublishError::from_client("eyecatch_upload", e));
                }
            }
        }

        if attempt < policy.attempts && !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff * attempt).await;
        }
    }

    Err(match (last_response, last_error) {
        (Some(resp), _) => PublishError::rejected("eyecatch_upload", &resp),
        (None, Some(err)) => err,
        (None, None) => PublishError::Network {
            step: "eyecatch_upload",
            message: "no upload attempted".to_string(),
        },
    })
}

/// Download `url` into a temporary file that is deleted when dropped.
async fn download_and_stage<A>(api: &A, url: &str) -> Result<NamedTempFile>
where
    A: NoteApi + ?Sized,
{
    let image = api
        .download(url)
        .await
        .map_err(|e| PublishError::from_client("image_download", e))?;

    let extension = infer_extension(url, image.content_type.as_deref());
    stage_bytes(&image.bytes, &extension)
}

fn stage_bytes(bytes: &[u8], extension: &str) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix("note-image-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

/// File extension for a downloaded image: URL path first, then content type.
pub fn infer_extension(url: &str, content_type: Option<&str>) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|e| !e.is_empty())
        .or_else(|| content_type.and_then(extension_for_mime))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn extension_for_mime(mime: &str) -> Option<String> {
    let ext = match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        other => {
            return mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first())
                .map(|e| e.to_string());
        }
    };
    Some(ext.to_string())
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string()
}

fn incomplete(step: &'static str, response: &ApiResponse, reason: &str) -> PublishError {
    PublishError::UpstreamRejected {
        step,
        status: response.status,
        body: format!("{}: {}", reason, response.truncated_body()),
    }
}
