//! `multipart/form-data` parsing for upload requests

use crate::{
    error::{BgRemovalError, Result},
    types::{BackgroundMode, ProcessingOptions},
};
use bytes::Bytes;
use futures::stream;
use multer::{Constraints, Multipart, SizeLimit};
use std::collections::HashMap;
use std::convert::Infallible;

/// Name of the file field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Parsed upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Bytes of the `image` file field, if present
    pub image: Option<Vec<u8>>,
    /// Original file name of the upload
    pub file_name: Option<String>,
    /// Text fields, last value wins
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Parse a buffered request body
    ///
    /// # Errors
    /// - `InvalidConfig` for a missing boundary or malformed body
    /// - `ResourceExhausted` when the body exceeds `max_bytes`
    pub fn parse(content_type: &str, body: Vec<u8>, max_bytes: u64) -> Result<Self> {
        let boundary = multer::parse_boundary(content_type).map_err(|e| {
            BgRemovalError::invalid_config(format!("Expected multipart/form-data body: {e}"))
        })?;

        let body = stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(body)) });
        let constraints =
            Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes));
        let multipart = Multipart::with_constraints(body, boundary, constraints);

        futures::executor::block_on(Self::collect(multipart))
    }

    async fn collect(mut multipart: Multipart<'static>) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(map_multer_error)? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                let file_name = field.file_name().map(ToString::to_string);
                let data = field.bytes().await.map_err(map_multer_error)?;
                // Browsers send an empty part when no file was chosen
                if !data.is_empty() {
                    form.image = Some(data.to_vec());
                    form.file_name = file_name;
                }
            } else {
                let value = field.text().await.map_err(map_multer_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Build processing options from the text fields
    ///
    /// Absent fields take their defaults. `shadow` is enabled only by a
    /// case-insensitive `"true"`.
    ///
    /// # Errors
    /// - `InvalidConfig` for an unknown `bgType`
    pub fn processing_options(&self) -> Result<ProcessingOptions> {
        let mut options = ProcessingOptions::default();

        if let Some(model) = self.field("model") {
            options.model = model.to_string();
        }
        if let Some(shadow) = self.field("shadow") {
            options.shadow = shadow.trim().eq_ignore_ascii_case("true");
        }
        if let Some(bg_type) = self.field("bgType") {
            options.background_mode = bg_type.parse::<BackgroundMode>()?;
        }
        if let Some(color) = self.field("bgColor") {
            options.bg_color = color.to_string();
        }
        if let Some(start) = self.field("gradientStart") {
            options.gradient_start = start.to_string();
        }
        if let Some(end) = self.field("gradientEnd") {
            options.gradient_end = end.to_string();
        }

        Ok(options)
    }

    /// Take the uploaded image bytes
    ///
    /// # Errors
    /// - `MissingInput` when no non-empty image part was sent
    pub fn take_image(&mut self) -> Result<Vec<u8>> {
        self.image.take().ok_or(BgRemovalError::MissingInput)
    }
}

fn map_multer_error(error: multer::Error) -> BgRemovalError {
    match error {
        multer::Error::StreamSizeExceeded { limit } | multer::Error::FieldSizeExceeded { limit, .. } => {
            BgRemovalError::resource_exhausted(format!("Upload exceeds {limit} bytes"))
        },
        other => BgRemovalError::invalid_config(format!("Malformed form data: {other}")),
    }
}
