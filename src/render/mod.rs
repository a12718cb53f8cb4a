pub mod fonts;
pub mod layout;
pub mod logo;
pub mod pdf;

use std::sync::Arc;

use thiserror::Error;

pub use fonts::{FontAsset, FontStore};
pub use logo::Logo;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("font {0:?} is not loaded")]
    MissingFont(String),

    #[error("font {name:?} could not be loaded: {reason}")]
    Font { name: String, reason: String },

    #[error("image {name:?} could not be loaded: {reason}")]
    Image { name: String, reason: String },

    #[error("layout failed: {0}")]
    Layout(String),
}

impl RenderError {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::MissingFont(_) => "missing_font",
            RenderError::Font { .. } | RenderError::Image { .. } | RenderError::Layout(_) => {
                "render_error"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const TEXT: Rgb = Rgb(0x33, 0x33, 0x33);
    pub const MUTED: Rgb = Rgb(0x55, 0x55, 0x55);
    pub const NAVY: Rgb = Rgb(0x2b, 0x3d, 0x4f);

    /// Parses `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    pub(crate) fn unit(self) -> (f32, f32, f32) {
        (
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0,
        )
    }
}

/// Logical font names per text role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typography {
    pub body: String,
    pub heading: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
    /// Signed charts grow bars up and down from a centred baseline.
    pub signed: bool,
}

/// Coloured label shown top right on every page.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub label: String,
    pub value: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Subheading(String),
    Paragraph(String),
    QuestionAnswer { question: String, answer: String },
    Chart(BarChart),
    Callout { text: String, color: Rgb },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContent {
    pub title: String,
    pub file_name: String,
    pub badge: Option<Badge>,
    pub footer: Vec<String>,
    /// Word before the page counter, e.g. `Page` in "Page 2 / 5".
    pub page_label: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub file_name: String,
}

impl ReportDocument {
    pub const CONTENT_TYPE: &'static str = "application/pdf";
}

/// Fonts resolved for one render.
pub(crate) struct FontSet {
    pub body: Arc<FontAsset>,
    pub heading: Arc<FontAsset>,
}

impl FontSet {
    pub fn get(&self, role: FontRole) -> &FontAsset {
        match role {
            FontRole::Body => &self.body,
            FontRole::Heading => &self.heading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FontRole {
    Body,
    Heading,
}

pub struct DocumentRenderer {
    fonts: Arc<FontStore>,
    typography: Typography,
    logo: Option<Arc<Logo>>,
}

impl DocumentRenderer {
    pub fn new(fonts: Arc<FontStore>, typography: Typography) -> Self {
        Self {
            fonts,
            typography,
            logo: None,
        }
    }

    /// Adds a header logo and a faint centred watermark to every page.
    pub fn with_logo(mut self, logo: Option<Arc<Logo>>) -> Self {
        self.logo = logo;
        self
    }

    pub fn typography(&self) -> &Typography {
        &self.typography
    }

    fn resolve(&self, name: &str) -> Result<Arc<FontAsset>, RenderError> {
        self.fonts
            .get(name)
            .ok_or_else(|| RenderError::MissingFont(name.to_string()))
    }

    /// Lays out and writes the document. Every font role is resolved first,
    /// so a missing font never yields partial output.
    pub fn render(&self, content: &DocumentContent) -> Result<ReportDocument, RenderError> {
        let fonts = FontSet {
            body: self.resolve(&self.typography.body)?,
            heading: self.resolve(&self.typography.heading)?,
        };

        let logo = self.logo.as_deref();
        let pages = layout::layout(content, &fonts, logo)?;
        let page_count = pages.len();
        let bytes = pdf::write_pdf(&pages, &fonts, logo, &content.title);

        Ok(ReportDocument {
            bytes,
            page_count,
            file_name: content.file_name.clone(),
        })
    }
}
