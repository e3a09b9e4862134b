use image::{ImageFormat, Rgba};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which rendering path an overlay takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    #[default]
    Text,
    Image,
}

/// Named placement zone on a 3x3 grid over the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Text fill color. `Auto` picks black or white from the background under the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayColor {
    Rgba(Rgba<u8>),
    Auto,
}

impl Default for OverlayColor {
    fn default() -> Self {
        OverlayColor::Rgba(Rgba([255, 255, 255, 255]))
    }
}

impl OverlayColor {
    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` or `auto`
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("auto") {
            return Some(OverlayColor::Auto);
        }

        if let Some(hex) = value.strip_prefix('#') {
            let channel = |s: &str| u8::from_str_radix(s, 16).ok();
            return match hex.len() {
                3 => {
                    let mut out = [0u8, 0, 0, 255];
                    for (i, c) in hex.chars().enumerate() {
                        let v = c.to_digit(16)? as u8;
                        out[i] = v * 17;
                    }
                    Some(OverlayColor::Rgba(Rgba(out)))
                }
                6 | 8 => {
                    let r = channel(hex.get(0..2)?)?;
                    let g = channel(hex.get(2..4)?)?;
                    let b = channel(hex.get(4..6)?)?;
                    let a = match hex.get(6..8) {
                        Some(a) => channel(a)?,
                        None => 255,
                    };
                    Some(OverlayColor::Rgba(Rgba([r, g, b, a])))
                }
                _ => None,
            };
        }

        let lower = value.to_ascii_lowercase();
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let r = parts[0].parse::<u8>().ok()?;
        let g = parts[1].parse::<u8>().ok()?;
        let b = parts[2].parse::<u8>().ok()?;
        let a = match parts.get(3) {
            Some(a) => (a.parse::<f32>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => 255,
        };
        Some(OverlayColor::Rgba(Rgba([r, g, b, a])))
    }

    pub fn to_css(&self) -> String {
        match self {
            OverlayColor::Auto => "auto".to_string(),
            OverlayColor::Rgba(Rgba([r, g, b, 255])) => format!("#{:02x}{:02x}{:02x}", r, g, b),
            OverlayColor::Rgba(Rgba([r, g, b, a])) => {
                format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
            }
        }
    }
}

impl Serialize for OverlayColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> Deserialize<'de> for OverlayColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OverlayColor::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color: {}", raw)))
    }
}

/// Configuration for one overlay operation. Serialized as a flat camelCase record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlaySpec {
    pub kind: OverlayKind,
    pub text: String,
    pub image_source: String,
    pub anchor: Anchor,
    pub opacity: f32,
    pub size: f32,
    pub color: OverlayColor,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub rotation_degrees: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub enabled: bool,
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            kind: OverlayKind::Text,
            text: "© {year}".to_string(),
            image_source: String::new(),
            anchor: Anchor::BottomRight,
            opacity: 0.5,
            size: 24.0,
            color: OverlayColor::default(),
            font_family: "DejaVuSans".to_string(),
            font_weight: FontWeight::Normal,
            rotation_degrees: 0.0,
            offset_x: 20.0,
            offset_y: 20.0,
            enabled: true,
        }
    }
}

impl OverlaySpec {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: OverlayKind::Text,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn image(source: impl Into<String>) -> Self {
        Self {
            kind: OverlayKind::Image,
            image_source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_offsets(mut self, offset_x: f32, offset_y: f32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Opacity as used for painting
    pub fn effective_opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            return 0.0;
        }
        self.opacity.clamp(0.0, 1.0)
    }
}

/// Encoding used for composited output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Whether a file extension already names this format (`jpeg` and `JPG` count for jpeg)
    pub fn matches_extension(&self, extension: &str) -> bool {
        ImageFormat::from_extension(extension) == Some(self.image_format())
    }
}

/// An encoded image in one of the two transport representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    /// `data:<mime>;base64,<data>`
    DataUrl(String),
}

impl ImagePayload {
    pub fn len(&self) -> usize {
        match self {
            ImagePayload::Bytes(bytes) => bytes.len(),
            ImagePayload::DataUrl(url) => url.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for ImagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        ImagePayload::Bytes(bytes)
    }
}
