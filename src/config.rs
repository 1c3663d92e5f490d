use std::fmt;
use std::str::FromStr;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::animation::AnimationKind;
use crate::font::{FontTable, RetryPolicy};
use crate::scene::CameraSettings;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A color string that is not `#rgb` or `#rrggbb`
    #[error("invalid color `{0}`, expected #rrggbb")]
    InvalidColor(String),
    /// Malformed settings or project JSON
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// An sRGB color as stored by the editor (`#rrggbb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: RgbColor = RgbColor::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_color(self) -> Color {
        Color::srgb_u8(self.r, self.g, self.b)
    }
}

impl Default for RgbColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for RgbColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            // #rgb shorthand, each digit doubled
            3 => Ok(Self::new(
                channel(&hex[0..1])? * 0x11,
                channel(&hex[1..2])? * 0x11,
                channel(&hex[2..3])? * 0x11,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for RgbColor {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Symbolic font family name, e.g. `helvetiker` or `serif`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontKey(String);

impl FontKey {
    pub const HELVETIKER: &'static str = "helvetiker";
    pub const OPTIMER: &'static str = "optimer";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn helvetiker() -> Self {
        Self::new(Self::HELVETIKER)
    }

    pub fn optimer() -> Self {
        Self::new(Self::OPTIMER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FontKey {
    fn default() -> Self {
        Self::helvetiker()
    }
}

impl From<&str> for FontKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Axis3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Axis3> for Vec3 {
    fn from(v: Axis3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for Axis3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

fn default_depth() -> f32 {
    0.5
}

/// Everything needed to build one text mesh. A new value triggers a new
/// pipeline run; the value itself is never mutated by the render side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyleConfig {
    pub text: String,
    #[serde(default)]
    pub color: RgbColor,
    pub font_size: f32,
    #[serde(default)]
    pub font_family: FontKey,
    #[serde(default = "default_depth")]
    pub depth: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Axis3>,
    /// Euler angles in radians, XYZ order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Axis3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Axis3>,
}

impl Default for TextStyleConfig {
    fn default() -> Self {
        Self {
            text: "안녕하세요".to_string(),
            color: RgbColor::new(0x3b, 0x82, 0xf6),
            font_size: 4.0,
            font_family: FontKey::new("cookierun-bold"),
            depth: default_depth(),
            position: None,
            rotation: None,
            scale: None,
        }
    }
}

impl TextStyleConfig {
    pub const MIN_FONT_SIZE: f32 = 1.0;
    pub const MAX_FONT_SIZE: f32 = 20.0;
    pub const MAX_DEPTH: f32 = 5.0;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..default()
        }
    }

    pub fn with_color(mut self, color: RgbColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_font(mut self, font_family: impl Into<FontKey>) -> Self {
        self.font_family = font_family.into();
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = Some(rotation.into());
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale.into());
        self
    }

    /// Applies the editor's input clamps.
    pub fn clamped(mut self) -> Self {
        self.font_size = self
            .font_size
            .clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);
        self.depth = self.depth.clamp(0.0, Self::MAX_DEPTH);
        self
    }

    /// Top-level transform of the mesh built from this config.
    pub fn transform(&self) -> Transform {
        let rotation = self.rotation.unwrap_or_default();
        Transform {
            translation: self.position.map(Vec3::from).unwrap_or(Vec3::ZERO),
            rotation: Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z),
            scale: self.scale.map(Vec3::from).unwrap_or(Vec3::ONE),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The `textConfig` sub-document of a persisted project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTextConfig {
    #[serde(flatten)]
    pub style: TextStyleConfig,
    #[serde(default)]
    pub animation_type: Option<AnimationKind>,
    #[serde(default)]
    pub background_color: Option<RgbColor>,
}

/// A persisted project record. Only `text_config` feeds the renderer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub text_config: ProjectTextConfig,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ProjectDocument {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn style(&self) -> TextStyleConfig {
        self.text_config.style.clone().clamped()
    }

    pub fn animation(&self) -> Option<AnimationKind> {
        self.text_config.animation_type
    }
}

/// Tunables for the whole editor core, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    pub debounce_ms: u64,
    pub init_timeout_ms: u64,
    pub font_retry: RetryPolicy,
    pub fonts: FontTable,
    pub camera: CameraSettings,
    pub background: RgbColor,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            init_timeout_ms: 10_000,
            font_retry: RetryPolicy::default(),
            fonts: FontTable::default(),
            camera: CameraSettings::default(),
            background: RgbColor::new(0x22, 0x22, 0x22),
        }
    }
}

impl EditorSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(
            "#3b82f6".parse::<RgbColor>().unwrap(),
            RgbColor::new(0x3b, 0x82, 0xf6)
        );
        assert_eq!("#fff".parse::<RgbColor>().unwrap(), RgbColor::WHITE);
        assert_eq!(RgbColor::new(0, 0x10, 0xff).to_string(), "#0010ff");
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["3b82f6", "#3b82f", "#gggggg", "", "#"] {
            assert!(bad.parse::<RgbColor>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn clamps_to_editor_ranges() {
        let config = TextStyleConfig::new("x")
            .with_font_size(42.0)
            .with_depth(-1.0)
            .clamped();
        assert_eq!(config.font_size, 20.0);
        assert_eq!(config.depth, 0.0);
    }

    #[test]
    fn transform_defaults_to_identity() {
        assert_eq!(TextStyleConfig::new("x").transform(), Transform::IDENTITY);
    }

    #[test]
    fn reads_text_config_json() {
        let config = TextStyleConfig::from_json_str(
            r##"{"text":"A","color":"#ef4444","fontSize":3,"fontFamily":"serif",
                "rotation":{"x":0,"y":1.5,"z":0}}"##,
        )
        .unwrap();
        assert_eq!(config.color, RgbColor::new(0xef, 0x44, 0x44));
        assert_eq!(config.font_family.as_str(), "serif");
        assert_eq!(config.depth, 0.5);
        assert_eq!(config.rotation, Some(Axis3::new(0.0, 1.5, 0.0)));
    }

    #[test]
    fn reads_project_document() {
        let project = ProjectDocument::from_json_str(
            r##"{
                "id": "p1",
                "title": "Greeting",
                "textConfig": {
                    "text": "안녕",
                    "color": "#10b981",
                    "fontSize": 99,
                    "fontFamily": "nanum-gothic",
                    "animationType": "pulse",
                    "textureType": "neon"
                },
                "isPublic": true,
                "userId": "u1"
            }"##,
        )
        .unwrap();
        assert_eq!(project.animation(), Some(AnimationKind::Pulse));
        let style = project.style();
        assert_eq!(style.text, "안녕");
        assert_eq!(style.font_size, TextStyleConfig::MAX_FONT_SIZE);
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings = EditorSettings::from_json_str(r#"{"debounceMs": 250}"#).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.init_timeout_ms, 10_000);
        assert_eq!(settings.font_retry, RetryPolicy::default());
    }
}
