//! Parameter model for a clip request.
//!
//! Every field is independently optional: `None` means "no opinion, defer to the
//! renderer default" and is never collapsed into `false` or `0`. The struct, the
//! fill-missing merge and the form-field table are all generated from one field list
//! so a field added there is picked up by JSON decoding, form decoding and presets.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Page sizes understood by the renderer.
pub const PAGE_SIZES: &[&str] = &[
    "A0", "A1", "A2", "A3", "A4", "A5", "A6", "A7", "A8", "A9", "B0", "B1", "B10", "B2", "B3",
    "B4", "B5", "B6", "B7", "B8", "B9", "C5E", "Comm10E", "Custom", "DLE", "Executive", "Folio",
    "Ledger", "Legal", "Letter", "Tabloid",
];

pub const ORIENTATION_LANDSCAPE: &str = "Landscape";
pub const ORIENTATION_PORTRAIT: &str = "Portrait";

/// Scalar kind a field is decoded as when it arrives as form text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    UnsignedInteger,
    Text,
    Boolean,
    Decimal,
}

impl FieldKind {
    pub fn expected(self) -> &'static str {
        match self {
            FieldKind::UnsignedInteger => "unsigned integer",
            FieldKind::Text => "string",
            FieldKind::Boolean => "bool (true or false)",
            FieldKind::Decimal => "number",
        }
    }
}

trait FieldValue: Sized {
    const KIND: FieldKind;

    fn parse_field(raw: &str) -> Option<Self>;
}

impl FieldValue for u32 {
    const KIND: FieldKind = FieldKind::UnsignedInteger;

    fn parse_field(raw: &str) -> Option<Self> {
        if raw.starts_with('+') {
            return None;
        }
        raw.parse().ok()
    }
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn parse_field(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn parse_field(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

impl FieldValue for f64 {
    const KIND: FieldKind = FieldKind::Decimal;

    fn parse_field(raw: &str) -> Option<Self> {
        raw.parse::<f64>().ok().filter(|value| value.is_finite())
    }
}

/// One entry of the field table: the external name, its scalar kind, and a setter
/// that decodes raw form text into the matching field.
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    assign: fn(&mut RenderParams, &str) -> Result<(), DomainError>,
}

impl FieldDef {
    pub fn assign(&self, params: &mut RenderParams, raw: &str) -> Result<(), DomainError> {
        (self.assign)(params, raw)
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

macro_rules! render_params {
    ($( $(#[doc = $doc:literal])* $field:ident: $ty:ty ),+ $(,)?) => {
        /// Tunable extraction and rendering options.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct RenderParams {
            $(
                $(#[doc = $doc])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
        }

        impl RenderParams {
            /// Fill every unset field from `overlay`. Fields already set are never
            /// overwritten, so the first value supplied for a field wins.
            pub fn add_from(&mut self, overlay: &RenderParams) {
                $(
                    if self.$field.is_none() {
                        self.$field.clone_from(&overlay.$field);
                    }
                )+
            }

            fn write_set_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $(
                    if let Some(value) = &self.$field {
                        write!(f, "{}: {}; ", stringify!($field), value)?;
                    }
                )+
                Ok(())
            }
        }

        /// Registration table used by form decoding.
        pub static FIELDS: &[FieldDef] = &[
            $(
                FieldDef {
                    name: stringify!($field),
                    kind: <$ty as FieldValue>::KIND,
                    assign: {
                        fn assign(params: &mut RenderParams, raw: &str) -> Result<(), DomainError> {
                            let value = <$ty as FieldValue>::parse_field(raw).ok_or_else(|| {
                                DomainError::field_decode(
                                    stringify!($field),
                                    <$ty as FieldValue>::KIND.expected(),
                                )
                            })?;
                            params.$field = Some(value);
                            Ok(())
                        }
                        assign
                    },
                },
            )+
        ];
    };
}

render_params! {
    /// CSS selector of the content kept in the rendered document.
    query: String,
    /// CSS selector of elements to delete.
    remove: String,
    /// Elements that must not be preceded by a page break.
    no_break_before: String,
    /// Elements that must not be split across pages.
    no_break_inside: String,
    /// Elements that must not be followed by a page break.
    no_break_after: String,
    /// Stylesheet text injected verbatim.
    custom_styles: String,
    /// Keep the ancestor chain from `<body>` down to the `query` result.
    with_containers: bool,
    /// Copy `data-src` into `src` for lazily loaded images.
    force_image_loading: bool,
    grayscale: bool,
    margin_bottom: u32,
    margin_left: u32,
    margin_right: u32,
    margin_top: u32,
    orientation: String,
    page_height: u32,
    page_width: u32,
    page_size: String,
    title: String,
    disable_external_links: bool,
    disable_internal_links: bool,
    enable_javascript: bool,
    no_background: bool,
    no_images: bool,
    page_offset: u32,
    zoom: f64,
    viewport_size: String,
}

impl RenderParams {
    /// Look up a table entry by its external name.
    pub fn field(name: &str) -> Option<&'static FieldDef> {
        FIELDS.iter().find(|def| def.name == name)
    }

    /// Check the enumerated fields, reporting the first violation only.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(size) = self.page_size.as_deref()
            && !PAGE_SIZES.contains(&size)
        {
            return Err(DomainError::validation(format!("invalid page size: {size}")));
        }

        if let Some(orientation) = self.orientation.as_deref()
            && orientation != ORIENTATION_LANDSCAPE
            && orientation != ORIENTATION_PORTRAIT
        {
            return Err(DomainError::validation(format!(
                "bad value for orientation parameter: {orientation}"
            )));
        }

        Ok(())
    }

    /// True when no content transformation is requested and the renderer can be pointed
    /// at the target URL without fetching it first.
    pub fn skips_extraction(&self) -> bool {
        self.query.is_none()
            && self.remove.is_none()
            && self.custom_styles.is_none()
            && self.force_image_loading.is_none()
    }

    pub(crate) fn selector(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|selector| !selector.is_empty())
    }

    pub(crate) fn enabled(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }
}

impl fmt::Display for RenderParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderParams{ ")?;
        self.write_set_fields(f)?;
        f.write_str("}")
    }
}
