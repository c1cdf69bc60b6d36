//! Renderer option derivation.
//!
//! The renderer takes a flat list of named options split into a global block (before the
//! input) and a page block (after it). Only set fields produce options; boolean switches
//! appear only when true.

use std::fmt;

use super::params::RenderParams;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOption {
    pub name: &'static str,
    pub value: Option<String>,
}

impl RenderOption {
    fn switch(name: &'static str) -> Self {
        Self { name, value: None }
    }

    fn valued(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: Some(value.to_string()),
        }
    }

    /// Command line form: `--name` followed by the value when there is one.
    pub fn push_args(&self, args: &mut Vec<String>) {
        args.push(format!("--{}", self.name));
        if let Some(value) = &self.value {
            args.push(value.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub global: Vec<RenderOption>,
    pub page: Vec<RenderOption>,
}

fn push_switch(target: &mut Vec<RenderOption>, name: &'static str, value: Option<bool>) {
    if value == Some(true) {
        target.push(RenderOption::switch(name));
    }
}

fn push_value<T: fmt::Display>(
    target: &mut Vec<RenderOption>,
    name: &'static str,
    value: &Option<T>,
) {
    if let Some(value) = value {
        target.push(RenderOption::valued(name, value));
    }
}

impl From<&RenderParams> for RenderOptions {
    fn from(params: &RenderParams) -> Self {
        let mut global = Vec::new();
        push_switch(&mut global, "grayscale", params.grayscale);
        push_value(&mut global, "margin-bottom", &params.margin_bottom);
        push_value(&mut global, "margin-left", &params.margin_left);
        push_value(&mut global, "margin-right", &params.margin_right);
        push_value(&mut global, "margin-top", &params.margin_top);
        push_value(&mut global, "orientation", &params.orientation);
        push_value(&mut global, "page-height", &params.page_height);
        push_value(&mut global, "page-width", &params.page_width);
        push_value(&mut global, "page-size", &params.page_size);
        push_value(&mut global, "title", &params.title);

        let mut page = Vec::new();
        push_switch(
            &mut page,
            "disable-external-links",
            params.disable_external_links,
        );
        push_switch(
            &mut page,
            "disable-internal-links",
            params.disable_internal_links,
        );
        if params.enable_javascript != Some(true) {
            page.push(RenderOption::switch("disable-javascript"));
        }
        push_switch(&mut page, "no-background", params.no_background);
        push_switch(&mut page, "no-images", params.no_images);
        push_value(&mut page, "page-offset", &params.page_offset);
        push_value(&mut page, "zoom", &params.zoom);
        push_value(&mut page, "viewport-size", &params.viewport_size);

        Self { global, page }
    }
}
