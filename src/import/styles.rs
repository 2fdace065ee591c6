//! Styles sub-interface (spec §4.9 `styles`): one `start_*` method per
//! record kind, each returning an owned builder the per-format handler
//! drives with setters and then finalizes with `commit`, which returns
//! the numeric id later referenced from an `xf`.
//!
//! `commit` takes `self: Box<Self>` so it can only be called once and the
//! builder can't be reused afterward — mirrors the spec's "post-commit,
//! the handle pointer must not be dereferenced" precondition without
//! needing a runtime check.

use crate::import::types::{Argb, BorderDirection, HorizontalAlignment, VerticalAlignment, XfCategory};

pub trait Styles {
    fn start_font_style(&mut self) -> Option<Box<dyn FontStyleBuilder>> {
        None
    }
    fn start_fill_style(&mut self) -> Option<Box<dyn FillStyleBuilder>> {
        None
    }
    fn start_border_style(&mut self) -> Option<Box<dyn BorderStyleBuilder>> {
        None
    }
    fn start_cell_protection(&mut self) -> Option<Box<dyn CellProtectionBuilder>> {
        None
    }
    fn start_number_format(&mut self) -> Option<Box<dyn NumberFormatBuilder>> {
        None
    }
    fn start_xf(&mut self, category: XfCategory) -> Option<Box<dyn XfBuilder>> {
        let _ = category;
        None
    }
    fn start_cell_style(&mut self) -> Option<Box<dyn CellStyleBuilder>> {
        None
    }
}

pub trait FontStyleBuilder {
    fn set_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_size(&mut self, points: f64) {
        let _ = points;
    }
    fn set_bold(&mut self, value: bool) {
        let _ = value;
    }
    fn set_italic(&mut self, value: bool) {
        let _ = value;
    }
    fn set_underline(&mut self, value: bool) {
        let _ = value;
    }
    fn set_strikethrough(&mut self, value: bool) {
        let _ = value;
    }
    fn set_color(&mut self, color: Argb) {
        let _ = color;
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait FillStyleBuilder {
    fn set_pattern_type(&mut self, pattern: &str) {
        let _ = pattern;
    }
    fn set_fg_color(&mut self, color: Argb) {
        let _ = color;
    }
    fn set_bg_color(&mut self, color: Argb) {
        let _ = color;
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait BorderStyleBuilder {
    fn set_style(&mut self, direction: BorderDirection, style: &str) {
        let (_, _) = (direction, style);
    }
    fn set_color(&mut self, direction: BorderDirection, color: Argb) {
        let (_, _) = (direction, color);
    }
    fn set_width(&mut self, direction: BorderDirection, width: f64) {
        let (_, _) = (direction, width);
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait CellProtectionBuilder {
    fn set_locked(&mut self, value: bool) {
        let _ = value;
    }
    fn set_hidden(&mut self, value: bool) {
        let _ = value;
    }
    fn set_formula_hidden(&mut self, value: bool) {
        let _ = value;
    }
    fn set_print_content(&mut self, value: bool) {
        let _ = value;
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait NumberFormatBuilder {
    fn set_identifier(&mut self, id: u32) {
        let _ = id;
    }
    fn set_code(&mut self, code: &str) {
        let _ = code;
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait XfBuilder {
    fn set_font(&mut self, id: u32) {
        let _ = id;
    }
    fn set_fill(&mut self, id: u32) {
        let _ = id;
    }
    fn set_border(&mut self, id: u32) {
        let _ = id;
    }
    fn set_protection(&mut self, id: u32) {
        let _ = id;
    }
    fn set_number_format(&mut self, id: u32) {
        let _ = id;
    }
    fn set_style_xf(&mut self, parent_xf_id: u32) {
        let _ = parent_xf_id;
    }
    fn set_horizontal_alignment(&mut self, align: HorizontalAlignment) {
        let _ = align;
    }
    fn set_vertical_alignment(&mut self, align: VerticalAlignment) {
        let _ = align;
    }
    fn set_wrap_text(&mut self, value: bool) {
        let _ = value;
    }
    fn set_shrink_to_fit(&mut self, value: bool) {
        let _ = value;
    }
    fn set_apply_alignment(&mut self, value: bool) {
        let _ = value;
    }
    fn commit(self: Box<Self>) -> u32;
}

pub trait CellStyleBuilder {
    fn set_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_display_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_xf(&mut self, xf_id: u32) {
        let _ = xf_id;
    }
    fn set_parent_name(&mut self, name: &str) {
        let _ = name;
    }
    fn set_builtin(&mut self, builtin_id: u32) {
        let _ = builtin_id;
    }
    /// No id is returned — a cell style is referenced by name, not a
    /// numeric id (spec §4.9 `start_cell_style`).
    fn commit(self: Box<Self>);
}
