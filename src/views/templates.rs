//! Line builders shared by the field views.

use crate::fields::FieldModel;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

pub fn header(model: &FieldModel, glyph: &str) -> Line<'static> {
    let mut spans = vec![
        Span::styled(format!("{glyph} "), crate::theme::text_muted()),
        Span::styled(model.title(), crate::theme::text_active_bold()),
    ];
    if model.attr_bool("required") {
        spans.push(Span::styled(" *", crate::theme::text_error()));
    }
    spans.push(Span::styled(
        format!("  {}", model.kind),
        crate::theme::text_muted(),
    ));
    Line::from(spans)
}

pub fn detail(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        format!("    {}", text.into()),
        crate::theme::text_muted(),
    ))
}

pub fn body(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::raw(format!("    {}", text.into())))
}

pub fn error(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        format!("    ! {}", text.into()),
        crate::theme::text_error().add_modifier(Modifier::ITALIC),
    ))
}

/// Placeholder for a view whose model is gone.
pub fn missing(id: u64) -> Vec<Line<'static>> {
    vec![Line::from(Span::styled(
        format!("(field #{id} no longer exists)"),
        Style::default().add_modifier(Modifier::DIM),
    ))]
}

/// Shift lines right, used for fieldset children.
pub fn indent(lines: Vec<Line<'static>>, width: usize) -> Vec<Line<'static>> {
    let pad = " ".repeat(width);
    lines
        .into_iter()
        .map(|l| {
            let mut spans = vec![Span::raw(pad.clone())];
            spans.extend(l.spans);
            Line::from(spans).style(l.style)
        })
        .collect()
}

pub fn value_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn placeholder_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").ok())
        .as_ref()
}

/// Fill `${attr}` placeholders from the model; `${id}` and `${type}` are
/// available too. Unknown names render empty.
pub fn fill(template: &str, model: &FieldModel) -> String {
    let Some(re) = placeholder_re() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures| match &caps[1] {
        "id" => model.id.to_string(),
        "type" => model.kind.clone(),
        "order" => model.order.to_string(),
        key => model.attr(key).map(value_text).unwrap_or_default(),
    })
    .to_string()
}
