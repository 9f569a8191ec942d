//! Text rendering of layouts and decoded views (debug dumps, test diagnostics).

use crate::codec::ElementAccess;
use crate::layout::{ByteOrder, DynamicTemplate, EnumTable, Layout, LayoutField};
use crate::value::Value;

/// Enum entry name when `table` has one for the value, the plain value otherwise.
pub fn format_value(v: &Value, table: Option<&EnumTable>) -> String {
    match table.and_then(|t| t.name_of(v)) {
        Some(name) => name.to_string(),
        None => v.to_string(),
    }
}

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

fn order_tag(order: ByteOrder) -> &'static str {
    match order {
        ByteOrder::LittleEndian => "le",
        ByteOrder::BigEndian => "be",
    }
}

fn field_line(field: &LayoutField, pad: &str) -> String {
    let mut line = format!(
        "{}{}: {} deser {}+{} ser {}+{} {}",
        pad,
        if field.name().is_empty() { "<item>" } else { field.name() },
        field.scalar_type(),
        field.deserialized.bit_offset,
        field.deserialized.bit_size,
        field.serialized.bit_offset,
        field.serialized.bit_size,
        order_tag(field.byte_order)
    );
    if let Some(table) = field.enum_table() {
        line.push_str(&format!(" enum {}", table.name));
    }
    if let Some(constant) = &field.constant {
        line.push_str(&format!(" = {}", format_value(constant, field.enum_table())));
    }
    line
}

fn template_lines(template: &DynamicTemplate, indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    if template.is_alignment_marker() {
        lines.push(format!("{}<align {}>", pad, template.alignment));
        return;
    }
    let count = if template.is_dynamic_array() {
        format!("[{}]", template.size_field)
    } else {
        String::new()
    };
    lines.push(format!(
        "{}{}{} align {} size {}/{} {{",
        pad, template.name, count, template.alignment, template.size.deserialized, template.size.serialized
    ));
    let inner = "  ".repeat(indent + 1);
    for field in &template.fields {
        lines.push(field_line(field, &inner));
    }
    for child in &template.children {
        template_lines(child, indent + 1, lines);
    }
    lines.push(format!("{}}}", pad));
}

/// One line per fixed field (both positions in bits, byte order), then the dynamic templates.
pub fn format_layout(layout: &Layout) -> String {
    let mut lines = vec![format!(
        "struct {} static {}/{} bits",
        layout.name(),
        layout.static_offsets().deserialized,
        layout.static_offsets().serialized
    )];
    for field in layout.fields() {
        lines.push(field_line(field, "  "));
    }
    if layout.has_dynamic_elements() {
        lines.push("  dynamic:".to_string());
        for template in layout.dynamic_templates() {
            template_lines(template, 2, &mut lines);
        }
    }
    lines.join("\n")
}

/// `name = value` for every element of a view. Elements that cannot be read
/// show their bytes (when addressable) or the error.
pub fn format_elements<V: ElementAccess + ?Sized>(view: &V) -> String {
    let mut lines = Vec::with_capacity(view.element_count());
    for index in 0..view.element_count() {
        let Ok(field) = view.element(index) else { continue };
        let text = match view.get_element_value(index) {
            Ok(v) => format_value(&v, field.enum_table()),
            Err(e) => match view.element_address(index) {
                Ok(Some(bytes)) => format!("hex({})", hex_string(bytes)),
                _ => format!("<{}>", e),
            },
        };
        lines.push(format!("{} = {}", field.name(), text));
    }
    lines.join("\n")
}
