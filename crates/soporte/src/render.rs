// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of store contents for terminal output.

use serde_json::Value;
use soporte_store::Entity;

fn text<'a>(entity: &'a Entity, key: &str) -> Option<&'a str> {
    entity
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// One line per ticket: id, status, priority, assignee and title.
pub fn ticket_line(ticket: &Entity) -> String {
    let estado = text(ticket, "estado").unwrap_or("?");
    let mut line = format!("#{:<6} {estado:<22}", ticket.id().to_string());

    if let Some(prioridad) = text(ticket, "prioridad") {
        line.push_str(&format!(" {prioridad:<8}"));
    }

    let analyst = ticket
        .get("asignacion_actual")
        .and_then(|a| a.get("id_analista"))
        .filter(|v| !v.is_null());
    match analyst {
        Some(Value::String(s)) => line.push_str(&format!(" @{s}")),
        Some(other) => line.push_str(&format!(" @{other}")),
        None => {}
    }

    if let Some(titulo) = text(ticket, "titulo") {
        line.push_str("  ");
        line.push_str(titulo);
    }
    if ticket.get("pendiente").and_then(Value::as_bool) == Some(true) {
        line.push_str(" (pendiente)");
    }
    line.trim_end().to_string()
}

/// Ticket counts per status, sorted by status name.
pub fn status_summary(tickets: &[Entity]) -> String {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for ticket in tickets {
        *counts.entry(text(ticket, "estado").unwrap_or("?")).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(estado, n)| format!("{estado}={n}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).unwrap()
    }

    #[test]
    fn line_shows_assignee_and_title() {
        let line = ticket_line(&entity(json!({
            "id": 42,
            "estado": "en_espera",
            "prioridad": "alta",
            "titulo": "Impresora sin tóner",
            "asignacion_actual": {"id_analista": 7}
        })));
        assert!(line.starts_with("#42"));
        assert!(line.contains("en_espera"));
        assert!(line.contains("alta"));
        assert!(line.contains("@7"));
        assert!(line.ends_with("Impresora sin tóner"));
    }

    #[test]
    fn sparse_ticket_still_renders() {
        let line = ticket_line(&entity(json!({"id": "abc"})));
        assert_eq!(line, "#abc    ?");
    }

    #[test]
    fn summary_counts_by_status() {
        let tickets = vec![
            entity(json!({"id": 1, "estado": "en_proceso"})),
            entity(json!({"id": 2, "estado": "cerrado"})),
            entity(json!({"id": 3, "estado": "en_proceso"})),
        ];
        assert_eq!(status_summary(&tickets), "cerrado=1 en_proceso=2");
        assert_eq!(status_summary(&[]), "");
    }
}
