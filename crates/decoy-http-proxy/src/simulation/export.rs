//! Document export: render the canonical model back to the wire shape.

use super::types::Simulation;
use super::views::{DataView, FieldView, GlobalActionsView, MetaView, PairView, RequestView, SimulationView};
use crate::predicate::{FieldSpec, MatcherType, RequestField, RequestMatcher};

/// Version reported when the simulation did not carry one from import.
pub const EXPORTER_VERSION: &str = concat!("decoy-", env!("CARGO_PKG_VERSION"));

/// Build the document view of a simulation.
pub fn export(simulation: &Simulation) -> SimulationView {
    let pairs = simulation
        .pairs
        .iter()
        .map(|pair| PairView {
            request: export_request(&pair.matcher),
            response: pair.response.clone(),
        })
        .collect();

    SimulationView {
        data: DataView {
            pairs,
            global_actions: GlobalActionsView {
                delays: simulation.delays.clone(),
                delays_log_normal: simulation.delays_log_normal.clone(),
            },
        },
        meta: Some(MetaView {
            schema_version: Some(simulation.schema_version.as_str().to_string()),
            hoverfly_version: Some(
                simulation
                    .meta
                    .hoverfly_version
                    .clone()
                    .unwrap_or_else(|| EXPORTER_VERSION.to_string()),
            ),
            time_exported: Some(chrono::Utc::now().to_rfc3339()),
        }),
    }
}

/// Render a simulation as pretty-printed JSON.
pub fn export_json(simulation: &Simulation) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export(simulation))
}

fn export_request(matcher: &RequestMatcher) -> RequestView {
    let field = |f: RequestField| export_field(f, matcher.field(f));
    RequestView {
        path: field(RequestField::Path),
        method: field(RequestField::Method),
        destination: field(RequestField::Destination),
        scheme: field(RequestField::Scheme),
        query: field(RequestField::Query),
        body: field(RequestField::Body),
        headers: matcher
            .headers
            .iter()
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect(),
        request_type: None,
    }
}

/// Group patterns by matcher type, keeping first-appearance order.
fn export_field(field: RequestField, spec: &FieldSpec) -> Option<FieldView> {
    if spec.is_wildcard() {
        return None;
    }
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for matcher in spec.matchers() {
        let key = matcher.matcher_type().key();
        let pattern = export_pattern(field, matcher.matcher_type(), matcher.pattern());
        match grouped.iter_mut().find(|(k, _)| k == key) {
            Some((_, patterns)) => patterns.push(pattern),
            None => grouped.push((key.to_string(), vec![pattern])),
        }
    }
    Some(FieldView::Matchers(grouped))
}

/// Literal query patterns are decoded on import, so a bare `%` must be
/// escaped for the document to import back to the same pattern.
fn export_pattern(field: RequestField, matcher_type: MatcherType, pattern: &str) -> String {
    let literal = matches!(matcher_type, MatcherType::Exact | MatcherType::Glob);
    if field == RequestField::Query && literal {
        pattern.replace('%', "%25")
    } else {
        pattern.to_string()
    }
}
