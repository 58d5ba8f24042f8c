use minijinja::Environment;
use serde::Serialize;

use crate::design::ApiDefinition;
use crate::router::Router;

const ROUTES_TEMPLATE: &str = r#"# {{ api }}{% if version %} ({{ version }}){% endif %}

{{ routes | length }} route(s).

| Method | Route | Handler | Responses | Timeout |
|--------|-------|---------|-----------|---------|
{% for r in routes -%}
| {{ r.method }} | `{{ r.template }}` | `{{ r.handler }}` | {{ r.responses | join(", ") }} | {% if r.timeout_ms %}{{ r.timeout_ms }} ms{% else %}-{% endif %} |
{% endfor %}
{%- for mt in media_types %}
## {{ mt.identifier }}

| View | Fields |
|------|--------|
{% for v in mt.views -%}
| {{ v.name }} | {{ v.fields | join(", ") }} |
{% endfor %}
{%- endfor %}
"#;

#[derive(Serialize)]
struct RouteLine {
    method: String,
    template: String,
    handler: String,
    /// `key status` pairs
    responses: Vec<String>,
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct ViewLine {
    name: String,
    fields: Vec<String>,
}

#[derive(Serialize)]
struct MediaTypeSection {
    identifier: String,
    views: Vec<ViewLine>,
}

#[derive(Serialize)]
struct RoutesContext {
    api: String,
    version: Option<String>,
    routes: Vec<RouteLine>,
    media_types: Vec<MediaTypeSection>,
}

fn context(api: &ApiDefinition, router: &Router) -> RoutesContext {
    let routes = router
        .entries()
        .iter()
        .map(|entry| RouteLine {
            method: entry.action.method.to_string(),
            template: entry.action.route.to_string(),
            handler: entry.handler_name.to_string(),
            responses: entry
                .action
                .responses
                .iter()
                .map(|(key, spec)| format!("{key} {}", spec.status))
                .collect(),
            timeout_ms: entry.action.timeout.map(|t| t.as_millis() as u64),
        })
        .collect();

    let media_types = api
        .media_types()
        .iter()
        .map(|mt| MediaTypeSection {
            identifier: mt.identifier.clone(),
            views: mt
                .views()
                .iter()
                .map(|v| ViewLine {
                    name: v.name.clone(),
                    fields: v
                        .fields
                        .iter()
                        .map(|f| match &f.view {
                            Some(view) => format!("{} ({view})", f.attribute),
                            None => f.attribute.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    RoutesContext {
        api: api.name.clone(),
        version: api.version.clone(),
        routes,
        media_types,
    }
}

/// Render `ROUTES.md`: the route table followed by the views of every media
/// type.
pub fn routes_markdown(api: &ApiDefinition, router: &Router) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("ROUTES.md", ROUTES_TEMPLATE)?;
    let tmpl = env.get_template("ROUTES.md")?;
    tmpl.render(context(api, router))
}
