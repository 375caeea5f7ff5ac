//! Application template rendering.
//!
//! Two syntaxes are supported, selected by `spec.goTemplate`:
//! - flat: `{{ key }}` tags replaced by string parameters; tags without a
//!   matching parameter are left as written
//! - Go templates, evaluated with gtmpl against the nested parameters

use std::{collections::HashMap, sync::OnceLock};

use gtmpl::{Context, FuncError, Value as TmplValue};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::{
	generators::Params,
	types::{
		Application, ApplicationSet, ApplicationSetTemplate, ApplicationSetTemplateMeta,
		ApplicationSpec, ARGOPROJ_API_VERSION,
	},
};

/// Longest name allowed for a DNS subdomain.
const MAX_DNS_NAME_LENGTH: usize = 253;

/// Rendered for template fields that resolve to nothing.
const NO_VALUE: &str = "<no value>";

#[derive(Debug, Error)]
pub enum TemplateError {
	#[error("invalid template {template:?}: {reason}")]
	Parse { template: String, reason: String },

	#[error("failed to execute template {template:?}: {reason}")]
	Execute { template: String, reason: String },

	#[error("template {template:?} references a missing key")]
	MissingKey { template: String },

	#[error("rendered template is not a valid Application")]
	Decode(#[from] serde_json::Error),
}

/// Lowercase `name` and replace everything a DNS subdomain can't hold with `-`.
pub fn sanitize_name(name: &str) -> String {
	static INVALID_DNS_NAME_CHARS: OnceLock<Regex> = OnceLock::new();
	let invalid = INVALID_DNS_NAME_CHARS
		.get_or_init(|| Regex::new("[^-a-z0-9.]").expect("valid DNS name character class"));

	let mut sanitized = invalid
		.replace_all(&name.to_lowercase(), "-")
		.into_owned();
	// Only ASCII is left, so byte truncation can't split a character
	sanitized.truncate(MAX_DNS_NAME_LENGTH);
	sanitized.trim_matches(['-', '.']).to_string()
}

/// Render a single string against `params`.
pub fn replace_templated_string(
	template: &str,
	params: &Params,
	use_go_template: bool,
	go_template_options: &[String],
) -> Result<String, TemplateError> {
	if !template.contains("{{") {
		return Ok(template.to_string());
	}
	if use_go_template {
		execute_go_template(template, params, go_template_options)
	} else {
		replace_flat_tags(template, params)
	}
}

fn replace_flat_tags(template: &str, params: &Params) -> Result<String, TemplateError> {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = rest.find("{{") {
		out.push_str(&rest[..start]);
		let after = &rest[start + 2..];
		let end = after.find("}}").ok_or_else(|| TemplateError::Parse {
			template: template.to_string(),
			reason: "cannot find end tag \"}}\"".to_string(),
		})?;

		let tag = &after[..end];
		match params.get(tag.trim()) {
			Some(Value::String(value)) if !tag.trim().is_empty() => out.push_str(value),
			_ => {
				out.push_str("{{");
				out.push_str(tag);
				out.push_str("}}");
			}
		}
		rest = &after[end + 2..];
	}

	out.push_str(rest);
	Ok(out)
}

fn execute_go_template(
	template: &str,
	params: &Params,
	options: &[String],
) -> Result<String, TemplateError> {
	let mut tmpl = gtmpl::Template::default();
	tmpl.add_func("default", tmpl_default);
	tmpl.add_func("lower", tmpl_lower);
	tmpl.add_func("upper", tmpl_upper);
	tmpl.add_func("normalize", tmpl_normalize);
	tmpl.parse(template).map_err(|e| TemplateError::Parse {
		template: template.to_string(),
		reason: format!("{:?}", e),
	})?;

	let context = Context::from(params_to_gtmpl(params));
	let rendered = tmpl.render(&context).map_err(|e| TemplateError::Execute {
		template: template.to_string(),
		reason: format!("{:?}", e),
	})?;

	let missing_key_error = options
		.iter()
		.any(|option| option == "missingkey=error");
	if missing_key_error && rendered.contains(NO_VALUE) {
		return Err(TemplateError::MissingKey {
			template: template.to_string(),
		});
	}

	Ok(rendered)
}

/// Sprig's `default`: the piped value unless it is empty, then the fallback.
fn tmpl_default(args: &[TmplValue]) -> Result<TmplValue, FuncError> {
	// Piped values come last, so check them first
	for arg in args.iter().rev() {
		if !is_empty_value(arg) {
			return Ok(arg.clone());
		}
	}
	Ok(args.first().cloned().unwrap_or(TmplValue::NoValue))
}

fn tmpl_lower(args: &[TmplValue]) -> Result<TmplValue, FuncError> {
	Ok(map_string_arg(args, str::to_lowercase))
}

fn tmpl_upper(args: &[TmplValue]) -> Result<TmplValue, FuncError> {
	Ok(map_string_arg(args, str::to_uppercase))
}

fn tmpl_normalize(args: &[TmplValue]) -> Result<TmplValue, FuncError> {
	Ok(map_string_arg(args, sanitize_name))
}

/// Apply `f` to the last (piped) argument when it is a string.
fn map_string_arg(args: &[TmplValue], f: impl Fn(&str) -> String) -> TmplValue {
	match args.last() {
		Some(TmplValue::String(s)) => TmplValue::String(f(s)),
		Some(other) => other.clone(),
		None => TmplValue::NoValue,
	}
}

fn is_empty_value(v: &TmplValue) -> bool {
	match v {
		TmplValue::NoValue | TmplValue::Nil => true,
		TmplValue::Bool(b) => !b,
		TmplValue::String(s) => s.is_empty(),
		TmplValue::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
		TmplValue::Array(a) => a.is_empty(),
		TmplValue::Map(m) => m.is_empty(),
		TmplValue::Object(o) => o.is_empty(),
		_ => false,
	}
}

fn params_to_gtmpl(params: &Params) -> TmplValue {
	TmplValue::Map(
		params
			.iter()
			.map(|(k, v)| (k.clone(), json_to_gtmpl(v)))
			.collect::<HashMap<_, _>>(),
	)
}

fn json_to_gtmpl(value: &Value) -> TmplValue {
	match value {
		Value::Null => TmplValue::Nil,
		Value::Bool(b) => TmplValue::Bool(*b),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				TmplValue::Number(i.into())
			} else if let Some(f) = n.as_f64() {
				TmplValue::Number(f.into())
			} else {
				TmplValue::Nil
			}
		}
		Value::String(s) => TmplValue::String(s.clone()),
		Value::Array(arr) => TmplValue::Array(arr.iter().map(json_to_gtmpl).collect()),
		Value::Object(obj) => TmplValue::Map(
			obj.iter()
				.map(|(k, v)| (k.clone(), json_to_gtmpl(v)))
				.collect(),
		),
	}
}

/// Deep merge two JSON values (patch into base).
fn merge_json(base: Value, patch: Value) -> Value {
	match (base, patch) {
		(Value::Object(mut base_map), Value::Object(patch_map)) => {
			for (key, patch_value) in patch_map {
				let base_value = base_map.remove(&key).unwrap_or(Value::Null);
				base_map.insert(key, merge_json(base_value, patch_value));
			}
			Value::Object(base_map)
		}
		(_, patch) => patch,
	}
}

/// Overlay a generator's template on the ApplicationSet's template.
///
/// Fields the generator sets win; the rest come from the ApplicationSet.
pub fn merge_templates(
	app_set_template: &ApplicationSetTemplate,
	generator_template: Option<&ApplicationSetTemplate>,
) -> Result<ApplicationSetTemplate, TemplateError> {
	let Some(generator_template) = generator_template else {
		return Ok(app_set_template.clone());
	};
	let base = serde_json::to_value(app_set_template)?;
	let patch = serde_json::to_value(generator_template)?;
	Ok(serde_json::from_value(merge_json(base, patch))?)
}

/// Render every string inside `value` in place.
fn render_strings(
	value: &mut Value,
	render: &dyn Fn(&str) -> Result<String, TemplateError>,
) -> Result<(), TemplateError> {
	match value {
		Value::String(s) => *s = render(s)?,
		Value::Array(items) => {
			for item in items {
				render_strings(item, render)?;
			}
		}
		Value::Object(map) => {
			for item in map.values_mut() {
				render_strings(item, render)?;
			}
		}
		Value::Null | Value::Bool(_) | Value::Number(_) => {}
	}
	Ok(())
}

/// Render an Application from `template` and one parameter set.
///
/// Applications without a namespace in the template land in the
/// ApplicationSet's namespace.
#[instrument(skip_all, fields(app_set = %app_set.name()))]
pub fn render_application(
	template: &ApplicationSetTemplate,
	params: &Params,
	app_set: &ApplicationSet,
) -> Result<Application, TemplateError> {
	let use_go_template = app_set.spec.go_template;
	let options = &app_set.spec.go_template_options;

	let mut value = serde_json::to_value(template)?;
	render_strings(&mut value, &|s| {
		replace_templated_string(s, params, use_go_template, options)
	})?;
	let rendered: ApplicationSetTemplate = serde_json::from_value(value)?;

	let ApplicationSetTemplateMeta {
		name,
		namespace,
		labels,
		annotations,
		finalizers,
	} = rendered.metadata;

	let metadata = ObjectMeta {
		name: Some(name).filter(|n| !n.is_empty()),
		namespace: Some(namespace)
			.filter(|ns| !ns.is_empty())
			.or_else(|| app_set.metadata.namespace.clone()),
		labels: Some(labels).filter(|l| !l.is_empty()),
		annotations: Some(annotations).filter(|a| !a.is_empty()),
		finalizers: Some(finalizers).filter(|f| !f.is_empty()),
		..Default::default()
	};

	let spec = match rendered.spec {
		Value::Null => ApplicationSpec::default(),
		spec => serde_json::from_value(spec)?,
	};

	Ok(Application {
		api_version: ARGOPROJ_API_VERSION.to_string(),
		kind: "Application".to_string(),
		metadata,
		spec,
	})
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn params(value: Value) -> Params {
		match value {
			Value::Object(map) => map,
			_ => panic!("params must be an object"),
		}
	}

	#[rstest]
	#[case::plain("Guestbook", "guestbook")]
	#[case::underscores("my_app", "my-app")]
	#[case::dots_kept("app.v1", "app.v1")]
	#[case::trimmed("-_app_.", "app")]
	#[case::unicode("héllo wörld", "h-llo-w-rld")]
	fn test_sanitize_name(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(sanitize_name(input), expected);
	}

	#[test]
	fn test_sanitize_name_truncates() {
		let long = "a".repeat(300);
		assert_eq!(sanitize_name(&long).len(), MAX_DNS_NAME_LENGTH);
	}

	#[rstest]
	#[case::simple("{{path.basename}}", "guestbook")]
	#[case::spaces("app-{{ path.basename }}-x", "app-guestbook-x")]
	#[case::unknown_kept("{{cluster}}", "{{cluster}}")]
	#[case::non_string_kept("{{replicas}}", "{{replicas}}")]
	#[case::empty_tag("{{}}", "{{}}")]
	#[case::multiple("{{path[0]}}/{{path[1]}}", "apps/guestbook")]
	#[case::no_tags("static", "static")]
	fn test_flat_replacement(#[case] template: &str, #[case] expected: &str) {
		let params = params(json!({
			"path.basename": "guestbook",
			"path[0]": "apps",
			"path[1]": "guestbook",
			"replicas": 3,
		}));

		assert_eq!(
			replace_templated_string(template, &params, false, &[]).unwrap(),
			expected
		);
	}

	#[test]
	fn test_flat_unterminated_tag() {
		let result = replace_templated_string("{{path", &Params::new(), false, &[]);
		assert_matches!(result, Err(TemplateError::Parse { .. }));
	}

	#[rstest]
	#[case::field("{{.path.basename}}", "guestbook")]
	#[case::index("{{index .path.segments 1}}", "guestbook")]
	#[case::normalize("{{normalize .name}}", "my-app")]
	#[case::upper("{{upper .path.basename}}", "GUESTBOOK")]
	#[case::default_used("{{default \"none\" .empty}}", "none")]
	fn test_go_template(#[case] template: &str, #[case] expected: &str) {
		let params = params(json!({
			"path": {
				"path": "apps/guestbook",
				"basename": "guestbook",
				"segments": ["apps", "guestbook"],
			},
			"name": "My_App",
			"empty": "",
		}));

		assert_eq!(
			replace_templated_string(template, &params, true, &[]).unwrap(),
			expected
		);
	}

	#[test]
	fn test_go_template_missing_key_error() {
		let options = vec!["missingkey=error".to_string()];
		let result = replace_templated_string("{{.missing}}", &Params::new(), true, &options);
		assert_matches!(result, Err(TemplateError::MissingKey { .. }));
	}

	#[test]
	fn test_merge_templates_generator_wins() {
		let app_set_template: ApplicationSetTemplate = serde_json::from_value(json!({
			"metadata": { "name": "{{path.basename}}", "labels": { "team": "a" } },
			"spec": { "project": "default", "destination": { "namespace": "apps" } }
		}))
		.unwrap();
		let generator_template: ApplicationSetTemplate = serde_json::from_value(json!({
			"metadata": { "labels": { "tier": "web" } },
			"spec": { "destination": { "namespace": "web" } }
		}))
		.unwrap();

		let merged = merge_templates(&app_set_template, Some(&generator_template)).unwrap();

		assert_eq!(
			serde_json::to_value(merged).unwrap(),
			json!({
				"metadata": {
					"name": "{{path.basename}}",
					"labels": { "team": "a", "tier": "web" }
				},
				"spec": { "project": "default", "destination": { "namespace": "web" } }
			})
		);
	}

	#[test]
	fn test_merge_templates_without_override() {
		let template = ApplicationSetTemplate {
			metadata: ApplicationSetTemplateMeta {
				name: "app".to_string(),
				..Default::default()
			},
			spec: json!({ "project": "default" }),
		};

		assert_eq!(merge_templates(&template, None).unwrap(), template);
	}

	#[test]
	fn test_render_application() {
		let app_set: ApplicationSet = serde_json::from_value(json!({
			"apiVersion": "argoproj.io/v1alpha1",
			"kind": "ApplicationSet",
			"metadata": { "name": "guestbook", "namespace": "argocd" },
			"spec": {}
		}))
		.unwrap();
		let template: ApplicationSetTemplate = serde_json::from_value(json!({
			"metadata": { "name": "{{path.basename}}", "labels": { "app": "{{path.basename}}" } },
			"spec": {
				"project": "default",
				"source": {
					"repoURL": "https://github.com/org/repo.git",
					"targetRevision": "HEAD",
					"path": "{{path}}"
				},
				"destination": { "server": "https://kubernetes.default.svc", "namespace": "{{path.basename}}" }
			}
		}))
		.unwrap();
		let params = params(json!({ "path": "apps/guestbook", "path.basename": "guestbook" }));

		let app = render_application(&template, &params, &app_set).unwrap();

		assert_eq!(app.kind, "Application");
		assert_eq!(app.name(), "guestbook");
		assert_eq!(app.metadata.namespace.as_deref(), Some("argocd"));
		assert_eq!(
			app.metadata.labels.unwrap().get("app").map(String::as_str),
			Some("guestbook")
		);
		let source = app.spec.source.unwrap();
		assert_eq!(source.path, "apps/guestbook");
		assert_eq!(source.target_revision, "HEAD");
		assert_eq!(
			app.spec.destination.unwrap().namespace.as_deref(),
			Some("guestbook")
		);
		assert_eq!(app.spec.extra.get("project"), Some(&json!("default")));
	}
}
