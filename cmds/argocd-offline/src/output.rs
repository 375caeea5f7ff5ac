//! Printing previews.

use std::io::Write;

use anyhow::Result;
use appset_offline::types::Application;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
	/// One name per line
	#[default]
	Name,
	/// Pretty-printed JSON, one document per object
	Json,
	/// YAML stream separated by `---`
	Yaml,
}

pub fn write_applications<W: Write>(
	writer: &mut W,
	applications: &[Application],
	format: OutputFormat,
) -> Result<()> {
	write_objects(writer, applications, format, |app| app.name().to_string())
}

pub fn write_resources<W: Write>(
	writer: &mut W,
	resources: &[Value],
	format: OutputFormat,
) -> Result<()> {
	write_objects(writer, resources, format, resource_name)
}

/// `Kind/name` of a Kubernetes object.
pub fn resource_name(resource: &Value) -> String {
	let kind = resource
		.get("kind")
		.and_then(Value::as_str)
		.unwrap_or_default();
	let name = resource
		.pointer("/metadata/name")
		.and_then(Value::as_str)
		.unwrap_or_default();
	format!("{kind}/{name}")
}

fn write_objects<W: Write, T: Serialize>(
	writer: &mut W,
	objects: &[T],
	format: OutputFormat,
	name_of: impl Fn(&T) -> String,
) -> Result<()> {
	for (i, object) in objects.iter().enumerate() {
		match format {
			OutputFormat::Name => writeln!(writer, "{}", name_of(object))?,
			OutputFormat::Json => {
				serde_json::to_writer_pretty(&mut *writer, object)?;
				writeln!(writer)?;
			}
			OutputFormat::Yaml => {
				if i > 0 {
					writeln!(writer, "---")?;
				}
				write!(writer, "{}", serde_yaml::to_string(object)?)?;
			}
		}
	}
	writer.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use serde_json::json;

	use super::*;

	fn resources() -> Vec<Value> {
		vec![
			json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": "web" } }),
			json!({ "apiVersion": "apps/v1", "kind": "Deployment", "metadata": { "name": "web" } }),
		]
	}

	fn render(format: OutputFormat) -> String {
		let mut out = Vec::new();
		write_resources(&mut out, &resources(), format).unwrap();
		String::from_utf8(out).unwrap()
	}

	#[test]
	fn test_name_output() {
		assert_eq!(render(OutputFormat::Name), "Service/web\nDeployment/web\n");
	}

	#[test]
	fn test_yaml_output() {
		assert_eq!(
			render(OutputFormat::Yaml),
			indoc! {"
				apiVersion: v1
				kind: Service
				metadata:
				  name: web
				---
				apiVersion: apps/v1
				kind: Deployment
				metadata:
				  name: web
			"}
		);
	}

	#[test]
	fn test_json_output_is_one_document_per_object() {
		let output = render(OutputFormat::Json);
		let documents: Vec<Value> = serde_json::Deserializer::from_str(&output)
			.into_iter::<Value>()
			.collect::<Result<_, _>>()
			.unwrap();
		assert_eq!(documents, resources());
	}

	#[test]
	fn test_application_names() {
		let apps: Vec<Application> = ["guestbook", "helm-guestbook"]
			.into_iter()
			.map(|name| {
				serde_json::from_value(json!({ "kind": "Application", "metadata": { "name": name } }))
					.unwrap()
			})
			.collect();

		let mut out = Vec::new();
		write_applications(&mut out, &apps, OutputFormat::Name).unwrap();

		assert_eq!(String::from_utf8(out).unwrap(), "guestbook\nhelm-guestbook\n");
	}
}
