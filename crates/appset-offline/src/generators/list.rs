//! List generator: parameters taken literally from `elements`.

use std::time::Duration;

use serde_json::Value;

use super::{Generator, GeneratorError, Params};
use crate::{
	client::Client,
	types::{ApplicationSet, ApplicationSetGenerator, ApplicationSetTemplate},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ListGenerator;

impl ListGenerator {
	pub fn new() -> Self {
		Self
	}
}

impl Generator for ListGenerator {
	fn get_template<'a>(
		&self,
		generator: &'a ApplicationSetGenerator,
	) -> Option<&'a ApplicationSetTemplate> {
		generator.list.as_ref().map(|list| &list.template)
	}

	/// Elements never change, so there is nothing to requeue for.
	fn get_requeue_after(&self, _generator: &ApplicationSetGenerator) -> Duration {
		Duration::ZERO
	}

	fn generate_params(
		&self,
		generator: &ApplicationSetGenerator,
		app_set: &ApplicationSet,
		_client: &dyn Client,
	) -> Result<Vec<Params>, GeneratorError> {
		let list = generator.list.as_ref().ok_or(GeneratorError::EmptyGenerator)?;

		list.elements
			.iter()
			.enumerate()
			.map(|(index, element)| {
				let Value::Object(element) = element else {
					return Err(GeneratorError::ListElement {
						index,
						reason: "element is not an object".to_string(),
					});
				};
				if app_set.spec.go_template {
					Ok(element.clone())
				} else {
					flat_element_params(index, element)
				}
			})
			.collect()
	}
}

/// Flat-mode parameters: string members as-is, `values` spread into `values.<key>`.
fn flat_element_params(index: usize, element: &Params) -> Result<Params, GeneratorError> {
	let not_a_string = |key: &str| GeneratorError::ListElement {
		index,
		reason: format!("value of {key:?} is not a string"),
	};

	let mut params = Params::new();
	for (key, value) in element {
		if key == "values" {
			let Value::Object(values) = value else {
				return Err(GeneratorError::ListElement {
					index,
					reason: "values is not a map".to_string(),
				});
			};
			for (k, v) in values {
				let v = v.as_str().ok_or_else(|| not_a_string(k))?;
				params.insert(format!("values.{k}"), v.into());
			}
		} else {
			let v = value.as_str().ok_or_else(|| not_a_string(key))?;
			params.insert(key.clone(), v.into());
		}
	}
	Ok(params)
}
