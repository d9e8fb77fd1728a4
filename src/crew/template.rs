//! Prompt template resolution
//!
//! Task descriptions, expected-output descriptions and output-file paths are
//! templates rendered against the run's variable map.
//!
//! # Syntax
//!
//! - `{name}` substitutes the value of `name`; whitespace inside the braces
//!   is ignored, and names may contain dots (`{extract_requirements_task.output}`)
//! - `{{` renders a literal `{`, `}}` renders a literal `}`
//! - a lone `}` is kept as-is
//!
//! Resolution is a pure function of the template and the variable map.
//! Referencing a name that is not in the map is an error, never an empty
//! substitution.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Template rendering failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("undefined variable '{name}' at position {position} in template")]
    UndefinedVariable { name: String, position: usize },

    #[error("unmatched '{{' at position {position} in template")]
    UnmatchedBrace { position: usize },

    #[error("empty variable name '{{}}' at position {position} in template")]
    EmptyVariableName { position: usize },
}

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(char),
    Variable { name: &'a str, position: usize },
}

/// Tokenize a template into literal characters and variable references
fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    segments.push(Segment::Literal('{'));
                    continue;
                }

                let name_start = pos + 1;
                let name_end = loop {
                    match chars.next() {
                        Some((end, '}')) => break end,
                        Some((_, '{')) => return Err(TemplateError::UnmatchedBrace { position: pos }),
                        Some(_) => {}
                        None => return Err(TemplateError::UnmatchedBrace { position: pos }),
                    }
                };

                let name = template[name_start..name_end].trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyVariableName { position: pos });
                }

                segments.push(Segment::Variable {
                    name,
                    position: pos,
                });
            }
            '}' => {
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                }
                segments.push(Segment::Literal('}'));
            }
            _ => segments.push(Segment::Literal(ch)),
        }
    }

    Ok(segments)
}

/// Renders task templates against a variable map
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptResolver;

impl PromptResolver {
    pub fn new() -> Self {
        Self
    }

    /// Substitute every placeholder in `template` with its value from `variables`
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use geo_crew::crew::PromptResolver;
    ///
    /// let mut vars = HashMap::new();
    /// vars.insert("brief".to_string(), "X".to_string());
    ///
    /// let prompt = PromptResolver::new().resolve("Summarize: {brief}", &vars).unwrap();
    /// assert_eq!(prompt, "Summarize: X");
    /// ```
    pub fn resolve(
        &self,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(template.len());

        for segment in parse(template)? {
            match segment {
                Segment::Literal(ch) => rendered.push(ch),
                Segment::Variable { name, position } => match variables.get(name) {
                    Some(value) => rendered.push_str(value),
                    None => {
                        return Err(TemplateError::UndefinedVariable {
                            name: name.to_string(),
                            position,
                        })
                    }
                },
            }
        }

        Ok(rendered)
    }

    /// Distinct variable names referenced by `template`, sorted
    pub fn placeholders(&self, template: &str) -> Result<BTreeSet<String>, TemplateError> {
        Ok(parse(template)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Variable { name, .. } => Some(name.to_string()),
                Segment::Literal(_) => None,
            })
            .collect())
    }
}

/// Build a variable map from key/value pairs
pub fn vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
