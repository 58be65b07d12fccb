//! Note-type configuration extraction.

use super::{fold_updated, ConfigError};
use crate::syntax::{BlockTokenizer, PackKind};
use pagedeck_types::{joined_text, Field, Line, NoteType, Template, SOURCE_URL_FIELD};

const NOTE_TYPE_FILE: &str = "noteType.json";
const CSS_FILE: &str = "css";
const LATEX_PRE_FILE: &str = "pre.tex";
const LATEX_POST_FILE: &str = "post.tex";
const QUESTION_EXT: &str = ".question.html";
const ANSWER_EXT: &str = ".answer.html";

/// Extract a [`NoteType`] from a page's lines.
///
/// Code blocks are demultiplexed by file name: `noteType.json` carries
/// the main JSON, `css` the stylesheet, `pre.tex`/`post.tex` the LaTeX
/// wrapper (applied only when both are present), and
/// `<name>.question.html` / `<name>.answer.html` pairs accumulate one
/// template per name.
pub fn parse_note_type<T: BlockTokenizer + ?Sized>(
    tokenizer: &T,
    lines: &[Line],
) -> Result<NoteType, ConfigError> {
    if lines.is_empty() {
        return Err(ConfigError::NotFound(
            "This is an empty page so no note type is found.".into(),
        ));
    }
    let packs = tokenizer.parse_rows(&joined_text(lines), true);

    let mut json = String::new();
    let mut css = String::new();
    let mut latex_pre = String::new();
    let mut latex_post = String::new();
    // Template fragments keyed by name, in first-appearance order.
    let mut template_parts: Vec<(String, (String, String))> = Vec::new();
    let mut updated = 0i64;
    let mut counter = 0usize;

    for pack in &packs {
        match pack.kind {
            PackKind::Title | PackKind::Line | PackKind::Table => {
                counter += pack.row_count();
            }
            PackKind::Code => {
                updated = fold_updated(updated, lines, counter, pack.row_count());
                counter += pack.row_count();

                let (_, file_name, content) = tokenizer.convert(pack).into_code();
                let fragment = format!("\n{content}");
                match file_name.as_str() {
                    NOTE_TYPE_FILE => json.push_str(&fragment),
                    CSS_FILE => css.push_str(&fragment),
                    LATEX_PRE_FILE => latex_pre.push_str(&fragment),
                    LATEX_POST_FILE => latex_post.push_str(&fragment),
                    _ => {
                        if let Some(name) = file_name.strip_suffix(QUESTION_EXT) {
                            template_entry(&mut template_parts, name).0.push_str(&fragment);
                        } else if let Some(name) = file_name.strip_suffix(ANSWER_EXT) {
                            template_entry(&mut template_parts, name).1.push_str(&fragment);
                        }
                    }
                }
            }
        }
    }

    if json.trim().is_empty() {
        return Err(ConfigError::NotFound(
            "No note type settings found in the page.".into(),
        ));
    }

    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| ConfigError::Syntax(e.to_string()))?;
    let note_type = value
        .as_object()
        .ok_or_else(|| ConfigError::Invalid("Note type setting must be an object.".into()))?;

    let name = match note_type.get("name") {
        None => return Err(ConfigError::Invalid("Note type name is not found.".into())),
        Some(value) => value
            .as_str()
            .ok_or_else(|| ConfigError::Invalid("Note type name must be string.".into()))?,
    };
    let id = match note_type.get("id") {
        None => return Err(ConfigError::Invalid("Note type id not found.".into())),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| ConfigError::Invalid("Note type id must be number.".into()))?,
    };

    let raw_fields = match note_type.get("fields") {
        None => return Err(ConfigError::Invalid("Note type must have fields.".into())),
        Some(value) => value
            .as_array()
            .ok_or_else(|| ConfigError::Invalid("`fields` must be an array.".into()))?,
    };
    let mut fields = Vec::with_capacity(raw_fields.len() + 1);
    for raw in raw_fields {
        fields.push(validate_field(raw)?);
    }
    // The source-URL field is reserved: appended automatically, with a
    // redundant author declaration dropped in its favor.
    fields.retain(|field: &Field| field.name != SOURCE_URL_FIELD);
    fields.push(Field::named(SOURCE_URL_FIELD));

    if template_parts.is_empty() {
        return Err(ConfigError::Invalid(
            "Note type must have one or more template.".into(),
        ));
    }
    let mut templates = Vec::with_capacity(template_parts.len());
    for (name, (question, answer)) in template_parts {
        if question.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "\"{name}{QUESTION_EXT}\" is empty."
            )));
        }
        if answer.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "\"{name}{ANSWER_EXT}\" is empty."
            )));
        }
        templates.push(Template {
            name,
            question,
            answer,
        });
    }

    let is_cloze = match note_type.get("isCloze") {
        None => None,
        Some(value) => Some(
            value
                .as_bool()
                .ok_or_else(|| ConfigError::Invalid("`isCloze` must be a boolean.".into()))?,
        ),
    };

    Ok(NoteType {
        id,
        name: name.to_string(),
        updated,
        fields,
        templates,
        css: (!css.trim().is_empty()).then_some(css),
        latex: (!latex_pre.trim().is_empty() && !latex_post.trim().is_empty())
            .then_some((latex_pre, latex_post)),
        is_cloze,
    })
}

fn template_entry<'a>(
    parts: &'a mut Vec<(String, (String, String))>,
    name: &str,
) -> &'a mut (String, String) {
    if let Some(index) = parts.iter().position(|(n, _)| n == name) {
        return &mut parts[index].1;
    }
    parts.push((name.to_string(), (String::new(), String::new())));
    &mut parts.last_mut().unwrap().1
}

fn validate_field(raw: &serde_json::Value) -> Result<Field, ConfigError> {
    match raw {
        serde_json::Value::String(name) => Ok(Field::named(name)),
        serde_json::Value::Object(object) => {
            let name = match object.get("name") {
                None => {
                    return Err(ConfigError::Invalid(
                        "Each field object must have `name`.".into(),
                    ))
                }
                Some(value) => value.as_str().ok_or_else(|| {
                    ConfigError::Invalid("The name of a field must be a string.".into())
                })?,
            };
            let mut field = Field::named(name);

            if let Some(value) = object.get("description") {
                field.description = Some(
                    value
                        .as_str()
                        .ok_or_else(|| {
                            ConfigError::Invalid(
                                "The description of a field must be a string.".into(),
                            )
                        })?
                        .to_string(),
                );
            }
            if let Some(value) = object.get("rtl") {
                field.rtl = Some(value.as_bool().ok_or_else(|| {
                    ConfigError::Invalid("The rtl of a field must be a boolean.".into())
                })?);
            }
            if let Some(value) = object.get("font") {
                field.font = Some(
                    value
                        .as_str()
                        .ok_or_else(|| {
                            ConfigError::Invalid("The font of a field must be a string.".into())
                        })?
                        .to_string(),
                );
            }
            if let Some(value) = object.get("fontSize") {
                field.font_size = Some(
                    value
                        .as_u64()
                        .and_then(|size| u32::try_from(size).ok())
                        .ok_or_else(|| {
                            ConfigError::Invalid("The fontSize of a field must be a number.".into())
                        })?,
                );
            }
            Ok(field)
        }
        _ => Err(ConfigError::Invalid(
            "Members of `fields` must be a string or an object.".into(),
        )),
    }
}
