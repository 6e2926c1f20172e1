//! Download URL templates.
//!
//! A template is plain text with `{field}` placeholders that are replaced by
//! the value of the named tool field. `{{` and `}}` produce literal braces.
//!
//! ```text
//! https://github.com/{name}/releases/download/v{version}/{name}-{arch}.tar.gz
//! ```

use thiserror::Error;

/// Why a template could not be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a field the tool does not have.
    #[error("template error: unknown field `{field}` in `{template}`")]
    MissingField { field: String, template: String },

    /// A `{` is never closed.
    #[error("template error: unclosed `{{` at byte {position} in `{template}`")]
    Unclosed { position: usize, template: String },

    /// A lone `}` that is neither escaped nor closing a placeholder.
    #[error("template error: single `}}` at byte {position} in `{template}`")]
    UnmatchedBrace { position: usize, template: String },

    /// `{}` without a field name.
    #[error("template error: empty placeholder at byte {position} in `{template}`")]
    EmptyPlaceholder { position: usize, template: String },
}

/// Renders `template`, resolving each placeholder through `lookup`.
///
/// # Errors
///
/// Returns a [`TemplateError`] for unknown fields and malformed braces.
pub fn render<'a, F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if chars.next_if(|&(_, next)| next == '{').is_some() => out.push('{'),
            '}' if chars.next_if(|&(_, next)| next == '}').is_some() => out.push('}'),
            '}' => {
                return Err(TemplateError::UnmatchedBrace {
                    position,
                    template: template.to_string(),
                });
            }
            '{' => {
                let start = position + 1;
                let Some((end, _)) = chars.find(|&(_, c)| c == '}') else {
                    return Err(TemplateError::Unclosed {
                        position,
                        template: template.to_string(),
                    });
                };
                let field = &template[start..end];
                if field.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder {
                        position,
                        template: template.to_string(),
                    });
                }
                let value = lookup(field).ok_or_else(|| TemplateError::MissingField {
                    field: field.to_string(),
                    template: template.to_string(),
                })?;
                out.push_str(value);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str) -> Option<&'static str> {
        match name {
            "name" => Some("ripgrep"),
            "version" => Some("14.1.0"),
            "arch" => Some("x86_64"),
            _ => None,
        }
    }

    #[test]
    fn substitutes_named_fields() {
        let url = render(
            "https://github.com/BurntSushi/{name}/releases/download/{version}/{name}-{version}-{arch}.tar.gz",
            fields,
        )
        .expect("Should render");
        assert_eq!(
            url,
            "https://github.com/BurntSushi/ripgrep/releases/download/14.1.0/ripgrep-14.1.0-x86_64.tar.gz"
        );
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let url = render("https://example.com/tool.zip", fields).expect("Should render");
        assert_eq!(url, "https://example.com/tool.zip");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = render("{{name}} is {name}, }}", fields).expect("Should render");
        assert_eq!(out, "{name} is ripgrep, }");
    }

    #[test]
    fn unknown_field_is_reported() {
        let err = render("https://x/{name}/{os}.zip", fields).expect_err("Should fail");
        assert_eq!(
            err,
            TemplateError::MissingField {
                field: "os".to_string(),
                template: "https://x/{name}/{os}.zip".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "template error: unknown field `os` in `https://x/{name}/{os}.zip`"
        );
    }

    #[test]
    fn unclosed_brace_is_reported() {
        let err = render("v{version", fields).expect_err("Should fail");
        assert!(matches!(err, TemplateError::Unclosed { position: 1, .. }));
    }

    #[test]
    fn lone_closing_brace_is_reported() {
        let err = render("v}1", fields).expect_err("Should fail");
        assert!(matches!(err, TemplateError::UnmatchedBrace { position: 1, .. }));
    }

    #[test]
    fn empty_placeholder_is_reported() {
        let err = render("tool-{}.zip", fields).expect_err("Should fail");
        assert!(matches!(err, TemplateError::EmptyPlaceholder { position: 5, .. }));
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let out = render("ünïcode/{name}", fields).expect("Should render");
        assert_eq!(out, "ünïcode/ripgrep");
    }
}
