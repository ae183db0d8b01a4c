//! Schema-identifier resolution and validation (§4.1, §6, P7).
//!
//! Generalizes the teacher's `configuration::source` priority-list resolver
//! (explicit override → subject → tenant → environment default → configured
//! default) from config-value lookup to schema-name lookup. Every resolved
//! identifier is checked against the allow-list regex before it is ever
//! interpolated into query text, since Postgres has no way to bind a schema
//! name as a query parameter.

use callhub_core::error::AppError;

/// Sources consulted in priority order; the first `Some` wins.
#[derive(Clone, Debug, Default)]
pub struct SchemaResolutionInputs<'a> {
    pub explicit_override: Option<&'a str>,
    pub subject_schema: Option<&'a str>,
    pub tenant_schema: Option<&'a str>,
    pub environment_default: Option<&'a str>,
    pub configured_default: &'a str,
}

/// Resolve and validate a schema identifier. Returns `AppError::Validation`
/// (surfaced internally as `invalid-schema`) if the winning candidate does
/// not match `^[A-Za-z0-9_]+$`.
pub fn resolve_schema(inputs: SchemaResolutionInputs<'_>) -> Result<String, AppError> {
    let candidate = inputs
        .explicit_override
        .or(inputs.subject_schema)
        .or(inputs.tenant_schema)
        .or(inputs.environment_default)
        .unwrap_or(inputs.configured_default);
    validate_schema_identifier(candidate)?;
    Ok(candidate.to_string())
}

pub fn validate_schema_identifier(candidate: &str) -> Result<(), AppError> {
    if !candidate.is_empty()
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "invalid-schema: `{candidate}` does not match ^[A-Za-z0-9_]+$"
        )))
    }
}

/// Render a schema-qualified, validated table reference for interpolation
/// into query text. Never call this with an unvalidated schema.
pub fn qualify(schema: &str, table: &str) -> String {
    format!("{schema}.{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_identifiers_with_injection_characters() {
        assert!(validate_schema_identifier("public; drop table x;--").is_err());
        assert!(validate_schema_identifier("public.other").is_err());
        assert!(validate_schema_identifier("").is_err());
    }

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_schema_identifier("tenant_42").is_ok());
    }

    #[test]
    fn priority_order_prefers_override() {
        let resolved = resolve_schema(SchemaResolutionInputs {
            explicit_override: Some("override_schema"),
            subject_schema: Some("subject_schema"),
            tenant_schema: Some("tenant_schema"),
            environment_default: Some("env_schema"),
            configured_default: "default_schema",
        })
        .unwrap();
        assert_eq!(resolved, "override_schema");
    }

    #[test]
    fn priority_order_falls_back_to_configured_default() {
        let resolved = resolve_schema(SchemaResolutionInputs {
            explicit_override: None,
            subject_schema: None,
            tenant_schema: None,
            environment_default: None,
            configured_default: "default_schema",
        })
        .unwrap();
        assert_eq!(resolved, "default_schema");
    }
}
